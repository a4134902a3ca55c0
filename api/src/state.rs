use std::sync::Arc;

use crate::config::ApiSettings;
use crate::repositories::{ArticleRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        articles: Arc<dyn ArticleRepository>,
        settings: ApiSettings,
    ) -> Self {
        Self {
            users,
            articles,
            settings: Arc::new(settings),
        }
    }
}
