pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod router;
pub mod state;

pub use config::ApiSettings;
pub use error::{ApiError, ApiResult};
pub use repositories::{ArticleRepository, InMemoryRepository, PgRepository, UserRepository};
pub use router::create_router;
pub use state::AppState;
