use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ArticleRepository, RepositoryError, RepositoryResult, UserRepository};
use crate::models::{AccessToken, ArticleRecord, User, UserChanges};

/// Process-local repositories for tests and local runs.
#[derive(Default)]
pub struct InMemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    tokens: RwLock<HashMap<String, AccessToken>>,
    articles: RwLock<Vec<ArticleRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<ArticleRecord>) -> Self {
        Self {
            articles: RwLock::new(articles),
            ..Self::default()
        }
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, email: &str, hashed_password: &str) -> RepositoryResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(RepositoryError::Conflict("email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            is_active: true,
            is_superuser: false,
            is_verified: false,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> RepositoryResult<Option<User>> {
        let mut users = self.users.write().await;

        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(RepositoryError::Conflict("email already registered".to_string()));
            }
        }

        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hashed_password) = changes.hashed_password {
            user.hashed_password = hashed_password;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        if let Some(is_superuser) = changes.is_superuser {
            user.is_superuser = is_superuser;
        }
        if let Some(is_verified) = changes.is_verified {
            user.is_verified = is_verified;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> RepositoryResult<bool> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            self.tokens.write().await.retain(|_, t| t.user_id != id);
        }
        Ok(removed)
    }

    async fn create_token(&self, token: &AccessToken) -> RepositoryResult<()> {
        self.tokens
            .write()
            .await
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, token: &str) -> RepositoryResult<Option<AccessToken>> {
        Ok(self.tokens.read().await.get(token).cloned())
    }

    async fn delete_token(&self, token: &str) -> RepositoryResult<()> {
        self.tokens.write().await.remove(token);
        Ok(())
    }

    async fn delete_tokens_created_before(&self, cutoff: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.created_at >= cutoff);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl ArticleRepository for InMemoryRepository {
    async fn list_articles(
        &self,
        limit: i64,
        offset: i64,
        tag: Option<&str>,
    ) -> RepositoryResult<Vec<ArticleRecord>> {
        let articles = self.articles.read().await;
        let mut matching: Vec<&ArticleRecord> = articles
            .iter()
            .filter(|a| match tag {
                Some(tag) => a.tags.as_ref().is_some_and(|tags| tags.iter().any(|t| t == tag)),
                None => true,
            })
            .collect();

        // Newest first, undated rows last.
        matching.sort_by(|a, b| match (a.published, b.published) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_article(&self, id: i64) -> RepositoryResult<Option<ArticleRecord>> {
        Ok(self
            .articles
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }
}
