use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::backend::PersistenceBackend;
use crate::config::{AppConfig, JwtConfig};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub backend: PersistenceBackend,
    pub jwt: JwtKeys,
}

impl AppState {
    /// Connects the configured store and creates its schema. Fails fast when
    /// the schema cannot be created.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let backend = PersistenceBackend::open(&config.store).await?;
        Ok(Self {
            backend,
            jwt: JwtKeys::from(&config.jwt),
        })
    }

    pub fn from_parts(store: Arc<dyn Store>, jwt: &JwtConfig) -> Self {
        Self {
            backend: PersistenceBackend::new(store),
            jwt: JwtKeys::from(jwt),
        }
    }
}
