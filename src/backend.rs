//! Storage contract shared by every backend.
//!
//! `PersistenceBackend` owns the rules that must not drift between stores:
//! passwords are hashed before they reach a store, uniqueness is left to the
//! store's constraints, and login failures are worded identically whatever
//! the cause.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use tracing::{error, info, instrument, warn};

use crate::auth::password::{hash_password, verify_dummy, verify_password};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{
    self, models::now_utc, AuthenticatedUser, Dialect, Features, NewPrediction, NewUser, Outcome,
    Prediction, PredictionId, Store, User, UserId,
};

#[derive(Clone)]
pub struct PersistenceBackend {
    store: Arc<dyn Store>,
}

impl PersistenceBackend {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Connects and creates the schema; a backend without tables is unusable.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let backend = Self::new(store::connect(config).await?);
        backend.init_schema().await?;
        Ok(backend)
    }

    pub fn dialect(&self) -> Dialect {
        self.store.dialect()
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        self.store.init_schema().await.map_err(|e| {
            error!(error = %e, dialect = ?self.dialect(), "schema initialisation failed");
            e
        })
    }

    #[instrument(skip(self, password, full_name))]
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<UserId, StoreError> {
        let now = now_utc();
        let user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            full_name: full_name.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        match self.store.insert_user(&user).await {
            Ok(id) => {
                info!(user_id = %id, "user registered");
                Ok(id)
            }
            Err(StoreError::DuplicateKey(detail)) => {
                warn!(%detail, "username or email already registered");
                Err(StoreError::DuplicateKey(
                    "Username or email already exists".into(),
                ))
            }
            Err(e) => {
                error!(error = %e, "register user failed");
                Err(e)
            }
        }
    }

    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, StoreError> {
        let user = match self.store.user_by_username(username).await? {
            Some(u) => u,
            None => {
                verify_dummy(password);
                warn!("login for unknown username");
                return Err(StoreError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(StoreError::InvalidCredentials);
        }

        info!(user_id = %user.id, "user logged in");
        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
        })
    }

    #[instrument(skip(self, features))]
    pub async fn save_prediction(
        &self,
        user_id: UserId,
        features: Features,
        prediction: Outcome,
    ) -> Result<PredictionId, StoreError> {
        let record = NewPrediction {
            user_id,
            features,
            prediction,
            created_at: now_utc(),
        };
        let id = self.store.insert_prediction(&record).await.map_err(|e| {
            error!(error = %e, "save prediction failed");
            e
        })?;
        info!(prediction_id = %id, outcome = ?prediction, "prediction saved");
        Ok(id)
    }

    pub async fn list_predictions(&self, user_id: UserId) -> Result<Vec<Prediction>, StoreError> {
        self.store.predictions_for_user(user_id).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.store.user_by_id(id).await?.ok_or(StoreError::NotFound)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.store.user_by_username(username).await
    }

    /// Removes the user; the store cascades the delete to its predictions.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let removed = self.store.delete_user(id).await?;
        if removed {
            info!(user_id = %id, "user deleted");
        }
        Ok(removed)
    }

    /// Inserts an already-hashed user row, keeping its timestamps.
    pub async fn import_user(&self, user: &User) -> Result<UserId, StoreError> {
        self.store.insert_user(&NewUser::from(user)).await
    }

    /// Inserts a prediction row verbatim under `user_id`.
    pub async fn import_prediction(
        &self,
        user_id: UserId,
        source: &Prediction,
    ) -> Result<PredictionId, StoreError> {
        self.store
            .insert_prediction(&NewPrediction {
                user_id,
                features: source.features,
                prediction: source.prediction,
                created_at: source.created_at,
            })
            .await
    }

    pub fn stream_users(&self) -> BoxStream<'_, Result<User, StoreError>> {
        self.store.stream_users()
    }

    pub fn stream_predictions(&self) -> BoxStream<'_, Result<Prediction, StoreError>> {
        self.store.stream_predictions()
    }
}
