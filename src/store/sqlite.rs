use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::{macros::format_description, OffsetDateTime, UtcOffset};
use tracing::debug;

use super::{
    Dialect, NewPrediction, NewUser, OpenMode, Prediction, PredictionId, Store, User, UserId,
};
use crate::error::StoreError;

/// Embedded, file-backed store. Writers are serialised by SQLite's own lock.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self, StoreError> {
        Self::open_with_mode(path, max_connections, OpenMode::ReadWrite).await
    }

    pub async fn open_with_mode(
        path: &Path,
        max_connections: u32,
        mode: OpenMode,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(mode == OpenMode::ReadWrite)
            .read_only(mode == OpenMode::ReadOnly)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Database(e) => StoreError::Connection(e),
                other => other,
            })?;
        debug!(path = %path.display(), ?mode, "sqlite store opened");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// SQLite keeps timestamps as text; a fixed-width UTC form sorts correctly.
fn encode_timestamp(ts: OffsetDateTime) -> Result<String, StoreError> {
    ts.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .map_err(StoreError::from)
}

#[async_trait]
impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::schema)?;
        for stmt in Dialect::Sqlite.statements() {
            sqlx::query(stmt)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::schema)?;
        }
        tx.commit().await.map_err(StoreError::schema)?;
        Ok(())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<UserId, StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(encode_timestamp(user.created_at)?)
        .bind(encode_timestamp(user.updated_at)?)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_prediction(&self, p: &NewPrediction) -> Result<PredictionId, StoreError> {
        let f = &p.features;
        let res = sqlx::query(
            r#"
            INSERT INTO predictions
                (user_id, pregnancies, glucose, blood_pressure, skin_thickness, insulin,
                 bmi, diabetes_pedigree_function, age, prediction, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(p.user_id)
        .bind(f.pregnancies)
        .bind(f.glucose)
        .bind(f.blood_pressure)
        .bind(f.skin_thickness)
        .bind(f.insulin)
        .bind(f.bmi)
        .bind(f.diabetes_pedigree_function)
        .bind(f.age)
        .bind(p.prediction)
        .bind(encode_timestamp(p.created_at)?)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn predictions_for_user(&self, user_id: UserId) -> Result<Vec<Prediction>, StoreError> {
        let rows = sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, user_id, pregnancies, glucose, blood_pressure, skin_thickness, insulin,
                   bmi, diabetes_pedigree_function, age, prediction, created_at
            FROM predictions
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    fn stream_users(&self) -> BoxStream<'_, Result<User, StoreError>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch(&self.pool)
        .map_err(StoreError::from)
        .boxed()
    }

    fn stream_predictions(&self) -> BoxStream<'_, Result<Prediction, StoreError>> {
        sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, user_id, pregnancies, glucose, blood_pressure, skin_thickness, insulin,
                   bmi, diabetes_pedigree_function, age, prediction, created_at
            FROM predictions
            ORDER BY id
            "#,
        )
        .fetch(&self.pool)
        .map_err(StoreError::from)
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{now_utc, Features, Outcome};
    use tempfile::TempDir;
    use time::macros::datetime;

    async fn test_store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("test.db"), 4)
            .await
            .unwrap();
        store.init_schema().await.unwrap();
        (tmp, store)
    }

    fn new_user(name: &str) -> NewUser {
        let now = now_utc();
        NewUser {
            username: name.into(),
            email: format!("{name}@x.com"),
            password_hash: "$argon2id$v=19$placeholder".into(),
            full_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn new_prediction(user_id: UserId, created_at: OffsetDateTime) -> NewPrediction {
        NewPrediction {
            user_id,
            features: Features {
                pregnancies: 1,
                glucose: 89.0,
                blood_pressure: 66.0,
                skin_thickness: 23.0,
                insulin: 94.0,
                bmi: 28.1,
                diabetes_pedigree_function: 0.167,
                age: 21,
            },
            prediction: Outcome::Negative,
            created_at,
        }
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let whole = encode_timestamp(datetime!(2024-03-01 08:00:00 UTC)).unwrap();
        let frac = encode_timestamp(datetime!(2024-03-01 08:00:00.5 UTC)).unwrap();
        assert_eq!(whole, "2024-03-01T08:00:00.000000Z");
        assert_eq!(frac, "2024-03-01T08:00:00.500000Z");
        assert!(whole < frac);
    }

    #[test]
    fn timestamps_are_normalised_to_utc() {
        let ts = encode_timestamp(datetime!(2024-03-01 10:00:00 +02:00)).unwrap();
        assert_eq!(ts, "2024-03-01T08:00:00.000000Z");
    }

    #[tokio::test]
    async fn read_only_open_requires_an_existing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.db");
        let err = SqliteStore::open_with_mode(&missing, 1, OpenMode::ReadOnly)
            .await
            .err()
            .expect("missing file must not be created");
        assert!(matches!(err, StoreError::Connection(_)), "{err:?}");
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let (_tmp, store) = test_store().await;
        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn user_roundtrip_keeps_timestamps() {
        let (_tmp, store) = test_store().await;
        let user = new_user("carol");
        let id = store.insert_user(&user).await.unwrap();
        let loaded = store.user_by_id(id).await.unwrap().expect("user exists");
        assert_eq!(loaded.username, "carol");
        assert_eq!(loaded.created_at, user.created_at);
        assert_eq!(
            store.user_by_username("carol").await.unwrap().map(|u| u.id),
            Some(id)
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_by_the_store() {
        let (_tmp, store) = test_store().await;
        store.insert_user(&new_user("dave")).await.unwrap();
        let mut clash = new_user("dave2");
        clash.email = "dave@x.com".into();
        let err = store.insert_user(&clash).await.unwrap_err();
        assert!(err.is_duplicate(), "{err:?}");
    }

    #[tokio::test]
    async fn unknown_user_reference_is_a_foreign_key_violation() {
        let (_tmp, store) = test_store().await;
        let err = store
            .insert_prediction(&new_prediction(999, now_utc()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_predictions() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_user(&new_user("erin")).await.unwrap();
        store
            .insert_prediction(&new_prediction(id, now_utc()))
            .await
            .unwrap();
        assert!(store.delete_user(id).await.unwrap());
        assert!(store.predictions_for_user(id).await.unwrap().is_empty());
        let remaining: Vec<_> = store.stream_predictions().try_collect().await.unwrap();
        assert!(remaining.is_empty());
        assert!(!store.delete_user(id).await.unwrap());
    }

    #[tokio::test]
    async fn identical_prediction_hits_natural_key() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_user(&new_user("fred")).await.unwrap();
        let p = new_prediction(id, now_utc());
        store.insert_prediction(&p).await.unwrap();
        let err = store.insert_prediction(&p).await.unwrap_err();
        assert!(err.is_duplicate(), "{err:?}");
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let (_tmp, store) = test_store().await;
        let id = store.insert_user(&new_user("gina")).await.unwrap();
        let older = datetime!(2023-01-01 00:00:00 UTC);
        let newer = datetime!(2023-06-01 00:00:00 UTC);
        store.insert_prediction(&new_prediction(id, newer)).await.unwrap();
        store.insert_prediction(&new_prediction(id, older)).await.unwrap();
        let rows = store.predictions_for_user(id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].created_at, newer);
        assert_eq!(rows[1].created_at, older);
    }
}
