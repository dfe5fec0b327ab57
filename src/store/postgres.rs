use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt, TryStreamExt};
use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
    Connection, PgConnection,
};
use tracing::{debug, info, warn};

use super::{
    Dialect, NewPrediction, NewUser, OpenMode, Prediction, PredictionId, Store, User, UserId,
};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Client-server store. Each call checks a connection out of the pool for
/// exactly one statement.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::connect_with_mode(config, OpenMode::ReadWrite).await
    }

    pub async fn connect_with_mode(
        config: &StoreConfig,
        mode: OpenMode,
    ) -> Result<Self, StoreError> {
        let (options, max_connections) = match config {
            StoreConfig::Postgres {
                url: Some(url),
                max_connections,
                ..
            } => (
                url.parse::<PgConnectOptions>()
                    .map_err(StoreError::Connection)?,
                *max_connections,
            ),
            StoreConfig::Postgres {
                url: None,
                host,
                port,
                user,
                password,
                database,
                max_connections,
            } => {
                let server = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password);
                if mode == OpenMode::ReadWrite {
                    ensure_database(&server, database).await?;
                }
                (server.database(database), *max_connections)
            }
            StoreConfig::Sqlite { .. } => {
                return Err(StoreError::Connection(sqlx::Error::Configuration(
                    "postgres store given a sqlite configuration".into(),
                )))
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Database(e) => StoreError::Connection(e),
                other => other,
            })?;
        debug!("postgres store connected");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Creates `database` on the server when it is missing. A server that will
/// not let us look is left for the real connection attempt to report.
async fn ensure_database(server: &PgConnectOptions, database: &str) -> Result<(), StoreError> {
    let mut conn = match PgConnection::connect_with(&server.clone().database("postgres")).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "cannot reach maintenance database; assuming {database} exists");
            return Ok(());
        }
    };

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(database)
            .fetch_one(&mut conn)
            .await?;
    if !exists {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(database)))
            .execute(&mut conn)
            .await
            .map_err(StoreError::schema)?;
        info!(database, "created database");
    }
    conn.close().await?;
    Ok(())
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[async_trait]
impl Store for PgStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::schema)?;
        for stmt in Dialect::Postgres.statements() {
            sqlx::query(stmt)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::schema)?;
        }
        tx.commit().await.map_err(StoreError::schema)?;
        Ok(())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<UserId, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, email, password_hash, full_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, full_name, created_at, updated_at
            FROM users
            WHERE id = $1
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
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_prediction(&self, p: &NewPrediction) -> Result<PredictionId, StoreError> {
        let f = &p.features;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO predictions
                (user_id, pregnancies, glucose, blood_pressure, skin_thickness, insulin,
                 bmi, diabetes_pedigree_function, age, prediction, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
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
        .bind(p.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn predictions_for_user(&self, user_id: UserId) -> Result<Vec<Prediction>, StoreError> {
        let rows = sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, user_id, pregnancies, glucose, blood_pressure, skin_thickness, insulin,
                   bmi, diabetes_pedigree_function, age, prediction, created_at
            FROM predictions
            WHERE user_id = $1
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
