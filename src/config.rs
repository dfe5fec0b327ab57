use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context};
#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Where one store lives. Resolved once at startup and passed down.
#[derive(Clone)]
pub enum StoreConfig {
    Sqlite {
        path: PathBuf,
        max_connections: u32,
    },
    Postgres {
        /// Full connection URL; when set, the discrete fields are ignored.
        url: Option<String>,
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
        max_connections: u32,
    },
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::Sqlite { path, max_connections } => f
                .debug_struct("Sqlite")
                .field("path", path)
                .field("max_connections", max_connections)
                .finish(),
            StoreConfig::Postgres {
                url,
                host,
                port,
                user,
                database,
                max_connections,
                ..
            } => f
                .debug_struct("Postgres")
                .field("url", &url.as_ref().map(|_| "<redacted>"))
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("password", &"<redacted>")
                .field("database", database)
                .field("max_connections", max_connections)
                .finish(),
        }
    }
}

pub const DEFAULT_SQLITE_PATH: &str = "diabetes_app.db";
pub const DEFAULT_DB_NAME: &str = "diabetes_app";

impl StoreConfig {
    /// Reads `{prefix}DB_*` variables, falling back to `default_backend`.
    pub fn from_env(prefix: &str, default_backend: &str) -> anyhow::Result<Self> {
        Self::from_lookup(prefix, default_backend, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(prefix: &str, default_backend: &str, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{prefix}{name}"));
        let max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("{prefix}DB_MAX_CONNECTIONS must be a number"))?,
            None => 10,
        };

        let backend = var("DB_BACKEND").unwrap_or_else(|| default_backend.to_string());
        match backend.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreConfig::Sqlite {
                path: var("DB_PATH")
                    .unwrap_or_else(|| DEFAULT_SQLITE_PATH.into())
                    .into(),
                max_connections,
            }),
            "postgres" | "postgresql" => Ok(StoreConfig::Postgres {
                url: var("DATABASE_URL"),
                host: var("DB_HOST").unwrap_or_else(|| "localhost".into()),
                port: match var("DB_PORT") {
                    Some(p) => p
                        .parse::<u16>()
                        .with_context(|| format!("{prefix}DB_PORT must be a port number"))?,
                    None => 5432,
                },
                user: var("DB_USER").unwrap_or_else(|| "postgres".into()),
                password: var("DB_PASSWORD").unwrap_or_default(),
                database: var("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.into()),
                max_connections,
            }),
            other => bail!("unsupported {prefix}DB_BACKEND `{other}` (expected sqlite or postgres)"),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = StoreConfig::from_env("", "sqlite")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "riskstore".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "riskstore-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
        };
        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            store,
            jwt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn sqlite_defaults() {
        let cfg = StoreConfig::from_lookup("", "sqlite", lookup(&[])).unwrap();
        match cfg {
            StoreConfig::Sqlite { path, max_connections } => {
                assert_eq!(path, PathBuf::from(DEFAULT_SQLITE_PATH));
                assert_eq!(max_connections, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prefixed_postgres_settings() {
        let cfg = StoreConfig::from_lookup(
            "DEST_",
            "postgres",
            lookup(&[
                ("DEST_DB_HOST", "db.internal"),
                ("DEST_DB_PORT", "6543"),
                ("DEST_DB_USER", "svc"),
                ("DEST_DB_PASSWORD", "hunter2"),
                ("DB_HOST", "ignored"),
            ]),
        )
        .unwrap();
        match &cfg {
            StoreConfig::Postgres {
                host,
                port,
                user,
                password,
                database,
                url,
                ..
            } => {
                assert_eq!(host, "db.internal");
                assert_eq!(*port, 6543);
                assert_eq!(user, "svc");
                assert_eq!(password, "hunter2");
                assert_eq!(database, DEFAULT_DB_NAME);
                assert!(url.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }

    #[test]
    fn backend_override_and_rejects_unknown() {
        let cfg = StoreConfig::from_lookup(
            "SOURCE_",
            "sqlite",
            lookup(&[("SOURCE_DB_BACKEND", "postgres")]),
        )
        .unwrap();
        assert_eq!(cfg.backend_name(), "postgres");

        let err = StoreConfig::from_lookup("", "sqlite", lookup(&[("DB_BACKEND", "mysql")]))
            .unwrap_err();
        assert!(err.to_string().contains("mysql"));
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = StoreConfig::from_lookup("", "postgres", lookup(&[("DB_PORT", "abc")]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }
}
