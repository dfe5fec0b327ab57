//! DDL for the `users` and `predictions` relations.
//!
//! Every statement is `IF NOT EXISTS`, so applying a dialect's script to an
//! already initialised database is a no-op. The predictions natural-key index
//! is what keeps a repeated migration from duplicating assessment rows.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn statements(self) -> &'static [&'static str] {
        match self {
            Dialect::Sqlite => SQLITE,
            Dialect::Postgres => POSTGRES,
        }
    }
}

// Timestamps are fixed-width UTC RFC 3339 text so lexical order is time order.
const SQLITE: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        username      TEXT NOT NULL UNIQUE,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        full_name     TEXT,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id                         INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id                    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        pregnancies                INTEGER NOT NULL,
        glucose                    REAL NOT NULL,
        blood_pressure             REAL NOT NULL,
        skin_thickness             REAL NOT NULL,
        insulin                    REAL NOT NULL,
        bmi                        REAL NOT NULL,
        diabetes_pedigree_function REAL NOT NULL,
        age                        INTEGER NOT NULL,
        prediction                 INTEGER NOT NULL CHECK (prediction IN (0, 1)),
        created_at                 TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS predictions_user_created_idx
        ON predictions (user_id, created_at DESC)
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS predictions_natural_key
        ON predictions (user_id, created_at, pregnancies, glucose, blood_pressure,
                        skin_thickness, insulin, bmi, diabetes_pedigree_function,
                        age, prediction)
    "#,
];

const POSTGRES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        email         TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        full_name     TEXT,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id                         BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        user_id                    BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        pregnancies                INTEGER NOT NULL,
        glucose                    DOUBLE PRECISION NOT NULL,
        blood_pressure             DOUBLE PRECISION NOT NULL,
        skin_thickness             DOUBLE PRECISION NOT NULL,
        insulin                    DOUBLE PRECISION NOT NULL,
        bmi                        DOUBLE PRECISION NOT NULL,
        diabetes_pedigree_function DOUBLE PRECISION NOT NULL,
        age                        INTEGER NOT NULL,
        prediction                 INTEGER NOT NULL CHECK (prediction IN (0, 1)),
        created_at                 TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS predictions_user_created_idx
        ON predictions (user_id, created_at DESC)
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS predictions_natural_key
        ON predictions (user_id, created_at, pregnancies, glucose, blood_pressure,
                        skin_thickness, insulin, bmi, diabetes_pedigree_function,
                        age, prediction)
    "#,
];
