use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

pub type UserId = i64;
pub type PredictionId = i64;

/// User record as stored by either backend.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // PHC digest, never exposed in JSON
    pub full_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Row to insert; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<&User> for NewUser {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            email: u.email.clone(),
            password_hash: u.password_hash.clone(),
            full_name: u.full_name.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// What a successful login hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
}

/// Binary risk label produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum Outcome {
    Negative = 0,
    Positive = 1,
}

impl TryFrom<i32> for Outcome {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Outcome::Negative),
            1 => Ok(Outcome::Positive),
            other => Err(format!("prediction label must be 0 or 1, got {other}")),
        }
    }
}

impl From<Outcome> for i32 {
    fn from(o: Outcome) -> Self {
        o as i32
    }
}

/// The eight clinical inputs of one assessment. Ranges are the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Features {
    pub pregnancies: i32,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: i32,
}

impl Features {
    /// Column order expected by the classifier.
    pub fn to_vector(&self) -> [f64; 8] {
        [
            self.pregnancies as f64,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age as f64,
        ]
    }
}

/// Write-once assessment record.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Prediction {
    pub id: PredictionId,
    pub user_id: UserId,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub features: Features,
    pub prediction: Outcome,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub user_id: UserId,
    pub features: Features,
    pub prediction: Outcome,
    pub created_at: OffsetDateTime,
}

/// Current UTC time truncated to microseconds, the finest precision both
/// backends keep.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Outcome::Positive).unwrap(), "1");
        let o: Outcome = serde_json::from_str("0").unwrap();
        assert_eq!(o, Outcome::Negative);
        assert!(serde_json::from_str::<Outcome>("2").is_err());
    }

    #[test]
    fn feature_vector_keeps_column_order() {
        let f = Features {
            pregnancies: 2,
            glucose: 120.0,
            blood_pressure: 70.0,
            skin_thickness: 20.0,
            insulin: 79.0,
            bmi: 25.5,
            diabetes_pedigree_function: 0.47,
            age: 33,
        };
        assert_eq!(
            f.to_vector(),
            [2.0, 120.0, 70.0, 20.0, 79.0, 25.5, 0.47, 33.0]
        );
    }

    #[test]
    fn now_is_microsecond_aligned() {
        assert_eq!(now_utc().nanosecond() % 1_000, 0);
    }

    #[test]
    fn user_json_hides_digest() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$secret".into(),
            full_name: Some("Alice A".into()),
            created_at: now_utc(),
            updated_at: now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("argon2id"));
    }
}
