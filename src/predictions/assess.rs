//! Boundary with the risk model, which lives outside this crate.

use tracing::debug;

use crate::backend::PersistenceBackend;
use crate::error::StoreError;
use crate::store::{Features, Outcome, PredictionId, UserId};

/// Feature scaling applied before classification.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, raw: [f64; 8]) -> [f64; 8];
}

/// Opaque binary classifier: eight scaled features in, label out.
pub trait RiskClassifier: Send + Sync {
    fn predict(&self, scaled: &[f64; 8]) -> Outcome;
}

/// Scales, classifies and records one assessment for `user_id`.
pub async fn assess(
    backend: &PersistenceBackend,
    scaler: &dyn FeatureScaler,
    classifier: &dyn RiskClassifier,
    user_id: UserId,
    features: Features,
) -> Result<(PredictionId, Outcome), StoreError> {
    let scaled = scaler.transform(features.to_vector());
    let outcome = classifier.predict(&scaled);
    debug!(user_id = %user_id, ?outcome, "classified");
    let id = backend.save_prediction(user_id, features, outcome).await?;
    Ok((id, outcome))
}
