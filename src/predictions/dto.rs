use serde::{Deserialize, Serialize};

use crate::store::{Features, Outcome, PredictionId};

/// Body of `POST /predictions`: the inputs and the label the classifier produced.
#[derive(Debug, Deserialize)]
pub struct CreatePredictionRequest {
    #[serde(flatten)]
    pub features: Features,
    pub prediction: Outcome,
}

#[derive(Debug, Serialize)]
pub struct CreatePredictionResponse {
    pub id: PredictionId,
}
