use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SymptomPredictionResponse {
    pub prediction: String,
    pub features: serde_json::Value, // request body, echoed back
    pub recorded: bool,              // false if the history write was skipped or failed
}

#[derive(Debug, Serialize)]
pub struct ImagePredictionResponse {
    pub prediction: &'static str,
    pub message: &'static str,
    pub recorded: bool,
}
