use serde_json::Value;

use crate::error::InputError;

/// Symptom keys in the order the classifier expects them.
pub const SYMPTOM_KEYS: [&str; 8] = [
    "Fever",
    "Cough",
    "Fatigue",
    "Diff_Breathing",
    "Headache",
    "Sore_Throat",
    "Body_Aches",
    "Runny_Nose",
];

/// Fixed-order 0/1 feature vector built from a symptom map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureVector(pub [u8; SYMPTOM_KEYS.len()]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Accepts 0/1 as integers, booleans, integral floats or numeric strings.
fn coerce(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        },
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    match n {
        0 => Some(0),
        1 => Some(1),
        _ => None,
    }
}

/// Missing keys count as 0. Keys outside [`SYMPTOM_KEYS`] are ignored.
pub fn parse_symptoms(payload: &Value) -> Result<FeatureVector, InputError> {
    let map = payload.as_object().ok_or_else(|| {
        InputError::InvalidInput("Request body must be a JSON object".into())
    })?;

    let mut features = [0u8; SYMPTOM_KEYS.len()];
    for (slot, key) in features.iter_mut().zip(SYMPTOM_KEYS) {
        if let Some(value) = map.get(key) {
            *slot = coerce(value).ok_or_else(|| InputError::InvalidFeature(key.to_string()))?;
        }
    }
    Ok(FeatureVector(features))
}
