use std::{collections::HashMap, path::Path};

use anyhow::Context;
use serde::Deserialize;

use super::symptoms::{FeatureVector, SYMPTOM_KEYS};

/// A trained symptom classifier. Output labels are returned to clients verbatim.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<String>;
}

#[derive(Debug, Deserialize)]
struct Sample {
    features: Vec<u8>,
    label: String,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    feature_names: Vec<String>,
    k: usize,
    samples: Vec<Sample>,
}

/// k-nearest-neighbour vote over labelled symptom vectors, Hamming distance.
#[derive(Debug)]
pub struct NearestNeighbourModel {
    k: usize,
    samples: Vec<([u8; SYMPTOM_KEYS.len()], String)>,
}

impl NearestNeighbourModel {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read model artifact {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parse model artifact {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let artifact: Artifact = serde_json::from_str(raw)?;
        anyhow::ensure!(
            artifact.feature_names.iter().map(String::as_str).eq(SYMPTOM_KEYS),
            "feature order {:?} does not match {:?}",
            artifact.feature_names,
            SYMPTOM_KEYS
        );
        anyhow::ensure!(artifact.k > 0, "k must be positive");
        anyhow::ensure!(!artifact.samples.is_empty(), "model has no samples");

        let samples = artifact
            .samples
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let features: [u8; SYMPTOM_KEYS.len()] = s
                    .features
                    .as_slice()
                    .try_into()
                    .with_context(|| format!("sample {i} has {} features", s.features.len()))?;
                Ok((features, s.label))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            k: artifact.k,
            samples,
        })
    }
}

impl Classifier for NearestNeighbourModel {
    /// Majority label among the `k` nearest samples. Equal vote counts go to
    /// the label with the nearer sample; equal distances keep artifact order.
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<String> {
        let mut ranked: Vec<(usize, usize)> = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, (x, _))| {
                let dist = x.iter().zip(features.as_slice()).filter(|(a, b)| a != b).count();
                (dist, i)
            })
            .collect();
        ranked.sort_unstable();

        // label -> (votes, rank of its nearest sample)
        let mut votes: HashMap<&str, (usize, usize)> = HashMap::new();
        for (rank, (_, i)) in ranked.iter().take(self.k).enumerate() {
            let entry = votes.entry(self.samples[*i].1.as_str()).or_insert((0, rank));
            entry.0 += 1;
        }

        votes
            .into_iter()
            .max_by(|(_, (va, ra)), (_, (vb, rb))| va.cmp(vb).then(rb.cmp(ra)))
            .map(|(label, _)| label.to_string())
            .context("no neighbours")
    }
}
