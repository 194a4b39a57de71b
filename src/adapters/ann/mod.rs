//! ANN adapter: the frozen feed-forward classifier and its artifacts.
//!
//! The training pipeline exports three files into one directory:
//!
//! - `model.json`: dense layers (weights, bias, activation)
//! - `preprocessing.json`: label-encoder classes and scaler parameters
//! - `manifest.json`: SHA-256 digest of each of the files above
//!
//! # Integrity
//!
//! Every file bound by the manifest is hashed and compared before it is
//! parsed. A missing manifest is only tolerated when the caller explicitly
//! allows unverified artifacts (local development).

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{FeatureSchema, FEATURE_COUNT};
use crate::ports::{Classifier, ModelError};

pub const MODEL_FILE: &str = "model.json";
pub const PREPROCESSING_FILE: &str = "preprocessing.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Widest layer accepted from an artifact. Guards against absurd inputs.
const MAX_LAYER_WIDTH: usize = 1024;

/// Activation applied after a dense layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Linear => x,
            Self::Relu => x.max(0.0),
            Self::Sigmoid => sigmoid(x),
        }
    }
}

/// Numerically stable logistic function.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// One fully connected layer. `weights` is `[outputs][inputs]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub activation: Activation,
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    fn input_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn output_dim(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Frozen dense network exported by the training pipeline.
///
/// The final layer must have a single sigmoid unit, so the output is a
/// probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub version: u32,
    pub input_dim: usize,
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Parse and validate a network from its JSON export.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` if the JSON is malformed or the
    /// layer shapes do not chain.
    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let network: Self = serde_json::from_str(content)
            .map_err(|e| ModelError::InvalidArtifact(format!("{MODEL_FILE}: {e}")))?;
        network.validate()?;
        Ok(network)
    }

    /// Check that layer shapes chain and the output is a probability.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidArtifact` describing the first problem.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: String| Err(ModelError::InvalidArtifact(msg));

        if self.input_dim == 0 || self.input_dim > MAX_LAYER_WIDTH {
            return invalid(format!("input_dim {} out of range", self.input_dim));
        }
        let Some(last) = self.layers.last() else {
            return invalid("network has no layers".into());
        };

        let mut width = self.input_dim;
        for (i, layer) in self.layers.iter().enumerate() {
            let out = layer.output_dim();
            if out == 0 || out > MAX_LAYER_WIDTH {
                return invalid(format!("layer {i}: width {out} out of range"));
            }
            if layer.bias.len() != out {
                return invalid(format!(
                    "layer {i}: bias has {} entries, expected {out}",
                    layer.bias.len()
                ));
            }
            if layer.weights.iter().any(|row| row.len() != width) {
                return invalid(format!("layer {i}: every weight row must have {width} inputs"));
            }
            let finite = layer.weights.iter().flatten().chain(&layer.bias).all(|v| v.is_finite());
            if !finite {
                return invalid(format!("layer {i}: non-finite parameter"));
            }
            width = out;
        }

        if last.output_dim() != 1 || last.activation != Activation::Sigmoid {
            return invalid("final layer must be a single sigmoid unit".into());
        }
        Ok(())
    }

    /// Number of dense layers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl Classifier for DenseNetwork {
    fn input_dim(&self) -> usize {
        self.layers.first().map_or(self.input_dim, DenseLayer::input_dim)
    }

    fn forward(&self, features: &[f64]) -> Result<f64, ModelError> {
        let expected = self.input_dim();
        if features.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: features.len(),
            });
        }

        let mut activations = features.to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }

        match activations.as_slice() {
            [p] if p.is_finite() => Ok(*p),
            _ => Err(ModelError::NonFiniteOutput),
        }
    }
}

/// Read-only artifacts loaded once at process start.
#[derive(Debug, Clone)]
pub struct FrozenArtifacts {
    pub schema: FeatureSchema,
    pub network: DenseNetwork,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ArtifactManifest {
    version: u32,
    /// File name -> lowercase hex SHA-256
    files: BTreeMap<String, String>,
}

/// Load and verify the artifacts in `dir`.
///
/// # Errors
/// Returns `ModelError` if a file is missing, fails its digest check, or is
/// inconsistent with the encoder's feature layout.
pub fn load_artifacts(dir: &Path, allow_unverified: bool) -> Result<FrozenArtifacts, ModelError> {
    if !dir.is_dir() {
        return Err(ModelError::ArtifactMissing(dir.to_path_buf()));
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        verify_manifest(dir, &manifest_path)?;
        tracing::info!("Artifact digests verified against {:?}", manifest_path);
    } else if allow_unverified {
        tracing::warn!("No {MANIFEST_FILE} in {:?}; loading unverified artifacts", dir);
    } else {
        return Err(ModelError::ArtifactMissing(manifest_path));
    }

    let schema: FeatureSchema = serde_json::from_slice(&read_artifact(&dir.join(PREPROCESSING_FILE))?)
        .map_err(|e| ModelError::InvalidArtifact(format!("{PREPROCESSING_FILE}: {e}")))?;
    schema
        .validate()
        .map_err(|e| ModelError::InvalidArtifact(format!("{PREPROCESSING_FILE}: {e}")))?;

    let model_bytes = read_artifact(&dir.join(MODEL_FILE))?;
    let content = String::from_utf8(model_bytes)
        .map_err(|e| ModelError::InvalidArtifact(format!("{MODEL_FILE}: {e}")))?;
    let network = DenseNetwork::from_json(&content)?;

    if network.input_dim() != FEATURE_COUNT {
        return Err(ModelError::DimensionMismatch {
            expected: FEATURE_COUNT,
            actual: network.input_dim(),
        });
    }

    tracing::info!(
        "Loaded model from {:?} (layers={}, n_features={})",
        dir,
        network.depth(),
        network.input_dim()
    );

    Ok(FrozenArtifacts { schema, network })
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, ModelError> {
    if !path.exists() {
        return Err(ModelError::ArtifactMissing(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|e| ModelError::ArtifactUnreadable(format!("{path:?}: {e}")))
}

fn verify_manifest(dir: &Path, manifest_path: &Path) -> Result<(), ModelError> {
    let manifest: ArtifactManifest = serde_json::from_slice(&read_artifact(manifest_path)?)
        .map_err(|e| ModelError::InvalidArtifact(format!("{MANIFEST_FILE}: {e}")))?;

    for required in [MODEL_FILE, PREPROCESSING_FILE] {
        if !manifest.files.contains_key(required) {
            return Err(ModelError::InvalidArtifact(format!(
                "{MANIFEST_FILE} does not bind {required}"
            )));
        }
    }

    for (name, expected) in &manifest.files {
        // Only plain file names; the manifest must not reach outside `dir`.
        let components: Vec<Component<'_>> = Path::new(name).components().collect();
        if !matches!(components.as_slice(), [Component::Normal(_)]) {
            return Err(ModelError::InvalidArtifact(format!(
                "{MANIFEST_FILE} entry {name:?} is not a plain file name"
            )));
        }
        let path = dir.join(name);
        let actual = sha256_hex(&read_artifact(&path)?);
        if !constant_time_eq_str(&actual, &expected.to_ascii_lowercase()) {
            return Err(ModelError::DigestMismatch(name.clone()));
        }
    }
    Ok(())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

// Constant-time compare for hex digests.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
