//! Churn-risk model
//!
//! The model is fitted elsewhere and shipped as coefficients. Scoring is a
//! linear predictor over the feature vector, exponentiated into a relative
//! hazard: 1.0 is baseline risk, higher means more likely to churn.

use crate::error::SyncError;
use crate::risk::features::MemberFeatures;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Scores a member's features
pub trait RiskModel: Send + Sync {
    fn predict_risk(&self, features: &MemberFeatures) -> f64;
}

/// Linear predictor loaded from JSON:
///
/// ```json
/// {
///   "intercept": -0.4,
///   "weights": {"taken_wss": -0.3, "total_dollars_spent": -0.0004},
///   "categorical": {"gender": {"Female": -0.1}}
/// }
/// ```
///
/// Features without a weight, unknown values, and unlisted categories all
/// contribute nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRiskModel {
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub categorical: HashMap<String, HashMap<String, f64>>,
}

impl LinearRiskModel {
    pub fn from_json_str(content: &str) -> Result<Self, SyncError> {
        serde_json::from_str(content).map_err(|e| SyncError::Model(format!("Parse model failed: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Model(format!("Read model {} failed: {}", path.display(), e))
        })?;
        let model = Self::from_json_str(&content)?;
        tracing::info!(
            path = %path.display(),
            weights = model.weights.len(),
            categorical = model.categorical.len(),
            "Loaded risk model"
        );
        Ok(model)
    }

    /// Sum of intercept and weighted features
    pub fn linear_predictor(&self, features: &MemberFeatures) -> f64 {
        let numeric: f64 = features
            .numeric()
            .into_iter()
            .filter_map(|(name, value)| Some(value? * self.weights.get(name)?))
            .sum();

        let categorical: f64 = features
            .categorical()
            .into_iter()
            .filter_map(|(name, value)| self.categorical.get(name)?.get(value?).copied())
            .sum();

        self.intercept + numeric + categorical
    }
}

impl RiskModel for LinearRiskModel {
    fn predict_risk(&self, features: &MemberFeatures) -> f64 {
        self.linear_predictor(features).exp()
    }
}
