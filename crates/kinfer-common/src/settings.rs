//! Language feature flags and tunable inference settings.
//!
//! Settings are plain data, deserializable from a JSON document shaped like
//!
//! ```json
//! {
//!   "languageFeatures": { "unrestrictedBuilderInference": true },
//!   "maxIncorporationSteps": 5000
//! }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use crate::limits;
use serde::Deserialize;

/// Language features that change inference behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageFeatures {
    /// Any call may take part in builder inference, even one whose return
    /// type or extension receiver still mentions a stub type.
    pub unrestricted_builder_inference: bool,
    /// Keep the declared-upper-bound position of a constraint when builder
    /// inference substitutes only its lower side, so the bound stays weak.
    pub forbid_inferring_postponed_type_variable_into_declared_upper_bound: bool,
}

impl Default for LanguageFeatures {
    fn default() -> Self {
        Self {
            unrestricted_builder_inference: false,
            forbid_inferring_postponed_type_variable_into_declared_upper_bound: true,
        }
    }
}

/// Settings threaded through every inference operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferenceSettings {
    pub language_features: LanguageFeatures,
    pub max_incorporation_steps: u32,
    pub allowed_depth_delta_for_incorporation: u32,
    pub max_type_depth: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            language_features: LanguageFeatures::default(),
            max_incorporation_steps: limits::MAX_INCORPORATION_STEPS,
            allowed_depth_delta_for_incorporation: limits::ALLOWED_DEPTH_DELTA_FOR_INCORPORATION,
            max_type_depth: limits::MAX_TYPE_DEPTH,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid inference settings: {0}")]
    Parse(#[from] serde_json::Error),
}

impl InferenceSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_features(mut self, features: LanguageFeatures) -> Self {
        self.language_features = features;
        self
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
