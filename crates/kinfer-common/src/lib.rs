//! Common types and utilities for the kinfer type inference engine.
//!
//! This crate provides foundational types used across all kinfer crates:
//! - String interning (`Atom`, `Interner`)
//! - Inference limits and thresholds
//! - Diagnostic types and inference diagnostic codes
//! - Language feature settings (`InferenceSettings`, `LanguageFeatures`)
//! - Tracing subscriber setup for debugging inference runs

// String interning for class and type variable names
pub mod interner;
pub use interner::{Atom, Interner};

// Centralized limits and thresholds
pub mod limits;

// Diagnostics emitted by the inference engine
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory};

// Language feature flags and tunable inference settings
pub mod settings;
pub use settings::{InferenceSettings, LanguageFeatures, SettingsError};

// Tracing subscriber configuration
pub mod tracing_config;
