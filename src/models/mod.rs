//! Forecast model artifacts.
//!
//! Models are loaded read-only from JSON and evaluated as small, pure
//! functions so the forecaster can stay generic over the artifact kind.

pub mod model;

pub use model::*;
