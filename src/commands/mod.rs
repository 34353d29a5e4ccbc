//! Top-level command orchestration.
pub mod run;
