//! Core domain types
//!
//! These types describe what a pipeline run is made of (one producer, a fixed
//! set of consumers, a deadline) and what each task reports when it finishes.
//! Execution logic lives in the runner.

pub mod outcome;
pub mod pipeline;
pub mod process;
