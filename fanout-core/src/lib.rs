//! Fanout Core
//!
//! Core types shared by the fanout runner and CLI.
//!
//! This crate contains:
//! - Domain types: process descriptors, consumer specs, pipeline definitions
//!   and the outcomes reported by pipeline tasks
//! - Errors: the task failure taxonomy and definition validation errors

pub mod domain;
pub mod error;
