//! CHATTEN: Q-Score mint and trade decision agent for AI compute tokens.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod scoring;
pub mod mint;
pub mod trading;
pub mod collaborators;
pub mod engine;
pub mod storage;
pub mod dashboard;
