//! # mmu Library
//!
//! This library exposes the mmu modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod cli;
pub mod config;
pub mod logging;

// Re-export mmu_core for convenience
pub use mmu_core;
