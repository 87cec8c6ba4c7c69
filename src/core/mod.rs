//! Core layer - the engine's contracts and shared machinery.
//!
//! This module provides:
//! - [`Primitive`] / [`Hit`] - What the scene layer hands the builders
//! - [`BuildConfig`] / [`PhrParams`] / [`CostModel`] - Explicit tuning
//! - A bounded job queue with synchronous fallback used by both builders

mod config;
pub(crate) mod pool;
mod primitive;

pub use config::{
    default_workers, BuildConfig, CostModel, PhrParams, DEFAULT_BUCKET_COUNT,
    DEFAULT_MAX_CUT_SIZE, DEFAULT_MORTON_BITS, MAX_MORTON_BITS,
};
pub use primitive::{enclosing, Hit, Primitive};
