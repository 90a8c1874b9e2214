//! Ready-to-use multimodal neural machine translation models.
//!
//! This crate provides attentive sequence-to-sequence translation models
//! over text and pre-extracted visual features, built on the `tch` bindings
//! to the libtorch library, together with the vocabulary and dataset
//! utilities needed to drive them.

pub mod attentive_mnmt;
pub mod common;
pub mod datasets;
pub mod vocab;

pub use common::config::Config;
pub use common::error::RustMmtError;
pub use common::resources;
