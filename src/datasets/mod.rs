//! # Datasets over parallel multimodal corpora
//!
//! A translation task is described by a `Topology` naming its source and
//! target streams. `MultimodalDataset` materializes one split of such a task
//! and produces padded, length-sorted batches.

mod multimodal_dataset;
mod topology;

pub use multimodal_dataset::{Batch, MultimodalDataset};
pub use topology::{Stream, StreamKind, Topology};
