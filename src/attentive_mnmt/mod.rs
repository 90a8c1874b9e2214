//! # Attentive multimodal NMT (Caglayan et al.)
//!
//! Implementation of the attentive multimodal translation model
//! ([LIUM-CVC Submissions for WMT17 Multimodal Translation Task](https://arxiv.org/abs/1707.04481)):
//! a recurrent sequence-to-sequence model attending jointly over the source
//! text and pre-extracted convolutional image features, with optional
//! doubly-stochastic attention regularization (Xu et al., 2015).
//!
//! The model is implemented in the `attentive_mnmt::AttentiveMnmtModel`
//! struct, composed of a bidirectional `TextEncoder` and a two-cell
//! `ConditionalMmDecoder` with one attention pathway per context stream.
//!
//! # Model set-up
//!
//! All models expect the following resources:
//! - Configuration file expected to be a JSON serialization of an
//!   `AttentiveMnmtConfig`; omitted keys resolve to the model defaults
//! - One JSON vocabulary file per text stream, with the reserved
//!   `<pad>`/`<bos>`/`<eos>`/`<unk>` entries at indices 0-3
//! - Per-split corpora: pre-tokenized text files and `.npy` feature tensors
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_mmt::attentive_mnmt::{AttentiveMnmtConfig, AttentiveMnmtModel};
//! use rust_mmt::Config;
//! use std::path::Path;
//! use tch::{nn, Device};
//!
//! let device = Device::cuda_if_available();
//! let vs = nn::VarStore::new(device);
//! let config = AttentiveMnmtConfig::from_file(Path::new("path/to/config.json"));
//! let model = AttentiveMnmtModel::new(&vs.root() / "model", &config)?;
//! # Ok(())
//! # }
//! ```

mod attention;
mod attentive_mnmt_model;
mod decoder;
mod encoder;

pub use attention::{Attention, AttentionBottleneck, AttentionType};
pub use attentive_mnmt_model::{
    doubly_stochastic_regularization, AttentiveMnmtConfig, AttentiveMnmtConfigResources,
    AttentiveMnmtModel, AttentiveMnmtOutput, AttentiveMnmtVocabResources, DecoderInit,
    EncodedContext, FusionType, RnnType, TiedEmbedding, TranslationOptions, IMAGE_STREAM,
};
pub use decoder::{
    ConditionalMmDecoder, ConditionalMmDecoderConfig, ConditionalMmDecoderOutput, DecoderState,
};
pub use encoder::{TextEncoder, TextEncoderConfig};
