// Copyright 2017 University of Le Mans - LIUM, The nmtpy Authors
// Copyright 2021 The rust-mmt Project Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::attentive_mnmt::attention::{AttentionBottleneck, AttentionType};
use crate::attentive_mnmt::decoder::{ConditionalMmDecoder, ConditionalMmDecoderConfig};
use crate::attentive_mnmt::encoder::{TextEncoder, TextEncoderConfig};
use crate::common::activations::Activation;
use crate::common::config::Config;
use crate::common::error::RustMmtError;
use crate::datasets::{Batch, MultimodalDataset, Topology};
use crate::vocab::{Vocabulary, BOS_ID, EOS_ID, PAD_ID};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::path::PathBuf;
use tch::{nn, Device, Kind, Tensor};
use tracing::info;

/// Name of the visual context stream.
pub const IMAGE_STREAM: &str = "image";

/// Encoded context bundle: for every stream, the context tensor
/// `[locations, batch, dim]` and an optional validity mask
/// `[locations, batch]`. Image contexts carry no mask.
pub type EncodedContext = HashMap<String, (Tensor, Option<Tensor>)>;

/// # AttentiveMnmt pretrained model config files
pub struct AttentiveMnmtConfigResources;

/// # AttentiveMnmt pretrained model vocab files
pub struct AttentiveMnmtVocabResources;

impl AttentiveMnmtConfigResources {
    /// Trained on the Multi30k en-de task with ResNet-50 res4f features.
    pub const MULTI30K_EN_DE: (&'static str, &'static str) = (
        "attentive-mnmt-multi30k-en-de/config",
        "https://huggingface.co/rust-mmt/attentive-mnmt-multi30k-en-de/resolve/main/config.json",
    );
}

impl AttentiveMnmtVocabResources {
    /// Trained on the Multi30k en-de task with ResNet-50 res4f features.
    pub const MULTI30K_EN: (&'static str, &'static str) = (
        "attentive-mnmt-multi30k-en-de/vocab-en",
        "https://huggingface.co/rust-mmt/attentive-mnmt-multi30k-en-de/resolve/main/vocab.en.json",
    );
    /// Trained on the Multi30k en-de task with ResNet-50 res4f features.
    pub const MULTI30K_DE: (&'static str, &'static str) = (
        "attentive-mnmt-multi30k-en-de/vocab-de",
        "https://huggingface.co/rust-mmt/attentive-mnmt-multi30k-en-de/resolve/main/vocab.de.json",
    );
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
/// # Recurrence kind for encoder and decoder cells
pub enum RnnType {
    gru,
    lstm,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
/// # Multimodal context fusion strategy
pub enum FusionType {
    /// Elementwise sum of the attended contexts
    sum,
    /// Elementwise product of the attended contexts
    mul,
    /// Concatenation of the attended contexts
    concat,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
/// # Embedding tying mode
pub enum TiedEmbedding {
    /// Independent embeddings and output projection
    #[serde(rename = "false")]
    untied,
    /// Decoder output projection shares the decoder embedding
    #[serde(rename = "2way")]
    two_way,
    /// Additionally shares the encoder and decoder embeddings
    #[serde(rename = "3way")]
    three_way,
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
/// # Decoder state initialization strategy
pub enum DecoderInit {
    /// All-zero initial state
    zero,
    /// Masked mean of the primary text context through a learned projection
    mean_ctx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// # AttentiveMnmt model configuration
/// Defines the model architecture (layer sizes, recurrence kinds, attention
/// and fusion settings). Keys omitted from a configuration file resolve to
/// the documented defaults; the configuration is resolved once at model
/// construction and immutable afterwards.
pub struct AttentiveMnmtConfig {
    /// Source and target embedding dimensionality.
    pub emb_dim: i64,
    /// Encoder hidden size (per direction).
    pub enc_dim: i64,
    /// Decoder hidden size.
    pub dec_dim: i64,
    /// Source vocabulary size, including the reserved entries.
    pub src_vocab_size: i64,
    /// Target vocabulary size, including the reserved entries.
    pub trg_vocab_size: i64,
    pub enc_type: RnnType,
    pub dec_type: RnnType,
    /// Number of stacked encoder layers.
    pub n_encoders: i64,
    pub dropout_emb: f64,
    pub dropout_ctx: f64,
    pub dropout_enc: f64,
    pub dropout_out: f64,
    /// Optional max-norm clipping of embedding rows.
    pub emb_maxnorm: Option<f64>,
    /// Scale embedding gradients by the inverse token frequency.
    pub emb_gradscale: bool,
    pub tied_emb: TiedEmbedding,
    pub dec_init: DecoderInit,
    pub att_type: AttentionType,
    pub att_activ: Activation,
    pub att_bottleneck: AttentionBottleneck,
    pub att_transform_ctx: bool,
    pub att_mlp_bias: bool,
    /// Multimodal context fusion. Defaults to `concat`.
    pub fusion_type: FusionType,
    /// Visual feature dimensionality; depends on the features used.
    pub n_channels: i64,
    /// Weight of the doubly-stochastic attention regularization.
    pub alpha_c: f64,
    /// Modality topology of the task.
    pub direction: String,
    /// Text stream ordering the dataset batches. Empty resolves to the
    /// primary source stream.
    pub bucket_by: String,
}

impl Default for AttentiveMnmtConfig {
    fn default() -> Self {
        AttentiveMnmtConfig {
            emb_dim: 128,
            enc_dim: 256,
            dec_dim: 256,
            src_vocab_size: 0,
            trg_vocab_size: 0,
            enc_type: RnnType::gru,
            dec_type: RnnType::gru,
            n_encoders: 1,
            dropout_emb: 0.0,
            dropout_ctx: 0.0,
            dropout_enc: 0.0,
            dropout_out: 0.0,
            emb_maxnorm: None,
            emb_gradscale: false,
            tied_emb: TiedEmbedding::untied,
            dec_init: DecoderInit::zero,
            att_type: AttentionType::mlp,
            att_activ: Activation::tanh,
            att_bottleneck: AttentionBottleneck::Ctx,
            att_transform_ctx: true,
            att_mlp_bias: false,
            fusion_type: FusionType::concat,
            n_channels: 2048,
            alpha_c: 0.0,
            direction: "en:Text, image:ImageFeats -> de:Text".to_string(),
            bucket_by: String::new(),
        }
    }
}

impl Config<AttentiveMnmtConfig> for AttentiveMnmtConfig {}

impl AttentiveMnmtConfig {
    /// Validates the configuration, failing fast before any layer is built.
    pub fn validate(&self) -> Result<(), RustMmtError> {
        for (name, value) in &[
            ("emb_dim", self.emb_dim),
            ("enc_dim", self.enc_dim),
            ("dec_dim", self.dec_dim),
            ("src_vocab_size", self.src_vocab_size),
            ("trg_vocab_size", self.trg_vocab_size),
            ("n_encoders", self.n_encoders),
            ("n_channels", self.n_channels),
        ] {
            if *value <= 0 {
                return Err(RustMmtError::InvalidConfigurationError(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.alpha_c < 0.0 {
            return Err(RustMmtError::InvalidConfigurationError(format!(
                "alpha_c must be non-negative, got {}",
                self.alpha_c
            )));
        }
        for (name, value) in &[
            ("dropout_emb", self.dropout_emb),
            ("dropout_ctx", self.dropout_ctx),
            ("dropout_enc", self.dropout_enc),
            ("dropout_out", self.dropout_out),
        ] {
            if !(0.0..1.0).contains(value) {
                return Err(RustMmtError::InvalidConfigurationError(format!(
                    "{} must be within [0, 1), got {}",
                    name, value
                )));
            }
        }
        if let Some(max_norm) = self.emb_maxnorm {
            if max_norm <= 0.0 {
                return Err(RustMmtError::InvalidConfigurationError(format!(
                    "emb_maxnorm must be positive, got {}",
                    max_norm
                )));
            }
        }
        if self.tied_emb == TiedEmbedding::three_way
            && self.src_vocab_size != self.trg_vocab_size
        {
            return Err(RustMmtError::InvalidConfigurationError(format!(
                "3way tied embeddings require equal vocabulary sizes, got {} and {}",
                self.src_vocab_size, self.trg_vocab_size
            )));
        }
        Ok(())
    }
}

/// Doubly-stochastic attention regularization (Xu et al., 2015): penalizes
/// attention mass whose per-location sum over the produced sequence deviates
/// from 1.
///
/// # Arguments
///
/// * `alphas` - per-step attention weights, each `[locations, batch]`
/// * `alpha_c` - regularization weight
///
/// Returns a scalar: the squared deviation summed over locations, averaged
/// over the batch and scaled by `alpha_c`.
pub fn doubly_stochastic_regularization(alphas: &[Tensor], alpha_c: f64) -> Tensor {
    let summed = Tensor::stack(alphas, 0).sum_dim_intlist(&[0], false, Kind::Float);
    let deviation = summed - 1.0;
    (&deviation * &deviation)
        .sum_dim_intlist(&[0], false, Kind::Float)
        .mean(Kind::Float)
        * alpha_c
}

/// Output of an `AttentiveMnmtModel` forward pass.
#[derive(Debug)]
pub struct AttentiveMnmtOutput {
    /// Cross-entropy loss summed over the non-padding target tokens.
    pub loss: Tensor,
    /// Number of target tokens contributing to the loss.
    pub n_items: i64,
}

/// Decoding options for `AttentiveMnmtModel::translate`.
#[derive(Debug, Clone)]
pub struct TranslationOptions {
    /// Number of hypotheses kept per item. 1 decodes greedily.
    pub beam_size: usize,
    /// Maximum produced length, `<eos>` excluded.
    pub max_len: i64,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        TranslationOptions {
            beam_size: 4,
            max_len: 100,
        }
    }
}

/// # Attentive multimodal translation model
///
/// An end-to-end sequence-to-sequence translation model with attention over
/// both the source text and pre-extracted convolutional image features. The
/// encoder and decoder are sized from the configuration and the context-size
/// registry; the registry is fully populated before the decoder is built.
pub struct AttentiveMnmtModel {
    config: AttentiveMnmtConfig,
    topology: Topology,
    src_lang: String,
    trg_lang: String,
    ctx_sizes: HashMap<String, i64>,
    encoder: TextEncoder,
    decoder: ConditionalMmDecoder,
    aux_loss: HashMap<String, Tensor>,
    datasets: HashMap<String, MultimodalDataset>,
    device: Device,
}

impl AttentiveMnmtModel {
    /// Builds the model inside the given variable store path.
    ///
    /// Fails fast on invalid configurations; under `3way` tying the encoder
    /// embedding storage is aliased to the decoder's, so both read and
    /// write one underlying parameter block.
    pub fn new<'p, P>(p: P, config: &AttentiveMnmtConfig) -> Result<AttentiveMnmtModel, RustMmtError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        config.validate()?;
        let device = p.device();

        let topology = Topology::new(&config.direction)?;
        let src_lang = topology
            .first_src_text()
            .ok_or_else(|| {
                RustMmtError::InvalidConfigurationError(format!(
                    "direction declares no source text stream: {}",
                    config.direction
                ))
            })?
            .name
            .clone();
        let trg_lang = topology
            .first_trg_text()
            .ok_or_else(|| {
                RustMmtError::InvalidConfigurationError(format!(
                    "direction declares no target text stream: {}",
                    config.direction
                ))
            })?
            .name
            .clone();

        // The decoder sizes one attention pathway per registry entry, so
        // every attended stream must be registered first.
        let mut ctx_sizes = HashMap::new();
        ctx_sizes.insert(src_lang.clone(), 2 * config.enc_dim);
        ctx_sizes.insert(IMAGE_STREAM.to_string(), config.n_channels);

        let mut encoder = TextEncoder::new(
            p / "enc",
            &TextEncoderConfig {
                input_size: config.emb_dim,
                hidden_size: config.enc_dim,
                n_vocab: config.src_vocab_size,
                rnn_type: config.enc_type,
                src_sorted_batches: true,
                dropout_emb: config.dropout_emb,
                dropout_ctx: config.dropout_ctx,
                dropout_rnn: config.dropout_enc,
                num_layers: config.n_encoders,
                emb_maxnorm: config.emb_maxnorm,
                emb_gradscale: config.emb_gradscale,
            },
        );
        let decoder = ConditionalMmDecoder::new(
            p / "dec",
            &ConditionalMmDecoderConfig {
                input_size: config.emb_dim,
                hidden_size: config.dec_dim,
                n_vocab: config.trg_vocab_size,
                rnn_type: config.dec_type,
                ctx_size_dict: ctx_sizes.clone(),
                ctx_name: src_lang.clone(),
                fusion_type: config.fusion_type,
                tied_emb: config.tied_emb,
                dec_init: config.dec_init,
                att_type: config.att_type,
                att_activ: config.att_activ,
                transform_ctx: config.att_transform_ctx,
                mlp_bias: config.att_mlp_bias,
                att_bottleneck: config.att_bottleneck,
                dropout_out: config.dropout_out,
                emb_maxnorm: config.emb_maxnorm,
                emb_gradscale: config.emb_gradscale,
            },
        )?;

        // Share encoder and decoder embedding storage. Applied strictly
        // after both are built.
        if config.tied_emb == TiedEmbedding::three_way {
            encoder.emb.ws = decoder.emb.ws.shallow_clone();
        }

        let mut aux_loss = HashMap::new();
        if config.alpha_c > 0.0 {
            aux_loss.insert(
                "alpha_reg".to_string(),
                Tensor::from(0f64).to_kind(Kind::Float).to_device(device),
            );
        }

        Ok(AttentiveMnmtModel {
            config: config.clone(),
            topology,
            src_lang,
            trg_lang,
            ctx_sizes,
            encoder,
            decoder,
            aux_loss,
            datasets: HashMap::new(),
            device,
        })
    }

    pub fn config(&self) -> &AttentiveMnmtConfig {
        &self.config
    }

    /// Dimensionality registry of the attended context streams.
    pub fn ctx_sizes(&self) -> &HashMap<String, i64> {
        &self.ctx_sizes
    }

    /// Auxiliary losses produced by the latest training forward pass.
    pub fn aux_loss(&self) -> &HashMap<String, Tensor> {
        &self.aux_loss
    }

    /// Primary source and target language tags of the task.
    pub fn languages(&self) -> (&str, &str) {
        (&self.src_lang, &self.trg_lang)
    }

    /// Encoder embedding weights (shared with the decoder under `3way`
    /// tying).
    pub fn src_embedding_weights(&self) -> Tensor {
        self.encoder.embedding_weights()
    }

    /// Decoder embedding weights.
    pub fn trg_embedding_weights(&self) -> Tensor {
        self.decoder.embedding_weights()
    }

    /// Loads the requested dataset split into the model-held registry. A
    /// split already loaded is reused as is.
    pub fn load_data(
        &mut self,
        split: &str,
        sources: &HashMap<String, PathBuf>,
        vocabs: &HashMap<String, Vocabulary>,
    ) -> Result<(), RustMmtError> {
        if self.datasets.contains_key(split) {
            return Ok(());
        }
        let bucket_by = if self.config.bucket_by.is_empty() {
            self.src_lang.clone()
        } else {
            self.config.bucket_by.clone()
        };
        let dataset = MultimodalDataset::new(sources, vocabs, &self.topology, &bucket_by)?;
        info!("loaded {} split: {}", split, dataset);
        self.datasets.insert(split.to_string(), dataset);
        Ok(())
    }

    /// Dataset previously loaded for a split.
    pub fn dataset(&self, split: &str) -> Option<&MultimodalDataset> {
        self.datasets.get(split)
    }

    /// Encodes a batch into the context bundle consumed by the decoder.
    ///
    /// The raw visual features `(batch, channels, spatial...)` are
    /// flattened over their spatial dimensions and transposed into
    /// `(locations, batch, channels)`; every location is attendable, so the
    /// image context carries no mask. The source text stream goes through
    /// the encoder, producing a masked context.
    pub fn encode(&self, batch: &Batch, train: bool) -> Result<EncodedContext, RustMmtError> {
        let feats = batch.get(IMAGE_STREAM)?;
        let size = feats.size();
        if size.len() < 3 {
            return Err(RustMmtError::ValueError(format!(
                "image features must be (batch, channels, spatial...), got {:?}",
                size
            )));
        }
        let feats = feats.view((size[0], size[1], -1)).permute(&[2, 0, 1]);

        let tokens = batch.get(&self.src_lang)?;
        let (ctx, mask) = self.encoder.forward_t(tokens, train);

        let mut encoded = HashMap::new();
        encoded.insert(IMAGE_STREAM.to_string(), (feats, None));
        encoded.insert(self.src_lang.clone(), (ctx, Some(mask)));
        Ok(encoded)
    }

    /// Runs the full training or inference pipeline over a batch:
    /// encode, teacher-forced decode and per-token cross-entropy.
    ///
    /// In training state, with `alpha_c > 0`, the attention history over
    /// the image locations additionally produces the `alpha_reg` entry of
    /// the auxiliary-loss registry, overwriting the previous value. The
    /// registry is never written in inference state.
    pub fn forward_t(
        &mut self,
        batch: &Batch,
        train: bool,
    ) -> Result<AttentiveMnmtOutput, RustMmtError> {
        let ctx = self.encode(batch, train)?;
        let target = batch.get(&self.trg_lang)?;
        let decoder_output = self.decoder.forward_t(&ctx, target, train)?;

        let target_size = target.size();
        let log_probs = decoder_output.logits.log_softmax(-1, Kind::Float);
        let picked = log_probs
            .gather(2, &target.unsqueeze(-1), false)
            .view((target_size[0], target_size[1]));
        let token_mask = target.ne(PAD_ID).to_kind(Kind::Float);
        let loss = (picked * &token_mask).sum(Kind::Float).neg();
        let n_items = token_mask.sum(Kind::Float).int64_value(&[]);

        if train && self.config.alpha_c > 0.0 && !decoder_output.alphas.is_empty() {
            let alpha_reg =
                doubly_stochastic_regularization(&decoder_output.alphas, self.config.alpha_c);
            self.aux_loss.insert("alpha_reg".to_string(), alpha_reg);
        }

        Ok(AttentiveMnmtOutput { loss, n_items })
    }

    /// Translates a batch, returning target token indices per item,
    /// `<eos>` excluded. `beam_size` 1 decodes greedily; larger beams keep
    /// the length-normalized best hypothesis.
    pub fn translate(
        &self,
        batch: &Batch,
        options: &TranslationOptions,
    ) -> Result<Vec<Vec<i64>>, RustMmtError> {
        if options.beam_size == 0 || options.max_len <= 0 {
            return Err(RustMmtError::ValueError(format!(
                "translation requires a positive beam size and max_len, got {} and {}",
                options.beam_size, options.max_len
            )));
        }
        let ctx = self.encode(batch, false)?;
        if options.beam_size == 1 {
            return self.greedy_search(&ctx, batch.size(), options.max_len);
        }
        let mut outputs = Vec::with_capacity(batch.size() as usize);
        for item in 0..batch.size() {
            outputs.push(self.beam_search_item(&ctx, item, options.beam_size, options.max_len)?);
        }
        Ok(outputs)
    }

    fn greedy_search(
        &self,
        ctx: &EncodedContext,
        batch_size: i64,
        max_len: i64,
    ) -> Result<Vec<Vec<i64>>, RustMmtError> {
        let mut state = self.decoder.init_state(ctx, batch_size, self.device)?;
        let mut tokens = Tensor::full(&[batch_size], BOS_ID, (Kind::Int64, self.device));
        let mut outputs: Vec<Vec<i64>> = vec![Vec::new(); batch_size as usize];
        let mut finished = vec![false; batch_size as usize];
        for _ in 0..max_len {
            let (log_probs, next_state) = self.decoder.decode_step(&tokens, &state, ctx)?;
            state = next_state;
            tokens = log_probs.argmax(-1, false);
            let ids = Vec::<i64>::from(&tokens);
            let mut all_done = true;
            for (item, id) in ids.iter().enumerate() {
                if !finished[item] {
                    if *id == EOS_ID {
                        finished[item] = true;
                    } else {
                        outputs[item].push(*id);
                    }
                }
                all_done &= finished[item];
            }
            if all_done {
                break;
            }
        }
        Ok(outputs)
    }

    fn beam_search_item(
        &self,
        ctx: &EncodedContext,
        item: i64,
        beam_size: usize,
        max_len: i64,
    ) -> Result<Vec<i64>, RustMmtError> {
        let k = beam_size as i64;
        // Slice this item's context and tile it across the beam.
        let mut item_ctx = HashMap::new();
        for (name, (tensor, mask)) in ctx {
            let tiled = tensor.narrow(1, item, 1).repeat(&[1, k, 1]);
            let tiled_mask = mask
                .as_ref()
                .map(|mask| mask.narrow(1, item, 1).repeat(&[1, k]));
            item_ctx.insert(name.clone(), (tiled, tiled_mask));
        }

        let mut state = self.decoder.init_state(&item_ctx, k, self.device)?;
        let mut tokens = Tensor::full(&[k], BOS_ID, (Kind::Int64, self.device));
        let mut hypotheses: Vec<Vec<i64>> = vec![Vec::new(); beam_size];
        // All beams start from the same <bos>; only one may survive the
        // first expansion.
        let mut scores = vec![0.0; beam_size];
        for score in scores.iter_mut().skip(1) {
            *score = f64::NEG_INFINITY;
        }
        let mut finished: Vec<(f64, Vec<i64>)> = Vec::new();

        for _ in 0..max_len {
            let (log_probs, next_state) = self.decoder.decode_step(&tokens, &state, &item_ctx)?;
            let n_vocab = log_probs.size()[1];
            let totals = log_probs
                + Tensor::of_slice(&scores)
                    .to_kind(Kind::Float)
                    .to_device(self.device)
                    .unsqueeze(1);
            let (top_scores, top_indices) = totals.view(-1).topk(k, -1, true, true);
            let beam_indices = &top_indices / n_vocab;
            let token_indices = top_indices.remainder(n_vocab);

            state = next_state.index_select(&beam_indices);
            tokens = token_indices.shallow_clone();

            let beam_ids = Vec::<i64>::from(&beam_indices);
            let token_ids = Vec::<i64>::from(&token_indices);
            let new_scores = Vec::<f64>::from(&top_scores);
            let mut next_hypotheses = Vec::with_capacity(beam_size);
            for beam in 0..beam_size {
                let mut hypothesis = hypotheses[beam_ids[beam] as usize].clone();
                if token_ids[beam] == EOS_ID {
                    let length = (hypothesis.len() + 1) as f64;
                    finished.push((new_scores[beam] / length, hypothesis.clone()));
                    scores[beam] = f64::NEG_INFINITY;
                } else {
                    hypothesis.push(token_ids[beam]);
                    scores[beam] = new_scores[beam];
                }
                next_hypotheses.push(hypothesis);
            }
            hypotheses = next_hypotheses;
            if finished.len() >= beam_size || scores.iter().all(|s| *s == f64::NEG_INFINITY) {
                break;
            }
        }

        let best = finished
            .into_iter()
            .max_by_key(|(score, _)| OrderedFloat(*score));
        Ok(match best {
            Some((_, hypothesis)) => hypothesis,
            // No hypothesis reached <eos> within max_len: fall back to the
            // best-scoring partial one.
            None => {
                let mut indexed: Vec<(f64, Vec<i64>)> = scores
                    .into_iter()
                    .zip(hypotheses.into_iter())
                    .map(|(score, hypothesis)| {
                        (score / (hypothesis.len().max(1) as f64), hypothesis)
                    })
                    .collect();
                indexed.sort_by_key(|(score, _)| OrderedFloat(-*score));
                indexed.remove(0).1
            }
        })
    }
}
