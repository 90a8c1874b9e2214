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

use crate::attentive_mnmt::attention::{Attention, AttentionBottleneck, AttentionType};
use crate::attentive_mnmt::encoder::clip_embedding_norm;
use crate::attentive_mnmt::{DecoderInit, EncodedContext, FusionType, RnnType, TiedEmbedding, IMAGE_STREAM};
use crate::common::activations::Activation;
use crate::common::dropout::Dropout;
use crate::common::error::RustMmtError;
use crate::vocab::BOS_ID;
use std::borrow::Borrow;
use std::collections::HashMap;
use tch::nn::{embedding, EmbeddingConfig, RNNConfig, RNN};
use tch::nn::{GRUState, LSTMState};
use tch::{nn, Device, Kind, Tensor};

/// Configuration for a `ConditionalMmDecoder`.
#[derive(Debug, Clone)]
pub struct ConditionalMmDecoderConfig {
    /// Embedding dimensionality.
    pub input_size: i64,
    /// Hidden size of the recurrent cells.
    pub hidden_size: i64,
    /// Target vocabulary size.
    pub n_vocab: i64,
    /// Recurrence kind.
    pub rnn_type: RnnType,
    /// Dimensionality of every context stream the decoder attends over.
    /// Must be fully populated before the decoder is built.
    pub ctx_size_dict: HashMap<String, i64>,
    /// Name of the primary textual context stream.
    pub ctx_name: String,
    /// How the attended context streams are combined.
    pub fusion_type: FusionType,
    /// Embedding tying mode.
    pub tied_emb: TiedEmbedding,
    /// Decoder state initialization strategy.
    pub dec_init: DecoderInit,
    /// Attention scoring mechanism.
    pub att_type: AttentionType,
    /// Attention activation (additive attention only).
    pub att_activ: Activation,
    /// Project contexts into the bottleneck space before scoring.
    pub transform_ctx: bool,
    /// Bias on the query projection.
    pub mlp_bias: bool,
    /// Size of the common attention space.
    pub att_bottleneck: AttentionBottleneck,
    /// Dropout over the pre-softmax output.
    pub dropout_out: f64,
    /// Optional max-norm clipping of the embedding rows.
    pub emb_maxnorm: Option<f64>,
    /// Scale embedding gradients by the inverse token frequency.
    pub emb_gradscale: bool,
}

#[derive(Debug)]
enum RnnCell {
    Gru(nn::GRU),
    Lstm(nn::LSTM),
}

/// Recurrent state of one decoder cell, `[1, batch, hidden]`. The memory
/// component is present for LSTM cells only.
#[derive(Debug)]
pub struct DecoderState {
    pub(crate) hidden: Tensor,
    pub(crate) memory: Option<Tensor>,
}

impl DecoderState {
    /// Reorders the batch dimension, used to track surviving hypotheses
    /// during beam decoding.
    pub fn index_select(&self, indices: &Tensor) -> DecoderState {
        DecoderState {
            hidden: self.hidden.index_select(1, indices),
            memory: self
                .memory
                .as_ref()
                .map(|memory| memory.index_select(1, indices)),
        }
    }
}

impl RnnCell {
    fn step(&self, input: &Tensor, state: &DecoderState) -> DecoderState {
        match self {
            RnnCell::Gru(rnn) => {
                let next = rnn.step(input, &GRUState(state.hidden.shallow_clone()));
                DecoderState {
                    hidden: next.0,
                    memory: None,
                }
            }
            RnnCell::Lstm(rnn) => {
                let memory = state
                    .memory
                    .as_ref()
                    .map(|memory| memory.shallow_clone())
                    .unwrap_or_else(|| state.hidden.zeros_like());
                let next = rnn.step(
                    input,
                    &LSTMState((state.hidden.shallow_clone(), memory)),
                );
                DecoderState {
                    hidden: (next.0).0,
                    memory: Some((next.0).1),
                }
            }
        }
    }
}

#[derive(Debug)]
enum Initializer {
    Zero,
    MeanCtx(nn::Linear),
}

/// Output of a teacher-forced decoder pass.
#[derive(Debug)]
pub struct ConditionalMmDecoderOutput {
    /// Vocabulary logits, shape `[batch, steps, n_vocab]`.
    pub logits: Tensor,
    /// Per-step attention weights over the image locations,
    /// each `[locations, batch]`, in decoding order.
    pub alphas: Vec<Tensor>,
}

/// # Conditional recurrent decoder over multiple context streams
///
/// A two-cell conditional decoder: the first cell consumes the embedded
/// previous token, its state queries one attention block per context
/// stream, and the fused attended context drives the second cell. The
/// output projection optionally shares the embedding matrix (`2way`/`3way`
/// tying).
#[derive(Debug)]
pub struct ConditionalMmDecoder {
    pub(crate) emb: nn::Embedding,
    cell1: RnnCell,
    cell2: RnnCell,
    attentions: Vec<(String, Attention)>,
    fusion_type: FusionType,
    initializer: Initializer,
    hid2out: nn::Linear,
    out_proj: Option<nn::Linear>,
    dropout_out: Dropout,
    emb_maxnorm: Option<f64>,
    rnn_type: RnnType,
    hidden_size: i64,
    ctx_name: String,
}

impl ConditionalMmDecoder {
    /// Builds the decoder. Fails when the context-size registry is missing
    /// the primary textual stream or the image stream, or when `sum`/`mul`
    /// fusion is requested over attended contexts of unequal sizes.
    pub fn new<'p, P>(
        p: P,
        config: &ConditionalMmDecoderConfig,
    ) -> Result<ConditionalMmDecoder, RustMmtError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let primary_ctx_size = *config.ctx_size_dict.get(&config.ctx_name).ok_or_else(|| {
            RustMmtError::InvalidConfigurationError(format!(
                "context size registry has no entry for the primary stream {}",
                config.ctx_name
            ))
        })?;
        if !config.ctx_size_dict.contains_key(IMAGE_STREAM) {
            return Err(RustMmtError::InvalidConfigurationError(format!(
                "context size registry has no entry for the {} stream; it must be populated before the decoder is built",
                IMAGE_STREAM
            )));
        }

        let mut stream_names = vec![config.ctx_name.clone()];
        let mut others: Vec<String> = config
            .ctx_size_dict
            .keys()
            .filter(|name| **name != config.ctx_name)
            .cloned()
            .collect();
        others.sort();
        stream_names.extend(others);

        let mut attentions = Vec::with_capacity(stream_names.len());
        let mut attended_sizes = Vec::with_capacity(stream_names.len());
        for name in stream_names {
            let ctx_size = config.ctx_size_dict[&name];
            let bottleneck = config
                .att_bottleneck
                .resolve(ctx_size, config.hidden_size);
            let attention = Attention::new(
                p / format!("att_{}", name),
                ctx_size,
                config.hidden_size,
                config.att_type,
                config.att_activ,
                config.transform_ctx,
                config.mlp_bias,
                bottleneck,
            )?;
            attended_sizes.push(attention.output_dim());
            attentions.push((name, attention));
        }

        let fusion_size = match config.fusion_type {
            FusionType::concat => attended_sizes.iter().sum(),
            FusionType::sum | FusionType::mul => {
                let first = attended_sizes[0];
                if attended_sizes.iter().any(|size| *size != first) {
                    return Err(RustMmtError::InvalidConfigurationError(format!(
                        "{:?} fusion requires equal attended context sizes, got {:?}",
                        config.fusion_type, attended_sizes
                    )));
                }
                first
            }
        };

        let embedding_config = EmbeddingConfig {
            padding_idx: crate::vocab::PAD_ID,
            scale_grad_by_freq: config.emb_gradscale,
            ..Default::default()
        };
        let emb = embedding(
            p / "emb",
            config.n_vocab,
            config.input_size,
            embedding_config,
        );

        let rnn_config = RNNConfig::default();
        let (cell1, cell2) = match config.rnn_type {
            RnnType::gru => (
                RnnCell::Gru(nn::gru(&(p / "dec0"), config.input_size, config.hidden_size, rnn_config)),
                RnnCell::Gru(nn::gru(&(p / "dec1"), fusion_size, config.hidden_size, rnn_config)),
            ),
            RnnType::lstm => (
                RnnCell::Lstm(nn::lstm(&(p / "dec0"), config.input_size, config.hidden_size, rnn_config)),
                RnnCell::Lstm(nn::lstm(&(p / "dec1"), fusion_size, config.hidden_size, rnn_config)),
            ),
        };

        let initializer = match config.dec_init {
            DecoderInit::zero => Initializer::Zero,
            DecoderInit::mean_ctx => Initializer::MeanCtx(nn::linear(
                p / "ff_dec_init",
                primary_ctx_size,
                config.hidden_size,
                Default::default(),
            )),
        };

        let hid2out = nn::linear(
            p / "hid2out",
            config.hidden_size,
            config.input_size,
            Default::default(),
        );
        let out_proj = match config.tied_emb {
            TiedEmbedding::untied => Some(nn::linear(
                p / "out",
                config.input_size,
                config.n_vocab,
                Default::default(),
            )),
            TiedEmbedding::two_way | TiedEmbedding::three_way => None,
        };

        Ok(ConditionalMmDecoder {
            emb,
            cell1,
            cell2,
            attentions,
            fusion_type: config.fusion_type,
            initializer,
            hid2out,
            out_proj,
            dropout_out: Dropout::new(config.dropout_out),
            emb_maxnorm: config.emb_maxnorm,
            rnn_type: config.rnn_type,
            hidden_size: config.hidden_size,
            ctx_name: config.ctx_name.clone(),
        })
    }

    pub(crate) fn embedding_weights(&self) -> Tensor {
        self.emb.ws.shallow_clone()
    }

    /// Initial recurrent state for a batch, per the configured strategy.
    pub fn init_state(
        &self,
        ctx: &EncodedContext,
        batch_size: i64,
        device: Device,
    ) -> Result<DecoderState, RustMmtError> {
        let hidden = match &self.initializer {
            Initializer::Zero => Tensor::zeros(
                &[1, batch_size, self.hidden_size],
                (Kind::Float, device),
            ),
            Initializer::MeanCtx(projection) => {
                let (ctx_tensor, ctx_mask) = stream(ctx, &self.ctx_name)?;
                let mean = match ctx_mask {
                    Some(mask) => {
                        let mask = mask.unsqueeze(-1);
                        (ctx_tensor * &mask).sum_dim_intlist(&[0], false, Kind::Float)
                            / mask.sum_dim_intlist(&[0], false, Kind::Float)
                    }
                    None => {
                        ctx_tensor.sum_dim_intlist(&[0], false, Kind::Float)
                            / ctx_tensor.size()[0] as f64
                    }
                };
                mean.apply(projection).tanh().unsqueeze(0)
            }
        };
        let memory = match self.rnn_type {
            RnnType::gru => None,
            RnnType::lstm => Some(hidden.zeros_like()),
        };
        Ok(DecoderState { hidden, memory })
    }

    /// One decoding step from an embedded token.
    ///
    /// Returns the vocabulary logits `[batch, n_vocab]`, the next state and
    /// the attention weights over the image locations, when that stream is
    /// attended.
    fn step(
        &self,
        input: &Tensor,
        state: &DecoderState,
        ctx: &EncodedContext,
        train: bool,
    ) -> Result<(Tensor, DecoderState, Option<Tensor>), RustMmtError> {
        let state1 = self.cell1.step(input, state);
        let query = state1.hidden.select(0, 0);

        let mut attended = Vec::with_capacity(self.attentions.len());
        let mut image_alpha = None;
        for (name, attention) in &self.attentions {
            let (ctx_tensor, ctx_mask) = stream(ctx, name)?;
            let (alpha, weighted) = attention.forward(&query, ctx_tensor, ctx_mask.as_ref());
            if name == IMAGE_STREAM {
                image_alpha = Some(alpha);
            }
            attended.push(weighted);
        }
        let fused = match self.fusion_type {
            FusionType::concat => Tensor::cat(&attended, -1),
            FusionType::sum => {
                let mut acc = attended[0].shallow_clone();
                for weighted in attended.iter().skip(1) {
                    acc = acc + weighted;
                }
                acc
            }
            FusionType::mul => {
                let mut acc = attended[0].shallow_clone();
                for weighted in attended.iter().skip(1) {
                    acc = acc * weighted;
                }
                acc
            }
        };

        let state2 = self.cell2.step(&fused, &state1);
        let output = state2
            .hidden
            .select(0, 0)
            .apply(&self.hid2out)
            .tanh()
            .apply_t(&self.dropout_out, train);
        let logits = match &self.out_proj {
            Some(projection) => output.apply(projection),
            None => output.linear::<Tensor>(&self.emb.ws, None),
        };
        Ok((logits, state2, image_alpha))
    }

    /// One inference step from previous token indices `[batch]`.
    ///
    /// Returns log-probabilities `[batch, n_vocab]` and the next state.
    pub fn decode_step(
        &self,
        prev_tokens: &Tensor,
        state: &DecoderState,
        ctx: &EncodedContext,
    ) -> Result<(Tensor, DecoderState), RustMmtError> {
        let input = prev_tokens.apply(&self.emb);
        let (logits, next_state, _alpha) = self.step(&input, state, ctx, false)?;
        Ok((logits.log_softmax(-1, Kind::Float), next_state))
    }

    /// Teacher-forced pass over a `[batch, steps]` target batch. The
    /// decoder input at step `t` is `<bos>` for `t = 0` and the reference
    /// token `t - 1` afterwards.
    pub fn forward_t(
        &self,
        ctx: &EncodedContext,
        target: &Tensor,
        train: bool,
    ) -> Result<ConditionalMmDecoderOutput, RustMmtError> {
        let target_size = target.size();
        if target_size.len() != 2 || target_size[1] < 1 {
            return Err(RustMmtError::ValueError(format!(
                "target batch must be [batch, steps] with at least one step, got {:?}",
                target_size
            )));
        }
        let (batch_size, steps) = (target_size[0], target_size[1]);
        let device = target.device();
        if let Some(max_norm) = self.emb_maxnorm {
            clip_embedding_norm(&self.emb, max_norm);
        }

        let bos = Tensor::full(&[batch_size, 1], BOS_ID, (Kind::Int64, device));
        let inputs = Tensor::cat(&[bos, target.narrow(1, 0, steps - 1)], 1);
        let embedded = inputs.apply(&self.emb);

        let mut state = self.init_state(ctx, batch_size, device)?;
        let mut step_logits = Vec::with_capacity(steps as usize);
        let mut alphas = Vec::new();
        for t in 0..steps {
            let input = embedded.select(1, t);
            let (logits, next_state, image_alpha) = self.step(&input, &state, ctx, train)?;
            state = next_state;
            if let Some(alpha) = image_alpha {
                alphas.push(alpha);
            }
            step_logits.push(logits);
        }
        let logits = Tensor::stack(&step_logits, 0).transpose(0, 1);
        Ok(ConditionalMmDecoderOutput { logits, alphas })
    }
}

fn stream<'a>(
    ctx: &'a EncodedContext,
    name: &str,
) -> Result<&'a (Tensor, Option<Tensor>), RustMmtError> {
    ctx.get(name).ok_or_else(|| {
        RustMmtError::ValueError(format!("encoded context is missing the {} stream", name))
    })
}
