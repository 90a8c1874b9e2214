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

use crate::attentive_mnmt::RnnType;
use crate::common::dropout::Dropout;
use crate::vocab::PAD_ID;
use std::borrow::Borrow;
use tch::nn::{embedding, EmbeddingConfig, RNNConfig, RNN};
use tch::{nn, Kind, Tensor};

/// Configuration for a `TextEncoder`.
#[derive(Debug, Clone)]
pub struct TextEncoderConfig {
    /// Embedding dimensionality.
    pub input_size: i64,
    /// Hidden size of each direction of the recurrence.
    pub hidden_size: i64,
    /// Source vocabulary size.
    pub n_vocab: i64,
    /// Recurrence kind.
    pub rnn_type: RnnType,
    /// Declares that incoming batches are sorted by source length,
    /// longest first. The encoder relies on this for variable-length
    /// batching; callers violating it are on their own.
    pub src_sorted_batches: bool,
    /// Dropout over the embedded tokens.
    pub dropout_emb: f64,
    /// Dropout over the produced context.
    pub dropout_ctx: f64,
    /// Dropout between stacked recurrent layers.
    pub dropout_rnn: f64,
    /// Number of stacked recurrent layers.
    pub num_layers: i64,
    /// Optional max-norm clipping of the embedding rows.
    pub emb_maxnorm: Option<f64>,
    /// Scale embedding gradients by the inverse token frequency.
    pub emb_gradscale: bool,
}

#[derive(Debug)]
enum RnnLayer {
    Gru(nn::GRU),
    Lstm(nn::LSTM),
}

impl RnnLayer {
    fn seq(&self, input: &Tensor) -> Tensor {
        match self {
            RnnLayer::Gru(rnn) => rnn.seq(input).0,
            RnnLayer::Lstm(rnn) => rnn.seq(input).0,
        }
    }
}

/// Clips the rows of an embedding matrix to a maximum L2 norm, in place and
/// outside of gradient tracking, mirroring embedding max-norm semantics.
pub(crate) fn clip_embedding_norm(emb: &nn::Embedding, max_norm: f64) {
    tch::no_grad(|| {
        let renormed = emb.ws.renorm(2.0, 0, max_norm);
        let mut ws = emb.ws.shallow_clone();
        ws.copy_(&renormed);
    });
}

/// # Bidirectional recurrent encoder over a source text stream
///
/// Embeds padded token batches and runs them through a stack of
/// bidirectional recurrent layers. The produced context keeps one position
/// per source token, `[seq, batch, 2 * hidden_size]`, together with a
/// padding mask.
#[derive(Debug)]
pub struct TextEncoder {
    pub(crate) emb: nn::Embedding,
    layers: Vec<RnnLayer>,
    dropout_emb: Dropout,
    dropout_ctx: Dropout,
    dropout_rnn: Dropout,
    emb_maxnorm: Option<f64>,
    output_size: i64,
}

impl TextEncoder {
    pub fn new<'p, P>(p: P, config: &TextEncoderConfig) -> TextEncoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let embedding_config = EmbeddingConfig {
            padding_idx: PAD_ID,
            scale_grad_by_freq: config.emb_gradscale,
            ..Default::default()
        };
        let emb = embedding(
            p / "emb",
            config.n_vocab,
            config.input_size,
            embedding_config,
        );
        let rnn_config = RNNConfig {
            bidirectional: true,
            ..Default::default()
        };
        let p_rnn = p / "rnn";
        let mut layers = Vec::with_capacity(config.num_layers as usize);
        for layer_index in 0..config.num_layers {
            let in_dim = if layer_index == 0 {
                config.input_size
            } else {
                2 * config.hidden_size
            };
            layers.push(match config.rnn_type {
                RnnType::gru => RnnLayer::Gru(nn::gru(
                    &(&p_rnn / layer_index),
                    in_dim,
                    config.hidden_size,
                    rnn_config,
                )),
                RnnType::lstm => RnnLayer::Lstm(nn::lstm(
                    &(&p_rnn / layer_index),
                    in_dim,
                    config.hidden_size,
                    rnn_config,
                )),
            });
        }
        TextEncoder {
            emb,
            layers,
            dropout_emb: Dropout::new(config.dropout_emb),
            dropout_ctx: Dropout::new(config.dropout_ctx),
            dropout_rnn: Dropout::new(config.dropout_rnn),
            emb_maxnorm: config.emb_maxnorm,
            output_size: 2 * config.hidden_size,
        }
    }

    /// Dimensionality of the produced context.
    pub fn output_size(&self) -> i64 {
        self.output_size
    }

    pub(crate) fn embedding_weights(&self) -> Tensor {
        self.emb.ws.shallow_clone()
    }

    /// Encodes a `[batch, seq]` int64 token batch.
    ///
    /// Returns the context `[seq, batch, 2 * hidden_size]` and the padding
    /// mask `[seq, batch]` (1 for real tokens).
    pub fn forward_t(&self, tokens: &Tensor, train: bool) -> (Tensor, Tensor) {
        if let Some(max_norm) = self.emb_maxnorm {
            clip_embedding_norm(&self.emb, max_norm);
        }
        let mut output = tokens
            .apply(&self.emb)
            .apply_t(&self.dropout_emb, train);
        for (layer_index, layer) in self.layers.iter().enumerate() {
            if layer_index > 0 {
                output = output.apply_t(&self.dropout_rnn, train);
            }
            output = layer.seq(&output);
        }
        let ctx = output.transpose(0, 1).apply_t(&self.dropout_ctx, train);
        let mask = tokens.ne(PAD_ID).to_kind(Kind::Float).transpose(0, 1);
        (ctx, mask)
    }
}
