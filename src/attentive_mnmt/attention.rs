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

use crate::common::activations::{Activation, TensorFunction};
use crate::common::error::RustMmtError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::{nn, Kind, Tensor};

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
/// # Attention scoring mechanism
pub enum AttentionType {
    /// Additive attention with a learned scoring layer (Bahdanau et al.)
    mlp,
    /// Scaled dot-product between query and context
    dot,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
/// # Size of the common space queries and contexts are projected into
pub enum AttentionBottleneck {
    /// Sized after the attended context
    Ctx,
    /// Sized after the decoder hidden state
    Hid,
    /// Explicit dimension
    Dim(i64),
}

impl AttentionBottleneck {
    /// Resolves the bottleneck to a concrete dimension for one context
    /// stream.
    pub fn resolve(&self, ctx_size: i64, hidden_size: i64) -> i64 {
        match self {
            AttentionBottleneck::Ctx => ctx_size,
            AttentionBottleneck::Hid => hidden_size,
            AttentionBottleneck::Dim(dim) => *dim,
        }
    }
}

#[derive(Debug)]
enum Scorer {
    Mlp(nn::Linear),
    Dot(f64),
}

/// # Attention over one context stream
///
/// Projects the decoder query (and optionally the context) into a common
/// space, scores every context location, and returns the normalized
/// attention weights together with the weighted context summary.
#[derive(Debug)]
pub struct Attention {
    ctx_proj: Option<nn::Linear>,
    query_proj: nn::Linear,
    scorer: Scorer,
    activation: TensorFunction,
    output_dim: i64,
}

impl Attention {
    /// Builds an attention block for a context stream of dimensionality
    /// `ctx_size`, queried by decoder states of dimensionality
    /// `hidden_size`. When `transform_ctx` is unset the bottleneck must
    /// equal the context size, since scores are computed in context space.
    pub fn new<'p, P>(
        p: P,
        ctx_size: i64,
        hidden_size: i64,
        att_type: AttentionType,
        att_activ: Activation,
        transform_ctx: bool,
        mlp_bias: bool,
        bottleneck: i64,
    ) -> Result<Attention, RustMmtError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        if !transform_ctx && bottleneck != ctx_size {
            return Err(RustMmtError::InvalidConfigurationError(format!(
                "attention bottleneck ({}) must match the context size ({}) when the context is not transformed",
                bottleneck, ctx_size
            )));
        }
        let no_bias = nn::LinearConfig {
            bias: false,
            ..Default::default()
        };
        let ctx_proj = if transform_ctx {
            Some(nn::linear(p / "ctx2ctx", ctx_size, bottleneck, no_bias))
        } else {
            None
        };
        let query_proj = nn::linear(
            p / "hid2ctx",
            hidden_size,
            bottleneck,
            nn::LinearConfig {
                bias: mlp_bias,
                ..Default::default()
            },
        );
        let scorer = match att_type {
            AttentionType::mlp => Scorer::Mlp(nn::linear(p / "mlp", bottleneck, 1, no_bias)),
            AttentionType::dot => Scorer::Dot((bottleneck as f64).powf(-0.5)),
        };
        Ok(Attention {
            ctx_proj,
            query_proj,
            scorer,
            activation: att_activ.get_function(),
            output_dim: bottleneck,
        })
    }

    /// Dimensionality of the weighted context summary.
    pub fn output_dim(&self) -> i64 {
        self.output_dim
    }

    /// Attends over a context.
    ///
    /// # Arguments
    ///
    /// * `query` - decoder state, shape `[batch, hidden]`
    /// * `ctx` - context, shape `[locations, batch, ctx_size]`
    /// * `mask` - optional validity mask, shape `[locations, batch]`, 1 for
    ///   attendable locations. `None` treats every location as valid.
    ///
    /// Returns the attention weights `[locations, batch]`, normalized over
    /// locations, and the weighted context `[batch, bottleneck]`.
    pub fn forward(&self, query: &Tensor, ctx: &Tensor, mask: Option<&Tensor>) -> (Tensor, Tensor) {
        let ctx_size = ctx.size();
        let ctx_ = match &self.ctx_proj {
            Some(proj) => ctx.apply(proj),
            None => ctx.shallow_clone(),
        };
        let query_ = query.apply(&self.query_proj).unsqueeze(0);
        let scores = match &self.scorer {
            Scorer::Mlp(mlp) => {
                let energy = (self.activation.get_fn())(&(&ctx_ + &query_));
                energy.apply(mlp).view((ctx_size[0], ctx_size[1]))
            }
            Scorer::Dot(scaling) => {
                (&ctx_ * &query_).sum_dim_intlist(&[-1], false, Kind::Float) * *scaling
            }
        };
        let scores = match mask {
            Some(mask) => scores.masked_fill(&mask.eq(0), std::f64::NEG_INFINITY),
            None => scores,
        };
        let alpha = scores.softmax(0, Kind::Float);
        let weighted = (&alpha.unsqueeze(-1) * &ctx_).sum_dim_intlist(&[0], false, Kind::Float);
        (alpha, weighted)
    }
}
