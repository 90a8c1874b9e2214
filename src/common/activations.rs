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

use serde::{Deserialize, Serialize};
use tch::Tensor;

pub(crate) fn _tanh(x: &Tensor) -> Tensor {
    x.tanh()
}

pub(crate) fn _sigmoid(x: &Tensor) -> Tensor {
    x.sigmoid()
}

pub(crate) fn _relu(x: &Tensor) -> Tensor {
    x.relu()
}

pub(crate) fn _linear(x: &Tensor) -> Tensor {
    x.shallow_clone()
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
/// # Activation function used inside attention and output blocks
pub enum Activation {
    /// Hyperbolic tangent
    tanh,
    /// Sigmoid
    sigmoid,
    /// Rectified Linear Unit
    relu,
    /// Identity
    linear,
}

impl Activation {
    pub fn get_function(&self) -> TensorFunction {
        TensorFunction::new(match self {
            Activation::tanh => Box::new(_tanh),
            Activation::sigmoid => Box::new(_sigmoid),
            Activation::relu => Box::new(_relu),
            Activation::linear => Box::new(_linear),
        })
    }
}

/// Wrapper around a tensor-to-tensor function, holding the resolved
/// activation for a layer.
pub struct TensorFunction(Box<fn(&Tensor) -> Tensor>);

impl TensorFunction {
    pub fn new(fun: Box<fn(&Tensor) -> Tensor>) -> Self {
        Self(fun)
    }

    pub fn get_fn(&self) -> &fn(&Tensor) -> Tensor {
        &self.0
    }
}

impl std::fmt::Debug for TensorFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TensorFunction")
    }
}
