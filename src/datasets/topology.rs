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

use crate::common::error::RustMmtError;
use std::fmt;

/// Kind of data carried by a named stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Whitespace-tokenized text, mapped through a vocabulary.
    Text,
    /// Pre-extracted convolutional feature tensors.
    ImageFeats,
}

impl StreamKind {
    fn parse(value: &str) -> Result<StreamKind, RustMmtError> {
        match value {
            "Text" => Ok(StreamKind::Text),
            "ImageFeats" => Ok(StreamKind::ImageFeats),
            _ => Err(RustMmtError::InvalidConfigurationError(format!(
                "unknown stream kind: {}",
                value
            ))),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Text => write!(f, "Text"),
            StreamKind::ImageFeats => write!(f, "ImageFeats"),
        }
    }
}

/// A named input or output modality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub name: String,
    pub kind: StreamKind,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

/// # Modality topology of a translation task
///
/// Parsed from a direction description such as
/// `"en:Text, image:ImageFeats -> de:Text"`: the streams on the left of the
/// arrow are sources, the streams on the right are targets.
#[derive(Debug, Clone)]
pub struct Topology {
    pub srcs: Vec<Stream>,
    pub trgs: Vec<Stream>,
}

impl Topology {
    pub fn new(direction: &str) -> Result<Topology, RustMmtError> {
        let mut sides = direction.split("->");
        let src_side = sides.next().unwrap_or("");
        let trg_side = sides.next().ok_or_else(|| {
            RustMmtError::InvalidConfigurationError(format!(
                "direction must contain a single '->': {}",
                direction
            ))
        })?;
        if sides.next().is_some() {
            return Err(RustMmtError::InvalidConfigurationError(format!(
                "direction must contain a single '->': {}",
                direction
            )));
        }
        let srcs = Self::parse_side(src_side)?;
        let trgs = Self::parse_side(trg_side)?;
        if srcs.is_empty() || trgs.is_empty() {
            return Err(RustMmtError::InvalidConfigurationError(format!(
                "direction must declare at least one source and one target stream: {}",
                direction
            )));
        }
        Ok(Topology { srcs, trgs })
    }

    fn parse_side(side: &str) -> Result<Vec<Stream>, RustMmtError> {
        let mut streams = Vec::new();
        for item in side.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let mut parts = item.split(':');
            let name = parts.next().unwrap_or("").trim();
            let kind = parts.next().map(str::trim).ok_or_else(|| {
                RustMmtError::InvalidConfigurationError(format!(
                    "stream must be given as name:Kind: {}",
                    item
                ))
            })?;
            if name.is_empty() || parts.next().is_some() {
                return Err(RustMmtError::InvalidConfigurationError(format!(
                    "stream must be given as name:Kind: {}",
                    item
                )));
            }
            streams.push(Stream {
                name: name.to_string(),
                kind: StreamKind::parse(kind)?,
            });
        }
        Ok(streams)
    }

    /// First textual source stream, the primary language of the encoder.
    pub fn first_src_text(&self) -> Option<&Stream> {
        self.srcs.iter().find(|s| s.kind == StreamKind::Text)
    }

    /// First textual target stream, the language the decoder produces.
    pub fn first_trg_text(&self) -> Option<&Stream> {
        self.trgs.iter().find(|s| s.kind == StreamKind::Text)
    }

    /// Looks a stream up by name on either side.
    pub fn get(&self, name: &str) -> Option<&Stream> {
        self.srcs
            .iter()
            .chain(self.trgs.iter())
            .find(|s| s.name == name)
    }

    /// All streams, sources first.
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.srcs.iter().chain(self.trgs.iter())
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let srcs = self
            .srcs
            .iter()
            .map(Stream::to_string)
            .collect::<Vec<String>>()
            .join(", ");
        let trgs = self
            .trgs
            .iter()
            .map(Stream::to_string)
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{} -> {}", srcs, trgs)
    }
}
