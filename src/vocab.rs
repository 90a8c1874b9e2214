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

//! # Vocabulary management for whitespace-tokenized corpora
//!
//! A `Vocabulary` maps tokens to integer indices and back. Vocabulary files
//! are JSON objects (token to index). The first four indices are reserved
//! and must be present with their fixed values.

use crate::common::error::RustMmtError;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Token reserved for padding positions.
pub const PAD_TOKEN: &str = "<pad>";
/// Token marking the beginning of a target sequence.
pub const BOS_TOKEN: &str = "<bos>";
/// Token marking the end of a sequence.
pub const EOS_TOKEN: &str = "<eos>";
/// Token substituted for out-of-vocabulary items.
pub const UNK_TOKEN: &str = "<unk>";

pub const PAD_ID: i64 = 0;
pub const BOS_ID: i64 = 1;
pub const EOS_ID: i64 = 2;
pub const UNK_ID: i64 = 3;

const RESERVED: [(&str, i64); 4] = [
    (PAD_TOKEN, PAD_ID),
    (BOS_TOKEN, BOS_ID),
    (EOS_TOKEN, EOS_ID),
    (UNK_TOKEN, UNK_ID),
];

/// # Vocabulary for a single text stream
#[derive(Debug, Clone)]
pub struct Vocabulary {
    values: HashMap<String, i64>,
    indices: HashMap<i64, String>,
}

impl Vocabulary {
    /// Loads a vocabulary from a JSON file mapping tokens to indices.
    /// Fails if a reserved entry is missing or mapped to the wrong index.
    pub fn from_file(path: &Path) -> Result<Vocabulary, RustMmtError> {
        let f = File::open(path).map_err(|e| {
            RustMmtError::IOError(format!("{} vocabulary file not found :: {}", path.display(), e))
        })?;
        let br = BufReader::new(f);
        let values: HashMap<String, i64> = serde_json::from_reader(br)?;
        Self::from_values(values)
    }

    /// Builds a vocabulary from an already-resolved token-to-index mapping.
    pub fn from_values(values: HashMap<String, i64>) -> Result<Vocabulary, RustMmtError> {
        for (token, index) in RESERVED.iter() {
            match values.get(*token) {
                Some(value) if value == index => {}
                _ => {
                    return Err(RustMmtError::InvalidConfigurationError(format!(
                        "vocabulary must map the reserved token {} to index {}",
                        token, index
                    )));
                }
            }
        }
        let indices = values
            .iter()
            .map(|(token, index)| (*index, token.clone()))
            .collect();
        Ok(Vocabulary { values, indices })
    }

    /// Builds a vocabulary from a list of regular tokens, assigning indices
    /// after the reserved entries in the order given. Duplicates are kept
    /// at their first position.
    pub fn from_tokens(tokens: &[&str]) -> Vocabulary {
        let mut values = HashMap::with_capacity(tokens.len() + RESERVED.len());
        for (token, index) in RESERVED.iter() {
            values.insert(token.to_string(), *index);
        }
        let mut next_index = RESERVED.len() as i64;
        for token in tokens {
            if !values.contains_key(*token) {
                values.insert(token.to_string(), next_index);
                next_index += 1;
            }
        }
        let indices = values
            .iter()
            .map(|(token, index)| (*index, token.clone()))
            .collect();
        Vocabulary { values, indices }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index for a token, falling back to `<unk>` for unknown tokens.
    pub fn token_to_id(&self, token: &str) -> i64 {
        self.values.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn id_to_token(&self, id: i64) -> Option<&str> {
        self.indices.get(&id).map(String::as_str)
    }

    /// Maps a pre-tokenized sentence to indices, terminated by `<eos>`.
    pub fn sentence_to_ids(&self, sentence: &str) -> Vec<i64> {
        sentence
            .split_whitespace()
            .map(|token| self.token_to_id(token))
            .chain(std::iter::once(EOS_ID))
            .collect()
    }

    /// Maps indices back to a sentence, stopping at the first `<eos>` and
    /// skipping `<bos>` and padding.
    pub fn ids_to_sentence(&self, ids: &[i64]) -> String {
        let mut tokens = Vec::new();
        for id in ids {
            if *id == EOS_ID {
                break;
            }
            if *id == BOS_ID || *id == PAD_ID {
                continue;
            }
            tokens.push(self.id_to_token(*id).unwrap_or(UNK_TOKEN));
        }
        tokens.join(" ")
    }
}
