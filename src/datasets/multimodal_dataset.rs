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
use crate::datasets::topology::{StreamKind, Topology};
use crate::vocab::{Vocabulary, PAD_ID};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tch::{Kind, Tensor};

/// # A batch of parallel items
///
/// Text streams are `[batch, seq]` int64 tensors padded with `<pad>`; image
/// feature streams keep their `(batch, channels, spatial...)` layout.
#[derive(Debug)]
pub struct Batch {
    pub data: HashMap<String, Tensor>,
    /// Unpadded sequence lengths for the text streams.
    pub lengths: HashMap<String, Vec<i64>>,
}

impl Batch {
    /// Tensor for a named stream, failing with a value error when absent.
    pub fn get(&self, name: &str) -> Result<&Tensor, RustMmtError> {
        self.data.get(name).ok_or_else(|| {
            RustMmtError::ValueError(format!("batch is missing the {} stream", name))
        })
    }

    /// Number of items in the batch.
    pub fn size(&self) -> i64 {
        self.data
            .values()
            .next()
            .map(|tensor| tensor.size()[0])
            .unwrap_or(0)
    }
}

#[derive(Debug)]
enum StreamData {
    Text(Vec<Vec<i64>>),
    ImageFeats(Tensor),
}

impl StreamData {
    fn len(&self) -> usize {
        match self {
            StreamData::Text(sentences) => sentences.len(),
            StreamData::ImageFeats(feats) => feats.size()[0] as usize,
        }
    }
}

/// # Dataset over parallel text and image-feature streams
///
/// Text streams are read as pre-tokenized UTF-8 lines and mapped through the
/// stream's vocabulary. Image-feature streams are read from `.npy` files
/// holding one feature tensor per item, `(items, channels, spatial...)`.
/// Batches are bucketed by the length of the `bucket_by` stream and sorted
/// within each batch by source length, longest first, as the text encoder
/// expects.
#[derive(Debug)]
pub struct MultimodalDataset {
    streams: HashMap<String, StreamData>,
    topology: Topology,
    bucket_by: String,
    n_items: usize,
}

impl MultimodalDataset {
    /// Builds the dataset for one split.
    ///
    /// # Arguments
    ///
    /// * `data_dict` - per-stream source files for this split
    /// * `vocabs` - per-stream vocabularies for the text streams
    /// * `topology` - modality topology naming every stream of the task
    /// * `bucket_by` - text stream whose length orders batching
    pub fn new(
        data_dict: &HashMap<String, PathBuf>,
        vocabs: &HashMap<String, Vocabulary>,
        topology: &Topology,
        bucket_by: &str,
    ) -> Result<MultimodalDataset, RustMmtError> {
        let mut streams = HashMap::new();
        let mut n_items = None;
        for stream in topology.streams() {
            let path = data_dict.get(&stream.name).ok_or_else(|| {
                RustMmtError::InvalidConfigurationError(format!(
                    "no data source configured for stream {}",
                    stream.name
                ))
            })?;
            let data = match stream.kind {
                StreamKind::Text => {
                    let vocab = vocabs.get(&stream.name).ok_or_else(|| {
                        RustMmtError::InvalidConfigurationError(format!(
                            "no vocabulary provided for text stream {}",
                            stream.name
                        ))
                    })?;
                    StreamData::Text(read_sentences(path, vocab)?)
                }
                StreamKind::ImageFeats => {
                    let feats = Tensor::read_npy(path)?.to_kind(Kind::Float);
                    if feats.size().len() < 3 {
                        return Err(RustMmtError::ValueError(format!(
                            "image features must be (items, channels, spatial...), got {:?}",
                            feats.size()
                        )));
                    }
                    StreamData::ImageFeats(feats)
                }
            };
            match n_items {
                None => n_items = Some(data.len()),
                Some(count) if count == data.len() => {}
                Some(count) => {
                    return Err(RustMmtError::ValueError(format!(
                        "stream {} has {} items, expected {}",
                        stream.name,
                        data.len(),
                        count
                    )));
                }
            }
            streams.insert(stream.name.clone(), data);
        }
        match streams.get(bucket_by) {
            Some(StreamData::Text(_)) => {}
            _ => {
                return Err(RustMmtError::InvalidConfigurationError(format!(
                    "bucket_by must name a text stream of the topology: {}",
                    bucket_by
                )));
            }
        }
        Ok(MultimodalDataset {
            streams,
            topology: topology.clone(),
            bucket_by: bucket_by.to_string(),
            n_items: n_items.unwrap_or(0),
        })
    }

    /// Number of parallel items in the split.
    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    /// Produces the batches for one pass over the split.
    ///
    /// Items are ordered by `bucket_by` length so each batch holds items of
    /// similar length, then every batch is sorted by the primary source text
    /// length, longest first.
    pub fn batches(&self, batch_size: i64) -> Result<Vec<Batch>, RustMmtError> {
        if batch_size <= 0 {
            return Err(RustMmtError::ValueError(format!(
                "batch size must be positive, got {}",
                batch_size
            )));
        }
        let bucket_lengths = match &self.streams[&self.bucket_by] {
            StreamData::Text(sentences) => sentences.iter().map(Vec::len).collect::<Vec<usize>>(),
            StreamData::ImageFeats(_) => unreachable!("bucket_by is validated as a text stream"),
        };
        let mut order: Vec<usize> = (0..self.n_items).collect();
        order.sort_by_key(|index| bucket_lengths[*index]);

        let sort_key = self
            .topology
            .first_src_text()
            .map(|stream| stream.name.clone());
        let mut batches = Vec::new();
        for chunk in order.chunks(batch_size as usize) {
            let mut indices = chunk.to_vec();
            if let Some(src_name) = &sort_key {
                if let StreamData::Text(sentences) = &self.streams[src_name] {
                    indices.sort_by(|a, b| sentences[*b].len().cmp(&sentences[*a].len()));
                }
            }
            batches.push(self.make_batch(&indices)?);
        }
        Ok(batches)
    }

    fn make_batch(&self, indices: &[usize]) -> Result<Batch, RustMmtError> {
        let mut data = HashMap::new();
        let mut lengths = HashMap::new();
        for (name, stream) in &self.streams {
            match stream {
                StreamData::Text(sentences) => {
                    let rows: Vec<&Vec<i64>> = indices.iter().map(|i| &sentences[*i]).collect();
                    let max_len = rows.iter().map(|row| row.len()).max().unwrap_or(0);
                    let mut flat = Vec::with_capacity(indices.len() * max_len);
                    let mut row_lengths = Vec::with_capacity(indices.len());
                    for row in rows {
                        row_lengths.push(row.len() as i64);
                        flat.extend_from_slice(row);
                        flat.extend(std::iter::repeat(PAD_ID).take(max_len - row.len()));
                    }
                    let tokens =
                        Tensor::of_slice(&flat).view((indices.len() as i64, max_len as i64));
                    data.insert(name.clone(), tokens);
                    lengths.insert(name.clone(), row_lengths);
                }
                StreamData::ImageFeats(feats) => {
                    let index = Tensor::of_slice(
                        &indices.iter().map(|i| *i as i64).collect::<Vec<i64>>(),
                    );
                    data.insert(name.clone(), feats.index_select(0, &index));
                }
            }
        }
        Ok(Batch { data, lengths })
    }
}

impl fmt::Display for MultimodalDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MultimodalDataset ({}) with {} items, bucketed by {}",
            self.topology, self.n_items, self.bucket_by
        )
    }
}

fn read_sentences(path: &Path, vocab: &Vocabulary) -> Result<Vec<Vec<i64>>, RustMmtError> {
    let f = File::open(path).map_err(|e| {
        RustMmtError::IOError(format!("{} corpus file not found :: {}", path.display(), e))
    })?;
    let reader = BufReader::new(f);
    let mut sentences = Vec::new();
    for line in reader.lines() {
        sentences.push(vocab.sentence_to_ids(&line?));
    }
    Ok(sentences)
}
