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

//! # Resource definitions for model configurations, vocabularies and weights
//!
//! Resources wrap the files consumed at model set-up time. `LocalResource`
//! points at files on disk, `RemoteResource` at files downloaded and cached
//! on first use.

extern crate dirs;

use crate::common::error::RustMmtError;
use cached_path::{Cache, Options, ProgressBar};
use lazy_static::lazy_static;
use std::path::PathBuf;

/// # Resource used by the models and datasets
/// Wraps a local or remote file used as a configuration, vocabulary, corpus
/// or weights source.
pub enum Resource {
    Local(LocalResource),
    Remote(RemoteResource),
}

impl Resource {
    /// Gets the local path for a given resource, downloading remote
    /// resources to the library cache if they are not available yet.
    pub fn get_local_path(&self) -> Result<PathBuf, RustMmtError> {
        match self {
            Resource::Local(resource) => Ok(resource.local_path.clone()),
            Resource::Remote(resource) => {
                let cached_path = CACHE.cached_path_with_options(
                    &resource.url,
                    &Options::default().subdir(&resource.cache_subdir),
                )?;
                Ok(cached_path)
            }
        }
    }
}

/// # Local resource
#[derive(PartialEq, Clone)]
pub struct LocalResource {
    /// Path for the local resource.
    pub local_path: PathBuf,
}

/// # Remote resource, cached locally on first download
#[derive(PartialEq, Clone)]
pub struct RemoteResource {
    /// URL for the remote resource.
    pub url: String,
    /// Sub-directory of the cache root where this resource is saved.
    pub cache_subdir: String,
}

impl RemoteResource {
    /// Creates a new RemoteResource from an URL and a cache sub-directory.
    pub fn new(url: &str, cache_subdir: &str) -> RemoteResource {
        RemoteResource {
            url: url.to_string(),
            cache_subdir: cache_subdir.to_string(),
        }
    }

    /// Creates a new RemoteResource from a pre-defined `(cache_subdir, url)`
    /// pair, as listed in the model resource presets.
    pub fn from_pretrained(name_url_tuple: (&str, &str)) -> RemoteResource {
        let cache_subdir = name_url_tuple.0.to_string();
        let url = name_url_tuple.1.to_string();
        RemoteResource { url, cache_subdir }
    }
}

lazy_static! {
    /// Shared download cache for remote resources.
    pub static ref CACHE: Cache = Cache::builder()
        .dir(_get_cache_directory())
        .progress_bar(Some(ProgressBar::Light))
        .build()
        .expect("Could not create resource cache");
}

fn _get_cache_directory() -> PathBuf {
    match std::env::var("RUSTMMT_CACHE") {
        Ok(value) => PathBuf::from(value),
        Err(_) => {
            let mut home = dirs::home_dir().expect("Could not locate user home directory");
            home.push(".cache");
            home.push(".rustmmt");
            home
        }
    }
}
