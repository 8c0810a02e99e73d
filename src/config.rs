// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration, TOML-backed and versioned. Lives at `<root>/.hhg/config.toml`,
//! loaded/saved/env-overridden the way a per-project config file normally is.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
	AUTO_BUILD_ENV, CHUNK_OVERLAP_TOKENS, CHUNK_SIZE_TOKENS, DEFAULT_BATCH_SIZE, INDEX_DIR,
	IGNORED_DIRS, MAX_FILE_SIZE, QUERY_CACHE_SIZE,
};
use crate::error::{EngineError, Result};

fn default_version() -> u32 {
	1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
	/// Maximum file size, in bytes, the scanner will read.
	pub max_file_size: u64,
	/// Directory names skipped unconditionally during a walk.
	pub ignored_dirs: Vec<String>,
}

impl Default for ScannerConfig {
	fn default() -> Self {
		Self {
			max_file_size: MAX_FILE_SIZE,
			ignored_dirs: IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
	/// Bi-encoder model name, passed through to the inference provider.
	pub model: String,
	/// Cross-encoder model name used by the reranker.
	pub reranker_model: String,
	pub batch_size: usize,
	/// Size of the LRU cache for query embeddings.
	pub query_cache_size: usize,
}

impl Default for EmbeddingConfig {
	fn default() -> Self {
		Self {
			model: "BAAI/bge-small-en-v1.5".to_string(),
			reranker_model: "BAAI/bge-reranker-base".to_string(),
			batch_size: DEFAULT_BATCH_SIZE,
			query_cache_size: QUERY_CACHE_SIZE,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
	pub chunk_size_tokens: usize,
	pub chunk_overlap_tokens: usize,
}

impl Default for ChunkingConfig {
	fn default() -> Self {
		Self {
			chunk_size_tokens: CHUNK_SIZE_TOKENS,
			chunk_overlap_tokens: CHUNK_OVERLAP_TOKENS,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	#[serde(default = "default_version")]
	pub version: u32,

	#[serde(default)]
	pub scanner: ScannerConfig,

	#[serde(default)]
	pub embedding: EmbeddingConfig,

	#[serde(default)]
	pub chunking: ChunkingConfig,

	/// Build a fresh index automatically when a search finds none. Mirrors
	/// the `HHG_AUTO_BUILD` environment variable, which takes precedence
	/// over this value when set.
	#[serde(default)]
	pub auto_build: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			version: default_version(),
			scanner: ScannerConfig::default(),
			embedding: EmbeddingConfig::default(),
			chunking: ChunkingConfig::default(),
			auto_build: false,
		}
	}
}

impl Config {
	/// Load the config at `<root>/.hhg/config.toml`, writing the default
	/// file out if none exists yet. `HHG_AUTO_BUILD` overrides `auto_build`
	/// when set to `1`/`true`/`yes`, case-insensitively (any other value
	/// is treated as unset).
	pub fn load(root: &Path) -> Result<Self> {
		let config_path = Self::config_path(root);

		let mut config = if config_path.exists() {
			let content = fs::read_to_string(&config_path)
				.map_err(|e| EngineError::IOError(config_path.clone(), e.to_string()))?;
			toml::from_str(&content)
				.map_err(|e| EngineError::Corrupt(config_path.clone(), e.to_string()))?
		} else {
			let config = Config::default();
			config.save(root)?;
			config
		};

		if let Ok(raw) = std::env::var(AUTO_BUILD_ENV) {
			config.auto_build = matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes");
		}

		Ok(config)
	}

	pub fn save(&self, root: &Path) -> Result<()> {
		let config_path = Self::config_path(root);
		if let Some(parent) = config_path.parent() {
			fs::create_dir_all(parent)
				.map_err(|e| EngineError::IOError(parent.to_path_buf(), e.to_string()))?;
		}
		let toml_content = toml::to_string_pretty(self)
			.map_err(|e| EngineError::Corrupt(config_path.clone(), e.to_string()))?;
		fs::write(&config_path, toml_content)
			.map_err(|e| EngineError::IOError(config_path.clone(), e.to_string()))?;
		Ok(())
	}

	pub fn config_path(root: &Path) -> PathBuf {
		root.join(INDEX_DIR).join("config.toml")
	}
}
