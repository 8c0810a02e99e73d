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

//! Bi-encoder embedding (C3): CLS-pooled, L2-normalized vectors via
//! FastEmbed, with an LRU query cache and token-bucketed batching
//! (spec §4.2).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex as PLMutex;

use crate::constants::{
	CACHE_DIR_ENV, CHARS_PER_TOKEN, QUERY_CACHE_SIZE, QUERY_PREFIX, TOKEN_BUCKET_WIDTH,
};
use crate::error::{EngineError, Result};

/// Map a model name to its FastEmbed enum variant. Only the variants the
/// bound model table cares about are listed; unknown names are rejected
/// up front rather than panicking mid-batch.
fn map_model(model: &str) -> Result<EmbeddingModel> {
	Ok(match model {
		"sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
		"BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
		"BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
		"BAAI/bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
		"nomic-ai/nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
		"intfloat/multilingual-e5-small" => EmbeddingModel::MultilingualE5Small,
		"intfloat/multilingual-e5-base" => EmbeddingModel::MultilingualE5Base,
		"jinaai/jina-embeddings-v2-base-code" => EmbeddingModel::JinaEmbeddingsV2BaseCode,
		other => {
			return Err(EngineError::EmbeddingFailed(
				0,
				format!("unsupported embedding model: {other}"),
			))
		}
	})
}

fn cache_dir() -> Result<PathBuf> {
	if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
		return Ok(PathBuf::from(dir));
	}
	let base = dirs::cache_dir()
		.ok_or_else(|| EngineError::IOError(PathBuf::new(), "no cache directory".to_string()))?
		.join("hhg")
		.join("fastembed");
	std::fs::create_dir_all(&base).map_err(|e| EngineError::IOError(base.clone(), e.to_string()))?;
	Ok(base)
}

fn l2_normalize(vector: &mut [f32]) {
	let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt().max(1e-9);
	for v in vector.iter_mut() {
		*v /= norm;
	}
}

fn estimate_tokens(text: &str) -> usize {
	(text.len() / CHARS_PER_TOKEN).max(1)
}

/// Small LRU over query text -> embedding. Evicts the oldest half of
/// entries once at capacity, rather than one at a time, to amortize the
/// eviction cost across a burst of distinct queries.
struct QueryCache {
	capacity: usize,
	order: Vec<String>,
	map: HashMap<String, Vec<f32>>,
}

impl QueryCache {
	fn new(capacity: usize) -> Self {
		Self {
			capacity,
			order: Vec::new(),
			map: HashMap::new(),
		}
	}

	fn get(&mut self, key: &str) -> Option<Vec<f32>> {
		if let Some(v) = self.map.get(key).cloned() {
			self.order.retain(|k| k != key);
			self.order.push(key.to_string());
			Some(v)
		} else {
			None
		}
	}

	fn insert(&mut self, key: String, value: Vec<f32>) {
		if self.map.len() >= self.capacity {
			let evict_count = self.capacity / 2;
			for old_key in self.order.drain(..evict_count.max(1)) {
				self.map.remove(&old_key);
			}
		}
		self.order.push(key.clone());
		self.map.insert(key, value);
	}
}

/// Seam for the inference provider (spec §1, §6): tensor transport to a
/// specific accelerator is an external collaborator's concern. [`Embedder`]
/// is the bound default, wrapping FastEmbed.
pub trait InferenceProvider: Send + Sync {
	fn embed_query(&self, query: &str) -> Result<Vec<f32>>;
	fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Bi-encoder embedding provider. Thread-safe: inference is serialized
/// internally via the FastEmbed model handle.
pub struct Embedder {
	model: PLMutex<TextEmbedding>,
	query_cache: Mutex<QueryCache>,
	batch_size: usize,
}

impl Embedder {
	pub fn new(model_name: &str, batch_size: usize) -> Result<Self> {
		let model_enum = map_model(model_name)?;
		let cache_dir = cache_dir()?;
		let model = TextEmbedding::try_new(
			InitOptions::new(model_enum)
				.with_show_download_progress(false)
				.with_cache_dir(cache_dir),
		)
		.map_err(|e| EngineError::EmbeddingFailed(0, e.to_string()))?;

		Ok(Self {
			model: PLMutex::new(model),
			query_cache: Mutex::new(QueryCache::new(QUERY_CACHE_SIZE)),
			batch_size,
		})
	}

	/// Embed a query, using the LRU cache when possible. Queries are
	/// encoded with the model's recommended retrieval-query prefix.
	pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		{
			let mut cache = self.query_cache.lock().unwrap();
			if let Some(cached) = cache.get(query) {
				return Ok(cached);
			}
		}

		let prefixed = format!("{QUERY_PREFIX}{query}");
		let mut embeddings = self.embed_raw(&[prefixed])?;
		let mut embedding = embeddings.remove(0);
		l2_normalize(&mut embedding);

		let mut cache = self.query_cache.lock().unwrap();
		cache.insert(query.to_string(), embedding.clone());
		Ok(embedding)
	}

	/// Embed a batch of documents. Texts are grouped into buckets of
	/// similar estimated token length before being handed to the model,
	/// to avoid excessive padding; a bucket producing any NaN falls back
	/// to embedding its items one at a time.
	pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(vec![]);
		}

		let mut indices: Vec<usize> = (0..texts.len()).collect();
		indices.sort_by_key(|&i| estimate_tokens(&texts[i]) / TOKEN_BUCKET_WIDTH);

		let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

		for chunk in indices.chunks(self.batch_size) {
			let chunk_texts: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
			let mut embeddings = self.embed_raw(&chunk_texts)?;
			let has_nan = embeddings.iter().any(|e| e.iter().any(|v| v.is_nan()));
			if has_nan {
				for &i in chunk {
					let mut single = self.embed_raw(std::slice::from_ref(&texts[i]))?;
					let mut e = single.remove(0);
					if e.iter().any(|v| v.is_nan()) {
						return Err(EngineError::EmbeddingFailed(i, "embedding contains NaN after retry".to_string()));
					}
					l2_normalize(&mut e);
					results[i] = Some(e);
				}
			} else {
				for (&i, embedding) in chunk.iter().zip(embeddings.iter_mut()) {
					l2_normalize(embedding);
					results[i] = Some(std::mem::take(embedding));
				}
			}
		}

		Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
	}

	fn embed_raw(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let model = self.model.lock();
		let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
		model
			.embed(refs, None)
			.map_err(|e| EngineError::EmbeddingFailed(0, e.to_string()))
	}
}

impl InferenceProvider for Embedder {
	fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		Embedder::embed_query(self, query)
	}

	fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		Embedder::embed_batch(self, texts)
	}
}
