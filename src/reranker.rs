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

//! Cross-encoder reranking (C9): batched `(query, candidate)` scoring
//! squashed into `[0, 1]`, order-preserving relative to input index on
//! ties (spec §4.9).

use fastembed::{RerankInitOptions, RerankerModel, TextRerank};

use crate::constants::DEFAULT_BATCH_SIZE;
use crate::error::{EngineError, Result};

fn map_model(model: &str) -> Result<RerankerModel> {
	Ok(match model {
		"BAAI/bge-reranker-base" => RerankerModel::BGERerankerBase,
		"BAAI/bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
		"jinaai/jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
		other => {
			return Err(EngineError::EmbeddingFailed(
				0,
				format!("unsupported reranker model: {other}"),
			))
		}
	})
}

fn sigmoid(x: f32) -> f32 {
	1.0 / (1.0 + (-x).exp())
}

/// Seam for the rerank provider (spec §1, §6), mirroring
/// [`crate::embedding::InferenceProvider`]. [`Reranker`] is the bound
/// default, wrapping FastEmbed's cross-encoder.
pub trait RerankProvider: Send + Sync {
	fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

/// Cross-encoder reranker, scoring `(query, candidate)` pairs in
/// fixed-size batches.
pub struct Reranker {
	model: parking_lot::Mutex<TextRerank>,
	batch_size: usize,
}

impl Reranker {
	pub fn new(model_name: &str) -> Result<Self> {
		let model_enum = map_model(model_name)?;
		let model = TextRerank::try_new(RerankInitOptions::new(model_enum).with_show_download_progress(false))
			.map_err(|e| EngineError::EmbeddingFailed(0, e.to_string()))?;
		Ok(Self {
			model: parking_lot::Mutex::new(model),
			batch_size: DEFAULT_BATCH_SIZE,
		})
	}

	/// Score every candidate against `query`, returning scores in the
	/// same order as `candidates`, each mapped into `[0, 1]` via sigmoid.
	pub fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
		if candidates.is_empty() {
			return Ok(vec![]);
		}

		let mut scores = vec![0.0f32; candidates.len()];
		let mut model = self.model.lock();

		for (batch_start, chunk) in candidates.chunks(self.batch_size).enumerate() {
			let documents: Vec<&str> = chunk.iter().map(|s| s.as_str()).collect();
			let results = model
				.rerank(query, documents, false, None)
				.map_err(|e| EngineError::EmbeddingFailed(0, e.to_string()))?;

			let base = batch_start * self.batch_size;
			for result in results {
				scores[base + result.index] = sigmoid(result.score);
			}
		}

		Ok(scores)
	}

	/// Truncate `candidates` to `max_candidates`, dropping the longest
	/// content first, when the cap would otherwise be exceeded.
	pub fn cap_candidates<T: Clone>(candidates: &[(T, String)], max_candidates: usize) -> Vec<(T, String)> {
		if candidates.len() <= max_candidates {
			return candidates.to_vec();
		}
		let mut sorted: Vec<&(T, String)> = candidates.iter().collect();
		sorted.sort_by_key(|(_, content)| content.len());
		sorted
			.into_iter()
			.take(max_candidates)
			.map(|(t, c)| (t.clone(), c.clone()))
			.collect()
	}
}

impl RerankProvider for Reranker {
	fn rerank(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
		Reranker::rerank(self, query, candidates)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sigmoid_squashes_into_unit_interval() {
		assert!(sigmoid(-10.0) > 0.0 && sigmoid(-10.0) < 0.01);
		assert!(sigmoid(10.0) < 1.0 && sigmoid(10.0) > 0.99);
		assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
	}

	#[test]
	fn unsupported_model_name_is_rejected() {
		let err = map_model("not-a-real-model").unwrap_err();
		assert!(matches!(err, EngineError::EmbeddingFailed(_, _)));
	}

	#[test]
	fn cap_candidates_keeps_shortest_content_first() {
		let candidates = vec![
			(1, "a".repeat(100)),
			(2, "b".repeat(10)),
			(3, "c".repeat(50)),
		];
		let capped = Reranker::cap_candidates(&candidates, 2);
		assert_eq!(capped.len(), 2);
		assert!(capped.iter().any(|(id, _)| *id == 2));
		assert!(capped.iter().any(|(id, _)| *id == 3));
	}

	#[test]
	fn cap_candidates_is_noop_under_limit() {
		let candidates = vec![(1, "x".to_string())];
		let capped = Reranker::cap_candidates(&candidates, 5);
		assert_eq!(capped.len(), 1);
	}
}
