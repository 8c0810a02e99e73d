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

//! GrepReranker (C10): scan, extract, cross-encoder rerank, with no
//! persistence — a one-shot structural search over a tree (spec §4.10).

use std::path::Path;

use regex::Regex;

use crate::block::Block;
use crate::error::{EngineError, Result};
use crate::extractor::BlockExtractor;
use crate::reranker::Reranker;
use crate::scanner::{FileScanner, WalkScanner};

const MAX_CANDIDATES: usize = 200;

/// One scored hit from [`GrepReranker::search`].
#[derive(Debug, Clone)]
pub struct GrepHit {
	pub file: String,
	pub block: Block,
	pub score: f32,
}

/// Regex metacharacters whose presence means a query is already a pattern,
/// not a bag of words to expand into an alternation.
const REGEX_METACHARS: &[char] = &['.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '^', '$', '\\'];

fn looks_like_regex(query: &str) -> bool {
	query.chars().any(|c| REGEX_METACHARS.contains(&c))
}

/// Expand a plain-words query into a case-insensitive alternation over its
/// words, so "hash password" matches either word rather than the literal
/// phrase. Left untouched if the query already contains regex syntax.
fn expand_query_pattern(query: &str) -> String {
	if looks_like_regex(query) {
		return query.to_string();
	}
	let words: Vec<&str> = query.split_whitespace().collect();
	if words.len() <= 1 {
		return regex::escape(query);
	}
	words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|")
}

/// Scan -> extract -> cross-encoder rerank pipeline with no index or
/// persistence of any kind.
pub struct GrepReranker {
	extractor: BlockExtractor,
	reranker: Reranker,
}

impl GrepReranker {
	pub fn new(reranker_model: &str) -> Result<Self> {
		Ok(Self {
			extractor: BlockExtractor::new(),
			reranker: Reranker::new(reranker_model)?,
		})
	}

	/// Search `root` for `query`, returning the top `limit` blocks ranked by
	/// cross-encoder score.
	pub fn search(&self, root: &Path, query: &str, limit: usize) -> Result<Vec<GrepHit>> {
		let pattern = expand_query_pattern(query);
		Regex::new(&pattern).map_err(|e| EngineError::InvalidRegex(e.to_string()))?;

		let scanner = WalkScanner::default();
		let files = scanner
			.scan(root, &pattern, false)
			.map_err(|e| EngineError::IOError(root.to_path_buf(), e.to_string()))?;

		let mut candidates: Vec<(String, Block)> = Vec::new();
		for (path, content) in files {
			let rel = path
				.strip_prefix(root)
				.unwrap_or(&path)
				.to_string_lossy()
				.replace('\\', "/");
			for block in self.extractor.extract(&path, &content, &pattern) {
				candidates.push((rel.clone(), block));
			}
		}

		if candidates.is_empty() {
			return Ok(vec![]);
		}

		let capped = Reranker::cap_candidates(
			&candidates
				.iter()
				.map(|(file, block)| {
					let text = format!("{} {}: {}", block.kind.as_str(), block.name_or_anonymous(), block.content);
					((file.clone(), block.clone()), text)
				})
				.collect::<Vec<_>>(),
			MAX_CANDIDATES,
		);

		let contents: Vec<String> = capped.iter().map(|(_, content)| content.clone()).collect();
		let scores = self.reranker.rerank(query, &contents)?;

		let mut hits: Vec<GrepHit> = capped
			.into_iter()
			.zip(scores)
			.map(|((file, block), score)| GrepHit { file, block, score })
			.collect();

		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(limit);
		Ok(hits)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plain_words_expand_to_alternation() {
		let pattern = expand_query_pattern("hash password");
		assert_eq!(pattern, "hash|password");
	}

	#[test]
	fn single_word_is_escaped_literally() {
		let pattern = expand_query_pattern("password");
		assert_eq!(pattern, "password");
	}

	#[test]
	fn regex_like_query_passes_through_unexpanded() {
		let pattern = expand_query_pattern("hash.*password");
		assert_eq!(pattern, "hash.*password");
	}

	#[test]
	fn looks_like_regex_detects_metachars() {
		assert!(looks_like_regex("a.*b"));
		assert!(!looks_like_regex("plain words"));
	}
}
