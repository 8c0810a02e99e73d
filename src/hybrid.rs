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

//! Hybrid ranking: semantic cosine score boosted by literal query-term
//! matches, query terms expanded through a fixed code-synonym table
//! (spec §4.8).

use std::collections::HashSet;

/// Common code abbreviations and synonyms used to expand a query before
/// counting literal matches.
const CODE_SYNONYMS: &[(&str, &[&str])] = &[
	("auth", &["authentication", "authorize", "authorization"]),
	("authn", &["authentication"]),
	("authz", &["authorization"]),
	("config", &["configuration", "settings", "options"]),
	("cfg", &["config", "configuration"]),
	("db", &["database"]),
	("err", &["error", "exception"]),
	("exc", &["exception", "error"]),
	("fn", &["function"]),
	("func", &["function"]),
	("impl", &["implementation", "implement"]),
	("init", &["initialize", "initialization"]),
	("msg", &["message"]),
	("param", &["parameter"]),
	("params", &["parameters"]),
	("req", &["request"]),
	("res", &["response"]),
	("resp", &["response"]),
	("ret", &["return"]),
	("srv", &["server", "service"]),
	("svc", &["service"]),
	("util", &["utility", "utilities"]),
	("utils", &["utilities", "utility"]),
	("val", &["value", "validate", "validation"]),
];

/// Expand `query` into the original lowercased words plus any synonyms
/// from [`CODE_SYNONYMS`].
pub fn expand_query_terms(query: &str) -> HashSet<String> {
	let mut terms = HashSet::new();
	for word in query.to_lowercase().split_whitespace() {
		terms.insert(word.to_string());
		if let Some((_, synonyms)) = CODE_SYNONYMS.iter().find(|(k, _)| *k == word) {
			for syn in *synonyms {
				terms.insert(syn.to_string());
			}
		}
	}
	terms
}

/// A scored candidate the ranker can boost. `name`/`content` are matched
/// case-insensitively against expanded query terms.
#[derive(Debug, Clone)]
pub struct RankedCandidate<T> {
	pub item: T,
	pub name: String,
	pub content: String,
	/// `(2 - cosine_distance) / 2`, already in `[0, 1]`.
	pub semantic_score: f32,
}

/// Re-ranks candidates by boosting the semantic score up to 1.5x based
/// on literal expanded-query-term matches, then sorts descending.
pub struct HybridRanker;

impl HybridRanker {
	pub fn rank<T>(query: &str, mut candidates: Vec<RankedCandidate<T>>) -> Vec<(T, f32)> {
		let terms = expand_query_terms(query);

		let mut scored: Vec<(T, f32)> = candidates
			.drain(..)
			.map(|c| {
				let haystack = format!("{} {}", c.name.to_lowercase(), c.content.to_lowercase());
				let matches = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
				let score = if matches > 0 {
					let boost = (1.0 + 0.1 * matches as f32).min(1.5);
					(c.semantic_score * boost).min(1.0)
				} else {
					c.semantic_score
				};
				(c.item, score)
			})
			.collect();

		scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
		scored
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expand_query_terms_includes_synonyms() {
		let terms = expand_query_terms("auth config");
		assert!(terms.contains("auth"));
		assert!(terms.contains("authentication"));
		assert!(terms.contains("authorize"));
		assert!(terms.contains("config"));
		assert!(terms.contains("settings"));
	}

	#[test]
	fn expand_query_terms_unmatched_word_passes_through() {
		let terms = expand_query_terms("frobnicate");
		assert_eq!(terms.len(), 1);
		assert!(terms.contains("frobnicate"));
	}

	#[test]
	fn literal_match_boosts_score_and_caps_at_one() {
		let candidates = vec![
			RankedCandidate {
				item: "a",
				name: "authenticate_user".to_string(),
				content: "fn authenticate_user() {}".to_string(),
				semantic_score: 0.9,
			},
			RankedCandidate {
				item: "b",
				name: "unrelated".to_string(),
				content: "fn unrelated() {}".to_string(),
				semantic_score: 0.95,
			},
		];

		let ranked = HybridRanker::rank("auth", candidates);
		assert_eq!(ranked[0].0, "a");
		assert!(ranked[0].1 <= 1.0);
		assert!(ranked[0].1 > 0.9);
	}

	#[test]
	fn no_match_keeps_semantic_score_unchanged() {
		let candidates = vec![RankedCandidate {
			item: "a",
			name: "nothing".to_string(),
			content: "nothing here".to_string(),
			semantic_score: 0.5,
		}];
		let ranked = HybridRanker::rank("zzz_no_match", candidates);
		assert_eq!(ranked[0].1, 0.5);
	}
}
