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

//! BlockExtractor (C2): structural extraction via tree-sitter queries,
//! prose chunking for text/markdown, and a deterministic fallback when
//! neither applies (spec §4.1).

pub mod languages;
pub mod prose;

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use regex::RegexBuilder;
use tree_sitter::{Parser, Query, QueryCursor, StreamingIterator};

use crate::block::{Block, BlockKind};
use crate::constants::TEXT_EXTENSIONS;

const NAME_NODE_KINDS: &[&str] = &[
	"identifier",
	"name",
	"field_identifier",
	"type_identifier",
	"constant",
	"simple_identifier",
	"word",
];

/// Structural block extractor. Parsers/queries are compiled lazily per
/// extension and cached for the extractor's lifetime.
pub struct BlockExtractor {
	parsers: std::sync::Mutex<HashMap<&'static str, (Parser, Query)>>,
}

impl Default for BlockExtractor {
	fn default() -> Self {
		Self::new()
	}
}

impl BlockExtractor {
	pub fn new() -> Self {
		Self {
			parsers: std::sync::Mutex::new(HashMap::new()),
		}
	}

	fn extension_of(path: &Path) -> String {
		path.extension()
			.map(|e| e.to_string_lossy().to_lowercase())
			.unwrap_or_default()
	}

	/// Extract blocks from `content`, named as if it lived at `path`.
	/// `fallback_pattern` is the regex used for the sliding-window
	/// fallback (pass `""`/any non-matching-capable pattern for a build,
	/// the actual grep pattern for a scoped grep).
	pub fn extract(&self, path: &Path, content: &str, fallback_pattern: &str) -> Vec<Block> {
		let ext = Self::extension_of(path);

		if TEXT_EXTENSIONS.contains(&format!(".{ext}").as_str()) {
			let blocks = prose::extract_text_blocks(&ext, content);
			if !blocks.is_empty() {
				return blocks;
			}
			return self.fallback_sliding_window(path, content, fallback_pattern);
		}

		let Some(spec) = languages::lookup(&ext) else {
			return self.fallback_sliding_window(path, content, fallback_pattern);
		};

		let mut guard = self.parsers.lock().unwrap();
		let entry = guard.entry(spec.ext).or_insert_with(|| {
			let language = (spec.language)();
			let mut parser = Parser::new();
			parser
				.set_language(&language)
				.expect("grammar/query table entries must be internally consistent");
			let query = Query::new(&language, spec.query)
				.expect("grammar/query table entries must be internally consistent");
			(parser, query)
		});
		let (parser, query) = entry;

		let Some(tree) = parser.parse(content, None) else {
			drop(guard);
			return self.fallback_sliding_window(path, content, fallback_pattern);
		};

		let mut cursor = QueryCursor::new();
		let capture_names = query.capture_names();
		let mut blocks = Vec::new();
		let mut seen_ranges: HashSet<(usize, usize)> = HashSet::new();

		let mut matches = cursor.matches(query, tree.root_node(), content.as_bytes());
		while let Some(m) = matches.next() {
			for capture in m.captures {
				let node = capture.node;
				let range = (node.start_byte(), node.end_byte());
				if !seen_ranges.insert(range) {
					continue;
				}

				let tag = capture_names
					.get(capture.index as usize)
					.copied()
					.unwrap_or("unknown");
				let kind = BlockKind::from_capture(tag);
				let name = Self::extract_name(node, content);

				let text = &content.as_bytes()[node.start_byte()..node.end_byte()];
				let text = String::from_utf8_lossy(text).to_string();

				blocks.push(Block {
					kind,
					name: Some(name),
					start_line: node.start_position().row,
					end_line: node.end_position().row,
					content: text,
				});
			}
		}
		drop(guard);

		if blocks.is_empty() {
			return self.fallback_sliding_window(path, content, fallback_pattern);
		}
		blocks
	}

	fn extract_name(node: tree_sitter::Node, content: &str) -> String {
		let bytes = content.as_bytes();
		let mut cursor = node.walk();
		for child in node.children(&mut cursor) {
			if NAME_NODE_KINDS.contains(&child.kind()) {
				if let Ok(text) = child.utf8_text(bytes) {
					return text.to_string();
				}
			}
		}
		let mut cursor = node.walk();
		for child in node.children(&mut cursor) {
			let mut grand_cursor = child.walk();
			for grandchild in child.children(&mut grand_cursor) {
				if NAME_NODE_KINDS.contains(&grandchild.kind()) {
					if let Ok(text) = grandchild.utf8_text(bytes) {
						return text.to_string();
					}
				}
			}
		}
		"anonymous".to_string()
	}

	/// Last-resort extraction: windows around regex matches, or the head
	/// of the file if the pattern doesn't match or fails to compile.
	fn fallback_sliding_window(&self, path: &Path, content: &str, pattern: &str) -> Vec<Block> {
		let lines: Vec<&str> = content.lines().collect();

		if !pattern.is_empty() {
			if let Ok(re) = RegexBuilder::new(pattern).case_insensitive(true).build() {
				let mut matches = Vec::new();
				for (i, line) in lines.iter().enumerate() {
					if re.is_match(line) {
						let start = i.saturating_sub(5);
						let end = (i + 6).min(lines.len());
						matches.push(Block {
							kind: BlockKind::Text,
							name: Some(format!("match at line {}", i + 1)),
							start_line: start,
							end_line: end,
							content: lines[start..end].join("\n"),
						});
						if matches.len() >= 5 {
							break;
						}
					}
				}
				if !matches.is_empty() {
					return matches;
				}
			}
		}

		let end_head = lines.len().min(50);
		let name = path
			.file_name()
			.map(|f| f.to_string_lossy().to_string())
			.unwrap_or_else(|| "unknown".to_string());
		vec![Block {
			kind: BlockKind::File,
			name: Some(name),
			start_line: 0,
			end_line: end_head,
			content: lines[..end_head].join("\n"),
		}]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn extracts_rust_function_and_struct() {
		let extractor = BlockExtractor::new();
		let content = "fn hash_password(input: &str) -> String {\n    input.to_string()\n}\n\nstruct User {\n    name: String,\n}\n";
		let blocks = extractor.extract(&PathBuf::from("src/auth.rs"), content, "");
		assert!(blocks.iter().any(|b| b.name.as_deref() == Some("hash_password")));
		assert!(blocks.iter().any(|b| b.name.as_deref() == Some("User")));
	}

	#[test]
	fn unknown_extension_falls_back_to_head_of_file() {
		let extractor = BlockExtractor::new();
		let content = "line one\nline two\n";
		let blocks = extractor.extract(&PathBuf::from("data.unknownext"), content, "");
		assert_eq!(blocks.len(), 1);
		assert_eq!(blocks[0].kind, BlockKind::File);
	}

	#[test]
	fn fallback_sliding_window_matches_pattern() {
		let extractor = BlockExtractor::new();
		let mut content = String::new();
		for i in 0..20 {
			content.push_str(&format!("line {i}\n"));
		}
		content.push_str("needle here\n");
		for i in 20..40 {
			content.push_str(&format!("line {i}\n"));
		}
		let blocks = extractor.extract(&PathBuf::from("data.unknownext"), &content, "needle");
		assert_eq!(blocks.len(), 1);
		assert!(blocks[0].content.contains("needle here"));
	}

	#[test]
	fn dedups_overlapping_capture_ranges() {
		let extractor = BlockExtractor::new();
		let content = "fn a() {}\nfn b() {}\n";
		let blocks = extractor.extract(&PathBuf::from("x.rs"), content, "");
		let mut seen = HashSet::new();
		for b in &blocks {
			assert!(seen.insert((b.start_line, b.end_line, b.name.clone())));
		}
	}
}
