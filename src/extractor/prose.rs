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

//! Prose/markdown chunking: header-hierarchy tracking, recursive
//! separator splitting and overlap (spec §4.1).

use crate::block::{Block, BlockKind};
use crate::constants::{CHUNK_OVERLAP_TOKENS, CHUNK_SIZE_TOKENS, MIN_CHUNK_SIZE_TOKENS};

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

fn estimate_tokens(text: &str) -> usize {
	((text.split_whitespace().count() as f64) * 1.3) as usize
}

/// Header-delimited section of a markdown document.
struct Section {
	headers: Vec<String>,
	content: String,
	start_line: usize,
	end_line: usize,
}

fn parse_markdown_structure(content: &str) -> Vec<Section> {
	let lines: Vec<&str> = content.lines().collect();
	let mut sections = Vec::new();
	let mut current_headers: Vec<String> = Vec::new();
	let mut current_content: Vec<&str> = Vec::new();
	let mut current_start = 0usize;
	let mut in_code_block = false;

	for (i, line) in lines.iter().enumerate() {
		if line.starts_with("```") || line.starts_with("~~~") {
			in_code_block = !in_code_block;
			current_content.push(line);
			continue;
		}
		if in_code_block {
			current_content.push(line);
			continue;
		}

		if let Some((level, title)) = parse_header(line) {
			if !current_content.is_empty() {
				let text = current_content.join("\n").trim().to_string();
				if !text.is_empty() {
					sections.push(Section {
						headers: current_headers.clone(),
						content: text,
						start_line: current_start,
						end_line: i.saturating_sub(1),
					});
				}
			}

			current_headers.truncate(level.saturating_sub(1));
			current_headers.push(title);
			current_content = Vec::new();
			current_start = i;
		} else {
			current_content.push(line);
		}
	}

	if !current_content.is_empty() {
		let text = current_content.join("\n").trim().to_string();
		if !text.is_empty() {
			sections.push(Section {
				headers: current_headers,
				content: text,
				start_line: current_start,
				end_line: lines.len().saturating_sub(1),
			});
		}
	}

	sections
}

fn parse_header(line: &str) -> Option<(usize, String)> {
	let trimmed = line;
	let hashes = trimmed.chars().take_while(|c| *c == '#').count();
	if hashes == 0 || hashes > 6 {
		return None;
	}
	let rest = &trimmed[hashes..];
	if !rest.starts_with(' ') {
		return None;
	}
	let title = rest.trim();
	if title.is_empty() {
		return None;
	}
	Some((hashes, title.to_string()))
}

/// Recursively split `text` into chunks at or under `chunk_size` estimated
/// tokens, trying paragraph -> line -> sentence -> word separators.
fn split_text_recursive(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
	if estimate_tokens(text) <= chunk_size {
		return if text.trim().is_empty() {
			vec![]
		} else {
			vec![text.to_string()]
		};
	}

	for (i, sep) in separators.iter().enumerate() {
		if !text.contains(sep) {
			continue;
		}

		let parts: Vec<&str> = text.split(sep).collect();
		let mut chunks = Vec::new();
		let mut current = String::new();

		for part in parts {
			let candidate = if current.is_empty() {
				part.to_string()
			} else {
				format!("{current}{sep}{part}")
			};

			if estimate_tokens(&candidate) <= chunk_size {
				current = candidate;
			} else {
				if !current.is_empty() {
					chunks.push(std::mem::take(&mut current));
				}
				if estimate_tokens(part) > chunk_size && i + 1 < separators.len() {
					chunks.extend(split_text_recursive(part, chunk_size, &separators[i + 1..]));
				} else {
					current = part.to_string();
				}
			}
		}
		if !current.is_empty() {
			chunks.push(current);
		}
		if !chunks.is_empty() {
			return chunks;
		}
	}

	// Fallback: hard split by words.
	let words: Vec<&str> = text.split_whitespace().collect();
	let mut chunks = Vec::new();
	let mut current_words: Vec<&str> = Vec::new();
	for word in words {
		current_words.push(word);
		if estimate_tokens(&current_words.join(" ")) >= chunk_size {
			chunks.push(current_words.join(" "));
			current_words.clear();
		}
	}
	if !current_words.is_empty() {
		chunks.push(current_words.join(" "));
	}
	chunks
}

/// Prepend the trailing words of the previous chunk (marked with `...`)
/// to each subsequent chunk.
fn add_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
	if chunks.len() <= 1 || overlap == 0 {
		return chunks;
	}
	let mut result = Vec::with_capacity(chunks.len());
	result.push(chunks[0].clone());
	for i in 1..chunks.len() {
		let prev_words: Vec<&str> = chunks[i - 1].split_whitespace().collect();
		let start = prev_words.len().saturating_sub(overlap);
		let overlap_text = prev_words[start..].join(" ");
		result.push(format!("...{overlap_text} {}", chunks[i]));
	}
	result
}

/// Extract text/markdown blocks. Markdown gets header-hierarchy-aware
/// chunking with a `" > "`-joined breadcrumb prefix; other prose is split
/// directly. Returns an empty vec if every chunk falls below the minimum
/// token floor, signalling the caller to fall back to a sliding window.
pub fn extract_text_blocks(ext: &str, content: &str) -> Vec<Block> {
	let mut blocks = Vec::new();

	if matches!(ext, "md" | "mdx" | "markdown") {
		for section in parse_markdown_structure(content) {
			let context = if section.headers.is_empty() {
				None
			} else {
				Some(section.headers.join(" > "))
			};

			let chunks = split_text_recursive(&section.content, CHUNK_SIZE_TOKENS, SEPARATORS);
			let chunks = add_overlap(chunks, CHUNK_OVERLAP_TOKENS);

			for chunk in chunks {
				if estimate_tokens(&chunk) < MIN_CHUNK_SIZE_TOKENS {
					continue;
				}
				let kind = if section.headers.is_empty() {
					BlockKind::Text
				} else {
					BlockKind::Section
				};
				let name = section.headers.last().cloned();
				let content_with_context = match &context {
					Some(ctx) => format!("{ctx} | {chunk}"),
					None => chunk,
				};
				blocks.push(Block {
					kind,
					name,
					start_line: section.start_line,
					end_line: section.end_line,
					content: content_with_context,
				});
			}
		}
	} else {
		let chunks = split_text_recursive(content, CHUNK_SIZE_TOKENS, SEPARATORS);
		let chunks = add_overlap(chunks, CHUNK_OVERLAP_TOKENS);

		let mut line_num = 0usize;
		for chunk in chunks {
			if estimate_tokens(&chunk) < MIN_CHUNK_SIZE_TOKENS {
				continue;
			}
			let chunk_lines = chunk.matches('\n').count() + 1;
			blocks.push(Block {
				kind: BlockKind::Text,
				name: None,
				start_line: line_num,
				end_line: line_num + chunk_lines,
				content: chunk,
			});
			line_num += chunk_lines;
		}
	}

	blocks
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn markdown_sections_carry_header_breadcrumb() {
		let content = "# Title\n\nIntro text that is long enough to pass the minimum chunk size requirement easily by being quite verbose here.\n\n## Sub\n\nMore body text that is also long enough to clear the minimum chunk size floor comfortably in this test.\n";
		let blocks = extract_text_blocks("md", content);
		assert!(!blocks.is_empty());
		assert!(blocks.iter().any(|b| b.content.starts_with("Title |")));
		assert!(blocks.iter().any(|b| b.content.starts_with("Title > Sub |")));
	}

	#[test]
	fn headers_inside_fenced_code_blocks_are_ignored() {
		let content = "# Real Header\n\n```\n# not a header\n```\n\nSome trailing prose that is long enough to survive the minimum chunk size filter in this unit test.\n";
		let blocks = extract_text_blocks("md", content);
		assert!(blocks.iter().all(|b| b.name.as_deref() != Some("not a header")));
	}

	#[test]
	fn short_chunks_are_dropped() {
		let blocks = extract_text_blocks("txt", "too short");
		assert!(blocks.is_empty());
	}

	#[test]
	fn plain_text_is_split_without_headers() {
		let long_text = "word ".repeat(400);
		let blocks = extract_text_blocks("txt", &long_text);
		assert!(blocks.len() > 1);
		assert!(blocks.iter().all(|b| b.name.is_none()));
	}
}
