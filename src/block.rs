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

//! Block: a structurally identified region of a source file, and the
//! small value types that identify and address it (spec §3).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Closed set of block kinds. Unknown captures map to `Unknown`, never a
/// free-form string — ingest rejects anything else (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
	Function,
	Class,
	Item,
	Section,
	Text,
	File,
	Unknown,
}

impl BlockKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			BlockKind::Function => "function",
			BlockKind::Class => "class",
			BlockKind::Item => "item",
			BlockKind::Section => "section",
			BlockKind::Text => "text",
			BlockKind::File => "file",
			BlockKind::Unknown => "unknown",
		}
	}

	/// Parse a tree-sitter query capture tag into a kind, falling back to `Unknown`.
	pub fn from_capture(tag: &str) -> Self {
		match tag {
			"function" => BlockKind::Function,
			"class" => BlockKind::Class,
			"item" => BlockKind::Item,
			"section" => BlockKind::Section,
			"text" => BlockKind::Text,
			"file" => BlockKind::File,
			_ => BlockKind::Unknown,
		}
	}
}

/// A region of a source file identified structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
	pub kind: BlockKind,
	/// `None` for plain prose chunks with no heading context.
	pub name: Option<String>,
	/// Zero-based inclusive start line.
	pub start_line: usize,
	/// Zero-based inclusive end line.
	pub end_line: usize,
	pub content: String,
}

impl Block {
	pub fn name_or_anonymous(&self) -> &str {
		self.name.as_deref().unwrap_or("anonymous")
	}
}

/// Stable identifier for a block: `"<rel_path>:<start_line>:<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
	pub fn new(rel_path: &str, start_line: usize, name: &str) -> Self {
		BlockId(format!("{rel_path}:{start_line}:{name}"))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for BlockId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// First 16 hex characters of SHA-256 over file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
	pub fn of_bytes(bytes: &[u8]) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(bytes);
		let digest = hasher.finalize();
		ContentHash(format!("{digest:x}")[..16].to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn content_hash_is_16_hex_chars() {
		let h = ContentHash::of_bytes(b"hello world");
		assert_eq!(h.as_str().len(), 16);
		assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn content_hash_is_stable() {
		let a = ContentHash::of_bytes(b"same bytes");
		let b = ContentHash::of_bytes(b"same bytes");
		assert_eq!(a, b);
	}

	#[test]
	fn block_id_shape() {
		let id = BlockId::new("src/auth.py", 12, "hash_password");
		assert_eq!(id.as_str(), "src/auth.py:12:hash_password");
	}

	#[test]
	fn unknown_capture_tag_maps_to_unknown_kind() {
		assert_eq!(BlockKind::from_capture("wat"), BlockKind::Unknown);
		assert_eq!(BlockKind::from_capture("function"), BlockKind::Function);
	}
}
