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

//! Manifest: `rel_path -> {hash, block_ids}`, the ledger that mediates
//! incremental re-embedding and deletion (spec §3, §4.5, §6).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::{BlockId, ContentHash};
use crate::constants::MANIFEST_VERSION;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
	pub hash: String,
	pub blocks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
	pub version: u32,
	pub files: HashMap<String, FileEntry>,
}

impl Default for Manifest {
	fn default() -> Self {
		Self {
			version: MANIFEST_VERSION,
			files: HashMap::new(),
		}
	}
}

/// Convert `path` to a `root`-relative string, the way `semantic.py`'s
/// `_to_relative` does: if `path` isn't under `root`, it's returned
/// unchanged (already relative, or from a different tree entirely).
fn to_relative(path: &str, root: &Path) -> String {
	let candidate = Path::new(path);
	match candidate.strip_prefix(root) {
		Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
		Err(_) => path.to_string(),
	}
}

impl Manifest {
	/// Load the manifest at `path`, migrating older on-disk versions
	/// forward. A v1 entry is a bare hash string; v2 adds the `blocks`
	/// list; v3 rewrites absolute file keys to `root`-relative ones and
	/// rewrites any block id that embeds the old absolute path prefix.
	pub fn load(path: &Path, root: &Path) -> Result<Self> {
		if !path.exists() {
			return Ok(Manifest::default());
		}
		let content = fs::read_to_string(path)
			.map_err(|e| EngineError::IOError(path.to_path_buf(), e.to_string()))?;
		let mut raw: Value = serde_json::from_str(&content)
			.map_err(|e| EngineError::Corrupt(path.to_path_buf(), e.to_string()))?;

		let version = raw.get("version").and_then(Value::as_u64).unwrap_or(1) as u32;
		let files_value = raw
			.get_mut("files")
			.map(std::mem::take)
			.unwrap_or(Value::Object(Default::default()));

		let mut files = HashMap::new();
		if let Value::Object(map) = files_value {
			for (path_key, entry) in map {
				let file_entry = match entry {
					// v1: bare hash string -> empty block list.
					Value::String(hash) => FileEntry { hash, blocks: vec![] },
					Value::Object(obj) => {
						let hash = obj
							.get("hash")
							.and_then(Value::as_str)
							.unwrap_or_default()
							.to_string();
						let blocks = obj
							.get("blocks")
							.and_then(Value::as_array)
							.map(|arr| {
								arr.iter()
									.filter_map(Value::as_str)
									.map(|s| s.to_string())
									.collect()
							})
							.unwrap_or_default();
						FileEntry { hash, blocks }
					}
					_ => continue,
				};
				files.insert(path_key, file_entry);
			}
		}

		if version < 3 {
			let mut migrated = HashMap::with_capacity(files.len());
			for (path_key, mut entry) in files {
				let rel_path = to_relative(&path_key, root);
				entry.blocks = entry
					.blocks
					.into_iter()
					.map(|b| if b.contains(&path_key) { b.replace(&path_key, &rel_path) } else { b })
					.collect();
				migrated.insert(rel_path, entry);
			}
			files = migrated;
		}

		Ok(Manifest {
			version: MANIFEST_VERSION,
			files,
		})
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.map_err(|e| EngineError::IOError(parent.to_path_buf(), e.to_string()))?;
		}
		let json = serde_json::to_string_pretty(self)
			.map_err(|e| EngineError::Corrupt(path.to_path_buf(), e.to_string()))?;
		fs::write(path, json).map_err(|e| EngineError::IOError(path.to_path_buf(), e.to_string()))
	}

	pub fn entry_for(&self, rel_path: &str) -> Option<&FileEntry> {
		self.files.get(rel_path)
	}

	pub fn is_unchanged(&self, rel_path: &str, hash: &ContentHash) -> bool {
		self.files
			.get(rel_path)
			.is_some_and(|e| e.hash == hash.as_str())
	}

	pub fn set_entry(&mut self, rel_path: String, hash: &ContentHash, block_ids: &[BlockId]) {
		self.files.insert(
			rel_path,
			FileEntry {
				hash: hash.as_str().to_string(),
				blocks: block_ids.iter().map(|b| b.as_str().to_string()).collect(),
			},
		);
	}

	pub fn remove_entry(&mut self, rel_path: &str) -> Option<FileEntry> {
		self.files.remove(rel_path)
	}

	pub fn block_count(&self) -> usize {
		self.files.values().map(|e| e.blocks.len()).sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn missing_manifest_loads_empty_default() {
		let dir = tempdir().unwrap();
		let manifest = Manifest::load(&dir.path().join("manifest.json"), dir.path()).unwrap();
		assert_eq!(manifest.version, MANIFEST_VERSION);
		assert!(manifest.files.is_empty());
	}

	#[test]
	fn roundtrips_through_save_and_load() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("manifest.json");
		let mut manifest = Manifest::default();
		manifest.set_entry(
			"src/a.rs".to_string(),
			&ContentHash("abc1234567890123".to_string()),
			&[BlockId::new("src/a.rs", 1, "f")],
		);
		manifest.save(&path).unwrap();

		let loaded = Manifest::load(&path, dir.path()).unwrap();
		assert_eq!(loaded.block_count(), 1);
		assert!(loaded.is_unchanged(
			"src/a.rs",
			&ContentHash("abc1234567890123".to_string())
		));
	}

	#[test]
	fn migrates_v1_bare_string_entries() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("manifest.json");
		fs::write(
			&path,
			r#"{"version": 1, "files": {"src/a.rs": "deadbeefcafef00d"}}"#,
		)
		.unwrap();

		let manifest = Manifest::load(&path, dir.path()).unwrap();
		assert_eq!(manifest.version, MANIFEST_VERSION);
		let entry = manifest.entry_for("src/a.rs").unwrap();
		assert_eq!(entry.hash, "deadbeefcafef00d");
		assert!(entry.blocks.is_empty());
	}

	#[test]
	fn migrates_v2_absolute_paths_to_relative_and_rewrites_block_ids() {
		let dir = tempdir().unwrap();
		let root = dir.path().canonicalize().unwrap();
		let abs = root.join("src/a.rs").to_string_lossy().replace('\\', "/");
		let path = dir.path().join("manifest.json");
		fs::write(
			&path,
			serde_json::json!({
				"version": 2,
				"files": {
					abs.clone(): {
						"hash": "deadbeefcafef00d",
						"blocks": [format!("{abs}:1:f")],
					}
				}
			})
			.to_string(),
		)
		.unwrap();

		let manifest = Manifest::load(&path, &root).unwrap();
		assert_eq!(manifest.version, MANIFEST_VERSION);
		assert!(manifest.entry_for(&abs).is_none());
		let entry = manifest.entry_for("src/a.rs").expect("migrated to relative key");
		assert_eq!(entry.hash, "deadbeefcafef00d");
		assert_eq!(entry.blocks, vec!["src/a.rs:1:f".to_string()]);
	}

	#[test]
	fn corrupt_json_errors() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("manifest.json");
		fs::write(&path, "{not json").unwrap();
		let err = Manifest::load(&path, dir.path()).unwrap_err();
		assert!(matches!(err, EngineError::Corrupt(_, _)));
	}
}
