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

//! End-to-end coverage of the build/update/merge contract (spec §8),
//! wired by hand from scanner + extractor + manifest + store so no
//! model weights need to be downloaded: embeddings here are a cheap
//! deterministic hash of block content, not real FastEmbed output.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hhg::block::{Block, BlockId, ContentHash};
use hhg::extractor::BlockExtractor;
use hhg::manifest::Manifest;
use hhg::scanner::{FileScanner, WalkScanner};
use hhg::store::{VectorRecord, VectorStore};

const DIM: usize = 8;

/// Deterministic stand-in for a real embedder: hashes content into a
/// fixed-size vector. Not meaningful for similarity, only for identity.
fn fake_embed(content: &str) -> Vec<f32> {
	let hash = ContentHash::of_bytes(content.as_bytes());
	let bytes = hash.as_str().as_bytes();
	(0..DIM)
		.map(|i| bytes[i % bytes.len()] as f32 / 255.0)
		.collect()
}

struct Harness {
	root: PathBuf,
	index_dir: PathBuf,
	extractor: BlockExtractor,
	store: VectorStore,
	_tmp: tempfile::TempDir,
}

impl Harness {
	fn new() -> Self {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().canonicalize().unwrap();
		let index_dir = root.join(".hhg");
		let store = VectorStore::open(&index_dir, DIM).unwrap();
		Self {
			root,
			index_dir,
			extractor: BlockExtractor::new(),
			store,
			_tmp: tmp,
		}
	}

	fn manifest_path(&self) -> PathBuf {
		self.index_dir.join("manifest.json")
	}

	fn rel_path(&self, path: &Path) -> String {
		path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy().replace('\\', "/")
	}

	fn write_file(&self, rel: &str, content: &str) {
		let path = self.root.join(rel);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap();
		}
		std::fs::write(path, content).unwrap();
	}

	fn remove_file(&self, rel: &str) {
		std::fs::remove_file(self.root.join(rel)).unwrap();
	}

	/// Mirrors `IndexEngine::update`: diff against the manifest, delete
	/// stale blocks before writing fresh ones, persist.
	fn update(&self) -> (usize, usize, usize) {
		let mut manifest = Manifest::load(&self.manifest_path(), &self.root).unwrap();
		let scanner = WalkScanner::default();
		let files = scanner.scan(&self.root, "", false).unwrap();

		let seen_rel: HashSet<String> = files.keys().map(|p| self.rel_path(p)).collect();
		let deleted: Vec<String> = manifest.files.keys().filter(|rel| !seen_rel.contains(*rel)).cloned().collect();

		for rel in &deleted {
			if let Some(entry) = manifest.entry_for(rel) {
				let ids: Vec<BlockId> = entry.blocks.iter().map(|b| BlockId(b.clone())).collect();
				self.store.delete(&ids).unwrap();
			}
			manifest.remove_entry(rel);
		}

		let mut added = 0;
		let mut changed = 0;
		let mut blocks_indexed = 0;

		for (path, content) in files {
			let rel = self.rel_path(&path);
			let hash = ContentHash::of_bytes(content.as_bytes());
			if manifest.is_unchanged(&rel, &hash) {
				continue;
			}
			let is_new = manifest.entry_for(&rel).is_none();
			if let Some(entry) = manifest.entry_for(&rel) {
				let ids: Vec<BlockId> = entry.blocks.iter().map(|b| BlockId(b.clone())).collect();
				self.store.delete(&ids).unwrap();
			}

			let blocks = self.extractor.extract(&path, &content, "");
			let ids = self.index_blocks(&rel, &blocks);
			manifest.set_entry(rel, &hash, &ids);

			if is_new {
				added += 1;
			} else {
				changed += 1;
			}
			blocks_indexed += ids.len();
		}

		manifest.save(&self.manifest_path()).unwrap();
		(added, changed, deleted.len())
	}

	fn index_blocks(&self, rel_path: &str, blocks: &[Block]) -> Vec<BlockId> {
		let mut ids = Vec::with_capacity(blocks.len());
		let mut records = Vec::with_capacity(blocks.len());
		for block in blocks {
			let id = BlockId::new(rel_path, block.start_line, block.name_or_anonymous());
			ids.push(id.clone());
			records.push(VectorRecord {
				id,
				file: rel_path.to_string(),
				embedding: fake_embed(&block.content),
				block: block.clone(),
			});
		}
		self.store.set(&records).unwrap();
		ids
	}

	fn manifest(&self) -> Manifest {
		Manifest::load(&self.manifest_path(), &self.root).unwrap()
	}
}

#[test]
fn p1_update_is_idempotent() {
	let h = Harness::new();
	h.write_file("auth.py", "def hash_password(p):\n    return p\n");
	h.update();
	let manifest_once = std::fs::read_to_string(h.manifest_path()).unwrap();
	let count_once = h.store.count().unwrap();

	h.update();
	let manifest_twice = std::fs::read_to_string(h.manifest_path()).unwrap();
	let count_twice = h.store.count().unwrap();

	assert_eq!(manifest_once, manifest_twice);
	assert_eq!(count_once, count_twice);
}

#[test]
fn p2_unchanged_file_embeds_nothing_on_second_update() {
	let h = Harness::new();
	h.write_file("auth.py", "def hash_password(p):\n    return p\n");
	let (added, changed, _) = h.update();
	assert_eq!(added, 1);

	let (added2, changed2, deleted2) = h.update();
	assert_eq!((added2, changed2, deleted2), (0, 0, 0));
	let _ = changed;
}

#[test]
fn p3_editing_a_file_reembeds_only_that_file() {
	let h = Harness::new();
	h.write_file("a.py", "def a():\n    pass\n");
	h.write_file("b.py", "def b():\n    pass\n");
	h.update();

	let old_ids: HashSet<String> = h.manifest().entry_for("b.py").unwrap().blocks.iter().cloned().collect();

	h.write_file("b.py", "def b():\n    return 1\n");
	let (added, changed, deleted) = h.update();
	assert_eq!((added, changed, deleted), (0, 1, 0));

	let new_ids: HashSet<String> = h.manifest().entry_for("b.py").unwrap().blocks.iter().cloned().collect();
	assert_ne!(old_ids, new_ids);

	for old_id in &old_ids {
		assert!(h.store.get(&BlockId(old_id.clone())).unwrap().is_none());
	}
	for new_id in &new_ids {
		assert!(h.store.get(&BlockId(new_id.clone())).unwrap().is_some());
	}

	assert!(h.manifest().entry_for("a.py").is_some());
}

#[test]
fn p4_deleting_a_file_removes_its_manifest_row_and_blocks() {
	let h = Harness::new();
	h.write_file("gone.py", "def gone():\n    pass\n");
	h.update();
	let ids: Vec<String> = h.manifest().entry_for("gone.py").unwrap().blocks.clone();
	assert!(!ids.is_empty());

	h.remove_file("gone.py");
	let (added, changed, deleted) = h.update();
	assert_eq!((added, changed, deleted), (0, 0, 1));

	assert!(h.manifest().entry_for("gone.py").is_none());
	for id in &ids {
		assert!(h.store.get(&BlockId(id.clone())).unwrap().is_none());
	}
}

#[test]
fn p8_store_ids_equal_union_of_manifest_blocks() {
	let h = Harness::new();
	h.write_file("a.py", "def a():\n    pass\n");
	h.write_file("b.py", "def b():\n    pass\ndef c():\n    pass\n");
	h.update();

	h.write_file("b.py", "def b():\n    return 1\n");
	h.update();

	let manifest = h.manifest();
	let manifest_ids: HashSet<String> = manifest.files.values().flat_map(|e| e.blocks.iter().cloned()).collect();
	assert_eq!(manifest_ids.len() as u64, h.store.count().unwrap() as u64);

	for id in &manifest_ids {
		assert!(h.store.get(&BlockId(id.clone())).unwrap().is_some());
	}
}

#[test]
fn p10_migrating_a_v1_manifest_yields_root_relative_v3_paths() {
	let h = Harness::new();
	std::fs::create_dir_all(h.index_dir.clone()).unwrap();
	std::fs::write(
		h.manifest_path(),
		r#"{"version": 1, "files": {"src/a.rs": "deadbeefcafef00d"}}"#,
	)
	.unwrap();

	let manifest = h.manifest();
	assert_eq!(manifest.version, hhg::constants::MANIFEST_VERSION);
	manifest.save(&h.manifest_path()).unwrap();

	let reloaded: serde_json::Value =
		serde_json::from_str(&std::fs::read_to_string(h.manifest_path()).unwrap()).unwrap();
	let keys: Vec<&str> = reloaded["files"].as_object().unwrap().keys().map(|s| s.as_str()).collect();
	assert_eq!(keys, vec!["src/a.rs"]);
	assert!(!keys[0].starts_with('/'));
}

#[test]
fn discover_returns_not_found_without_building_when_auto_build_is_off() {
	let tmp = tempfile::tempdir().unwrap();
	let err = hhg::engine::IndexEngine::discover(tmp.path()).unwrap_err();
	assert!(matches!(err, hhg::error::EngineError::NotFound(_)));
}
