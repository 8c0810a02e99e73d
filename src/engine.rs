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

//! IndexEngine (C1): orchestrates scan, extract, embed and store into
//! the build/update/search/merge/clear operations a caller sees
//! (spec §4, §5). Every public method is synchronous.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::block::{Block, BlockId, ContentHash};
use crate::config::Config;
use crate::constants::{EMBEDDING_DIM, INDEX_DIR, MANIFEST_FILE};
use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::extractor::BlockExtractor;
use crate::hybrid::{HybridRanker, RankedCandidate};
use crate::index_root::find_index_root;
use crate::manifest::Manifest;
use crate::scanner::{FileScanner, WalkScanner};
use crate::store::{VectorRecord, VectorStore};

/// A single search result, ranked and ready to present.
#[derive(Debug, Clone)]
pub struct SearchHit {
	pub file: String,
	pub block: Block,
	pub score: f32,
}

/// Summary of an incremental `update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateStats {
	pub files_added: usize,
	pub files_changed: usize,
	pub files_deleted: usize,
	pub blocks_indexed: usize,
}

/// Orchestrates a single root's index: manifest, extractor, embedder and
/// vector store, bound together by the build/update/search operations.
pub struct IndexEngine {
	root: PathBuf,
	index_dir: PathBuf,
	config: Config,
	extractor: BlockExtractor,
	embedder: Embedder,
	store: VectorStore,
}

impl IndexEngine {
	/// Open (or create) the index rooted at `root`. `root` is canonicalized.
	pub fn open(root: &Path) -> Result<Self> {
		let root = root
			.canonicalize()
			.map_err(|e| EngineError::IOError(root.to_path_buf(), e.to_string()))?;
		let index_dir = root.join(INDEX_DIR);
		let config = Config::load(&root)?;
		let embedder = Embedder::new(&config.embedding.model, config.embedding.batch_size)?;
		let store = VectorStore::open(&index_dir, EMBEDDING_DIM)?;

		Ok(Self {
			root,
			index_dir,
			config,
			extractor: BlockExtractor::new(),
			embedder,
			store,
		})
	}

	/// Discover the nearest ancestor index for `search_path` and open it,
	/// or fall back to building fresh at `search_path` when `auto_build`
	/// is enabled. Mirrors the CLI's "index lookup" step (spec §5).
	pub fn discover(search_path: &Path) -> Result<Self> {
		let (root, index_dir) = find_index_root(search_path);
		if index_dir.is_some() {
			return Self::open(&root);
		}
		let config = Config::load(&root)?;
		if config.auto_build {
			let engine = Self::open(&root)?;
			engine.build()?;
			return Self::open(&root);
		}
		Err(EngineError::NotFound(root))
	}

	fn manifest_path(&self) -> PathBuf {
		self.index_dir.join(MANIFEST_FILE)
	}

	fn rel_path(&self, path: &Path) -> String {
		path.strip_prefix(&self.root)
			.unwrap_or(path)
			.to_string_lossy()
			.replace('\\', "/")
	}

	/// Full (re)build: scan the whole tree, extract, embed and store
	/// every file, replacing the manifest from scratch.
	pub fn build(&self) -> Result<UpdateStats> {
		let scanner = WalkScanner::default();
		let files = scanner
			.scan(&self.root, "", false)
			.map_err(|e| EngineError::IOError(self.root.clone(), e.to_string()))?;

		let mut manifest = Manifest::default();
		let mut stats = UpdateStats::default();

		for (path, content) in files {
			let rel = self.rel_path(&path);
			let hash = ContentHash::of_bytes(content.as_bytes());
			let blocks = self.extractor.extract(&path, &content, "");
			let ids = self.index_blocks(&rel, &blocks)?;
			manifest.set_entry(rel, &hash, &ids);
			stats.files_added += 1;
			stats.blocks_indexed += ids.len();
		}

		manifest.save(&self.manifest_path())?;
		Ok(stats)
	}

	fn index_blocks(&self, rel_path: &str, blocks: &[Block]) -> Result<Vec<BlockId>> {
		if blocks.is_empty() {
			return Ok(vec![]);
		}
		let texts: Vec<String> = blocks.iter().map(|b| b.content.clone()).collect();
		let embeddings = self.embedder.embed_batch(&texts)?;

		let mut ids = Vec::with_capacity(blocks.len());
		let mut records = Vec::with_capacity(blocks.len());
		for (block, embedding) in blocks.iter().zip(embeddings.into_iter()) {
			let id = BlockId::new(rel_path, block.start_line, block.name_or_anonymous());
			ids.push(id.clone());
			records.push(VectorRecord {
				id,
				file: rel_path.to_string(),
				block: block.clone(),
				embedding,
			});
		}
		self.store.set(&records)?;
		Ok(ids)
	}

	/// Diff against the manifest: reindex changed/new files, drop deleted
	/// ones. Deletes old blocks before writing new ones so a crash mid-update
	/// never leaves stale blocks shadowing fresh ones under the same file.
	pub fn update(&self) -> Result<UpdateStats> {
		let manifest_path = self.manifest_path();
		let mut manifest = Manifest::load(&manifest_path, &self.root)?;
		let mut stats = UpdateStats::default();

		let scanner = WalkScanner::default();
		let files = scanner
			.scan(&self.root, "", false)
			.map_err(|e| EngineError::IOError(self.root.clone(), e.to_string()))?;

		let seen_rel: HashSet<String> = files.keys().map(|p| self.rel_path(p)).collect();
		let deleted: Vec<String> = manifest
			.files
			.keys()
			.filter(|rel| !seen_rel.contains(*rel))
			.cloned()
			.collect();

		for rel in &deleted {
			if let Some(entry) = manifest.entry_for(rel) {
				let ids: Vec<BlockId> = entry.blocks.iter().map(|b| BlockId(b.clone())).collect();
				self.store.delete(&ids)?;
			}
			manifest.remove_entry(rel);
			stats.files_deleted += 1;
		}

		for (path, content) in files {
			let rel = self.rel_path(&path);
			let hash = ContentHash::of_bytes(content.as_bytes());
			if manifest.is_unchanged(&rel, &hash) {
				continue;
			}

			let is_new = manifest.entry_for(&rel).is_none();
			if let Some(entry) = manifest.entry_for(&rel) {
				let ids: Vec<BlockId> = entry.blocks.iter().map(|b| BlockId(b.clone())).collect();
				self.store.delete(&ids)?;
			}

			let blocks = self.extractor.extract(&path, &content, "");
			let ids = self.index_blocks(&rel, &blocks)?;
			manifest.set_entry(rel.clone(), &hash, &ids);

			if is_new {
				stats.files_added += 1;
			} else {
				stats.files_changed += 1;
			}
			stats.blocks_indexed += ids.len();
		}

		manifest.save(&manifest_path)?;
		Ok(stats)
	}

	/// Count of files that would be (re)indexed or dropped by the next
	/// `update`, without performing it.
	pub fn needs_update(&self) -> Result<usize> {
		let manifest = Manifest::load(&self.manifest_path(), &self.root)?;
		let scanner = WalkScanner::default();
		let files = scanner
			.scan(&self.root, "", false)
			.map_err(|e| EngineError::IOError(self.root.clone(), e.to_string()))?;

		let mut stale = 0usize;
		let seen_rel: HashSet<String> = files.keys().map(|p| self.rel_path(p)).collect();
		stale += manifest.files.keys().filter(|rel| !seen_rel.contains(*rel)).count();

		for (path, content) in &files {
			let rel = self.rel_path(path);
			let hash = ContentHash::of_bytes(content.as_bytes());
			if !manifest.is_unchanged(&rel, &hash) {
				stale += 1;
			}
		}
		Ok(stale)
	}

	pub fn is_indexed(&self) -> bool {
		self.manifest_path().exists()
	}

	/// Total indexed block count, read from the manifest (no store round-trip).
	pub fn count(&self) -> Result<usize> {
		if !self.is_indexed() {
			return Ok(0);
		}
		Ok(Manifest::load(&self.manifest_path(), &self.root)?.block_count())
	}

	/// Hybrid semantic + lexical search. `path_scope`, if given, restricts
	/// candidates to files under that relative prefix.
	pub fn search(&self, query: &str, k: usize, path_scope: Option<&str>) -> Result<Vec<SearchHit>> {
		let embedding = self.embedder.embed_query(query)?;
		let overfetch = if path_scope.is_some() { k * 3 } else { k };
		let candidates = self.store.search(&embedding, overfetch, path_scope)?;

		let ranked_candidates: Vec<RankedCandidate<(String, Block)>> = candidates
			.into_iter()
			.map(|c| RankedCandidate {
				name: c.block.name_or_anonymous().to_string(),
				content: c.block.content.clone(),
				semantic_score: semantic_score(c.distance),
				item: (c.file, c.block),
			})
			.collect();

		let ranked = HybridRanker::rank(query, ranked_candidates);

		Ok(ranked
			.into_iter()
			.take(k)
			.map(|((file, block), score)| SearchHit { file, block, score })
			.collect())
	}

	/// Merge a subdirectory's own index into this one: ids and file paths
	/// are prefixed by the subdir's relative path, vectors are copied
	/// as-is without re-embedding.
	pub fn merge_subdir(&self, subdir: &Path) -> Result<UpdateStats> {
		let subdir = subdir
			.canonicalize()
			.map_err(|e| EngineError::IOError(subdir.to_path_buf(), e.to_string()))?;
		let sub_index_dir = subdir.join(INDEX_DIR);
		let sub_manifest = Manifest::load(&sub_index_dir.join(MANIFEST_FILE), &subdir)?;
		let sub_store = VectorStore::open(&sub_index_dir, EMBEDDING_DIM)?;

		let prefix = self.rel_path(&subdir);
		let mut manifest = Manifest::load(&self.manifest_path(), &self.root)?;
		let mut stats = UpdateStats::default();

		for (sub_rel, entry) in &sub_manifest.files {
			let merged_rel = format!("{prefix}/{sub_rel}");
			if manifest.entry_for(&merged_rel).is_some() {
				continue;
			}

			let mut new_ids = Vec::with_capacity(entry.blocks.len());
			let mut records = Vec::with_capacity(entry.blocks.len());
			for block_id in &entry.blocks {
				let Some(record) = sub_store.get(&BlockId(block_id.clone()))? else {
					continue;
				};
				let merged_id = BlockId::new(&merged_rel, record.block.start_line, record.block.name_or_anonymous());
				new_ids.push(merged_id.clone());
				records.push(VectorRecord {
					id: merged_id,
					file: merged_rel.clone(),
					block: record.block,
					embedding: record.embedding,
				});
			}

			self.store.set(&records)?;
			manifest.set_entry(
				merged_rel.clone(),
				&ContentHash(entry.hash.clone()),
				&new_ids,
			);
			stats.files_added += 1;
			stats.blocks_indexed += new_ids.len();
		}

		manifest.save(&self.manifest_path())?;
		Ok(stats)
	}

	/// Remove the entire index directory for this root.
	pub fn clear(self) -> Result<()> {
		let index_dir = self.index_dir.clone();
		self.store.close()?;
		std::fs::remove_dir_all(&index_dir).map_err(|e| EngineError::IOError(index_dir, e.to_string()))
	}
}

fn semantic_score(distance: f32) -> f32 {
	(2.0 - distance) / 2.0
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[test]
	fn rel_path_strips_root_and_normalizes_separators() {
		let dir = tempdir().unwrap();
		std::fs::write(dir.path().join("a.rs"), "fn f() {}").unwrap();
		let root = dir.path().canonicalize().unwrap();
		let rel = root.join("a.rs").strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/");
		assert_eq!(rel, "a.rs");
	}

	#[test]
	fn semantic_score_maps_distance_range() {
		assert!((semantic_score(0.0) - 1.0).abs() < 1e-6);
		assert!((semantic_score(2.0) - 0.0).abs() < 1e-6);
	}
}
