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

//! Persistent vector store (C8): a single LanceDB table of blocks, opened
//! under an exclusive process lock, with cosine k-NN search (spec §4.4).
//!
//! The engine boundary is synchronous (spec §5); LanceDB's API is async,
//! so every call here is bridged through a single blocking executor.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};

use crate::block::{Block, BlockId, BlockKind};
use crate::error::{EngineError, Result};

const TABLE_NAME: &str = "blocks";
const LOCK_FILE: &str = "LOCK";

fn schema(vector_dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("file", DataType::Utf8, false),
		Field::new("kind", DataType::Utf8, false),
		Field::new("name", DataType::Utf8, true),
		Field::new("start_line", DataType::UInt32, false),
		Field::new("end_line", DataType::UInt32, false),
		Field::new("content", DataType::Utf8, false),
		Field::new(
			"embedding",
			DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
			true,
		),
	]))
}

/// One block as it lives in the store, paired with its embedding.
#[derive(Debug, Clone)]
pub struct VectorRecord {
	pub id: BlockId,
	pub file: String,
	pub block: Block,
	pub embedding: Vec<f32>,
}

/// A scored hit returned from [`VectorStore::search`].
#[derive(Debug, Clone)]
pub struct ScoredRecord {
	pub id: BlockId,
	pub file: String,
	pub block: Block,
	/// Cosine distance, ascending (lower is more similar).
	pub distance: f32,
}

fn block_kind_from_str(s: &str) -> BlockKind {
	BlockKind::from_capture(s)
}

fn row_to_record(batch: &RecordBatch, row: usize, include_embedding: bool) -> Option<VectorRecord> {
	let id = batch.column(0).as_any().downcast_ref::<StringArray>()?.value(row).to_string();
	let file = batch.column(1).as_any().downcast_ref::<StringArray>()?.value(row).to_string();
	let kind_str = batch.column(2).as_any().downcast_ref::<StringArray>()?.value(row);
	let name_col = batch.column(3).as_any().downcast_ref::<StringArray>()?;
	let name = if name_col.is_null(row) {
		None
	} else {
		Some(name_col.value(row).to_string())
	};
	let start_line = batch.column(4).as_any().downcast_ref::<UInt32Array>()?.value(row) as usize;
	let end_line = batch.column(5).as_any().downcast_ref::<UInt32Array>()?.value(row) as usize;
	let content = batch.column(6).as_any().downcast_ref::<StringArray>()?.value(row).to_string();

	let embedding = if include_embedding {
		let list = batch.column(7).as_any().downcast_ref::<FixedSizeListArray>()?;
		let values = list.value(row);
		let values = values.as_any().downcast_ref::<Float32Array>()?;
		values.values().to_vec()
	} else {
		Vec::new()
	};

	Some(VectorRecord {
		id: BlockId(id),
		file,
		block: Block {
			kind: block_kind_from_str(kind_str),
			name,
			start_line,
			end_line,
			content,
		},
		embedding,
	})
}

fn records_to_batch(records: &[VectorRecord], vector_dim: usize) -> Result<RecordBatch> {
	let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
	let files: Vec<&str> = records.iter().map(|r| r.file.as_str()).collect();
	let kinds: Vec<&str> = records.iter().map(|r| r.block.kind.as_str()).collect();
	let names: Vec<Option<&str>> = records.iter().map(|r| r.block.name.as_deref()).collect();
	let start_lines: Vec<u32> = records.iter().map(|r| r.block.start_line as u32).collect();
	let end_lines: Vec<u32> = records.iter().map(|r| r.block.end_line as u32).collect();
	let contents: Vec<&str> = records.iter().map(|r| r.block.content.as_str()).collect();

	for (i, r) in records.iter().enumerate() {
		if r.embedding.len() != vector_dim {
			return Err(EngineError::DimensionMismatch(PathBuf::new(), vector_dim, r.embedding.len()).into_with_index(i));
		}
	}

	let mut flattened = Vec::with_capacity(records.len() * vector_dim);
	for r in records {
		flattened.extend_from_slice(&r.embedding);
	}
	let embedding_array = FixedSizeListArray::new(
		Arc::new(Field::new("item", DataType::Float32, true)),
		vector_dim as i32,
		Arc::new(Float32Array::from(flattened)),
		None,
	);

	RecordBatch::try_new(
		schema(vector_dim),
		vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(files)),
			Arc::new(StringArray::from(kinds)),
			Arc::new(StringArray::from(names)),
			Arc::new(UInt32Array::from(start_lines)),
			Arc::new(UInt32Array::from(end_lines)),
			Arc::new(StringArray::from(contents)),
			Arc::new(embedding_array),
		],
	)
	.map_err(|e| EngineError::Corrupt(PathBuf::new(), e.to_string()))
}

// Small helper so the dimension-mismatch error can report the attempted
// index without threading a path through `records_to_batch`.
trait WithIndex {
	fn into_with_index(self, index: usize) -> EngineError;
}
impl WithIndex for EngineError {
	fn into_with_index(self, index: usize) -> EngineError {
		match self {
			EngineError::DimensionMismatch(_, have, want) => {
				EngineError::DimensionMismatch(PathBuf::from(format!("record[{index}]")), have, want)
			}
			other => other,
		}
	}
}

/// Vector store over a single LanceDB table. Holds an exclusive file
/// lock for its lifetime; `close` (or `Drop`) releases it.
pub struct VectorStore {
	db: Connection,
	vector_dim: usize,
	index_dir: PathBuf,
	_lock: std::fs::File,
}

impl VectorStore {
	/// Open (creating if absent) the store under `index_dir/vectors`,
	/// acquiring `index_dir/LOCK` exclusively first.
	pub fn open(index_dir: &Path, vector_dim: usize) -> Result<Self> {
		std::fs::create_dir_all(index_dir)
			.map_err(|e| EngineError::IOError(index_dir.to_path_buf(), e.to_string()))?;

		let lock_path = index_dir.join(LOCK_FILE);
		let lock = OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(false)
			.open(&lock_path)
			.map_err(|_| EngineError::Locked(index_dir.to_path_buf()))?;
		lock_file_exclusive(&lock, index_dir)?;

		let vectors_path = index_dir.join(crate::constants::VECTORS_DIR);
		let vectors_path_str = vectors_path.to_string_lossy().to_string();

		let db = futures::executor::block_on(async { connect(&vectors_path_str).execute().await })
			.map_err(|e| EngineError::Corrupt(index_dir.to_path_buf(), e.to_string()))?;

		let store = Self {
			db,
			vector_dim,
			index_dir: index_dir.to_path_buf(),
			_lock: lock,
		};
		store.ensure_table()?;
		store.check_dimension()?;
		Ok(store)
	}

	fn ensure_table(&self) -> Result<()> {
		futures::executor::block_on(async {
			let names = self
				.db
				.table_names()
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			if !names.contains(&TABLE_NAME.to_string()) {
				self.db
					.create_empty_table(TABLE_NAME, schema(self.vector_dim))
					.execute()
					.await
					.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			}
			Ok(())
		})
	}

	fn check_dimension(&self) -> Result<()> {
		futures::executor::block_on(async {
			let table = self
				.db
				.open_table(TABLE_NAME)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			let schema = table
				.schema()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			if let Ok(field) = schema.field_with_name("embedding") {
				if let DataType::FixedSizeList(_, size) = field.data_type() {
					if *size as usize != self.vector_dim {
						return Err(EngineError::DimensionMismatch(
							self.index_dir.clone(),
							*size as usize,
							self.vector_dim,
						));
					}
				}
			}
			Ok(())
		})
	}

	/// Insert or replace `records` by id.
	pub fn set(&self, records: &[VectorRecord]) -> Result<()> {
		if records.is_empty() {
			return Ok(());
		}
		let batch = records_to_batch(records, self.vector_dim)?;
		futures::executor::block_on(async {
			let table = self
				.db
				.open_table(TABLE_NAME)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			let ids: Vec<String> = records.iter().map(|r| format!("'{}'", r.id.as_str())).collect();
			table
				.delete(&format!("id IN ({})", ids.join(", ")))
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;

			let schema = batch.schema();
			let reader =
				arrow::record_batch::RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
			table
				.add(reader)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			Ok(())
		})
	}

	/// Delete every record whose id is in `ids`.
	pub fn delete(&self, ids: &[BlockId]) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}
		futures::executor::block_on(async {
			let table = self
				.db
				.open_table(TABLE_NAME)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			let list: Vec<String> = ids.iter().map(|id| format!("'{}'", id.as_str())).collect();
			table
				.delete(&format!("id IN ({})", list.join(", ")))
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			Ok(())
		})
	}

	/// Fetch one record by id, if present.
	pub fn get(&self, id: &BlockId) -> Result<Option<VectorRecord>> {
		futures::executor::block_on(async {
			let table = self
				.db
				.open_table(TABLE_NAME)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			let mut stream = table
				.query()
				.only_if(format!("id = '{}'", id.as_str()))
				.limit(1)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;

			while let Some(batch) = stream
				.try_next()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?
			{
				if batch.num_rows() > 0 {
					return Ok(row_to_record(&batch, 0, true));
				}
			}
			Ok(None)
		})
	}

	/// Cosine k-NN search over `embedding`, optionally scoped to a file
	/// path prefix (e.g. a search subtree, already relative to the root).
	pub fn search(&self, embedding: &[f32], limit: usize, path_prefix: Option<&str>) -> Result<Vec<ScoredRecord>> {
		if embedding.len() != self.vector_dim {
			return Err(EngineError::DimensionMismatch(
				self.index_dir.clone(),
				self.vector_dim,
				embedding.len(),
			));
		}

		futures::executor::block_on(async {
			let table = self
				.db
				.open_table(TABLE_NAME)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;

			let mut query = table
				.vector_search(embedding.to_vec())
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?
				.distance_type(DistanceType::Cosine)
				.limit(limit);

			if let Some(prefix) = path_prefix {
				query = query.only_if(format!("file LIKE '{prefix}%'"));
			}

			let mut stream = query
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;

			let mut results = Vec::new();
			while let Some(batch) = stream
				.try_next()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?
			{
				let distance_col = batch
					.column_by_name("_distance")
					.and_then(|c| c.as_any().downcast_ref::<Float32Array>());
				for row in 0..batch.num_rows() {
					if let Some(record) = row_to_record(&batch, row, false) {
						let distance = distance_col.map(|c| c.value(row)).unwrap_or(0.0);
						results.push(ScoredRecord {
							id: record.id,
							file: record.file,
							block: record.block,
							distance,
						});
					}
				}
			}

			results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
			Ok(results)
		})
	}

	pub fn count(&self) -> Result<usize> {
		futures::executor::block_on(async {
			let table = self
				.db
				.open_table(TABLE_NAME)
				.execute()
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))?;
			table
				.count_rows(None)
				.await
				.map_err(|e| EngineError::Corrupt(self.index_dir.clone(), e.to_string()))
		})
	}

	pub fn close(self) -> Result<()> {
		let lock_path = self.index_dir.join(LOCK_FILE);
		drop(self);
		let _ = std::fs::remove_file(lock_path);
		Ok(())
	}
}

impl Drop for VectorStore {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(self.index_dir.join(LOCK_FILE));
	}
}

#[cfg(unix)]
fn lock_file_exclusive(file: &std::fs::File, index_dir: &Path) -> Result<()> {
	use std::os::fd::AsRawFd;
	let fd = file.as_raw_fd();
	// SAFETY: fd is a valid, open file descriptor for the lifetime of this call.
	let result = unsafe { libc_flock(fd, 2 | 4) }; // LOCK_EX | LOCK_NB
	if result != 0 {
		return Err(EngineError::Locked(index_dir.to_path_buf()));
	}
	Ok(())
}

#[cfg(not(unix))]
fn lock_file_exclusive(_file: &std::fs::File, _index_dir: &Path) -> Result<()> {
	Ok(())
}

#[cfg(unix)]
extern "C" {
	#[link_name = "flock"]
	fn libc_flock(fd: i32, operation: i32) -> i32;
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	fn record(id: &str, file: &str, dim: usize) -> VectorRecord {
		VectorRecord {
			id: BlockId(id.to_string()),
			file: file.to_string(),
			block: Block {
				kind: BlockKind::Function,
				name: Some("f".to_string()),
				start_line: 0,
				end_line: 1,
				content: "fn f() {}".to_string(),
			},
			embedding: vec![0.1; dim],
		}
	}

	#[test]
	fn open_creates_table_and_lock_file() {
		let dir = tempdir().unwrap();
		let store = VectorStore::open(dir.path(), 4).unwrap();
		assert_eq!(store.count().unwrap(), 0);
		assert!(dir.path().join(LOCK_FILE).exists());
	}

	#[test]
	fn set_then_search_roundtrips() {
		let dir = tempdir().unwrap();
		let store = VectorStore::open(dir.path(), 4).unwrap();
		store.set(&[record("a.rs:1:f", "a.rs", 4)]).unwrap();
		assert_eq!(store.count().unwrap(), 1);

		let hits = store.search(&[0.1, 0.1, 0.1, 0.1], 5, None).unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].id.as_str(), "a.rs:1:f");
	}

	#[test]
	fn dimension_mismatch_on_search_is_rejected() {
		let dir = tempdir().unwrap();
		let store = VectorStore::open(dir.path(), 4).unwrap();
		let err = store.search(&[0.1, 0.1], 5, None).unwrap_err();
		assert!(matches!(err, EngineError::DimensionMismatch(_, _, _)));
	}

	#[test]
	fn delete_removes_record() {
		let dir = tempdir().unwrap();
		let store = VectorStore::open(dir.path(), 4).unwrap();
		store.set(&[record("a.rs:1:f", "a.rs", 4)]).unwrap();
		store.delete(&[BlockId("a.rs:1:f".to_string())]).unwrap();
		assert_eq!(store.count().unwrap(), 0);
	}

	#[test]
	fn opening_twice_from_same_process_with_separate_handles_fails() {
		let dir = tempdir().unwrap();
		let _first = VectorStore::open(dir.path(), 4).unwrap();
		let second = VectorStore::open(dir.path(), 4);
		assert!(second.is_err());
	}
}
