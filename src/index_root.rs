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

//! Locating index roots: walking up to find an existing index, and
//! walking down to find indexes nested under a subtree (spec §4.7, §6).

use std::path::{Path, PathBuf};

use crate::constants::{INDEX_DIR, MANIFEST_FILE};

fn manifest_exists_at(dir: &Path) -> bool {
	dir.join(INDEX_DIR).join(MANIFEST_FILE).exists()
}

/// Walk up from `search_path` looking for an existing index. Returns
/// `(index_root, existing_index_dir)`: if none is found, `index_root` is
/// `search_path` itself (where a new index would be created) and the
/// second element is `None`.
pub fn find_index_root(search_path: &Path) -> (PathBuf, Option<PathBuf>) {
	let search_path = search_path
		.canonicalize()
		.unwrap_or_else(|_| search_path.to_path_buf());

	let mut current = search_path.as_path();
	loop {
		if manifest_exists_at(current) {
			return (current.to_path_buf(), Some(current.join(INDEX_DIR)));
		}
		match current.parent() {
			Some(parent) => current = parent,
			None => break,
		}
	}

	(search_path, None)
}

/// Find a parent directory (strictly above `path`) with an existing
/// index. Returns `None` if no ancestor has one.
pub fn find_parent_index(path: &Path) -> Option<PathBuf> {
	let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
	let mut current = path.parent()?;
	loop {
		if manifest_exists_at(current) {
			return Some(current.to_path_buf());
		}
		current = current.parent()?;
	}
}

/// Find every `.hhg/` directory nested in a subdirectory of `path`
/// (never `path` itself), skipping hidden directories and never
/// descending into a found `.hhg/`.
pub fn find_subdir_indexes(path: &Path) -> Vec<PathBuf> {
	let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
	let mut indexes = Vec::new();
	walk_for_indexes(&path, &path, &mut indexes);
	indexes
}

fn walk_for_indexes(root: &Path, dir: &Path, indexes: &mut Vec<PathBuf>) {
	let Ok(entries) = std::fs::read_dir(dir) else {
		return;
	};

	for entry in entries.flatten() {
		let entry_path = entry.path();
		let Ok(file_type) = entry.file_type() else {
			continue;
		};
		if !file_type.is_dir() {
			continue;
		}
		let name = entry.file_name();
		let name = name.to_string_lossy();

		if name == INDEX_DIR {
			if dir != root && manifest_exists_at(dir) {
				indexes.push(dir.join(INDEX_DIR));
			}
			continue;
		}
		if name.starts_with('.') {
			continue;
		}
		walk_for_indexes(root, &entry_path, indexes);
	}

	if dir != root && manifest_exists_at(dir) && !indexes.contains(&dir.join(INDEX_DIR)) {
		indexes.push(dir.join(INDEX_DIR));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::tempdir;

	fn make_index(dir: &Path) {
		let index_dir = dir.join(INDEX_DIR);
		fs::create_dir_all(&index_dir).unwrap();
		fs::write(index_dir.join(MANIFEST_FILE), "{}").unwrap();
	}

	#[test]
	fn find_index_root_returns_search_path_when_none_exists() {
		let dir = tempdir().unwrap();
		let (root, existing) = find_index_root(dir.path());
		assert_eq!(root, dir.path().canonicalize().unwrap());
		assert!(existing.is_none());
	}

	#[test]
	fn find_index_root_walks_up_to_existing_index() {
		let dir = tempdir().unwrap();
		make_index(dir.path());
		let child = dir.path().join("a/b/c");
		fs::create_dir_all(&child).unwrap();

		let (root, existing) = find_index_root(&child);
		assert_eq!(root, dir.path().canonicalize().unwrap());
		assert!(existing.is_some());
	}

	#[test]
	fn find_parent_index_excludes_self() {
		let dir = tempdir().unwrap();
		make_index(dir.path());
		assert!(find_parent_index(dir.path()).is_some());

		let child = dir.path().join("sub");
		fs::create_dir_all(&child).unwrap();
		assert_eq!(
			find_parent_index(&child).unwrap(),
			dir.path().canonicalize().unwrap()
		);
	}

	#[test]
	fn find_subdir_indexes_finds_nested_and_skips_hidden() {
		let dir = tempdir().unwrap();
		let sub1 = dir.path().join("crates/a");
		let sub2 = dir.path().join(".hidden/b");
		fs::create_dir_all(&sub1).unwrap();
		fs::create_dir_all(&sub2).unwrap();
		make_index(&sub1);
		make_index(&sub2);

		let found = find_subdir_indexes(dir.path());
		assert_eq!(found.len(), 1);
		assert!(found[0].starts_with(dir.path().canonicalize().unwrap().join("crates")));
	}

	#[test]
	fn find_subdir_indexes_does_not_descend_into_found_index() {
		let dir = tempdir().unwrap();
		let sub = dir.path().join("crates/a");
		fs::create_dir_all(&sub).unwrap();
		make_index(&sub);
		// Plant a bogus nested .hhg to prove we don't descend into it.
		fs::create_dir_all(sub.join(INDEX_DIR).join("nested").join(INDEX_DIR)).unwrap();

		let found = find_subdir_indexes(dir.path());
		assert_eq!(found.len(), 1);
	}
}
