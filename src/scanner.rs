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

//! Scanner (C1): walks a root, applies ignore rules, returns `path -> text`
//! for eligible files. Treated as a pluggable collaborator (spec §1, §6) —
//! [`FileScanner`] is the seam; [`WalkScanner`] is the default, `ignore`-backed
//! implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::RegexBuilder;

use crate::constants::{BINARY_EXTENSIONS, IGNORED_DIRS, MAX_FILE_SIZE};
use crate::error::{EngineError, Result};

/// A pluggable directory-tree scanner (spec §6 Scanner contract).
pub trait FileScanner {
	/// Returns `absolute_path -> utf8_text` for every eligible file under
	/// `root` whose content matches `pattern` (a regex; `"."` matches
	/// everything and skips compilation).
	fn scan(
		&self,
		root: &Path,
		pattern: &str,
		include_hidden: bool,
	) -> Result<HashMap<PathBuf, String>>;
}

/// Default scanner: `ignore`-crate walk with the denylist and size/binary/
/// hidden filters from spec §6.
pub struct WalkScanner;

impl Default for WalkScanner {
	fn default() -> Self {
		Self
	}
}

impl FileScanner for WalkScanner {
	fn scan(
		&self,
		root: &Path,
		pattern: &str,
		include_hidden: bool,
	) -> Result<HashMap<PathBuf, String>> {
		if !root.exists() {
			return Err(EngineError::IOError(
				root.to_path_buf(),
				"path does not exist".to_string(),
			));
		}
		if !root.is_dir() {
			return Err(EngineError::IOError(
				root.to_path_buf(),
				"path is not a directory".to_string(),
			));
		}

		let match_all = pattern == ".";
		let regex = if match_all {
			None
		} else {
			Some(
				RegexBuilder::new(pattern)
					.case_insensitive(true)
					.build()
					.map_err(|e| EngineError::InvalidRegex(e.to_string()))?,
			)
		};

		let mut builder = ignore::WalkBuilder::new(root);
		builder
			.hidden(!include_hidden)
			.git_ignore(false)
			.git_global(false)
			.git_exclude(false)
			.parents(false)
			.follow_links(false)
			.filter_entry(|entry| {
				if entry.file_type().is_some_and(|ft| ft.is_dir()) {
					let name = entry.file_name().to_string_lossy();
					return !IGNORED_DIRS.contains(&name.as_ref());
				}
				true
			});

		let mut results = HashMap::new();
		for entry in builder.build() {
			let entry = match entry {
				Ok(e) => e,
				Err(_) => continue,
			};
			if !entry.file_type().is_some_and(|ft| ft.is_file()) {
				continue;
			}
			let path = entry.path();
			let Some(filename) = path.file_name().map(|f| f.to_string_lossy().to_string()) else {
				continue;
			};
			if !include_hidden && filename.starts_with('.') {
				continue;
			}
			if filename.ends_with("-lock.json") {
				continue;
			}
			let ext_lower = path
				.extension()
				.map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
				.unwrap_or_default();
			if BINARY_EXTENSIONS.contains(&ext_lower.as_str()) {
				continue;
			}

			let Ok(metadata) = path.metadata() else {
				continue;
			};
			if metadata.len() > MAX_FILE_SIZE {
				continue;
			}

			let Ok(raw) = std::fs::read(path) else {
				continue;
			};
			if raw[..raw.len().min(8192)].contains(&0u8) {
				continue;
			}
			let Ok(content) = String::from_utf8(raw) else {
				continue;
			};

			let matches = match &regex {
				None => true,
				Some(re) => re.is_match(&content),
			};
			if matches {
				results.insert(path.to_path_buf(), content);
			}
		}

		Ok(results)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::tempdir;

	#[test]
	fn skips_ignored_dirs_and_binary_extensions() {
		let dir = tempdir().unwrap();
		fs::create_dir_all(dir.path().join("node_modules")).unwrap();
		fs::write(dir.path().join("node_modules/pkg.js"), "module.exports = 1;").unwrap();
		fs::write(dir.path().join("keep.py"), "def f():\n    pass\n").unwrap();
		fs::write(dir.path().join("image.png"), [0u8, 1, 2, 3]).unwrap();

		let scanner = WalkScanner;
		let results = scanner.scan(dir.path(), ".", false).unwrap();

		let names: Vec<String> = results
			.keys()
			.map(|p| p.file_name().unwrap().to_string_lossy().to_string())
			.collect();
		assert!(names.contains(&"keep.py".to_string()));
		assert!(!names.iter().any(|n| n == "pkg.js"));
		assert!(!names.iter().any(|n| n == "image.png"));
	}

	#[test]
	fn match_all_pattern_skips_regex_compile() {
		let dir = tempdir().unwrap();
		fs::write(dir.path().join("a.txt"), "anything").unwrap();
		let scanner = WalkScanner;
		let results = scanner.scan(dir.path(), ".", false).unwrap();
		assert_eq!(results.len(), 1);
	}

	#[test]
	fn filters_by_content_regex() {
		let dir = tempdir().unwrap();
		fs::write(dir.path().join("a.py"), "def hash_password(): pass").unwrap();
		fs::write(dir.path().join("b.py"), "def other(): pass").unwrap();
		let scanner = WalkScanner;
		let results = scanner.scan(dir.path(), "password", false).unwrap();
		assert_eq!(results.len(), 1);
	}

	#[test]
	fn invalid_regex_errors() {
		let dir = tempdir().unwrap();
		let scanner = WalkScanner;
		let err = scanner.scan(dir.path(), "(unclosed", false).unwrap_err();
		assert!(matches!(err, EngineError::InvalidRegex(_)));
	}
}
