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

//! Engine-boundary error kinds (spec §7).

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	/// No manifest at or above the search root, and auto-build is disabled.
	#[error("no index found at or above {0}; run build first")]
	NotFound(PathBuf),

	/// Another process holds the store's file lock.
	#[error("index at {0} is locked by another process")]
	Locked(PathBuf),

	/// Manifest failed to parse, or the store refused to open.
	#[error("index at {0} is corrupt: {1}")]
	Corrupt(PathBuf, String),

	/// Store was opened against a different embedding dimension than it holds.
	#[error("dimension mismatch at {0}: store has {1}, requested {2}")]
	DimensionMismatch(PathBuf, usize, usize),

	/// Parser/query crashed for one file; non-fatal to the surrounding operation.
	#[error("extraction failed for {0}: {1}")]
	ExtractionFailed(PathBuf, String),

	/// NaN after per-item retry, or inference provider exception; fatal for the update.
	#[error("embedding failed for batch starting at {0}: {1}")]
	EmbeddingFailed(usize, String),

	/// Scanner or grep regex failed to compile.
	#[error("invalid regex: {0}")]
	InvalidRegex(String),

	/// File read/write failure.
	#[error("io error at {0}: {1}")]
	IOError(PathBuf, String),
}

impl EngineError {
	/// Exit-style classification used by CLI front ends (spec §7: match / no-match / error).
	pub fn exit_kind(&self) -> ExitKind {
		match self {
			EngineError::NotFound(_) => ExitKind::NoMatch,
			_ => ExitKind::Error,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
	Match,
	NoMatch,
	Error,
}
