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

//! Application-wide constants

/// Hidden index directory name, under the discovered root.
pub const INDEX_DIR: &str = ".hhg";
/// Manifest file name inside the index directory.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Vector store subdirectory name inside the index directory.
pub const VECTORS_DIR: &str = "vectors";
/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 3;

/// Embedding dimension produced by the bound bi-encoder model.
pub const EMBEDDING_DIM: usize = 384;
/// Max token length the bi-encoder/cross-encoder tokenizer truncates/pads to.
pub const MAX_LENGTH: usize = 512;

/// Prefix prepended to queries before encoding (model's recommended query prefix).
pub const QUERY_PREFIX: &str = "Represent the question for retrieving supporting documents: ";

/// Size of the LRU query-embedding cache.
pub const QUERY_CACHE_SIZE: usize = 128;

/// Target batch size for embedding/reranking inference calls.
pub const DEFAULT_BATCH_SIZE: usize = 32;
/// Width of a token-length bucket used to group similar-length texts before batching.
pub const TOKEN_BUCKET_WIDTH: usize = 50;
/// Rough characters-per-token ratio used to estimate token counts cheaply.
pub const CHARS_PER_TOKEN: usize = 4;

/// Maximum file size the scanner will read (1 MB).
pub const MAX_FILE_SIZE: u64 = 1_000_000;

/// Directory names the scanner always skips.
pub const IGNORED_DIRS: &[&str] = &[
	"node_modules",
	".git",
	"target",
	"build",
	"dist",
	"venv",
	"env",
	".pixi",
	".vscode",
	".idea",
	"__pycache__",
];

/// Binary file extensions the scanner always skips.
pub const BINARY_EXTENSIONS: &[&str] = &[
	".pyc", ".pyo", ".o", ".so", ".dylib", ".dll", ".bin", ".exe", ".a", ".lib", ".zip", ".tar",
	".gz", ".bz2", ".xz", ".7z", ".rar", ".jar", ".war", ".whl", ".pdf", ".doc", ".docx", ".xls",
	".xlsx", ".ppt", ".pptx", ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".webp", ".bmp",
	".tiff", ".mp3", ".mp4", ".wav", ".avi", ".mov", ".mkv", ".db", ".sqlite", ".sqlite3",
	".pickle", ".pkl", ".npy", ".npz", ".onnx", ".pt", ".pth", ".safetensors", ".lock",
];

/// Text/prose extensions handled by the recursive chunker instead of tree-sitter.
pub const TEXT_EXTENSIONS: &[&str] = &[".md", ".mdx", ".markdown", ".txt", ".rst"];

/// Chunking parameters for prose (spec §4.1).
pub const CHUNK_SIZE_TOKENS: usize = 250;
pub const CHUNK_OVERLAP_TOKENS: usize = 30;
pub const MIN_CHUNK_SIZE_TOKENS: usize = 20;

/// Environment variable that opts into auto-building a fresh index when none is found.
pub const AUTO_BUILD_ENV: &str = "HHG_AUTO_BUILD";
/// Environment variable overriding the inference provider's model cache directory.
pub const CACHE_DIR_ENV: &str = "HHG_CACHE_DIR";
