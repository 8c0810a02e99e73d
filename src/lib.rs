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

//! hhg — content-addressed incremental code indexing with hybrid
//! semantic + lexical search over a source tree.

pub mod block;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod grep;
pub mod hybrid;
pub mod index_root;
pub mod manifest;
pub mod reranker;
pub mod scanner;
pub mod store;

pub use block::{Block, BlockId, BlockKind, ContentHash};
pub use config::Config;
pub use engine::{IndexEngine, SearchHit, UpdateStats};
pub use error::{EngineError, Result};
pub use grep::GrepReranker;
pub use manifest::Manifest;
