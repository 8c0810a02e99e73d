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

use std::path::PathBuf;

use clap::Args;
use hhg::engine::IndexEngine;
use hhg::error::{ExitKind, Result};

#[derive(Debug, Args)]
pub struct BuildArgs {
	/// Root directory to index (defaults to the current directory)
	#[arg(default_value = ".")]
	pub path: PathBuf,
}

pub fn execute(args: &BuildArgs) -> Result<ExitKind> {
	let engine = IndexEngine::open(&args.path)?;
	let stats = engine.build()?;
	tracing::info!(
		files = stats.files_added,
		blocks = stats.blocks_indexed,
		"build complete"
	);
	println!(
		"indexed {} files, {} blocks",
		stats.files_added, stats.blocks_indexed
	);
	Ok(ExitKind::Match)
}
