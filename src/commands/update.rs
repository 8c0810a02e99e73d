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
pub struct UpdateArgs {
	/// Root directory whose index should be refreshed (defaults to the current directory)
	#[arg(default_value = ".")]
	pub path: PathBuf,
}

pub fn execute(args: &UpdateArgs) -> Result<ExitKind> {
	let engine = IndexEngine::open(&args.path)?;
	let stats = engine.update()?;
	tracing::info!(
		added = stats.files_added,
		changed = stats.files_changed,
		deleted = stats.files_deleted,
		"update complete"
	);
	println!(
		"+{} ~{} -{} files, {} blocks reindexed",
		stats.files_added, stats.files_changed, stats.files_deleted, stats.blocks_indexed
	);
	Ok(ExitKind::Match)
}
