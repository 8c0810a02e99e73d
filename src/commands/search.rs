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
pub struct SearchArgs {
	/// The search query
	pub query: String,

	/// Root directory to search from (defaults to the current directory)
	#[arg(short, long, default_value = ".")]
	pub path: PathBuf,

	/// Maximum number of results to return
	#[arg(short = 'k', long, default_value_t = 10)]
	pub limit: usize,

	/// Restrict results to files under this path prefix, relative to the index root
	#[arg(long)]
	pub scope: Option<String>,
}

pub fn execute(args: &SearchArgs) -> Result<ExitKind> {
	let engine = IndexEngine::discover(&args.path)?;
	let hits = engine.search(&args.query, args.limit, args.scope.as_deref())?;

	if hits.is_empty() {
		println!("no matches");
		return Ok(ExitKind::NoMatch);
	}

	for hit in &hits {
		println!(
			"{:.3}  {}:{}-{}  {}",
			hit.score,
			hit.file,
			hit.block.start_line + 1,
			hit.block.end_line + 1,
			hit.block.name_or_anonymous(),
		);
	}
	Ok(ExitKind::Match)
}
