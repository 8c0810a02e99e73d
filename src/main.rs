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

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "hhg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Content-addressed incremental code indexing with hybrid search")]
struct HhgArgs {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Build a fresh index from scratch
	Build(commands::BuildArgs),

	/// Incrementally reindex changed and deleted files
	Update(commands::UpdateArgs),

	/// Hybrid semantic + lexical search over an existing index
	Search(commands::SearchArgs),

	/// One-shot structural search with cross-encoder reranking, no index required
	Grep(commands::GrepArgs),

	/// Remove an index entirely
	Clear(commands::ClearArgs),
}

fn init_logging() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

fn main() {
	init_logging();
	let args = HhgArgs::parse();

	let result = match &args.command {
		Commands::Build(a) => commands::build::execute(a),
		Commands::Update(a) => commands::update::execute(a),
		Commands::Search(a) => commands::search::execute(a),
		Commands::Grep(a) => commands::grep::execute(a),
		Commands::Clear(a) => commands::clear::execute(a),
	};

	let exit_kind = match result {
		Ok(kind) => kind,
		Err(err) => {
			tracing::error!(error = %err, "command failed");
			eprintln!("error: {err}");
			err.exit_kind()
		}
	};

	std::process::exit(match exit_kind {
		hhg::error::ExitKind::Match => 0,
		hhg::error::ExitKind::NoMatch => 1,
		hhg::error::ExitKind::Error => 2,
	});
}
