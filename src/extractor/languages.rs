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

//! Closed ext -> (grammar, query) table for structural extraction.
//!
//! Trimmed to the grammars actually carried in the dependency tree —
//! elixir/java/kotlin/lua/swift/toml/yaml/zig/mojo/csharp are not
//! represented here for lack of a grammar crate.

use tree_sitter::Language;

/// Grammar + capture query for one file extension.
pub struct LanguageSpec {
	pub ext: &'static str,
	pub lang_name: &'static str,
	pub language: fn() -> Language,
	pub query: &'static str,
}

const RUST_QUERY: &str = r#"
    (function_item) @function
    (impl_item) @class
    (struct_item) @class
    (trait_item) @class
    (enum_item) @class
"#;

const PYTHON_QUERY: &str = r#"
    (function_definition) @function
    (class_definition) @class
"#;

const JAVASCRIPT_QUERY: &str = r#"
    (function_declaration) @function
    (class_declaration) @class
    (arrow_function) @function
"#;

const TYPESCRIPT_QUERY: &str = r#"
    (function_declaration) @function
    (class_declaration) @class
    (interface_declaration) @class
    (arrow_function) @function
"#;

const GO_QUERY: &str = r#"
    (function_declaration) @function
    (method_declaration) @function
    (type_declaration) @class
"#;

const CPP_QUERY: &str = r#"
    (function_definition) @function
    (class_specifier) @class
    (struct_specifier) @class
"#;

const BASH_QUERY: &str = "(function_definition) @function";

const RUBY_QUERY: &str = r#"
    (method) @function
    (singleton_method) @function
    (class) @class
    (module) @class
"#;

const PHP_QUERY: &str = r#"
    (function_definition) @function
    (method_declaration) @function
    (class_declaration) @class
    (interface_declaration) @class
    (trait_declaration) @class
"#;

const JSON_QUERY: &str = "(pair) @item";

const CSS_QUERY: &str = "(rule_set) @item";

const SVELTE_QUERY: &str = "(script_element) @class";

fn rust_language() -> Language {
	tree_sitter_rust::LANGUAGE.into()
}
fn python_language() -> Language {
	tree_sitter_python::LANGUAGE.into()
}
fn javascript_language() -> Language {
	tree_sitter_javascript::LANGUAGE.into()
}
fn typescript_language() -> Language {
	tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
}
fn tsx_language() -> Language {
	tree_sitter_typescript::LANGUAGE_TSX.into()
}
fn go_language() -> Language {
	tree_sitter_go::LANGUAGE.into()
}
fn cpp_language() -> Language {
	tree_sitter_cpp::LANGUAGE.into()
}
fn bash_language() -> Language {
	tree_sitter_bash::LANGUAGE.into()
}
fn ruby_language() -> Language {
	tree_sitter_ruby::LANGUAGE.into()
}
fn php_language() -> Language {
	tree_sitter_php::LANGUAGE_PHP.into()
}
fn json_language() -> Language {
	tree_sitter_json::LANGUAGE.into()
}
fn css_language() -> Language {
	tree_sitter_css::LANGUAGE.into()
}
fn svelte_language() -> Language {
	tree_sitter_svelte_ng::LANGUAGE.into()
}

const TABLE: &[LanguageSpec] = &[
	LanguageSpec { ext: "rs", lang_name: "rust", language: rust_language, query: RUST_QUERY },
	LanguageSpec { ext: "py", lang_name: "python", language: python_language, query: PYTHON_QUERY },
	LanguageSpec {
		ext: "js",
		lang_name: "javascript",
		language: javascript_language,
		query: JAVASCRIPT_QUERY,
	},
	LanguageSpec {
		ext: "jsx",
		lang_name: "javascript",
		language: javascript_language,
		query: JAVASCRIPT_QUERY,
	},
	LanguageSpec {
		ext: "ts",
		lang_name: "typescript",
		language: typescript_language,
		query: TYPESCRIPT_QUERY,
	},
	LanguageSpec { ext: "tsx", lang_name: "typescript", language: tsx_language, query: TYPESCRIPT_QUERY },
	LanguageSpec { ext: "go", lang_name: "go", language: go_language, query: GO_QUERY },
	LanguageSpec { ext: "c", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "cc", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "cpp", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "cxx", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "h", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "hh", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "hpp", lang_name: "cpp", language: cpp_language, query: CPP_QUERY },
	LanguageSpec { ext: "sh", lang_name: "bash", language: bash_language, query: BASH_QUERY },
	LanguageSpec { ext: "bash", lang_name: "bash", language: bash_language, query: BASH_QUERY },
	LanguageSpec { ext: "zsh", lang_name: "bash", language: bash_language, query: BASH_QUERY },
	LanguageSpec { ext: "rb", lang_name: "ruby", language: ruby_language, query: RUBY_QUERY },
	LanguageSpec { ext: "php", lang_name: "php", language: php_language, query: PHP_QUERY },
	LanguageSpec { ext: "json", lang_name: "json", language: json_language, query: JSON_QUERY },
	LanguageSpec { ext: "css", lang_name: "css", language: css_language, query: CSS_QUERY },
	LanguageSpec {
		ext: "svelte",
		lang_name: "svelte",
		language: svelte_language,
		query: SVELTE_QUERY,
	},
];

/// Look up the grammar/query pair for a lowercased, dot-free extension.
pub fn lookup(ext: &str) -> Option<&'static LanguageSpec> {
	TABLE.iter().find(|spec| spec.ext == ext)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn looks_up_known_extensions() {
		assert!(lookup("rs").is_some());
		assert!(lookup("py").is_some());
		assert!(lookup("tsx").is_some());
	}

	#[test]
	fn unknown_extension_returns_none() {
		assert!(lookup("elixir_is_not_here").is_none());
		assert!(lookup("ex").is_none());
	}

	#[test]
	fn every_spec_compiles_its_query() {
		for spec in TABLE {
			let language = (spec.language)();
			let query = tree_sitter::Query::new(&language, spec.query);
			assert!(query.is_ok(), "query for {} failed: {:?}", spec.ext, query.err());
		}
	}
}
