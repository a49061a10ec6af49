//! Decoders that turn one stage's raw text into a typed artifact.
//!
//! - free text: trimmed, with a fallback sentinel when empty
//! - line list: one trimmed, non-empty entry per line
//! - JSON object: a single JSON document, fatal for the stage on failure
//! - file map: `---FILENAME---` records of path + body, with wrapper noise
//!   (code fences, triple quotes) stripped from each body

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerateError;
use crate::stage::{FILE_MARKER, ResultKind, Stage};

/// Generic sentinel for an empty free-text result.
pub const NO_OUTPUT: &str = "no output generated";

/// A whole line that opens a wrapper: a code fence or triple quote,
/// optionally followed by a language tag.
static OPENING_WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:```|"""|''')[\w.+#-]*$"#).expect("static regex")
});

const CLOSING_WRAPPERS: [&str; 3] = ["```", "\"\"\"", "'''"];

/// A decoded stage result.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Text(String),
    Lines(Vec<String>),
    Json(Value),
    Files(FileMap),
}

/// Decode `raw` with the decoder selected by the stage's kind.
pub fn decode_stage(stage: Stage, raw: &str) -> Result<Artifact, GenerateError> {
    Ok(match stage.kind() {
        ResultKind::FreeText => Artifact::Text(decode_text(raw, stage.fallback())),
        ResultKind::LineList => Artifact::Lines(decode_lines(raw)),
        ResultKind::JsonObject => Artifact::Json(decode_json(stage, raw)?),
        ResultKind::FileMap => Artifact::Files(decode_files(raw)),
    })
}

pub fn decode_text(raw: &str, fallback: &str) -> String {
    let text = raw.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

pub fn decode_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a single JSON object. `source` names the stage in the error.
pub fn decode_json(source: impl std::fmt::Display, raw: &str) -> Result<Value, GenerateError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| GenerateError::malformed(&source, e))?;
    if !value.is_object() {
        return Err(GenerateError::malformed(source, "expected a JSON object"));
    }
    Ok(value)
}

/// One file record recovered from the source-files stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    pub path: String,
    pub content: String,
}

impl FileArtifact {
    /// Parse one marker-delimited segment. `None` when path or body is empty.
    pub fn parse(segment: &str) -> Option<Self> {
        let segment = segment.trim();
        let (path, body) = segment.split_once('\n').unwrap_or((segment, ""));
        let path = path.trim();
        let content = strip_wrappers(body);
        if path.is_empty() || content.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_string(),
            content: content.to_string(),
        })
    }
}

/// Ordered mapping of file path to file content.
///
/// Order follows first appearance in the generated text; a repeated path
/// keeps its first position but takes the later content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMap(IndexMap<String, String>);

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file; a later write to the same path replaces the content.
    pub fn insert(&mut self, file: FileArtifact) {
        self.0.insert(file.path, file.content);
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Render back into marker-delimited text that [`decode_files`] accepts.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, content) in self.iter() {
            out.push_str(FILE_MARKER);
            out.push('\n');
            out.push_str(path);
            out.push('\n');
            out.push_str(content);
            out.push('\n');
        }
        out
    }
}

pub fn decode_files(raw: &str) -> FileMap {
    let mut files = FileMap::new();
    for segment in raw.split(FILE_MARKER) {
        if segment.trim().is_empty() {
            continue;
        }
        match FileArtifact::parse(segment) {
            Some(file) => {
                if files.get(&file.path).is_some() {
                    tracing::debug!(path = %file.path, "Duplicate file path, keeping later content");
                }
                files.insert(file);
            }
            None => tracing::debug!("Dropping file segment with empty path or body"),
        }
    }
    files
}

/// Strip wrapper lines from the start and end of a body until none remain.
///
/// Only whole lines are considered, so delimiter text inside code is left
/// alone. Unbalanced or nested wrappers are stripped as far as they go.
fn strip_wrappers(body: &str) -> &str {
    let mut body = body.trim();
    loop {
        let before = body.len();

        let (first, rest) = body.split_once('\n').unwrap_or((body, ""));
        if OPENING_WRAPPER.is_match(first.trim()) {
            body = rest.trim();
        }

        let (init, last) = body.rsplit_once('\n').unwrap_or(("", body));
        if CLOSING_WRAPPERS.contains(&last.trim()) {
            body = init.trim();
        }

        if body.len() == before {
            return body;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_trimmed_or_replaced() {
        assert_eq!(decode_text("  tree/\n", NO_OUTPUT), "tree/");
        assert_eq!(decode_text(" \n\t", "fallback"), "fallback");
    }

    #[test]
    fn lines_drop_blanks_and_trim() {
        assert_eq!(decode_lines("a\n\nb \n"), vec!["a", "b"]);
        assert_eq!(decode_lines("  1. npm i\r\n2. npm start"), vec!["1. npm i", "2. npm start"]);
        assert!(decode_lines("\n \n").is_empty());
    }

    #[test]
    fn json_must_be_an_object() {
        let value = decode_json("stacks", r#" {"stacks": []} "#).unwrap();
        assert!(value["stacks"].is_array());

        assert!(matches!(
            decode_json("stacks", "not json"),
            Err(GenerateError::MalformedResponse { .. })
        ));
        assert!(matches!(
            decode_json("stacks", "[1,2]"),
            Err(GenerateError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn later_duplicate_wins_and_fence_is_stripped() {
        let raw = "---FILENAME---\nsrc/a.ts\n```ts\nconst x=1;\n```\n---FILENAME---\nsrc/a.ts\nconst x=2;";
        let files = decode_files(raw);
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("src/a.ts"), Some("const x=2;"));
    }

    #[test]
    fn whitespace_only_body_is_dropped() {
        let raw = "---FILENAME---\nsrc/empty.rs\n   \n\t\n---FILENAME---\nsrc/main.rs\nfn main() {}\n";
        let files = decode_files(raw);
        assert_eq!(files.len(), 1);
        assert!(files.get("src/empty.rs").is_none());
    }

    #[test]
    fn wrapper_only_body_is_dropped() {
        let files = decode_files("---FILENAME---\nREADME.md\n```markdown\n```\n");
        assert!(files.is_empty());
    }

    #[test]
    fn triple_quote_wrappers_are_stripped() {
        let raw = "---FILENAME---\napp.py\n\"\"\"\nprint('hi')\n\"\"\"\n\
                   ---FILENAME---\nutil.py\n'''python\nx = 1\n'''";
        let files = decode_files(raw);
        assert_eq!(files.get("app.py"), Some("print('hi')"));
        assert_eq!(files.get("util.py"), Some("x = 1"));
    }

    #[test]
    fn delimiters_inside_code_are_untouched() {
        let body = "const md = `\n```js\nlet a;\n```\n`;\nexport default md;";
        let raw = format!("---FILENAME---\nsrc/md.js\n{body}\n");
        assert_eq!(decode_files(&raw).get("src/md.js"), Some(body));
    }

    #[test]
    fn nested_and_unbalanced_fences_are_best_effort() {
        let files = decode_files("---FILENAME---\na.rs\n```\n```rust\nfn a() {}\n```\n```");
        assert_eq!(files.get("a.rs"), Some("fn a() {}"));

        let files = decode_files("---FILENAME---\nb.rs\n```rust\nfn b() {}");
        assert_eq!(files.get("b.rs"), Some("fn b() {}"));
    }

    #[test]
    fn preamble_before_first_marker_without_body_is_ignored() {
        let files = decode_files("Here are your files:\n---FILENAME---\nindex.html\n<html></html>");
        assert_eq!(files.len(), 1);
        assert_eq!(files.get("index.html"), Some("<html></html>"));
    }

    #[test]
    fn first_non_empty_line_is_the_path() {
        let files = decode_files("---FILENAME---\n\n  src/lib.rs  \npub fn f() {}\n");
        assert_eq!(files.get("src/lib.rs"), Some("pub fn f() {}"));
    }

    #[test]
    fn file_decoding_is_idempotent() {
        let inputs = [
            "---FILENAME---\nsrc/a.ts\n```ts\nconst x=1;\n```\n---FILENAME---\nsrc/b.ts\n'''\n'''\nlet y;\n'''\n'''",
            "junk\n---FILENAME---\n\n\nsrc/c.py\n\"\"\"\n\"\"\"\n---FILENAME---\nsrc/d.py\n```\n```py\ndef d(): pass\n",
            "---FILENAME---\nx\n```\n---FILENAME------FILENAME---\ny\n  body  \n",
            "",
        ];
        for raw in inputs {
            let once = decode_files(raw);
            let twice = decode_files(&once.render());
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    mod idempotency {
        use super::super::decode_files;
        use proptest::prelude::*;

        const ATOMS: &[&str] = &[
            "---FILENAME---",
            "```",
            "```rust",
            "\"\"\"",
            "'''",
            "\n",
            "\n\n",
            " ",
            "\t",
            "src/main.rs",
            "fn main() {}",
            "let x = 1;",
        ];

        fn raw_text() -> impl Strategy<Value = String> {
            prop::collection::vec(prop::sample::select(ATOMS), 0..48).prop_map(|atoms| atoms.concat())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(512))]
            #[test]
            fn decoding_rendered_files_changes_nothing(raw in raw_text()) {
                let once = decode_files(&raw);
                let twice = decode_files(&once.render());
                prop_assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn order_follows_first_appearance() {
        let raw = "---FILENAME---\nb\n1\n---FILENAME---\na\n2\n---FILENAME---\nb\n3\n";
        let paths: Vec<_> = decode_files(raw).iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["b", "a"]);
    }

    #[test]
    fn stage_decoding_follows_kind() {
        assert_eq!(
            decode_stage(Stage::ReadmeContent, "").unwrap(),
            Artifact::Text("No README generated".to_string())
        );
        assert_eq!(
            decode_stage(Stage::SetupInstructions, "1. a\n\n2. b").unwrap(),
            Artifact::Lines(vec!["1. a".to_string(), "2. b".to_string()])
        );
        assert!(matches!(
            decode_stage(Stage::MainProjectFiles, "---FILENAME---\nf\nx").unwrap(),
            Artifact::Files(files) if files.len() == 1
        ));
    }
}
