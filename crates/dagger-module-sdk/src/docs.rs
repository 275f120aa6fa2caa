//! Documentation index for module declarations
//!
//! Doc text can be attached to declarations directly or shipped as a JSON
//! file mapping dotted keys to text:
//!
//! ```json
//! {
//!   "Test": "A test module. Longer text follows.",
//!   "Test.hello": "Say hello.",
//!   "Test.hello.name": "Who to greet."
//! }
//! ```
//!
//! Keys use native names: `Type`, `Type.member` for functions and fields,
//! `Type.function.param` for parameters and `Enum.MEMBER` for enum members.

use crate::error::DocsError;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocIndex {
    entries: HashMap<String, String>,
}

impl DocIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, DocsError> {
        let entries: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Load an index from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DocsError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_json_str(&content)?;
        debug!(path = %path.display(), entries = index.len(), "Loaded doc index");
        Ok(index)
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(key.into(), text.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// First sentence of the entry under `key`.
    pub fn summary(&self, key: &str) -> Option<String> {
        self.get(key).and_then(first_sentence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The first sentence of a doc text, with line breaks folded into spaces.
///
/// A sentence ends at a period followed by a space and a capitalised word,
/// or at a blank line. Abbreviations such as "e.g." do not end it.
pub fn first_sentence(text: &str) -> Option<String> {
    let paragraph = text.trim().split("\n\n").next().unwrap_or_default();
    let folded = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
    if folded.is_empty() {
        return None;
    }

    let end = folded.match_indices(". ").map(|(i, _)| i).find(|&i| {
        folded[i + 2..]
            .chars()
            .next()
            .is_some_and(char::is_uppercase)
    });
    let sentence = match end {
        Some(end) => &folded[..=end],
        None => folded.as_str(),
    };
    Some(sentence.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case("Say hello. Then leave.", Some("Say hello."))]
    #[case("Say hello", Some("Say hello"))]
    #[case("  Spans\n  two lines. Second.", Some("Spans two lines."))]
    #[case("Version 1.2 is current", Some("Version 1.2 is current"))]
    #[case("Build e.g. a container. Then push.", Some("Build e.g. a container."))]
    #[case("First paragraph\n\nSecond paragraph.", Some("First paragraph"))]
    #[case("   ", None)]
    fn test_first_sentence(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(first_sentence(text).as_deref(), expected);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Test": "A test module. More.", "Test.hello.name": "Who to greet."}}"#
        )
        .unwrap();

        let index = DocIndex::load(file.path()).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.summary("Test").as_deref(), Some("A test module."));
        assert_eq!(index.get("Test.hello.name"), Some("Who to greet."));
        assert_eq!(index.get("Test.hello"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocIndex::load(&dir.path().join("docs.json")).unwrap_err();
        assert!(matches!(err, DocsError::Io { .. }));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            DocIndex::from_json_str("[1, 2]"),
            Err(DocsError::Parse(_))
        ));
    }
}
