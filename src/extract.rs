//! # Module Extraction
//!
//! Pattern-based extraction of module class definitions and their comments
//! from Python source text.
//!
//! A module is a class statement inheriting from the configured base class
//! (`dspy.Module` by default). Its body runs from the class header up to the
//! next line that starts another `class` statement, at any indentation, or
//! the end of the file. Nested classes therefore end the enclosing body.
//! This is a best-effort slice of the text, not a parse.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Base class that marks a module
pub const DEFAULT_BASE_CLASS: &str = "dspy.Module";

static DEFAULT_PATTERN: LazyLock<ModulePattern> = LazyLock::new(|| {
    ModulePattern::new(DEFAULT_BASE_CLASS).expect("default module pattern is valid")
});

static CLASS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*class\s+(\w+)").expect("class name pattern is valid"));

// `#` comments consume their line, so a `#` before a docstring on the same
// line hides that docstring's opening quotes.
static DOCSTRING_OR_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?ms)#.*?$|"""(.*?)"""|'''(.*?)'''"#).expect("comment pattern is valid")
});

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)#.*?$").expect("line comment pattern is valid"));

/// Matcher for class definitions inheriting from one base class
#[derive(Debug, Clone)]
pub struct ModulePattern {
    base_class: String,
    header: Regex,
    boundary: Regex,
}

impl ModulePattern {
    /// Build a matcher for classes inheriting from `base_class`
    pub fn new(base_class: &str) -> Result<Self> {
        let header = Regex::new(&format!(
            r"class\s+\w+\s*\(\s*{}\s*\):",
            regex::escape(base_class.trim())
        ))
        .map_err(|e| Error::Config(format!("Invalid base class {:?}: {}", base_class, e)))?;
        let boundary = Regex::new(r"\n\s*class\s")
            .map_err(|e| Error::Config(format!("Invalid boundary pattern: {}", e)))?;

        Ok(Self {
            base_class: base_class.trim().to_string(),
            header,
            boundary,
        })
    }

    /// The base class this pattern matches
    pub fn base_class(&self) -> &str {
        &self.base_class
    }

    /// Find every module definition in `code_text`, verbatim and in order
    pub fn find_modules(&self, code_text: &str) -> Vec<String> {
        let mut modules = Vec::new();
        let mut pos = 0;

        while let Some(header) = self.header.find_at(code_text, pos) {
            let end = self
                .boundary
                .find_at(code_text, header.end())
                .map_or(code_text.len(), |m| m.start());
            modules.push(code_text[header.start()..end].to_string());
            pos = end;
        }

        modules
    }
}

impl Default for ModulePattern {
    fn default() -> Self {
        DEFAULT_PATTERN.clone()
    }
}

/// Find every `dspy.Module` definition in `code_text`
pub fn find_modules(code_text: &str) -> Vec<String> {
    DEFAULT_PATTERN.find_modules(code_text)
}

/// Name of the class defined by a module's header
pub fn class_name(module: &str) -> Option<String> {
    CLASS_NAME
        .captures(module)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract comments from a module
///
/// Returns the non-empty docstring bodies in order of appearance, followed
/// by every `#` line comment. A `#` inside a string still counts as a line
/// comment.
pub fn extract_comments(module: &str) -> Vec<String> {
    let docstrings = DOCSTRING_OR_COMMENT.captures_iter(module).flat_map(|caps| {
        [caps.get(1), caps.get(2)]
            .into_iter()
            .flatten()
            .filter(|m| !m.is_empty())
            .map(|m| m.as_str().to_string())
            .collect::<Vec<_>>()
    });

    let inline = LINE_COMMENT
        .find_iter(module)
        .map(|m| m.as_str().to_string());

    docstrings.chain(inline).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"import dspy

class Helper:
    pass

class RAG(dspy.Module):
    """Retrieve then answer."""
    def __init__(self, k=3):
        super().__init__()
        # retriever
        self.retrieve = dspy.Retrieve(k=k)

    def forward(self, q):
        return self.retrieve(q)  # passthrough

class  Summarizer( dspy.Module ):
    '''Summarize text.'''
    pass
"#;

    #[test]
    fn test_find_modules() {
        let modules = find_modules(SOURCE);
        assert_eq!(modules.len(), 2);
        assert!(modules[0].starts_with("class RAG(dspy.Module):\n"));
        assert!(modules[0].ends_with("return self.retrieve(q)  # passthrough"));
        assert_eq!(
            modules[1],
            "class  Summarizer( dspy.Module ):\n    '''Summarize text.'''\n    pass\n"
        );
    }

    #[test]
    fn test_no_modules() {
        assert!(find_modules("class Helper:\n    pass\n").is_empty());
        assert!(find_modules("").is_empty());
    }

    #[test]
    fn test_nested_class_ends_body() {
        let modules =
            find_modules("class Outer(dspy.Module):\n    x = 1\n    class Inner:\n        pass\n    y = 2\n");
        assert_eq!(modules, vec!["class Outer(dspy.Module):\n    x = 1"]);
    }

    #[test]
    fn test_identifier_starting_with_class_does_not_end_body() {
        let modules = find_modules("class A(dspy.Module):\n    pass\nclassify = 1\nclass B(dspy.Module): pass");
        assert_eq!(
            modules,
            vec!["class A(dspy.Module):\n    pass\nclassify = 1", "class B(dspy.Module): pass"]
        );
    }

    #[test]
    fn test_custom_base_class() {
        let pattern = ModulePattern::new("nn.Module").unwrap();
        assert_eq!(pattern.base_class(), "nn.Module");
        let modules = pattern.find_modules("class Net(nn.Module):\n    pass\n\nclass RAG(dspy.Module):\n    pass\n");
        assert_eq!(modules, vec!["class Net(nn.Module):\n    pass"]);
        // the dot is literal
        assert!(pattern.find_modules("class Net(nnXModule):\n").is_empty());
    }

    #[test]
    fn test_class_name() {
        assert_eq!(class_name("class  Summarizer( dspy.Module ):").as_deref(), Some("Summarizer"));
        assert_eq!(class_name("\nclass RAG(dspy.Module):\n").as_deref(), Some("RAG"));
        assert_eq!(class_name("def f(): pass"), None);
    }

    #[test]
    fn test_extract_comments() {
        let modules = find_modules(SOURCE);
        assert_eq!(
            extract_comments(&modules[0]),
            vec!["Retrieve then answer.", "# retriever", "# passthrough"]
        );
        assert_eq!(extract_comments(&modules[1]), vec!["Summarize text."]);
    }

    #[test]
    fn test_extract_comments_edge_cases() {
        let comments =
            extract_comments("# top\n\"\"\"doc # not a comment\"\"\"\n''''''\nx = 1 # tail\n");
        assert_eq!(
            comments,
            vec!["doc # not a comment", "# top", "# not a comment\"\"\"", "# tail"]
        );

        let multiline = extract_comments("\"\"\"first\nline two\"\"\"\n# a\n# b");
        assert_eq!(multiline, vec!["first\nline two", "# a", "# b"]);

        assert!(extract_comments("x = 1\n").is_empty());
    }
}
