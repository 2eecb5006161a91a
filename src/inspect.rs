//! inspect generates metadata reports on grammar files.

extern crate serde;
extern crate serde_json;

use self::serde::{Deserialize, Serialize};
use crate::syntax;
use crate::tree::{Expr, Grammar};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path;

lazy_static::lazy_static! {
    /// LOWER_FILE_EXTENSIONS_TO_DIALECTS maps common grammar file
    /// extensions to PEG dialect names.
    pub static ref LOWER_FILE_EXTENSIONS_TO_DIALECTS: HashMap<String, String> = vec![
        ("leg".to_string(), "leg".to_string()),
        ("peg".to_string(), "leg".to_string()),
    ].into_iter().collect::<HashMap<String, String>>();
}

/// Metadata collects information about a file path regarding its
/// candidacy as a PEG grammar.
///
/// Some of the information may be left at a default value, when
/// scanning detects that the file is not a grammar, or when the grammar
/// fails to parse.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Metadata {
    /// path denotes some file path.
    pub path: String,

    /// filename denotes the basename.
    pub filename: String,

    /// is_grammar denotes whether the file path appears to be a PEG
    /// grammar, or some other kind of file.
    pub is_grammar: bool,

    /// dialect denotes the surface dialect implied by the extension.
    pub dialect: String,

    /// rules denotes the number of rules, defined or referenced.
    pub rules: usize,

    /// undefined denotes the number of rules referenced but never
    /// defined.
    pub undefined: usize,

    /// actions denotes the number of semantic actions.
    pub actions: usize,

    /// predicates denotes the number of predicate guards, excluding
    /// capture markers.
    pub predicates: usize,

    /// variables denotes the number of captured slots across all rules.
    pub variables: usize,

    /// start denotes the start rule name, when one exists.
    pub start: String,

    /// is_empty denotes whether the file contains any data or not.
    pub is_empty: bool,

    /// lines denotes the number of LF's in the file.
    pub lines: usize,

    /// has_final_eol denotes whether a final eol has been read from the
    /// file.
    pub has_final_eol: bool,
}

impl Metadata {
    /// new constructs a Metadata point.
    pub fn new() -> Metadata {
        Metadata {
            path: String::new(),
            filename: String::new(),
            is_grammar: false,
            dialect: String::new(),
            rules: 0,
            undefined: 0,
            actions: 0,
            predicates: 0,
            variables: 0,
            start: String::new(),
            is_empty: true,
            lines: 0,
            has_final_eol: false,
        }
    }
}

impl Default for Metadata {
    /// default generates a basic Metadata point.
    fn default() -> Self {
        Metadata::new()
    }
}

impl fmt::Display for Metadata {
    /// fmt renders a Metadata point for console use.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json: String = serde_json::to_string(&self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

/// survey fills the grammar-derived fields of a Metadata point.
pub fn survey(metadata: &mut Metadata, grammar: &Grammar) {
    metadata.rules = grammar.rules.len();
    metadata.undefined = grammar
        .rules
        .iter()
        .filter(|rule| rule.expression.is_none())
        .count();
    metadata.actions = grammar.actions.len();
    metadata.variables = grammar.rules.iter().map(|rule| rule.variables.len()).sum();
    metadata.start = grammar
        .start
        .map(|id| grammar.rules[id].name.clone())
        .unwrap_or_default();

    for rule in &grammar.rules {
        if let Some(expression) = &rule.expression {
            expression.visit(&mut |expr| {
                if let Expr::Predicate(text) = expr {
                    if text != "YY_BEGIN" && text != "YY_END" {
                        metadata.predicates += 1;
                    }
                }
            });
        }
    }
}

/// analyze summarizes high level attributes of a file path, such as
/// whether the file path appears to represent a PEG grammar, and the
/// shape of the grammar inside.
///
/// Certain fields are left with default values, when scanning detects
/// files not suitable for parser generation.
pub fn analyze(pth: &path::Path) -> Result<Metadata, String> {
    let mut metadata: Metadata = Metadata::new();
    metadata.path = pth.display().to_string();

    let filename: String = pth
        .file_name()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    metadata.filename = filename;

    let file_extension: String = pth
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let file_extension_lower: String = file_extension.to_lowercase();

    if let Some(dialect) = LOWER_FILE_EXTENSIONS_TO_DIALECTS.get(&file_extension_lower) {
        metadata.is_grammar = true;
        metadata.dialect = dialect.to_string();
    }

    if !metadata.is_grammar {
        return Ok(metadata);
    }

    let grammar_str: &str = &fs::read_to_string(pth)
        .map_err(|err| format!("error: {}: {}", pth.display(), err))?;

    metadata.is_empty = grammar_str.is_empty();

    if !metadata.is_empty {
        metadata.lines = 1 + grammar_str.matches('\n').count();
        let last_char: char = grammar_str.chars().last().unwrap_or(' ');
        metadata.has_final_eol = last_char == '\n';
    }

    let document = syntax::parse_grammar(&metadata.path, grammar_str)?;
    let grammar = Grammar::from_document(&document);
    survey(&mut metadata, &grammar);

    Ok(metadata)
}

#[test]
fn test_survey() {
    let document = syntax::parse_grammar(
        "-",
        "start = l:item r:item { use(l, r); } &{ guard() }\nitem = < 'a' > { $$ = 0; }\n",
    )
    .unwrap();
    let grammar = Grammar::from_document(&document);

    let mut metadata = Metadata::new();
    survey(&mut metadata, &grammar);

    assert_eq!(metadata.rules, 2);
    assert_eq!(metadata.undefined, 0);
    assert_eq!(metadata.actions, 2);
    assert_eq!(metadata.predicates, 1);
    assert_eq!(metadata.variables, 2);
    assert_eq!(metadata.start, "start");
}

#[test]
fn test_survey_undefined() {
    let document = syntax::parse_grammar("-", "start = missing\n").unwrap();
    let grammar = Grammar::from_document(&document);

    let mut metadata = Metadata::new();
    survey(&mut metadata, &grammar);

    assert_eq!(metadata.rules, 2);
    assert_eq!(metadata.undefined, 1);
}

#[test]
fn test_metadata_json() {
    let metadata = Metadata::new();
    let json = metadata.to_string();

    assert!(json.starts_with('{'));
    assert!(json.contains("\"is_grammar\":false"));

    let back: Metadata = serde_json::from_str(&json).unwrap();
    assert_eq!(back, metadata);
}

#[test]
fn test_analyze_extension_gate() {
    let metadata = analyze(path::Path::new("README.md")).unwrap();

    assert!(!metadata.is_grammar);
    assert_eq!(metadata.dialect, "");
}

#[test]
fn test_analyze_fixture() {
    let metadata = analyze(path::Path::new("fixtures/parse-valid/calc.peg")).unwrap();

    assert!(metadata.is_grammar);
    assert_eq!(metadata.dialect, "leg");
    assert!(!metadata.is_empty);
    assert!(metadata.rules > 0);
    assert!(metadata.has_final_eol);
}
