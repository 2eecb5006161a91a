//! warnings generates grammar recommendations.

use crate::analyze;
use crate::optimize;
use crate::syntax;
use crate::tree::{Expr, Grammar};
use std::fmt;

lazy_static::lazy_static! {
    /// BLANK_TEXT_PATTERN matches host-code bodies without content.
    pub static ref BLANK_TEXT_PATTERN: regex::Regex = regex::Regex::new(r"^\s*$").unwrap();

    /// WARNING_DEFAULT_PATH assumes stdin (unimplemented).
    static ref WARNING_DEFAULT_PATH: String = "-".to_string();

    /// CHECKS collects the set of available high level grammar scans.
    pub static ref CHECKS: Vec<Check> = vec![
        check_undefined_rules,
        check_unused_rules,
        check_blank_actions,
        check_blank_predicates,
        check_no_rules,
        check_left_recursion,
    ];
}

/// Check implements a linter scan.
pub type Check = fn(&str, &Grammar) -> Vec<Warning>;

/// Warning models a generator recommendation.
#[derive(Debug, PartialEq)]
pub struct Warning {
    /// path denotes an offending file path.
    pub path: String,

    /// context denotes the relevant grammar fragment, such as a rule
    /// name or an alternative spelling. May be empty.
    pub context: String,

    /// message denotes a brief description of the recommendation.
    pub message: &'static str,
}

impl Warning {
    /// new constructs a Warning.
    pub fn new() -> Warning {
        Warning {
            path: WARNING_DEFAULT_PATH.to_string(),
            context: String::new(),
            message: "",
        }
    }
}

impl Default for Warning {
    /// default generates a basic Warning.
    fn default() -> Self {
        Warning::new()
    }
}

impl fmt::Display for Warning {
    /// fmt renders a Warning for console use.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {}:", self.path)?;

        if !self.context.is_empty() {
            write!(f, " {}:", self.context)?;
        }

        write!(f, " {}", self.message)
    }
}

/// stamp rewrites the path of each warning in place.
pub fn stamp(pth: &str, warnings: &mut [Warning]) {
    for warning in warnings {
        warning.path = pth.to_string();
    }
}

pub static RULE_UNDEFINED: &str = "used but not defined";

/// check_undefined_rules reports references to rules without bodies.
fn check_undefined_rules(pth: &str, grammar: &Grammar) -> Vec<Warning> {
    grammar
        .rules
        .iter()
        .filter(|rule| rule.expression.is_none())
        .map(|rule| Warning {
            path: pth.to_string(),
            context: format!("rule '{}'", rule.name),
            message: RULE_UNDEFINED,
        })
        .collect()
}

#[test]
fn test_undefined_rules() {
    assert!(
        lint("-", "start = missing\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&RULE_UNDEFINED)
    );

    assert!(
        !lint("-", "start = sub\nsub = .\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&RULE_UNDEFINED)
    );
}

pub static RULE_UNUSED: &str = "defined but not used";

/// check_unused_rules reports rules that nothing references.
/// The start rule is exempt.
fn check_unused_rules(pth: &str, grammar: &Grammar) -> Vec<Warning> {
    grammar
        .rules
        .iter()
        .enumerate()
        .filter(|(id, rule)| !rule.used && Some(*id) != grammar.start)
        .map(|(_, rule)| Warning {
            path: pth.to_string(),
            context: format!("rule '{}'", rule.name),
            message: RULE_UNUSED,
        })
        .collect()
}

#[test]
fn test_unused_rules() {
    let found = lint("-", "start = .\nlonely = .\n").unwrap();

    assert_eq!(
        found
            .iter()
            .filter(|warning| warning.message == RULE_UNUSED)
            .map(|warning| warning.context.clone())
            .collect::<Vec<String>>(),
        vec!["rule 'lonely'".to_string()]
    );

    assert!(
        !lint("-", "start = sub\nsub = .\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&RULE_UNUSED)
    );
}

pub static BLANK_ACTION: &str = "blank action never fires any host code";

/// check_blank_actions reports actions without content.
fn check_blank_actions(pth: &str, grammar: &Grammar) -> Vec<Warning> {
    grammar
        .actions
        .iter()
        .filter(|action| BLANK_TEXT_PATTERN.is_match(&action.text))
        .map(|action| Warning {
            path: pth.to_string(),
            context: format!("action '{}'", action.name),
            message: BLANK_ACTION,
        })
        .collect()
}

#[test]
fn test_blank_actions() {
    assert!(
        lint("-", "start = 'a' {}\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&BLANK_ACTION)
    );

    assert!(
        !lint("-", "start = 'a' { done(); }\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&BLANK_ACTION)
    );
}

pub static BLANK_PREDICATE: &str = "blank predicate cannot guard a match";

/// check_blank_predicates reports predicate guards without content.
fn check_blank_predicates(pth: &str, grammar: &Grammar) -> Vec<Warning> {
    let mut found: Vec<Warning> = Vec::new();

    for rule in &grammar.rules {
        if let Some(expression) = &rule.expression {
            expression.visit(&mut |expr| {
                if let Expr::Predicate(text) = expr {
                    if BLANK_TEXT_PATTERN.is_match(text) {
                        found.push(Warning {
                            path: pth.to_string(),
                            context: format!("rule '{}'", rule.name),
                            message: BLANK_PREDICATE,
                        });
                    }
                }
            });
        }
    }

    found
}

#[test]
fn test_blank_predicates() {
    assert!(
        lint("-", "start = 'a' &{ }\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&BLANK_PREDICATE)
    );

    assert!(
        !lint("-", "start = < 'a' > &{ yyleng > 0 }\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&BLANK_PREDICATE)
    );
}

pub static NO_RULES: &str = "no rules defined";

/// check_no_rules reports grammars without any rule.
fn check_no_rules(pth: &str, grammar: &Grammar) -> Vec<Warning> {
    if grammar.rules.is_empty() {
        return vec![Warning {
            path: pth.to_string(),
            context: String::new(),
            message: NO_RULES,
        }];
    }

    Vec::new()
}

#[test]
fn test_no_rules() {
    assert!(
        lint("-", "# nothing here\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&NO_RULES)
    );

    assert!(
        !lint("-", "start = .\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&NO_RULES)
    );
}

pub static LEFT_RECURSION: &str = "possible infinite left recursion";

/// check_left_recursion reports rules reachable from themselves
/// without consuming input.
fn check_left_recursion(pth: &str, grammar: &Grammar) -> Vec<Warning> {
    let mut found = analyze::analyze(grammar);
    stamp(pth, &mut found);
    found
}

#[test]
fn test_left_recursion() {
    assert!(
        lint("-", "start = start 'a' | 'b'\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&LEFT_RECURSION)
    );

    assert!(
        !lint("-", "start = 'a' start | 'b'\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&LEFT_RECURSION)
    );
}

pub static NEVER_MATCHED: &str = "can never be matched";

#[test]
fn test_never_matched() {
    let found = lint("-", "start = \"foo\" | \"foobar\"\n").unwrap();

    assert_eq!(
        found
            .iter()
            .filter(|warning| warning.message == NEVER_MATCHED)
            .map(|warning| warning.context.clone())
            .collect::<Vec<String>>(),
        vec!["\"foobar\"".to_string()]
    );

    assert!(
        !lint("-", "start = \"foobar\" | \"foo\"\n")
            .unwrap()
            .into_iter()
            .map(|warning| warning.message)
            .collect::<Vec<&'static str>>()
            .contains(&NEVER_MATCHED)
    );
}

/// lint parses and optimizes a grammar, reporting every finding
/// without generating any code.
pub fn lint(pth: &str, s: &str) -> Result<Vec<Warning>, String> {
    let document = syntax::parse_grammar(pth, s)?;
    let mut grammar = Grammar::from_document(&document);

    let mut found = optimize::optimize(&mut grammar);
    stamp(pth, &mut found);

    for check in CHECKS.iter() {
        found.extend(check(pth, &grammar));
    }

    Ok(found)
}

#[test]
fn test_lint_rejects_bad_syntax() {
    assert!(lint("-", "start = )\n").is_err());
}

#[test]
fn test_warning_display() {
    let warning = Warning {
        path: "g.peg".to_string(),
        context: "rule 'start'".to_string(),
        message: RULE_UNUSED,
    };

    assert_eq!(
        warning.to_string(),
        "warning: g.peg: rule 'start': defined but not used"
    );

    let warning = Warning {
        path: "g.peg".to_string(),
        context: String::new(),
        message: NO_RULES,
    };

    assert_eq!(warning.to_string(), "warning: g.peg: no rules defined");
}
