//! analyze computes consumption facts about rule bodies.

use crate::tree::{Expr, Grammar, RuleId};
use crate::warnings::{LEFT_RECURSION, Warning};

/// analyze runs the consumes-input computation over every rule,
/// reporting possible infinite left recursion along the way.
pub fn analyze(grammar: &Grammar) -> Vec<Warning> {
    let mut warnings: Vec<Warning> = Vec::new();
    let mut in_progress = vec![false; grammar.rules.len()];

    for id in 0..grammar.rules.len() {
        rule_consumes(grammar, id, &mut in_progress, &mut warnings);
    }

    warnings
}

/// rule_consumes reports whether a rule always consumes at least one
/// byte on success. A rule re-entered while its own computation is in
/// progress can be reached without consuming input, so the cycle is
/// reported and treated as non-consuming.
pub fn rule_consumes(
    grammar: &Grammar,
    rule: RuleId,
    in_progress: &mut Vec<bool>,
    warnings: &mut Vec<Warning>,
) -> bool {
    if in_progress[rule] {
        warnings.push(Warning {
            context: format!("rule '{}'", grammar.rules[rule].name),
            message: LEFT_RECURSION,
            ..Warning::new()
        });

        return false;
    }

    in_progress[rule] = true;

    let result = match &grammar.rules[rule].expression {
        Some(expression) => consumes(grammar, expression, in_progress, warnings),
        None => false,
    };

    in_progress[rule] = false;
    result
}

/// consumes reports whether a construct always consumes at least one
/// byte on success.
pub fn consumes(
    grammar: &Grammar,
    expr: &Expr,
    in_progress: &mut Vec<bool>,
    warnings: &mut Vec<Warning>,
) -> bool {
    match expr {
        Expr::Dot => true,
        Expr::Character { .. } => true,
        Expr::Class { .. } => true,
        Expr::Table(_) => true,
        Expr::String { raw, .. } => !raw.is_empty(),
        Expr::Action(_) => false,
        Expr::Predicate(_) => false,
        Expr::Name { rule, .. } => rule_consumes(grammar, *rule, in_progress, warnings),
        Expr::Alternate(children) => children
            .iter()
            .all(|child| consumes(grammar, child, in_progress, warnings)),
        Expr::Sequence(children) => children
            .iter()
            .any(|child| consumes(grammar, child, in_progress, warnings)),
        Expr::PeekFor(_) => false,
        Expr::PeekNot(_) => false,
        Expr::Query(_) => false,
        Expr::Star(_) => false,
        Expr::Plus(element) => consumes(grammar, element, in_progress, warnings),
    }
}

#[cfg(test)]
fn consumption(src: &str) -> (bool, Vec<Warning>) {
    let document = crate::syntax::parse_grammar("-", src).unwrap();
    let grammar = Grammar::from_document(&document);
    let mut warnings = Vec::new();
    let mut in_progress = vec![false; grammar.rules.len()];
    let result = rule_consumes(&grammar, grammar.start.unwrap(), &mut in_progress, &mut warnings);
    (result, warnings)
}

#[test]
fn test_consumes_primitives() {
    assert!(consumption("start = .\n").0);
    assert!(consumption("start = 'a'\n").0);
    assert!(consumption("start = [a-z]\n").0);
    assert!(consumption("start = \"ab\"\n").0);
    assert!(!consumption("start = ''\n").0);
    assert!(!consumption("start = { act(); }\n").0);
    assert!(!consumption("start = &{ 1 }\n").0);
}

#[test]
fn test_consumes_compounds() {
    assert!(consumption("start = 'a' | 'b' \"cd\"\n").0);
    assert!(!consumption("start = 'a' | ''\n").0);
    assert!(consumption("start = { pre(); } 'a' { post(); }\n").0);
    assert!(!consumption("start = { pre(); } &{ 1 }\n").0);
}

#[test]
fn test_consumes_repetitions_and_lookahead() {
    assert!(!consumption("start = 'a'?\n").0);
    assert!(!consumption("start = 'a'*\n").0);
    assert!(consumption("start = 'a'+\n").0);
    assert!(!consumption("start = ''+\n").0);
    assert!(!consumption("start = &'a'\n").0);
    assert!(!consumption("start = !'a'\n").0);
}

#[test]
fn test_consumes_names() {
    assert!(consumption("start = sub\nsub = 'a'\n").0);
    assert!(!consumption("start = sub\nsub = 'a'?\n").0);
    assert!(!consumption("start = missing\n").0);
}

#[test]
fn test_left_recursion_warning() {
    let (result, warnings) = consumption("start = start 'a'\n");

    assert!(result);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context, "rule 'start'");
    assert_eq!(warnings[0].message, LEFT_RECURSION);
}

#[test]
fn test_mutual_recursion_warning() {
    let (_, warnings) = consumption("start = other\nother = start\n");

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context, "rule 'start'");
}

#[test]
fn test_guarded_recursion_is_fine() {
    let (result, warnings) = consumption("start = 'a' start | 'b'\n");

    assert!(result);
    assert!(warnings.is_empty());
}

#[test]
fn test_analyze_covers_all_rules() {
    let document = crate::syntax::parse_grammar("-", "a = a\nb = b\n").unwrap();
    let grammar = Grammar::from_document(&document);
    let warnings = analyze(&grammar);

    assert_eq!(warnings.len(), 2);
}
