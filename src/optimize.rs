//! optimize rewrites rule bodies into leaner dispatch structures.

use crate::charset::CharSet;
use crate::tree::{Expr, Grammar, StringTable};
use crate::warnings::{NEVER_MATCHED, Warning};

/// optimize rewrites every rule body in place: adjacent character
/// classes coalesce, unreachable alternatives drop with a warning, and
/// qualifying alternations become StringTable dispatch nodes.
///
/// Running the pass a second time is a no-op.
pub fn optimize(grammar: &mut Grammar) -> Vec<Warning> {
    let mut warnings: Vec<Warning> = Vec::new();

    for rule in &mut grammar.rules {
        if let Some(expression) = rule.expression.as_mut() {
            optimize_expr(expression, &mut warnings);
        }
    }

    warnings
}

fn optimize_expr(expr: &mut Expr, warnings: &mut Vec<Warning>) {
    match expr {
        Expr::Sequence(children) => {
            for child in children {
                optimize_expr(child, warnings);
            }
        }
        Expr::Alternate(children) => {
            coalesce_classes(children);
            filter_unreachable(children, warnings);
            stringify(children);

            for child in children {
                optimize_expr(child, warnings);
            }
        }
        _ => {}
    }
}

/// coalesce_classes combines adjacent class and character alternatives
/// into a single class. Characters are equivalent to a class of one.
/// Each merge leaves the merged node in place and re-checks its new
/// right neighbor, so a run of any length collapses in one sweep.
fn coalesce_classes(children: &mut Vec<Expr>) {
    enum Merge {
        ClassClass,
        ClassCharacter,
        CharacterClass,
        CharacterCharacter,
        None,
    }

    let mut i = 0;

    while i + 1 < children.len() {
        let merge = match (&children[i], &children[i + 1]) {
            (Expr::Class { .. }, Expr::Class { .. }) => Merge::ClassClass,
            (Expr::Class { .. }, Expr::Character { .. }) => Merge::ClassCharacter,
            (Expr::Character { .. }, Expr::Class { .. }) => Merge::CharacterClass,
            (Expr::Character { .. }, Expr::Character { .. }) => Merge::CharacterCharacter,
            _ => Merge::None,
        };

        match merge {
            Merge::ClassClass => {
                let other = match &children[i + 1] {
                    Expr::Class { bits, .. } => *bits,
                    _ => unreachable!(),
                };

                if let Expr::Class { bits, .. } = &mut children[i] {
                    bits.union(&other);
                }

                children.remove(i + 1);
            }
            Merge::ClassCharacter => {
                let value = match &children[i + 1] {
                    Expr::Character { value, .. } => *value,
                    _ => unreachable!(),
                };

                if let Expr::Class { bits, .. } = &mut children[i] {
                    bits.set(value);
                }

                children.remove(i + 1);
            }
            Merge::CharacterClass => {
                let value = match &children[i] {
                    Expr::Character { value, .. } => *value,
                    _ => unreachable!(),
                };

                if let Expr::Class { bits, .. } = &mut children[i + 1] {
                    bits.set(value);
                }

                children.remove(i);
            }
            Merge::CharacterCharacter => {
                let mut bits = CharSet::new();

                for child in &children[i..=i + 1] {
                    if let Expr::Character { value, .. } = child {
                        bits.set(*value);
                    }
                }

                children[i] = Expr::Class {
                    spelling: None,
                    bits,
                };
                children.remove(i + 1);
            }
            Merge::None => i += 1,
        }
    }
}

/// filter_unreachable walks an alternation left to right, dropping
/// alternatives that a prior alternative dominates. A byte claimed by an
/// earlier class or character cannot reach a later character or string
/// starting with it; a prior string that is a prefix of a later, equal
/// or longer string claims it outright; at most one empty string
/// survives. Each removal warns.
fn filter_unreachable(children: &mut Vec<Expr>, warnings: &mut Vec<Warning>) {
    let mut bits = CharSet::new();
    let mut empty_string = false;
    let mut seen: Vec<Vec<u8>> = Vec::new();
    let mut i = 0;

    while i < children.len() {
        let dominated: Option<String> = match &children[i] {
            Expr::Class { bits: b, .. } => {
                bits.union(b);
                None
            }
            Expr::Dot => {
                bits.union(&CharSet::full());
                None
            }
            Expr::Character { spelling, value } => {
                if bits.is_set(*value) {
                    Some(format!("'{}'", spelling))
                } else {
                    bits.set(*value);
                    None
                }
            }
            Expr::String { spelling, raw } => {
                if raw.is_empty() {
                    if empty_string {
                        Some(format!("\"{}\"", spelling))
                    } else {
                        empty_string = true;
                        None
                    }
                } else if bits.is_set(raw[0]) {
                    Some(format!("\"{}\"", spelling))
                } else if seen
                    .iter()
                    .any(|prior| prior.len() <= raw.len() && raw.starts_with(&prior[..]))
                {
                    Some(format!("\"{}\"", spelling))
                } else {
                    seen.push(raw.clone());
                    None
                }
            }
            _ => None,
        };

        match dominated {
            Some(context) => {
                warnings.push(Warning {
                    context,
                    message: NEVER_MATCHED,
                    ..Warning::new()
                });
                children.remove(i);
            }
            None => i += 1,
        }
    }
}

/// stringify replaces an alternation made entirely of strings,
/// characters, classes, and dots with a single StringTable node. The
/// table owns the decoded string bytes, the union of the class and
/// character bits, and the empty-string flag. An alternation with fewer
/// than two dispatchable arms, or without a non-empty string, gains
/// nothing and is left alone.
fn stringify(children: &mut Vec<Expr>) {
    let eligible = children.iter().all(|child| {
        matches!(
            child,
            Expr::String { .. } | Expr::Character { .. } | Expr::Class { .. } | Expr::Dot
        )
    });

    if children.is_empty() || !eligible {
        return;
    }

    let count = children
        .iter()
        .filter(|child| matches!(child, Expr::String { raw, .. } if !raw.is_empty()))
        .count();

    let has_cc = children.iter().any(|child| {
        matches!(
            child,
            Expr::Character { .. } | Expr::Class { .. } | Expr::Dot
        )
    });

    if count == 0 || count + usize::from(has_cc) < 2 {
        return;
    }

    let mut bits: Option<CharSet> = None;
    let mut empty_string = false;
    let mut strings: Vec<Vec<u8>> = Vec::with_capacity(count);

    for child in children.drain(..) {
        match child {
            Expr::String { raw, .. } => {
                if raw.is_empty() {
                    empty_string = true;
                } else {
                    strings.push(raw);
                }
            }
            Expr::Character { value, .. } => {
                bits.get_or_insert_with(CharSet::new).set(value);
            }
            Expr::Class { bits: b, .. } => {
                bits.get_or_insert_with(CharSet::new).union(&b);
            }
            Expr::Dot => {
                bits.get_or_insert_with(CharSet::new).union(&CharSet::full());
            }
            _ => unreachable!(),
        }
    }

    strings.sort();

    children.push(Expr::Table(StringTable {
        bits,
        empty_string,
        strings,
    }));
}

#[cfg(test)]
fn optimized(src: &str) -> (Grammar, Vec<Warning>) {
    let document = crate::syntax::parse_grammar("-", src).unwrap();
    let mut grammar = Grammar::from_document(&document);
    let warnings = optimize(&mut grammar);
    (grammar, warnings)
}

#[cfg(test)]
fn start_children(grammar: &Grammar) -> &Vec<Expr> {
    match grammar.rules[grammar.start.unwrap()].expression.as_ref() {
        Some(Expr::Alternate(children)) => children,
        other => panic!("expected an alternation, got {:?}", other),
    }
}

#[test]
fn test_coalesce_characters() {
    let (g, warnings) = optimized("start = 'a' | 'b' | 'c'\n");
    let children = start_children(&g);

    assert!(warnings.is_empty());
    assert_eq!(children.len(), 1);

    match &children[0] {
        Expr::Class { spelling, bits } => {
            assert_eq!(*spelling, None);
            assert_eq!(bits.bytes(), vec![b'a', b'b', b'c']);
        }
        other => panic!("expected a class, got {:?}", other),
    }
}

#[test]
fn test_coalesce_class_pairs() {
    let (g, _) = optimized("start = [a-c] | [x-z]\n");
    let children = start_children(&g);

    assert_eq!(children.len(), 1);

    match &children[0] {
        Expr::Class { bits, .. } => {
            assert_eq!(bits.bytes(), vec![b'a', b'b', b'c', b'x', b'y', b'z']);
        }
        other => panic!("expected a class, got {:?}", other),
    }
}

#[test]
fn test_coalesce_character_then_class() {
    let (g, _) = optimized("start = '0' | [1-3]\n");
    let children = start_children(&g);

    assert_eq!(children.len(), 1);

    match &children[0] {
        Expr::Class { bits, .. } => {
            assert_eq!(bits.bytes(), vec![b'0', b'1', b'2', b'3']);
        }
        other => panic!("expected a class, got {:?}", other),
    }
}

#[test]
fn test_filter_dominated_character() {
    let (g, warnings) = optimized("start = [a-z] | 'x' 'y' | 'b'\n");

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context, "'b'");
    assert_eq!(warnings[0].message, NEVER_MATCHED);
    assert_eq!(start_children(&g).len(), 2);
}

#[test]
fn test_filter_dominated_string() {
    let (g, warnings) = optimized("start = \"foo\" | \"foobar\"\n");

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context, "\"foobar\"");

    let children = start_children(&g);
    assert_eq!(children.len(), 1);
    assert!(matches!(&children[0], Expr::String { raw, .. } if raw == b"foo"));
}

#[test]
fn test_filter_duplicate_empty_string() {
    let (g, warnings) = optimized("start = '' | 'ab' | ''\n");

    assert_eq!(warnings.len(), 1);
    assert_eq!(start_children(&g).len(), 2);
}

#[test]
fn test_filter_string_behind_class() {
    let (_, warnings) = optimized("start = [f] | \"foo\"\n");

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context, "\"foo\"");
}

#[test]
fn test_filter_skips_opaque_arms() {
    let (g, warnings) = optimized("start = [a-z] | other | 'q'\nother = .\n");

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context, "'q'");
    assert_eq!(start_children(&g).len(), 2);
}

#[test]
fn test_stringify_prefix_family() {
    let (g, warnings) = optimized("start = \"goodbye\" | \"good\" | \"go\"\n");
    let children = start_children(&g);

    assert!(warnings.is_empty());
    assert_eq!(children.len(), 1);

    match &children[0] {
        Expr::Table(table) => {
            assert_eq!(table.bits, None);
            assert!(!table.empty_string);
            assert_eq!(
                table.strings,
                vec![b"go".to_vec(), b"good".to_vec(), b"goodbye".to_vec()]
            );
        }
        other => panic!("expected a table, got {:?}", other),
    }
}

#[test]
fn test_stringify_with_classes() {
    let (g, _) = optimized("start = \"foo\" | [xy]\n");
    let children = start_children(&g);

    assert_eq!(children.len(), 1);

    match &children[0] {
        Expr::Table(table) => {
            let bits = table.bits.expect("expected a head class");
            assert_eq!(bits.bytes(), vec![b'x', b'y']);
            assert_eq!(table.strings, vec![b"foo".to_vec()]);
        }
        other => panic!("expected a table, got {:?}", other),
    }
}

#[test]
fn test_stringify_empty_string_flag() {
    let (g, _) = optimized("start = \"ab\" | \"cd\" | ''\n");

    match &start_children(&g)[0] {
        Expr::Table(table) => {
            assert!(table.empty_string);
            assert_eq!(table.strings.len(), 2);
        }
        other => panic!("expected a table, got {:?}", other),
    }
}

#[test]
fn test_stringify_sort_order() {
    let (g, _) = optimized("start = \"zz\" | \"ab\" | \"aa\"\n");

    match &start_children(&g)[0] {
        Expr::Table(table) => {
            assert_eq!(
                table.strings,
                vec![b"aa".to_vec(), b"ab".to_vec(), b"zz".to_vec()]
            );
        }
        other => panic!("expected a table, got {:?}", other),
    }
}

#[test]
fn test_stringify_skips_single_string() {
    let (g, _) = optimized("start = \"foo\" | other\nother = .\n");

    for child in start_children(&g) {
        assert!(!matches!(child, Expr::Table(_)));
    }
}

#[test]
fn test_no_descent_through_repetition() {
    let (g, _) = optimized("start = ('a' | 'b')* 'q'\n");

    match g.rules[g.start.unwrap()].expression.as_ref().unwrap() {
        Expr::Sequence(children) => match &children[0] {
            Expr::Star(inner) => match inner.as_ref() {
                Expr::Alternate(arms) => assert_eq!(arms.len(), 2),
                other => panic!("expected an alternation, got {:?}", other),
            },
            other => panic!("expected a star, got {:?}", other),
        },
        other => panic!("expected a sequence, got {:?}", other),
    }
}

#[test]
fn test_optimize_idempotent() {
    let sources = [
        "start = 'a' | 'b' | 'c'\n",
        "start = \"goodbye\" | \"good\" | \"go\"\n",
        "start = \"foo\" | [xy] | ''\n",
        "start = [a-z] other 'q' | .\nother = 'x'\n",
    ];

    for src in sources {
        let (mut g, _) = optimized(src);
        let before = g.clone();
        let warnings = optimize(&mut g);

        assert!(warnings.is_empty(), "second pass warned for {}", src);
        assert_eq!(g, before, "second pass changed the tree for {}", src);
    }
}
