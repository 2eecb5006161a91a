//! syntax parses grammar source files.

extern crate peg;

use self::peg::parser;
use std::collections::HashSet;

/// Term models one surface construct, prior to lowering into the
/// expression tree. Literal and class spellings are kept raw; escape
/// decoding happens in the tree constructors.
#[derive(Debug, PartialEq)]
pub enum Term {
    /// Dot denotes the any-byte match `.`.
    Dot,

    /// Literal denotes a quoted string, spelling only.
    Literal(String),

    /// Class denotes a bracketed character class, spelling only.
    Class(String),

    /// Call denotes a rule reference, optionally binding the rule's
    /// semantic value to a variable.
    Call {
        /// name denotes the referenced rule.
        name: String,

        /// binding denotes the variable receiving the semantic value.
        binding: Option<String>,
    },

    /// Action denotes a `{ ... }` semantic action body.
    Action(String),

    /// Predicate denotes a `&{ ... }` guard body.
    Predicate(String),

    /// Begin denotes the `<` capture-begin marker.
    Begin,

    /// End denotes the `>` capture-end marker.
    End,

    /// Alternate denotes ordered choice.
    Alternate(Vec<Term>),

    /// Sequence denotes concatenation.
    Sequence(Vec<Term>),

    /// PeekFor denotes positive lookahead `&e`.
    PeekFor(Box<Term>),

    /// PeekNot denotes negative lookahead `!e`.
    PeekNot(Box<Term>),

    /// Query denotes `e?`.
    Query(Box<Term>),

    /// Star denotes `e*`.
    Star(Box<Term>),

    /// Plus denotes `e+`.
    Plus(Box<Term>),
}

/// Definition models one `name = expression` rule definition.
#[derive(Debug, PartialEq)]
pub struct Definition {
    /// name denotes the defined rule.
    pub name: String,

    /// term denotes the rule body.
    pub term: Term,
}

/// Document models a whole grammar file.
#[derive(Debug, PartialEq, Default)]
pub struct Document {
    /// prelude denotes an optional `%{ ... %}` block of host code.
    pub prelude: Option<String>,

    /// definitions collects the rule definitions, in source order.
    pub definitions: Vec<Definition>,

    /// trailer denotes an optional `%%` block of host code.
    pub trailer: Option<String>,
}

parser! {
    grammar parser() for str {
        rule eof() = quiet!{![_]} / expected!("EOF")

        rule comment() =
            quiet!{
                "#" [^ ('\r' | '\n')]*
            } / expected!("comment")

        /// _ matches optional whitespace, including comments.
        rule _ = quiet!{([' ' | '\t' | '\r' | '\n'] / comment())*}

        rule identifier() -> String =
            quiet!{
                s:$(['a'..='z' | 'A'..='Z' | '_'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-']*) _ {
                    s.to_string()
                }
            } / expected!("identifier")

        rule single_quoted() -> String =
            "'" s:$(("\\" [_] / [^ ('\'' | '\\')])*) "'" {
                s.to_string()
            }

        rule double_quoted() -> String =
            "\"" s:$(("\\" [_] / [^ ('"' | '\\')])*) "\"" {
                s.to_string()
            }

        rule literal() -> String =
            quiet!{
                s:(single_quoted() / double_quoted()) _ {
                    s
                }
            } / expected!("literal")

        rule class_spec() -> String =
            quiet!{
                "[" s:$(("\\" [_] / [^ (']' | '\\')])*) "]" _ {
                    s.to_string()
                }
            } / expected!("character class")

        rule braced() = "{" action_body() "}"

        rule action_body() = (braced() / [^ ('{' | '}')])*

        rule action_text() -> String =
            quiet!{
                "{" s:$(action_body()) "}" _ {
                    s.to_string()
                }
            } / expected!("action")

        rule primary() -> Term =
            v:identifier() ":" _ n:identifier() !"=" {
                Term::Call {
                    name: n,
                    binding: Some(v),
                }
            }
            / n:identifier() !"=" {
                Term::Call {
                    name: n,
                    binding: None,
                }
            }
            / "(" _ e:expression() ")" _ {
                e
            }
            / s:literal() {
                Term::Literal(s)
            }
            / s:class_spec() {
                Term::Class(s)
            }
            / "." _ {
                Term::Dot
            }
            / a:action_text() {
                Term::Action(a)
            }
            / "<" _ {
                Term::Begin
            }
            / ">" _ {
                Term::End
            }

        rule suffix() -> Term =
            p:primary() op:$(['?' | '*' | '+'])? _ {
                match op {
                    Some("?") => Term::Query(Box::new(p)),
                    Some("*") => Term::Star(Box::new(p)),
                    Some("+") => Term::Plus(Box::new(p)),
                    _ => p,
                }
            }

        rule prefix() -> Term =
            "&" _ a:action_text() {
                Term::Predicate(a)
            }
            / "&" _ s:suffix() {
                Term::PeekFor(Box::new(s))
            }
            / "!" _ s:suffix() {
                Term::PeekNot(Box::new(s))
            }
            / suffix()

        rule sequence() -> Term =
            ps:(prefix()+) {
                match ps.len() {
                    1 => ps.into_iter().next().unwrap(),
                    _ => Term::Sequence(ps),
                }
            }

        rule expression() -> Term =
            first:sequence() rest:(("|" / "/") _ t:sequence() { t })* {
                if rest.is_empty() {
                    first
                } else {
                    let mut children = vec![first];
                    children.extend(rest);
                    Term::Alternate(children)
                }
            }

        rule definition() -> Definition =
            n:identifier() "=" _ t:expression() (";" _)? {
                Definition { name: n, term: t }
            }

        rule prelude() -> String =
            "%{" s:$((!"%}" [_])*) "%}" _ {
                s.to_string()
            }

        rule trailer() -> String =
            "%%" s:$([_]*) {
                s.to_string()
            }

        pub rule document() -> Document =
            _ p:(prelude()?) ds:(definition()*) t:(trailer()?) eof() {
                Document {
                    prelude: p,
                    definitions: ds,
                    trailer: t,
                }
            }
    }
}

/// parse_grammar generates a surface tree from grammar source,
/// or else returns a located parse error.
pub fn parse_grammar(pth: &str, s: &str) -> Result<Document, String> {
    parser::document(s).map_err(|err| {
        let loc: peg::str::LineCol = err.location;

        let mut valid_tokens: Vec<&str> = err
            .expected
            .tokens()
            .collect::<HashSet<&str>>()
            .into_iter()
            .collect();
        valid_tokens.sort();

        let bad_token: String = s
            .chars()
            .nth(loc.offset)
            .map(|e| format!("\"{}\"", e.to_string().escape_debug()))
            .unwrap_or("EOF".to_string());

        format!(
            "error: {}:{}:{} found {}, expected: {}",
            pth,
            loc.line,
            loc.column,
            bad_token,
            valid_tokens.join(", ")
        )
    })
}

#[test]
fn test_empty_documents() {
    assert_eq!(parse_grammar("-", ""), Ok(Document::default()));
    assert_eq!(parse_grammar("-", "\n"), Ok(Document::default()));
    assert_eq!(parse_grammar("-", "# comment only\n"), Ok(Document::default()));
    assert_eq!(parse_grammar("-", "# comment only"), Ok(Document::default()));
}

#[test]
fn test_parse_definitions() {
    assert_eq!(
        parse_grammar("-", "start = .\n"),
        Ok(Document {
            prelude: None,
            definitions: vec![Definition {
                name: "start".to_string(),
                term: Term::Dot,
            }],
            trailer: None,
        })
    );

    assert_eq!(
        parse_grammar("-", "start = 'a' ;"),
        Ok(Document {
            prelude: None,
            definitions: vec![Definition {
                name: "start".to_string(),
                term: Term::Literal("a".to_string()),
            }],
            trailer: None,
        })
    );

    assert_eq!(
        parse_grammar("-", "a = b\nb = .\n"),
        Ok(Document {
            prelude: None,
            definitions: vec![
                Definition {
                    name: "a".to_string(),
                    term: Term::Call {
                        name: "b".to_string(),
                        binding: None,
                    },
                },
                Definition {
                    name: "b".to_string(),
                    term: Term::Dot,
                },
            ],
            trailer: None,
        })
    );

    assert!(parse_grammar("-", "start = ").is_err());
    assert!(parse_grammar("-", "= .").is_err());
    assert!(parse_grammar("-", "start = )").is_err());
}

#[test]
fn test_parse_operators() {
    let doc = parse_grammar("-", "start = !'x' .* | &[a-z] 'y'+ | 'z'?\n").unwrap();

    assert_eq!(
        doc.definitions[0].term,
        Term::Alternate(vec![
            Term::Sequence(vec![
                Term::PeekNot(Box::new(Term::Literal("x".to_string()))),
                Term::Star(Box::new(Term::Dot)),
            ]),
            Term::Sequence(vec![
                Term::PeekFor(Box::new(Term::Class("a-z".to_string()))),
                Term::Plus(Box::new(Term::Literal("y".to_string()))),
            ]),
            Term::Query(Box::new(Term::Literal("z".to_string()))),
        ])
    );
}

#[test]
fn test_parse_slash_alternation() {
    assert_eq!(
        parse_grammar("-", "start = 'a' / 'b'\n"),
        parse_grammar("-", "start = 'a' | 'b'\n")
    );
}

#[test]
fn test_parse_grouping() {
    let doc = parse_grammar("-", "start = ('a' | 'b') 'c'\n").unwrap();

    assert_eq!(
        doc.definitions[0].term,
        Term::Sequence(vec![
            Term::Alternate(vec![
                Term::Literal("a".to_string()),
                Term::Literal("b".to_string()),
            ]),
            Term::Literal("c".to_string()),
        ])
    );
}

#[test]
fn test_parse_actions_and_predicates() {
    let doc = parse_grammar("-", "start = 'a' { yy = 1; } &{ yy > 0 }\n").unwrap();

    assert_eq!(
        doc.definitions[0].term,
        Term::Sequence(vec![
            Term::Literal("a".to_string()),
            Term::Action(" yy = 1; ".to_string()),
            Term::Predicate(" yy > 0 ".to_string()),
        ])
    );

    let doc = parse_grammar("-", "start = { if (a) { b(); } }\n").unwrap();
    assert_eq!(
        doc.definitions[0].term,
        Term::Action(" if (a) { b(); } ".to_string())
    );

    assert!(parse_grammar("-", "start = { unbalanced\n").is_err());
}

#[test]
fn test_parse_markers_and_bindings() {
    let doc = parse_grammar("-", "sum = l:number '+' r:number < . > { $$ = l + r; }\n").unwrap();

    assert_eq!(
        doc.definitions[0].term,
        Term::Sequence(vec![
            Term::Call {
                name: "number".to_string(),
                binding: Some("l".to_string()),
            },
            Term::Literal("+".to_string()),
            Term::Call {
                name: "number".to_string(),
                binding: Some("r".to_string()),
            },
            Term::Begin,
            Term::Dot,
            Term::End,
            Term::Action(" $$ = l + r; ".to_string()),
        ])
    );
}

#[test]
fn test_parse_escaped_literals() {
    let doc = parse_grammar("-", "start = '\\n' \"a\\\"b\" [\\]x]\n").unwrap();

    assert_eq!(
        doc.definitions[0].term,
        Term::Sequence(vec![
            Term::Literal("\\n".to_string()),
            Term::Literal("a\\\"b".to_string()),
            Term::Class("\\]x".to_string()),
        ])
    );
}

#[test]
fn test_parse_prelude_and_trailer() {
    let doc = parse_grammar(
        "-",
        "%{\n#include <stdio.h>\n%}\nstart = .\n%%\nint main() { return yyparse(); }\n",
    )
    .unwrap();

    assert_eq!(doc.prelude, Some("\n#include <stdio.h>\n".to_string()));
    assert_eq!(doc.definitions.len(), 1);
    assert_eq!(
        doc.trailer,
        Some("\nint main() { return yyparse(); }\n".to_string())
    );
}

#[test]
fn test_parse_comments() {
    let doc = parse_grammar(
        "-",
        "# leading note\nstart = 'a' # tail note\n  | 'b'\n# trailing note\n",
    )
    .unwrap();

    assert_eq!(
        doc.definitions[0].term,
        Term::Alternate(vec![
            Term::Literal("a".to_string()),
            Term::Literal("b".to_string()),
        ])
    );
}

#[test]
fn test_fixture_corpus() {
    use std::fs;
    use std::path;

    let fixtures_path: &path::Path = path::Path::new("fixtures");
    let valid_walker = walkdir::WalkDir::new(fixtures_path.join("parse-valid")).sort_by_file_name();

    for entry_result in valid_walker {
        let entry: walkdir::DirEntry = entry_result.unwrap();
        let pth: &path::Path = entry.path();

        if pth.is_dir() {
            continue;
        }

        let pth_display: path::Display = pth.display();
        let grammar_str: &str = &fs::read_to_string(pth).unwrap();
        assert!(
            parse_grammar(&pth_display.to_string(), grammar_str)
                .map_err(|err| format!("unable to parse {}: {}", &pth_display, err))
                .is_ok()
        );
    }

    let invalid_walker =
        walkdir::WalkDir::new(fixtures_path.join("parse-invalid")).sort_by_file_name();

    for entry_result in invalid_walker {
        let entry: walkdir::DirEntry = entry_result.unwrap();
        let pth: &path::Path = entry.path();

        if pth.is_dir() {
            continue;
        }

        let pth_string: String = pth.display().to_string();
        let grammar_str: &str = &fs::read_to_string(pth).unwrap();
        assert!(
            parse_grammar(&pth_string, grammar_str).is_err(),
            "failed to reject {}",
            pth_string
        );
    }
}

#[test]
fn test_parse_error_location() {
    let err = parse_grammar("g.peg", "start = )\n").unwrap_err();
    assert!(err.starts_with("error: g.peg:1:"), "unexpected: {}", err);
    assert!(err.contains("expected:"), "unexpected: {}", err);
}
