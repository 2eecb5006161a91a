//! peggen generates recursive-descent C recognizers from Parsing
//! Expression Grammars.
//!
//! The pipeline parses a grammar in the leg dialect into an expression
//! tree, rewrites alternations into compact dispatch structures, and
//! lowers each rule to a jump-and-label recognizer implementing ordered
//! choice with backtracking. Semantic actions are deferred as thunks and
//! fire only on a committed parse.

pub mod analyze;
pub mod charset;
pub mod compile;
pub mod inspect;
pub mod optimize;
pub mod syntax;
pub mod tree;
pub mod warnings;

use std::io::Write;
use warnings::Warning;

/// generate runs the full pipeline over grammar source: parse, lower,
/// optimize, scan, and emit C to the given stream. Returns the
/// collected diagnostics, or else a fatal error.
pub fn generate<W: Write>(pth: &str, s: &str, out: W) -> Result<Vec<Warning>, String> {
    let document = syntax::parse_grammar(pth, s)?;
    let mut grammar = tree::Grammar::from_document(&document);

    let mut found = optimize::optimize(&mut grammar);
    warnings::stamp(pth, &mut found);

    for check in warnings::CHECKS.iter() {
        found.extend(check(pth, &grammar));
    }

    compile::compile(&mut grammar, out).map_err(|err| format!("error: {}: {}", pth, err))?;
    Ok(found)
}

#[cfg(test)]
fn generate_string(src: &str) -> (String, Vec<Warning>) {
    let mut out: Vec<u8> = Vec::new();
    let found = generate("-", src, &mut out).unwrap();
    (String::from_utf8(out).unwrap(), found)
}

#[test]
fn test_generate_literal_grammar() {
    let (c, found) = generate_string("start = \"abc\"\n");

    assert!(found.is_empty());
    assert!(c.contains("if (!yymatchString(\"abc\")) goto l"));
    assert!(c.contains("return YYPARSEFROM(yy_start);"));
}

#[test]
fn test_generate_dominated_alternative() {
    let (c, found) = generate_string("start = \"foo\" | \"foobar\"\n");

    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].to_string(),
        "warning: -: \"foobar\": can never be matched"
    );
    assert!(c.contains("yymatchString(\"foo\")"));
}

#[test]
fn test_generate_longest_match_family() {
    let (c, found) = generate_string("start = \"goodbye\" | \"good\" | \"go\"\n");

    assert!(found.is_empty());
    assert!(c.contains("switch(yybuf[yypos++])"));
    assert!(c.contains("yyrmarker=yypos; yyraccept=1;"));
}

#[test]
fn test_generate_repetition_grammar() {
    let (c, found) = generate_string("start = [a-z]+\n");

    assert!(found.is_empty());
    assert!(c.contains("yymatchClass"));

    // plus emits its element twice: once mandatory, once in the loop
    assert_eq!(c.matches("yymatchClass((unsigned char *)").count(), 2);
}

#[test]
fn test_generate_lookahead_grammar() {
    let (c, found) = generate_string("start = !\"x\" .\n");

    assert!(found.is_empty());
    assert!(c.contains("yymatchChar('x')"));
    assert!(c.contains("yymatchDot()"));
}

#[test]
fn test_generate_nested_rule_grammar() {
    let (c, found) = generate_string("A = \"a\" A? \"b\"\n");

    assert!(found.is_empty());
    assert!(c.contains("YY_RULE(int) yy_A()"));
    assert!(c.contains("if (!yy_A()) goto l"));
    assert!(c.contains("return YYPARSEFROM(yy_A);"));
}

#[test]
fn test_generate_action_thunks() {
    let (c, found) = generate_string("S = a { act1(); } b { act2(); }\na = 'a'\nb = 'b'\n");

    assert!(found.is_empty());
    assert!(c.contains("yyDo(yy_1_S, yybegin, yyend);"));
    assert!(c.contains("yyDo(yy_2_S, yybegin, yyend);"));
    assert!(c.contains("YY_ACTION(void) yy_1_S(char *yytext, int yyleng)"));
    assert!(c.contains("act1();"));
    assert!(c.contains("act2();"));
}

#[test]
fn test_generate_reports_parse_errors() {
    let mut out: Vec<u8> = Vec::new();
    let err = generate("bad.peg", "start = )\n", &mut out).unwrap_err();

    assert!(err.starts_with("error: bad.peg:"));
    assert!(out.is_empty());
}

#[test]
fn test_generate_requires_rules() {
    let mut out: Vec<u8> = Vec::new();
    let err = generate("empty.peg", "# nothing\n", &mut out).unwrap_err();

    assert_eq!(err, "error: empty.peg: no start rule defined");
}

#[test]
fn test_generate_collects_all_diagnostics() {
    let (_, found) = generate_string("start = start missing\nlonely = 'x' {}\n");

    let messages: Vec<&'static str> = found.iter().map(|warning| warning.message).collect();

    assert!(messages.contains(&warnings::RULE_UNDEFINED));
    assert!(messages.contains(&warnings::RULE_UNUSED));
    assert!(messages.contains(&warnings::BLANK_ACTION));
    assert!(messages.contains(&warnings::LEFT_RECURSION));
}
