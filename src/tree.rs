//! tree models PEG grammars as expression trees.

use crate::charset::CharSet;
use crate::syntax::{Definition, Document, Term};

/// RuleId indexes a rule within its owning [Grammar].
pub type RuleId = usize;

/// ActionId indexes an action within the grammar-global action list.
pub type ActionId = usize;

/// unescape decodes a source spelling into raw bytes.
///
/// Recognized escapes: `\a \b \e \f \n \r \t \v`, octal runs of up to
/// three digits, `\x` followed by hex digits, and `\<other>` for the
/// literal `<other>`. The result may contain NUL bytes.
pub fn unescape(spelling: &str) -> Vec<u8> {
    #[derive(PartialEq)]
    enum State {
        Plain,
        Escape,
        Octal,
        Hex,
    }

    let mut out: Vec<u8> = Vec::with_capacity(spelling.len());
    let mut st = State::Plain;
    let mut xval: u32 = 0;

    for &c in spelling.as_bytes() {
        match st {
            State::Plain => {
                if c == b'\\' {
                    st = State::Escape;
                } else {
                    out.push(c);
                }
            }
            State::Escape => {
                st = State::Plain;

                match c {
                    b'0'..=b'7' => {
                        st = State::Octal;
                        xval = u32::from(c - b'0');
                    }
                    b'x' => {
                        st = State::Hex;
                        xval = 0;
                    }
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'e' => out.push(0x1b),
                    b'f' => out.push(0x0c),
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'v' => out.push(0x0b),
                    other => out.push(other),
                }
            }
            State::Octal => {
                if c.is_ascii_digit() && c < b'8' {
                    let tmp = (xval << 3) + u32::from(c - b'0');

                    if tmp <= 255 {
                        xval = tmp;
                        continue;
                    }
                }

                out.push(xval as u8);
                st = State::Plain;

                if c == b'\\' {
                    st = State::Escape;
                } else {
                    out.push(c);
                }
            }
            State::Hex => {
                if c.is_ascii_hexdigit() {
                    let tmp = (xval << 4) + u32::from((c as char).to_digit(16).unwrap_or(0));

                    if tmp <= 255 {
                        xval = tmp;
                        continue;
                    }
                }

                out.push(xval as u8);
                st = State::Plain;

                if c == b'\\' {
                    st = State::Escape;
                } else {
                    out.push(c);
                }
            }
        }
    }

    if st == State::Octal || st == State::Hex {
        out.push(xval as u8);
    }

    out
}

/// escape renders raw bytes as the body of a C string or character
/// literal. Printable ASCII passes through; quotes, backslashes, and the
/// named control characters take two-character escapes; everything else
/// takes a three-digit octal escape. Decoding the result with [unescape]
/// yields the original bytes.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());

    for &c in bytes {
        match c {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'"' => out.push_str("\\\""),
            0x07 => out.push_str("\\a"),
            0x08 => out.push_str("\\b"),
            0x1b => out.push_str("\\e"),
            0x0c => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x0b => out.push_str("\\v"),
            c if c < 0x80 && (c as char).is_ascii_graphic() || c == b' ' => out.push(c as char),
            c => out.push_str(&format!("\\{:03o}", c)),
        }
    }

    out
}

/// StringTable is an optimized dispatch node replacing a run of
/// string, character, and class alternatives.
///
/// `strings` holds the decoded bytes of every non-empty string
/// alternative, sorted by suffix then ascending length so that prefixes
/// precede their extensions. `bits` carries the union of any class and
/// character alternatives; `empty_string` records a zero-length
/// alternative, which makes the empty match acceptable immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    /// bits denotes the optional leading character class.
    pub bits: Option<CharSet>,

    /// empty_string denotes whether a zero-length alternative is present.
    pub empty_string: bool,

    /// strings collects the decoded non-empty string alternatives, sorted.
    pub strings: Vec<Vec<u8>>,
}

/// Expr models one PEG construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Dot matches any one byte.
    Dot,

    /// Character matches one specific byte.
    /// `spelling` preserves the source text for diagnostics.
    Character { spelling: String, value: u8 },

    /// String matches a fixed byte sequence.
    /// `spelling` preserves the source text; `raw` is the decoded value.
    String { spelling: String, raw: Vec<u8> },

    /// Class matches one byte whose bit is set.
    /// A coalesced class synthesized by the optimizer has no spelling.
    Class { spelling: Option<String>, bits: CharSet },

    /// Name references another rule, optionally binding its semantic
    /// value to a variable slot of the enclosing rule.
    Name { rule: RuleId, variable: Option<usize> },

    /// Action defers a semantic action to a committed parse.
    Action(ActionId),

    /// Predicate guards the match with host-language code,
    /// evaluated at match time.
    Predicate(String),

    /// Alternate is ordered choice over its children.
    Alternate(Vec<Expr>),

    /// Sequence is concatenation of its children.
    Sequence(Vec<Expr>),

    /// PeekFor is positive lookahead; it never consumes input.
    PeekFor(Box<Expr>),

    /// PeekNot is negative lookahead; it never consumes input.
    PeekNot(Box<Expr>),

    /// Query matches its element zero or one time.
    Query(Box<Expr>),

    /// Star matches its element zero or more times.
    Star(Box<Expr>),

    /// Plus matches its element one or more times.
    Plus(Box<Expr>),

    /// Table is a post-optimization multi-entry dispatch.
    Table(StringTable),
}

impl Expr {
    /// visit applies a function to this node and every descendant,
    /// in depth-first order.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);

        match self {
            Expr::Alternate(children) | Expr::Sequence(children) => {
                for child in children {
                    child.visit(f);
                }
            }
            Expr::PeekFor(e) | Expr::PeekNot(e) | Expr::Query(e) | Expr::Star(e)
            | Expr::Plus(e) => e.visit(f),
            _ => {}
        }
    }
}

/// Variable models a captured slot within a rule's value-stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// name denotes the slot name referenced by action bodies.
    pub name: String,

    /// offset denotes the stack offset, assigned at generation time,
    /// descending from 0.
    pub offset: i32,
}

/// Action models a semantic action with a synthesized callback name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// name denotes the synthesized callback name, `_<n>_<rule>`.
    pub name: String,

    /// text denotes the opaque host-language body, with `$$` rewritten
    /// to `yy`.
    pub text: String,

    /// rule denotes the owning rule.
    pub rule: RuleId,
}

/// Rule models a named nonterminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// name denotes the rule name, with `-` translated to `_`.
    pub name: String,

    /// id denotes the 1-based definition id.
    pub id: usize,

    /// used denotes whether any Name node references this rule.
    pub used: bool,

    /// variables collects the captured slots, in first-binding order.
    pub variables: Vec<Variable>,

    /// expression denotes the body, absent for rules referenced but
    /// never defined.
    pub expression: Option<Expr>,
}

/// Grammar owns the rule forest, the global action list, and the
/// user-supplied prelude and trailer blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grammar {
    /// rules collects every rule, in first-appearance order.
    pub rules: Vec<Rule>,

    /// actions threads every action across all rules.
    pub actions: Vec<Action>,

    /// start denotes the start rule: the rule named `start`,
    /// else the first rule to receive an expression.
    pub start: Option<RuleId>,

    /// prelude denotes the `%{ ... %}` block, emitted near the top of
    /// the generated file.
    pub prelude: Option<String>,

    /// trailer denotes the `%%` block, appended to the generated file.
    pub trailer: Option<String>,
}

impl Grammar {
    /// new constructs an empty grammar.
    pub fn new() -> Grammar {
        Grammar::default()
    }

    /// make_rule appends a fresh rule and returns its id.
    pub fn make_rule(&mut self, name: &str) -> RuleId {
        let id = self.rules.len();

        self.rules.push(Rule {
            name: name.to_string(),
            id: id + 1,
            used: false,
            variables: Vec::new(),
            expression: None,
        });

        id
    }

    /// find_rule translates `-` to `_` in the name and returns the
    /// matching rule, creating a forward declaration when none exists.
    pub fn find_rule(&mut self, name: &str) -> RuleId {
        let name = name.replace('-', "_");

        match self.rules.iter().position(|r| r.name == name) {
            Some(id) => id,
            None => self.make_rule(&name),
        }
    }

    /// set_expression installs a rule body and updates the start rule:
    /// the first defined rule wins unless a rule named `start` appears.
    pub fn set_expression(&mut self, rule: RuleId, expression: Expr) {
        self.rules[rule].expression = Some(expression);

        if self.start.is_none() || self.rules[rule].name == "start" {
            self.start = Some(rule);
        }
    }

    /// make_name references a rule, marking it used.
    pub fn make_name(&mut self, rule: RuleId, variable: Option<usize>) -> Expr {
        self.rules[rule].used = true;
        Expr::Name { rule, variable }
    }

    /// make_string decodes a spelling; a decoded length of one
    /// produces a Character, anything else a String.
    pub fn make_string(&mut self, spelling: &str) -> Expr {
        let raw = unescape(spelling);

        if raw.len() == 1 {
            Expr::Character {
                spelling: spelling.to_string(),
                value: raw[0],
            }
        } else {
            Expr::String {
                spelling: spelling.to_string(),
                raw,
            }
        }
    }

    /// make_class parses a class spelling into its bitmap.
    pub fn make_class(&mut self, spelling: &str) -> Expr {
        Expr::Class {
            spelling: Some(spelling.to_string()),
            bits: CharSet::from_spec(spelling),
        }
    }

    /// make_action registers an action under the given rule, assigning
    /// the synthesized name `_<n>_<rule>` and rewriting `$$` to `yy` so
    /// the body can reference the rule's semantic value.
    pub fn make_action(&mut self, rule: RuleId, ordinal: usize, text: &str) -> Expr {
        let name = format!("_{}_{}", ordinal, self.rules[rule].name);

        self.actions.push(Action {
            name,
            text: text.replace("$$", "yy"),
            rule,
        });

        Expr::Action(self.actions.len() - 1)
    }

    /// make_variable returns the slot index for a name within a rule,
    /// reusing an existing slot for a repeated binding.
    pub fn make_variable(&mut self, rule: RuleId, name: &str) -> usize {
        let variables = &mut self.rules[rule].variables;

        match variables.iter().position(|v| v.name == name) {
            Some(index) => index,
            None => {
                variables.push(Variable {
                    name: name.to_string(),
                    offset: 0,
                });

                variables.len() - 1
            }
        }
    }

    /// from_document lowers a surface tree into a grammar.
    pub fn from_document(document: &Document) -> Grammar {
        let mut grammar = Grammar::new();

        for definition in &document.definitions {
            grammar.lower_definition(definition);
        }

        grammar.prelude = document.prelude.clone();
        grammar.trailer = document.trailer.clone();
        grammar
    }

    fn lower_definition(&mut self, definition: &Definition) {
        let rule = self.find_rule(&definition.name);
        let mut actions_in_rule = 0;
        let expression = self.lower(rule, &mut actions_in_rule, &definition.term);
        self.set_expression(rule, expression);
    }

    fn lower(&mut self, rule: RuleId, actions_in_rule: &mut usize, term: &Term) -> Expr {
        match term {
            Term::Dot => Expr::Dot,
            Term::Literal(spelling) => self.make_string(spelling),
            Term::Class(spelling) => self.make_class(spelling),
            Term::Call { name, binding } => {
                let target = self.find_rule(name);
                let variable = binding.as_ref().map(|b| self.make_variable(rule, b));
                self.make_name(target, variable)
            }
            Term::Action(text) => {
                *actions_in_rule += 1;
                self.make_action(rule, *actions_in_rule, text)
            }
            Term::Predicate(text) => Expr::Predicate(text.clone()),
            Term::Begin => Expr::Predicate("YY_BEGIN".to_string()),
            Term::End => Expr::Predicate("YY_END".to_string()),
            Term::Alternate(terms) => {
                let children = terms
                    .iter()
                    .map(|t| self.lower(rule, actions_in_rule, t))
                    .collect();
                Expr::Alternate(children)
            }
            Term::Sequence(terms) => {
                let children = terms
                    .iter()
                    .map(|t| self.lower(rule, actions_in_rule, t))
                    .collect();
                Expr::Sequence(children)
            }
            Term::PeekFor(t) => Expr::PeekFor(Box::new(self.lower(rule, actions_in_rule, t))),
            Term::PeekNot(t) => Expr::PeekNot(Box::new(self.lower(rule, actions_in_rule, t))),
            Term::Query(t) => Expr::Query(Box::new(self.lower(rule, actions_in_rule, t))),
            Term::Star(t) => Expr::Star(Box::new(self.lower(rule, actions_in_rule, t))),
            Term::Plus(t) => Expr::Plus(Box::new(self.lower(rule, actions_in_rule, t))),
        }
    }

    /// render pretty-prints an expression for console use.
    pub fn render(&self, expr: &Expr) -> String {
        match expr {
            Expr::Dot => " .".to_string(),
            Expr::Character { spelling, .. } => format!(" '{}'", spelling),
            Expr::String { spelling, .. } => format!(" \"{}\"", spelling),
            Expr::Class { spelling, bits } => match spelling {
                Some(s) => format!(" [{}]", s),
                None => format!(" {}", bits),
            },
            Expr::Name { rule, .. } => format!(" {}", self.rules[*rule].name),
            Expr::Action(id) => format!(" {{ {} }}", self.actions[*id].text),
            Expr::Predicate(text) => format!(" ?{{ {} }}", text),
            Expr::Alternate(children) => {
                let mut s = " (".to_string();

                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        s.push_str(" |");
                    }

                    s.push_str(&self.render(child));
                }

                s.push_str(" )");
                s
            }
            Expr::Sequence(children) => {
                let mut s = " (".to_string();

                for child in children {
                    s.push_str(&self.render(child));
                }

                s.push_str(" )");
                s
            }
            Expr::PeekFor(e) => format!("&{}", self.render(e)),
            Expr::PeekNot(e) => format!("!{}", self.render(e)),
            Expr::Query(e) => format!("{}?", self.render(e)),
            Expr::Star(e) => format!("{}*", self.render(e)),
            Expr::Plus(e) => format!("{}+", self.render(e)),
            Expr::Table(table) => {
                let mut s = " <(".to_string();

                for (i, raw) in table.strings.iter().enumerate() {
                    if i > 0 {
                        s.push_str(" |");
                    }

                    s.push_str(&format!(" \"{}\"", escape(raw)));
                }

                if table.bits.is_some() {
                    s.push_str(" | [..]");
                }

                if table.empty_string {
                    s.push_str(" | \"\"");
                }

                s.push_str(" )>");
                s
            }
        }
    }

    /// render_rule pretty-prints one rule definition.
    pub fn render_rule(&self, rule: RuleId) -> String {
        let r = &self.rules[rule];

        match &r.expression {
            Some(e) => format!("{}.{} ={} ;", r.name, r.id, self.render(e)),
            None => format!("{}.{} = UNDEFINED ;", r.name, r.id),
        }
    }
}

#[test]
fn test_unescape_named() {
    assert_eq!(unescape("abc"), b"abc");
    assert_eq!(unescape("a\\nb"), b"a\nb");
    assert_eq!(unescape("\\t"), b"\t");
    assert_eq!(unescape("\\a\\b\\e\\f\\v"), vec![0x07, 0x08, 0x1b, 0x0c, 0x0b]);
    assert_eq!(unescape("\\q"), b"q");
    assert_eq!(unescape("\\\\"), b"\\");
    assert_eq!(unescape("\\\""), b"\"");
}

#[test]
fn test_unescape_octal() {
    assert_eq!(unescape("\\0"), vec![0]);
    assert_eq!(unescape("\\101"), b"A");
    assert_eq!(unescape("\\1012"), vec![b'A', b'2']);
    assert_eq!(unescape("\\377"), vec![255]);
    assert_eq!(unescape("\\3777"), vec![255, b'7']);
    assert_eq!(unescape("a\\0b"), vec![b'a', 0, b'b']);
}

#[test]
fn test_unescape_hex() {
    assert_eq!(unescape("\\x41"), b"A");
    assert_eq!(unescape("\\x0a"), b"\n");
    assert_eq!(unescape("\\x41g"), vec![b'A', b'g']);
    assert_eq!(unescape("\\xff"), vec![255]);
}

#[test]
fn test_escape_round_trip() {
    let samples: Vec<Vec<u8>> = vec![
        b"plain".to_vec(),
        b"with \"quotes\" and \\slashes\\".to_vec(),
        vec![0, 1, 2, 0x1b, 0x7f, 0x80, 0xff],
        b"tab\there\nnewline".to_vec(),
        Vec::new(),
    ];

    for bytes in samples {
        assert_eq!(unescape(&escape(&bytes)), bytes);
    }
}

#[test]
fn test_make_string_demotion() {
    let mut g = Grammar::new();

    match g.make_string("a") {
        Expr::Character { spelling, value } => {
            assert_eq!(spelling, "a");
            assert_eq!(value, b'a');
        }
        other => panic!("expected a character, got {:?}", other),
    }

    match g.make_string("\\n") {
        Expr::Character { value, .. } => assert_eq!(value, b'\n'),
        other => panic!("expected a character, got {:?}", other),
    }

    match g.make_string("ab") {
        Expr::String { raw, .. } => assert_eq!(raw, b"ab"),
        other => panic!("expected a string, got {:?}", other),
    }

    match g.make_string("") {
        Expr::String { raw, .. } => assert!(raw.is_empty()),
        other => panic!("expected a string, got {:?}", other),
    }
}

#[test]
fn test_find_rule_translation() {
    let mut g = Grammar::new();
    let a = g.find_rule("end-of-line");
    assert_eq!(g.rules[a].name, "end_of_line");

    let b = g.find_rule("end_of_line");
    assert_eq!(a, b);
    assert_eq!(g.rules.len(), 1);
    assert_eq!(g.rules[a].id, 1);
}

#[test]
fn test_start_selection() {
    let mut g = Grammar::new();
    let a = g.find_rule("alpha");
    g.set_expression(a, Expr::Dot);
    assert_eq!(g.start, Some(a));

    let b = g.find_rule("beta");
    g.set_expression(b, Expr::Dot);
    assert_eq!(g.start, Some(a));

    let s = g.find_rule("start");
    g.set_expression(s, Expr::Dot);
    assert_eq!(g.start, Some(s));
}

#[test]
fn test_make_action_rewrite() {
    let mut g = Grammar::new();
    let r = g.find_rule("value");
    g.make_action(r, 1, "$$ = atoi(yytext);");
    g.make_action(r, 2, "printf(\"%d\", $$$);");

    assert_eq!(g.actions[0].name, "_1_value");
    assert_eq!(g.actions[0].text, "yy = atoi(yytext);");
    assert_eq!(g.actions[1].name, "_2_value");
    assert_eq!(g.actions[1].text, "printf(\"%d\", yy$);");
}

#[test]
fn test_make_variable_dedup() {
    let mut g = Grammar::new();
    let r = g.find_rule("pair");

    let l = g.make_variable(r, "l");
    let r2 = g.make_variable(r, "r");
    let l2 = g.make_variable(r, "l");

    assert_eq!(l, l2);
    assert_ne!(l, r2);
    assert_eq!(g.rules[r].variables.len(), 2);
}

#[test]
fn test_render() {
    let mut g = Grammar::new();
    let r = g.find_rule("start");
    let digits = g.make_class("0-9");
    let x = g.make_string("x");
    g.set_expression(r, Expr::Sequence(vec![digits, Expr::Plus(Box::new(x))]));

    assert_eq!(g.render_rule(r), "start.1 = ( [0-9] 'x'+ ) ;");
}
