//! compile emits C recognizers from optimized grammars.

use crate::charset::CharSet;
use crate::tree::{Expr, Grammar, Rule, RuleId, StringTable, Variable, escape};
use std::collections::VecDeque;
use std::io::{self, Write};

/// HEADER lists the C includes every generated recognizer needs.
static HEADER: &str = "\
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
";

/// PREAMBLE carries the default `YY_*` macro definitions and the shared
/// recognizer runtime. The whole block is suppressable by defining
/// `YY_PART`, so a host embedding several parsers keeps one runtime.
static PREAMBLE: &str = r##"#ifndef YY_VARIABLE
#define YY_VARIABLE(T)	static T
#endif
#ifndef YY_LOCAL
#define YY_LOCAL(T)	static T
#endif
#ifndef YY_ACTION
#define YY_ACTION(T)	static T
#endif
#ifndef YY_RULE
#define YY_RULE(T)	static T
#endif
#ifndef YY_PARSE
#define YY_PARSE(T)	T
#endif
#ifndef YYPARSE
#define YYPARSE		yyparse
#endif
#ifndef YYPARSEFROM
#define YYPARSEFROM	yyparsefrom
#endif
#ifndef YY_INPUT
#define YY_INPUT(buf, result, max_size)			\
  {							\
    int yyc= getchar();					\
    result= (EOF == yyc) ? 0 : (*(buf)= yyc, 1);	\
    yyprintf((stderr, "<%c>", yyc));			\
  }
#endif
#ifndef YY_BEGIN
#define YY_BEGIN	( yybegin= yypos, 1)
#endif
#ifndef YY_END
#define YY_END		( yyend= yypos, 1)
#endif
#ifdef YY_DEBUG
# define yyprintf(args)	fprintf args
#else
# define yyprintf(args)
#endif
#ifndef YYSTYPE
#define YYSTYPE	int
#endif

#ifndef YY_STACK_SIZE
#define YY_STACK_SIZE 128
#endif

#ifndef YY_PART

typedef void (*yyaction)(char *yytext, int yyleng);
typedef struct _yythunk { int begin, end;  yyaction  action;  struct _yythunk *next; } yythunk;

YY_VARIABLE(char *   ) yybuf= 0;
YY_VARIABLE(int	     ) yybuflen= 0;
YY_VARIABLE(int	     ) yypos= 0;
YY_VARIABLE(int	     ) yylimit= 0;
YY_VARIABLE(char *   ) yytext= 0;
YY_VARIABLE(int	     ) yytextlen= 0;
YY_VARIABLE(int	     ) yybegin= 0;
YY_VARIABLE(int	     ) yyend= 0;
YY_VARIABLE(int	     ) yytextmax= 0;
YY_VARIABLE(yythunk *) yythunks= 0;
YY_VARIABLE(int	     ) yythunkslen= 0;
YY_VARIABLE(int      ) yythunkpos= 0;
YY_VARIABLE(YYSTYPE  ) yy;
YY_VARIABLE(YYSTYPE *) yyval= 0;
YY_VARIABLE(YYSTYPE *) yyvals= 0;
YY_VARIABLE(int      ) yyvalslen= 0;

YY_LOCAL(int) yyrefill(void)
{
  int yyn;
  while (yybuflen - yypos < 512)
    {
      yybuflen *= 2;
      yybuf= realloc(yybuf, yybuflen);
    }
  YY_INPUT((yybuf + yypos), yyn, (yybuflen - yypos));
  if (!yyn) return 0;
  yylimit += yyn;
  return 1;
}

YY_LOCAL(int) yymatchDot(void)
{
  if (yypos >= yylimit && !yyrefill()) return 0;
  ++yypos;
  return 1;
}

YY_LOCAL(int) yymatchChar(int c)
{
  if (yypos >= yylimit && !yyrefill()) return 0;
  if (yybuf[yypos] == c)
    {
      ++yypos;
      yyprintf((stderr, "  ok   yymatchChar(%c) @ %s\n", c, yybuf+yypos));
      return 1;
    }
  yyprintf((stderr, "  fail yymatchChar(%c) @ %s\n", c, yybuf+yypos));
  return 0;
}

YY_LOCAL(int) yymatchString(char *s)
{
  int yysav= yypos;
  while (*s)
    {
      if (yypos >= yylimit && !yyrefill()) return 0;
      if (yybuf[yypos] != *s)
        {
          yypos= yysav;
          return 0;
        }
      ++s;
      ++yypos;
    }
  return 1;
}

YY_LOCAL(int) yymatchClass(unsigned char *bits)
{
  int c;
  if (yypos >= yylimit && !yyrefill()) return 0;
  c= yybuf[yypos];
  if (bits[c >> 3] & (1 << (c & 7)))
    {
      ++yypos;
      yyprintf((stderr, "  ok   yymatchClass @ %s\n", yybuf+yypos));
      return 1;
    }
  yyprintf((stderr, "  fail yymatchClass @ %s\n", yybuf+yypos));
  return 0;
}

YY_LOCAL(void) yyDo(yyaction action, int begin, int end)
{
  while (yythunkpos >= yythunkslen)
    {
      yythunkslen *= 2;
      yythunks= realloc(yythunks, sizeof(yythunk) * yythunkslen);
    }
  yythunks[yythunkpos].begin=  begin;
  yythunks[yythunkpos].end=    end;
  yythunks[yythunkpos].action= action;
  ++yythunkpos;
}

YY_LOCAL(int) yyText(int begin, int end)
{
  int yyleng= end - begin;
  if (yyleng <= 0)
    yyleng= 0;
  else
    {
      while (yytextlen < (yyleng - 1))
	{
	  yytextlen *= 2;
	  yytext= realloc(yytext, yytextlen);
	}
      memcpy(yytext, yybuf + begin, yyleng);
    }
  yytext[yyleng]= '\0';
  return yyleng;
}

YY_LOCAL(void) yyDone(void)
{
  int pos;
  for (pos= 0;  pos < yythunkpos;  ++pos)
    {
      yythunk *thunk= &yythunks[pos];
      int yyleng= thunk->end ? yyText(thunk->begin, thunk->end) : thunk->begin;
      yyprintf((stderr, "DO [%d] %p %s\n", pos, thunk->action, yytext));
      thunk->action(yytext, yyleng);
    }
  yythunkpos= 0;
}

YY_LOCAL(void) yyCommit()
{
  if ((yylimit -= yypos))
    {
      memmove(yybuf, yybuf + yypos, yylimit);
    }
  yybegin -= yypos;
  yyend -= yypos;
  yypos= yythunkpos= 0;
}

YY_LOCAL(int) yyAccept(int tp0)
{
  if (tp0)
    {
      fprintf(stderr, "accept denied at %d\n", tp0);
      return 0;
    }
  else
    {
      yyDone();
      yyCommit();
    }
  return 1;
}

YY_LOCAL(void) yyPush(char *text, int count)	{ yyval += count; }
YY_LOCAL(void) yyPop(char *text, int count)	{ yyval -= count; }
YY_LOCAL(void) yySet(char *text, int count)	{ yyval[count]= yy; }

#endif /* YY_PART */

#define	YYACCEPT	yyAccept(yythunkpos0)

"##;

/// FOOTER_HEAD opens the entry-point block: buffer initialization and
/// the rule-pointer driver. The `YYPARSE` definition follows it with the
/// start rule substituted in.
static FOOTER_HEAD: &str = r##"

#ifndef YY_PART

typedef int (*yyrule)();

YY_PARSE(int) YYPARSEFROM(yyrule yystart)
{
  int yyok;
  if (!yybuflen)
    {
      yybuflen= 1024;
      yybuf= malloc(yybuflen);
      yytextlen= 1024;
      yytext= malloc(yytextlen);
      yythunkslen= YY_STACK_SIZE;
      yythunks= malloc(sizeof(yythunk) * yythunkslen);
      yyvalslen= YY_STACK_SIZE;
      yyvals= malloc(sizeof(YYSTYPE) * yyvalslen);
      yybegin= yyend= yypos= yylimit= yythunkpos= 0;
    }
  yybegin= yyend= yypos;
  yythunkpos= 0;
  yyval= yyvals;
  yyok= yystart();
  if (yyok) yyDone();
  yyCommit();
  return yyok;
  (void)yyrefill;
  (void)yymatchDot;
  (void)yymatchChar;
  (void)yymatchString;
  (void)yymatchClass;
  (void)yyDo;
  (void)yyText;
  (void)yyDone;
  (void)yyCommit;
  (void)yyAccept;
  (void)yyPush;
  (void)yyPop;
  (void)yySet;
  (void)yytextmax;
}

"##;

/// compile assigns variable offsets and emits the whole C translation
/// unit for a grammar.
pub fn compile<W: Write>(grammar: &mut Grammar, out: W) -> Result<(), String> {
    let start = grammar
        .start
        .ok_or_else(|| "no start rule defined".to_string())?;

    assign_offsets(grammar);

    let mut compiler = Compiler {
        grammar,
        out,
        label: 0,
    };

    compiler.emit(start).map_err(|err| err.to_string())
}

/// assign_offsets numbers each rule's variable slots descending from 0,
/// so the most recently bound variable lands at `yyval[-1]`.
fn assign_offsets(grammar: &mut Grammar) {
    for rule in &mut grammar.rules {
        let total = rule.variables.len() as i32;

        for (index, variable) in rule.variables.iter_mut().enumerate() {
            variable.offset = index as i32 - total;
        }
    }
}

/// Entry is one pending switch level of a StringTable emission:
/// a slice of the sorted strings viewed from a fixed byte offset.
struct Entry {
    label: Option<u32>,
    offset: usize,
    strings: Vec<Vec<u8>>,
}

/// Compiler carries the emission context: the grammar, the output
/// stream, and the label counter, monotonic for the whole run.
struct Compiler<'g, W: Write> {
    grammar: &'g Grammar,
    out: W,
    label: u32,
}

impl<'g, W: Write> Compiler<'g, W> {
    fn yyl(&mut self) -> u32 {
        self.label += 1;
        self.label
    }

    fn begin(&mut self) -> io::Result<()> {
        write!(self.out, "\n  {{")
    }

    fn end(&mut self) -> io::Result<()> {
        write!(self.out, "\n  }}")
    }

    fn label(&mut self, n: u32) -> io::Result<()> {
        write!(self.out, "\n  l{}:;\t", n)
    }

    fn jump(&mut self, n: u32) -> io::Result<()> {
        write!(self.out, "  goto l{};", n)
    }

    fn save(&mut self, n: u32) -> io::Result<()> {
        write!(
            self.out,
            "  int yypos{0}= yypos, yythunkpos{0}= yythunkpos;",
            n
        )
    }

    fn restore(&mut self, n: u32) -> io::Result<()> {
        write!(self.out, "  yypos= yypos{0}; yythunkpos= yythunkpos{0};", n)
    }

    fn case_line(&mut self, c: u8) -> io::Result<()> {
        if c.is_ascii_alphanumeric() {
            write!(self.out, "  case '{}':\n", c as char)
        } else {
            write!(self.out, "  case 0x{:02x}:\n", c)
        }
    }

    /// emit_expr lowers one expression around a failure label `ko`.
    /// Every failure path reaches `ko` with `yypos` and `yythunkpos`
    /// already restored to the state of the current alternative.
    fn emit_expr(&mut self, expr: &Expr, vars: &[Variable], ko: u32) -> io::Result<()> {
        match expr {
            Expr::Dot => write!(self.out, "  if (!yymatchDot()) goto l{};", ko),
            Expr::Character { value, .. } => write!(
                self.out,
                "  if (!yymatchChar('{}')) goto l{};",
                escape(&[*value]),
                ko
            ),
            Expr::String { raw, .. } => write!(
                self.out,
                "  if (!yymatchString(\"{}\")) goto l{};",
                escape(raw),
                ko
            ),
            Expr::Class { bits, .. } => write!(
                self.out,
                "  if (!yymatchClass((unsigned char *)\"{}\")) goto l{};",
                bits.to_c_literal(),
                ko
            ),
            Expr::Name { rule, variable } => {
                write!(
                    self.out,
                    "  if (!yy_{}()) goto l{};",
                    self.grammar.rules[*rule].name, ko
                )?;

                if let Some(slot) = variable {
                    write!(self.out, "  yyDo(yySet, {}, 0);", vars[*slot].offset)?;
                }

                Ok(())
            }
            Expr::Action(id) => write!(
                self.out,
                "  yyDo(yy{}, yybegin, yyend);",
                self.grammar.actions[*id].name
            ),
            Expr::Predicate(text) => write!(
                self.out,
                "  yyText(yybegin, yyend);  if (!({})) goto l{};",
                text, ko
            ),
            Expr::Alternate(children) => {
                if children.len() == 1 {
                    return self.emit_expr(&children[0], vars, ko);
                }

                let ok = self.yyl();
                self.begin()?;
                self.save(ok)?;

                for (index, child) in children.iter().enumerate() {
                    if index + 1 < children.len() {
                        let next = self.yyl();
                        self.emit_expr(child, vars, next)?;
                        self.jump(ok)?;
                        self.label(next)?;
                        self.restore(ok)?;
                    } else {
                        self.emit_expr(child, vars, ko)?;
                    }
                }

                self.end()?;
                self.label(ok)
            }
            Expr::Sequence(children) => {
                for child in children {
                    self.emit_expr(child, vars, ko)?;
                }

                Ok(())
            }
            Expr::PeekFor(element) => {
                let ok = self.yyl();
                self.begin()?;
                self.save(ok)?;
                self.emit_expr(element, vars, ko)?;
                self.restore(ok)?;
                self.end()
            }
            Expr::PeekNot(element) => {
                let ok = self.yyl();
                self.begin()?;
                self.save(ok)?;
                self.emit_expr(element, vars, ok)?;
                self.jump(ko)?;
                self.label(ok)?;
                self.restore(ok)?;
                self.end()
            }
            Expr::Query(element) => {
                let qko = self.yyl();
                let qok = self.yyl();
                self.begin()?;
                self.save(qko)?;
                self.emit_expr(element, vars, qko)?;
                self.jump(qok)?;
                self.label(qko)?;
                self.restore(qko)?;
                self.end()?;
                self.label(qok)
            }
            Expr::Star(element) => {
                let again = self.yyl();
                let out = self.yyl();
                self.label(again)?;
                self.begin()?;
                self.save(out)?;
                self.emit_expr(element, vars, out)?;
                self.jump(again)?;
                self.label(out)?;
                self.restore(out)?;
                self.end()
            }
            Expr::Plus(element) => {
                self.emit_expr(element, vars, ko)?;

                let again = self.yyl();
                let out = self.yyl();
                self.label(again)?;
                self.begin()?;
                self.save(out)?;
                self.emit_expr(element, vars, out)?;
                self.jump(again)?;
                self.label(out)?;
                self.restore(out)?;
                self.end()
            }
            Expr::Table(table) => self.emit_table(table, ko),
        }
    }

    /// emit_table lowers a StringTable as an ordered trie of dispatch
    /// switches over the input, one switch per shared-prefix level.
    ///
    /// `yyrmarker`/`yyraccept` realize longest-match-with-fallback:
    /// whenever a shorter alternative (or head-class byte) would have
    /// matched, the acceptance point is recorded, and a longer candidate
    /// failing past it rewinds there instead of failing the table.
    /// `yythunkpos` is never touched inside the table, so it needs no
    /// save.
    fn emit_table(&mut self, table: &StringTable, ko: u32) -> io::Result<()> {
        let re_fail = self.yyl();
        let re_done = self.yyl();

        let mut bits: Option<CharSet> = table.bits;

        self.begin()?;
        write!(
            self.out,
            "\n  int yyrmarker = yypos, yyraccept = {};\n",
            i32::from(table.empty_string)
        )?;

        let mut queue: VecDeque<Entry> = VecDeque::new();
        queue.push_back(Entry {
            label: None,
            offset: 0,
            strings: table.strings.clone(),
        });

        while let Some(entry) = queue.pop_front() {
            if let Some(label) = entry.label {
                self.label(label)?;
            }

            write!(self.out, "\n  if (yypos >= yylimit && !yyrefill())")?;
            self.jump(re_fail)?;
            write!(self.out, "\n  switch(yybuf[yypos++])")?;
            self.begin()?;
            write!(self.out, "\n")?;

            let count = entry.strings.len();
            let offset = entry.offset;
            let mut i = 0;

            while i < count {
                let c = entry.strings[i][offset];
                let length = entry.strings[i].len() - offset;

                self.case_line(c)?;

                if let Some(b) = bits.as_mut() {
                    if b.is_set(c) {
                        write!(self.out, "    yyrmarker=yypos; yyraccept=1;")?;
                        b.clear(c);
                    }
                }

                // group the contiguous strings sharing this byte
                let mut j = i + 1;

                while j < count {
                    let rs = &entry.strings[j];

                    if rs.len() - offset < 1 || rs[offset] != c {
                        break;
                    }

                    j += 1;
                }

                let mut group = j - i;

                if group == 1 {
                    if length == 1 {
                        self.jump(re_done)?;
                        write!(self.out, "\n")?;
                    } else {
                        let suffix = escape(&entry.strings[i][offset + 1..]);
                        write!(self.out, "    if (yymatchString(\"{}\"))", suffix)?;
                        self.jump(re_done)?;
                        self.jump(re_fail)?;
                        write!(self.out, "\n")?;
                    }

                    i += 1;
                } else {
                    // sorted, so only the first of the group can end
                    // here; accept it and descend with the rest
                    if length == 1 {
                        write!(self.out, "    yyrmarker=yypos; yyraccept=1;\n")?;
                        i += 1;
                        group -= 1;
                    }

                    let label = self.yyl();
                    let next_offset = offset + 1;
                    let mut strings: Vec<Vec<u8>> = entry.strings[i..i + group].to_vec();
                    i += group;

                    strings.sort_by(|a, b| a[next_offset..].cmp(&b[next_offset..]));

                    queue.push_back(Entry {
                        label: Some(label),
                        offset: next_offset,
                        strings,
                    });

                    self.jump(label)?;
                    write!(self.out, "\n")?;
                }
            }

            // remaining head-class bytes share a single accepting exit
            if let Some(b) = bits.take() {
                let mut has_cc = false;

                for c in b.bytes() {
                    has_cc = true;
                    self.case_line(c)?;
                }

                if has_cc {
                    write!(self.out, "    ")?;
                    self.jump(re_done)?;
                    write!(self.out, "\n")?;
                }
            }

            write!(self.out, "  default:")?;
            self.jump(re_fail)?;
            self.end()?;
        }

        self.label(re_fail)?;
        write!(self.out, "  if (!yyraccept)")?;
        self.jump(ko)?;
        write!(self.out, "  yypos=yyrmarker;\n")?;
        self.label(re_done)?;
        self.end()
    }

    /// emit_rule emits one recognizer function. A rule whose top-level
    /// operator cannot fail skips the entry save and the failure
    /// epilogue.
    fn emit_rule(&mut self, rule: &Rule) -> io::Result<()> {
        let expression = match &rule.expression {
            Some(expression) => expression,
            None => return Ok(()),
        };

        let ko = self.yyl();
        let safe = matches!(expression, Expr::Query(_) | Expr::Star(_));

        write!(self.out, "\nYY_RULE(int) yy_{}()\n{{", rule.name)?;

        if !safe {
            self.save(0)?;
        }

        if !rule.variables.is_empty() {
            write!(self.out, "  yyDo(yyPush, {}, 0);", rule.variables.len())?;
        }

        write!(
            self.out,
            "\n  yyprintf((stderr, \"%s\\n\", \"{}\"));",
            rule.name
        )?;

        self.emit_expr(expression, &rule.variables, ko)?;

        write!(
            self.out,
            "\n  yyprintf((stderr, \"  ok   %s @ %s\\n\", \"{}\", yybuf+yypos));",
            rule.name
        )?;

        if !rule.variables.is_empty() {
            write!(self.out, "  yyDo(yyPop, {}, 0);", rule.variables.len())?;
        }

        write!(self.out, "\n  return 1;")?;

        if !safe {
            self.label(ko)?;
            self.restore(0)?;
            write!(
                self.out,
                "\n  yyprintf((stderr, \"  fail %s @ %s\\n\", \"{}\", yybuf+yypos));",
                rule.name
            )?;
            write!(self.out, "\n  return 0;")?;
        }

        write!(self.out, "\n}}")
    }

    /// emit writes the whole translation unit: header, user prelude,
    /// runtime preamble, rule declarations, action callbacks, rule
    /// bodies, the entry-point footer, and the user trailer.
    fn emit(&mut self, start: RuleId) -> io::Result<()> {
        write!(
            self.out,
            "/* A recursive-descent parser generated by peggen {} */\n",
            env!("CARGO_PKG_VERSION")
        )?;
        write!(self.out, "\n")?;
        self.out.write_all(HEADER.as_bytes())?;
        write!(self.out, "#define YYRULECOUNT {}\n", self.grammar.rules.len())?;

        if let Some(prelude) = &self.grammar.prelude {
            write!(self.out, "{}\n", prelude)?;
        }

        self.out.write_all(PREAMBLE.as_bytes())?;

        for rule in &self.grammar.rules {
            write!(
                self.out,
                "YY_RULE(int) yy_{}(); /* {} */\n",
                rule.name, rule.id
            )?;
        }

        write!(self.out, "\n")?;

        for action in &self.grammar.actions {
            write!(
                self.out,
                "YY_ACTION(void) yy{}(char *yytext, int yyleng)\n{{\n",
                action.name
            )?;

            let variables = &self.grammar.rules[action.rule].variables;

            for variable in variables.iter().rev() {
                write!(
                    self.out,
                    "#define {} yyval[{}]\n",
                    variable.name, variable.offset
                )?;
            }

            write!(self.out, "  yyprintf((stderr, \"do yy{}\\n\"));\n", action.name)?;
            write!(self.out, "  {};\n", action.text)?;

            for variable in variables.iter().rev() {
                write!(self.out, "#undef {}\n", variable.name)?;
            }

            write!(self.out, "}}\n")?;
        }

        for rule in &self.grammar.rules {
            self.emit_rule(rule)?;
        }

        self.out.write_all(FOOTER_HEAD.as_bytes())?;
        write!(
            self.out,
            "YY_PARSE(int) YYPARSE(void)\n{{\n  return YYPARSEFROM(yy_{});\n}}\n\n#endif\n",
            self.grammar.rules[start].name
        )?;

        if let Some(trailer) = &self.grammar.trailer {
            write!(self.out, "{}\n", trailer)?;
        }

        Ok(())
    }
}

#[cfg(test)]
fn generate_c(src: &str) -> String {
    let document = crate::syntax::parse_grammar("-", src).unwrap();
    let mut grammar = Grammar::from_document(&document);
    crate::optimize::optimize(&mut grammar);

    let mut out: Vec<u8> = Vec::new();
    compile(&mut grammar, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_emit_matchers() {
    let c = generate_c("start = 'a' \"bc\" [d-f] .\n");

    assert!(c.contains("if (!yymatchChar('a')) goto l"));
    assert!(c.contains("if (!yymatchString(\"bc\")) goto l"));
    assert!(c.contains("if (!yymatchClass((unsigned char *)\"\\x00"));
    assert!(c.contains("if (!yymatchDot()) goto l"));
}

#[test]
fn test_emit_escaped_matchers() {
    let c = generate_c("start = '\\n' \"a\\\"b\" '\\''\n");

    assert!(c.contains("yymatchChar('\\n')"));
    assert!(c.contains("yymatchString(\"a\\\"b\")"));
    assert!(c.contains("yymatchChar('\\'')"));
}

#[test]
fn test_emit_file_shape() {
    let c = generate_c("start = sub\nsub = 'a'\n");

    assert!(c.starts_with("/* A recursive-descent parser generated by peggen"));
    assert!(c.contains("#include <stdio.h>"));
    assert!(c.contains("#define YYRULECOUNT 2"));
    assert!(c.contains("#ifndef YY_PART"));
    assert!(c.contains("YY_RULE(int) yy_start(); /* 1 */"));
    assert!(c.contains("YY_RULE(int) yy_sub(); /* 2 */"));
    assert!(c.contains("YY_RULE(int) yy_start()\n{"));
    assert!(c.contains("if (!yy_sub()) goto l"));
    assert!(c.contains("return YYPARSEFROM(yy_start);"));
    assert!(c.ends_with("#endif\n"));
}

#[test]
fn test_emit_start_fallback() {
    let c = generate_c("top = 'a'\n");
    assert!(c.contains("return YYPARSEFROM(yy_top);"));
}

#[test]
fn test_emit_undefined_rule_skipped() {
    let c = generate_c("start = missing\n");

    assert!(c.contains("YY_RULE(int) yy_missing(); /* 2 */"));
    assert!(!c.contains("YY_RULE(int) yy_missing()\n{"));
}

#[test]
fn test_emit_safe_rule() {
    let c = generate_c("start = 'a'*\n");

    assert!(!c.contains("yypos0"));

    let c = generate_c("start = 'a'\n");

    assert!(c.contains("int yypos0= yypos, yythunkpos0= yythunkpos;"));
    assert!(c.contains("yypos= yypos0; yythunkpos= yythunkpos0;"));
}

#[test]
fn test_emit_lookahead() {
    let c = generate_c("start = !'x' &'y' .\n");

    assert!(c.contains("yymatchChar('x')"));
    assert!(c.contains("yymatchChar('y')"));

    // both lookaheads restore state on their exit paths
    let restores = c.matches("yypos= yypos").count();
    assert!(restores >= 3, "expected restores, got:\n{}", c);
}

#[test]
fn test_emit_actions() {
    let c = generate_c("start = 'a' { $$ = 1; }\n");

    assert!(c.contains("YY_ACTION(void) yy_1_start(char *yytext, int yyleng)"));
    assert!(c.contains("yy = 1;"));
    assert!(c.contains("yyDo(yy_1_start, yybegin, yyend);"));
}

#[test]
fn test_emit_variables() {
    let c = generate_c("pair = l:item r:item { $$ = l + r; }\nitem = .\n");

    assert!(c.contains("yyDo(yyPush, 2, 0);"));
    assert!(c.contains("yyDo(yyPop, 2, 0);"));
    assert!(c.contains("#define r yyval[-1]\n#define l yyval[-2]\n"));
    assert!(c.contains("#undef r\n#undef l\n"));
    assert!(c.contains("yyDo(yySet, -2, 0);"));
    assert!(c.contains("yyDo(yySet, -1, 0);"));
}

#[test]
fn test_emit_markers_and_predicates() {
    let c = generate_c("start = < . > &{ yyleng > 0 }\n");

    assert!(c.contains("yyText(yybegin, yyend);  if (!(YY_BEGIN)) goto l"));
    assert!(c.contains("yyText(yybegin, yyend);  if (!(YY_END)) goto l"));
    assert!(c.contains("if (!( yyleng > 0 )) goto l"));
}

#[test]
fn test_emit_string_table() {
    let c = generate_c("start = \"goodbye\" | \"good\" | \"go\"\n");

    assert!(c.contains("int yyrmarker = yypos, yyraccept = 0;"));
    assert!(c.contains("if (yypos >= yylimit && !yyrefill())"));
    assert!(c.contains("switch(yybuf[yypos++])"));
    assert!(c.contains("case 'g':"));
    assert!(c.contains("case 'o':"));
    assert!(c.contains("yyrmarker=yypos; yyraccept=1;"));
    assert!(c.contains("if (yymatchString(\"ye\"))"));
    assert!(c.contains("if (!yyraccept)"));
    assert!(c.contains("yypos=yyrmarker;"));
}

#[test]
fn test_emit_string_table_head_class() {
    let c = generate_c("start = \"foo\" | \"bar\" | [xy]\n");

    assert!(c.contains("case 'f':"));
    assert!(c.contains("case 'b':"));
    assert!(c.contains("if (yymatchString(\"oo\"))"));
    assert!(c.contains("if (yymatchString(\"ar\"))"));
    assert!(c.contains("case 'x':\n  case 'y':\n"));
}

#[test]
fn test_emit_string_table_empty_string() {
    let c = generate_c("start = \"ab\" | \"cd\" | ''\n");
    assert!(c.contains("int yyrmarker = yypos, yyraccept = 1;"));
}

#[test]
fn test_emit_dominated_string_never_tables() {
    let c = generate_c("start = \"foo\" | \"foobar\"\n");

    assert!(c.contains("if (!yymatchString(\"foo\")) goto l"));
    assert!(!c.contains("switch(yybuf[yypos++])"));
}

#[test]
fn test_emit_prelude_and_trailer() {
    let c = generate_c("%{\n#include \"actions.h\"\n%}\nstart = .\n%%\nint main() { return yyparse(); }\n");

    assert!(c.contains("#include \"actions.h\""));
    assert!(c.contains("int main() { return yyparse(); }"));

    let head = c.find("#include \"actions.h\"").unwrap();
    let preamble = c.find("#ifndef YY_VARIABLE").unwrap();
    assert!(head < preamble);
}

#[test]
fn test_compile_requires_start() {
    let document = crate::syntax::parse_grammar("-", "# empty\n").unwrap();
    let mut grammar = Grammar::from_document(&document);
    let mut out: Vec<u8> = Vec::new();

    assert_eq!(
        compile(&mut grammar, &mut out),
        Err("no start rule defined".to_string())
    );
}

#[test]
fn test_labels_unique() {
    let c = generate_c("start = ('a' | 'b') ('c' | 'd') 'e'* 'f'+\n");

    let mut labels: Vec<&str> = c
        .split("\n  l")
        .skip(1)
        .map(|tail| tail.split(':').next().unwrap_or(""))
        .collect();

    let total = labels.len();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), total, "duplicate labels in:\n{}", c);
}
