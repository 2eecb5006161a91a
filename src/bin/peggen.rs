//! CLI peggen tool

extern crate die;
extern crate getopts;
extern crate peggen;

use self::peggen::{inspect, optimize, syntax, tree, warnings};
use die::{Die, die};
use std::env;
use std::fs;
use std::io;
use std::io::Write;
use std::path;

/// dump prints the optimized rules of a grammar to stderr.
fn dump(pth_string: &str, grammar_str: &str) -> Result<(), String> {
    let document = syntax::parse_grammar(pth_string, grammar_str)?;
    let mut grammar = tree::Grammar::from_document(&document);
    optimize::optimize(&mut grammar);

    for id in 0..grammar.rules.len() {
        eprintln!("{}", grammar.render_rule(id));
    }

    Ok(())
}

/// CLI entrypoint
fn main() {
    let brief: String = format!(
        "Usage: {} <OPTIONS> <grammar> [<grammar> ...]",
        env!("CARGO_PKG_NAME")
    );

    let mut opts: getopts::Options = getopts::Options::new();
    opts.optopt("o", "output", "write the generated parser to FILE", "FILE");
    opts.optflag("n", "dry-run", "lint grammars without generating code");
    opts.optflag("m", "metadata", "print grammar metadata as JSON");
    opts.optflag("d", "dump", "print optimized rules to stderr");
    opts.optflag("h", "help", "print usage info");
    opts.optflag("v", "version", "print version info");

    let usage: String = opts.usage(&brief);
    let arguments: Vec<String> = env::args().collect();
    let optmatches: getopts::Matches = opts.parse(&arguments[1..]).die(&usage);

    if optmatches.opt_present("h") {
        die!(0; usage);
    }

    if optmatches.opt_present("v") {
        die!(0; format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
    }

    let dry_run: bool = optmatches.opt_present("n");
    let metadata: bool = optmatches.opt_present("m");
    let output_option: Option<String> = optmatches.opt_str("o");
    let pth_strings: Vec<String> = optmatches.free.clone();

    if pth_strings.is_empty() {
        die!(1; usage);
    }

    if metadata {
        for pth_string in &pth_strings {
            let pth: &path::Path = path::Path::new(pth_string);
            let md: inspect::Metadata = inspect::analyze(pth).die("unable to inspect file path");
            println!("{}", md);
        }

        die!(0);
    }

    if dry_run {
        let mut found_quirk = false;

        for pth_string in &pth_strings {
            let pth: &path::Path = path::Path::new(pth_string);
            let md: fs::Metadata = fs::metadata(pth).die("unable to access file path");

            if md.is_dir() {
                die!(1; usage);
            }

            let grammar_str: &str = &fs::read_to_string(pth).die("unable to read grammar");

            match warnings::lint(pth_string, grammar_str) {
                Ok(found) => {
                    for warning in &found {
                        eprintln!("{}", warning);
                    }

                    found_quirk = found_quirk || !found.is_empty();
                }
                Err(err) => {
                    found_quirk = true;
                    eprintln!("{}", err);
                }
            }
        }

        if found_quirk {
            die!(1);
        }

        die!(0);
    }

    if pth_strings.len() > 1 {
        die!(1; usage);
    }

    let pth_string: &String = &pth_strings[0];
    let pth: &path::Path = path::Path::new(pth_string);
    let md: fs::Metadata = fs::metadata(pth).die("unable to access file path");

    if md.is_dir() {
        die!(1; usage);
    }

    let grammar_str: &str = &fs::read_to_string(pth).die("unable to read grammar");

    if optmatches.opt_present("d") {
        if let Err(err) = dump(pth_string, grammar_str) {
            die!(err);
        }
    }

    let mut sink: Box<dyn Write> = match output_option {
        Some(output_string) => {
            Box::new(fs::File::create(&output_string).die("unable to create output file"))
        }
        None => Box::new(io::stdout()),
    };

    match peggen::generate(pth_string, grammar_str, &mut sink) {
        Ok(found) => {
            for warning in found {
                eprintln!("{}", warning);
            }
        }
        Err(err) => {
            die!(err);
        }
    }
}
