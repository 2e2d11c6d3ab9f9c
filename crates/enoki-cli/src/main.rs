//! Command line front end.
//!
//! `enoki [-h] [-g] [file]`: compiles one source file (standard input
//! when no file is given) and writes i386 AT&T assembly to standard
//! output, or a Graphviz dump of every function's CFG with `-g`.

use std::io::Read;
use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};

use enoki_compiler::compile::driver;
use enoki_compiler::emit;

fn build_cli() -> Command {
    Command::new("enoki")
        .about("Experimental compiler for the enoki language")
        .arg(
            Arg::new("graphs")
                .short('g')
                .action(ArgAction::SetTrue)
                .help("Output the control-flow graphs in .dot format instead of assembly"),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Source file (standard input if not specified)"),
        )
}

fn main() {
    let matches = build_cli().get_matches();
    let graphs = matches.get_flag("graphs");
    let file = matches.get_one::<PathBuf>("file");

    let (filename, source) = match file {
        Some(path) => {
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("enoki: cannot read {}: {err}", path.display());
                    std::process::exit(1);
                }
            };
            (path.display().to_string(), source)
        }
        None => {
            let mut source = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut source) {
                eprintln!("enoki: cannot read standard input: {err}");
                std::process::exit(1);
            }
            ("<stdin>".to_string(), source)
        }
    };

    match enoki_compiler::compile_source(&filename, &source) {
        Ok(compilation) => {
            compilation.diagnostics.print(&filename);
            if graphs {
                print!("{}", driver::print_graphs(&compilation.cx));
            } else {
                print!("{}", emit::generate_asm(&compilation.cx));
            }
        }
        Err(
            enoki_compiler::Error::Parse(diagnostics)
            | enoki_compiler::Error::Analyze(diagnostics),
        ) => {
            // Ill-formed input: report and stop before code generation.
            diagnostics.print(&filename);
        }
    }
}
