mod ast;
mod codegen;
mod ir;
mod lexer;
mod parser;

use std::fs;

use anyhow::Context;
use clap::{App, Arg};

use codegen::Codegen;
use lexer::Token;
use parser::Parser;

fn main() -> anyhow::Result<()> {
    let matches = App::new("prism")
        .about("compiler front end for the prism expression language")
        .arg(
            Arg::with_name("input")
                .help("source file to compile")
                .index(1)
                .required_unless("eval"),
        )
        .arg(
            Arg::with_name("eval")
                .short("e")
                .long("eval")
                .value_name("SOURCE")
                .help("compile source given on the command line")
                .takes_value(true),
        )
        .get_matches();

    let source = match matches.value_of("eval") {
        Some(src) => src.to_string(),
        None => {
            // clap guarantees input is present when eval is absent
            let path = matches.value_of("input").unwrap();
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?
        }
    };

    let parser = Parser::default();
    let mut codegen = Codegen::new("main");
    let mut tokens = lexer::lex(&source);

    // one top-level unit at a time - an error only loses that unit
    while let Some(cur_tok) = tokens.last() {
        let node = match cur_tok {
            Token::Delimiter => {
                tokens.pop();
                continue;
            }
            Token::Def => parser.parse_definition(&mut tokens),
            Token::Extern => parser.parse_extern(&mut tokens),
            _ => parser.parse_toplevel_expr(&mut tokens),
        };

        match node {
            Ok(node) => {
                if let Err(err) = codegen.codegen_node(&node) {
                    eprintln!("error: {}", err);
                }
            }
            Err(err) => {
                eprintln!("error: {}", err);
                // skip the offending token and retry at the next unit
                tokens.pop();
            }
        }
    }

    print!("{}", codegen.module);

    Ok(())
}
