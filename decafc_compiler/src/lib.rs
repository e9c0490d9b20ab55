pub mod compiler;

use compiler::ast::printer;
use compiler::codegen::{self, mips::Mips};
use compiler::parser::Parser;
use compiler::scanner::Scanner;
use compiler::semantic::Analyzer;

use std::collections::HashSet;

pub use compiler::common::error::{Error, ErrorKind};

/// Compilation settings threaded through every stage. Debug tags are
/// printing-only: `ast`, `ast+`, `st`, `sttrace`, `tac`, `tac+`.
#[derive(Debug, Default)]
pub struct Config {
    debug: HashSet<String>,
}

impl Config {
    pub fn new(debug_tags: impl IntoIterator<Item = String>) -> Config {
        Config {
            debug: debug_tags.into_iter().collect(),
        }
    }
    pub fn debug_on(&self, tag: &str) -> bool {
        self.debug.contains(tag)
    }
}

pub fn compile(source: &str, config: &Config) -> Result<String, Vec<Error>> {
    // scan input
    let tokens = Scanner::new(source).scan()?;

    // parse tokens and build the tree
    let mut ast = Parser::new(tokens).parse()?;
    ast.link_parents();

    if config.debug_on("ast") {
        eprintln!("{}", printer::dump(&ast, false));
    }

    // build the symbol table, then run the three checking passes
    Analyzer::new(&mut ast, config).check()?;

    if config.debug_on("ast+") {
        eprintln!("{}", printer::dump(&ast, true));
    }

    // assign offsets and lower the tree to TAC
    let code = codegen::emit(&mut ast, config)?;

    // final code generation: the TAC listing itself or MIPS assembly
    if config.debug_on("tac") {
        let mut listing = code
            .iter()
            .map(|instr| instr.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        listing.push('\n');
        Ok(listing)
    } else {
        Ok(Mips::new().translate(&code))
    }
}
