mod cli_options;

use cli_options::CliOptions;
use decafc_compiler::{compile, Config};
use std::fs;
use std::io::Read;

fn sys_error(msg: &str, exit_code: i32) -> ! {
    eprintln!("decafc: {msg}");
    std::process::exit(exit_code);
}

fn read_source(options: &CliOptions) -> String {
    match &options.file_path {
        Some(path) => fs::read_to_string(path)
            .unwrap_or_else(|err| sys_error(&format!("{}: {}", path.display(), err), 2)),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .unwrap_or_else(|err| sys_error(&format!("<stdin>: {}", err), 2));
            source
        }
    }
}

fn main() {
    let options =
        CliOptions::parse().unwrap_or_else(|msg| sys_error(&format!("<command-line>: {msg}"), 2));
    let config = Config::new(options.debug_tags.iter().cloned());
    let source = read_source(&options);

    match compile(&source, &config) {
        Ok(output) => match &options.output_path {
            Some(path) => fs::write(path, output)
                .unwrap_or_else(|err| sys_error(&format!("{}: {}", path.display(), err), 2)),
            None => print!("{}", output),
        },
        Err(errors) => {
            for error in &errors {
                error.print_error();
            }
            eprintln!(
                "\n{} error{} generated.",
                errors.len(),
                if errors.len() > 1 { "s" } else { "" }
            );
            std::process::exit(1);
        }
    }
}
