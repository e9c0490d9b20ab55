use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

const USAGE: &str = "\
usage: decafc [-o | --output <file>] [-d | --debug <tag>]
        [-h | --help] [-v | --version] [<file>]";

const HELP: &str = "usage: decafc [options] [<file>]
options:
    -o | --output <file>    Specifies the output-file to write to
    -d | --debug <tag>      Turns on a debug tag; may be repeated.
                            Recognized tags: ast, ast+, st, sttrace, tac, tac+
    -h                      Prints usage information
    --help                  Prints elaborate help information
    -v | --version          Prints version information

file:
    The Decaf source file to be read; standard input when omitted";

fn sys_info(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(0);
}

pub struct CliOptions {
    // optional input file; stdin when not given
    pub file_path: Option<PathBuf>,

    // optional argument specifying output-file to write to
    pub output_path: Option<PathBuf>,

    // debug tags turned on with -d, printing-only
    pub debug_tags: Vec<String>,
}

impl CliOptions {
    fn default() -> CliOptions {
        CliOptions {
            file_path: None,
            output_path: None,
            debug_tags: Vec::new(),
        }
    }
    pub fn parse() -> Result<CliOptions, String> {
        let mut cli_options = CliOptions::default();
        let mut args = std::env::args().skip(1);

        while let Some(arg) = args.next() {
            if arg.starts_with('-') {
                match arg.as_str() {
                    "-o" | "--output" => match args.next() {
                        Some(file) => cli_options.output_path = Some(PathBuf::from(file)),
                        None => return Err(format!("Expects file following '{}' option", arg)),
                    },
                    "-d" | "--debug" => match args.next() {
                        Some(tag) => cli_options.debug_tags.push(tag),
                        None => return Err(format!("Expects tag following '{}' option", arg)),
                    },
                    "-h" => sys_info(USAGE),
                    "--help" => sys_info(HELP),
                    "-v" | "--version" => sys_info(VERSION),
                    _ => return Err(format!("Illegal option '{}'", arg)),
                }
            } else {
                cli_options.file_path = Some(PathBuf::from(arg));
            }
        }

        Ok(cli_options)
    }
}
