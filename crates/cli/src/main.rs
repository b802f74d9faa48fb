//! Command-line driver for the Knight interpreter.
//!
//! Thin by design: the library crates own every bit of interpreter
//! semantics, so `main` only has to pick a source (inline expression or
//! file), configure logging, and translate the library's `Result` into a
//! process exit code. This is the only place in the workspace allowed to
//! call `std::process::exit` (via `ExitCode`) — `knight-core` and
//! `knight-runtime` never do.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use knight_core::{Environment, KnightError};
use knight_runtime::play;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interpreter for the Knight programming language", long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["expr", "path"])))]
struct Cli {
    /// Evaluate an inline Knight expression instead of reading a file
    #[arg(short = 'e', long = "expr", value_name = "EXPRESSION")]
    expr: Option<String>,

    /// Knight source file to read and evaluate
    #[arg(value_name = "FILE")]
    path: Option<PathBuf>,

    /// Increase logging verbosity (repeatable: -v info, -vv debug, -vvv+ trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Builds the `tracing` subscriber from `-v`'s count, overridable by
/// `KNIGHT_LOG` (`tracing_subscriber::EnvFilter` syntax).
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("KNIGHT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn read_source(cli: &Cli) -> std::io::Result<Vec<u8>> {
    if let Some(expr) = &cli.expr {
        return Ok(expr.clone().into_bytes());
    }
    let path = cli.path.as_ref().expect("clap's ArgGroup guarantees expr xor path");
    let mut buf = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = match read_source(&cli) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("knight: error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut env = Environment::new();
    match play(&source, &mut env) {
        Ok(value) => {
            value.decrement(env.interner());
            ExitCode::SUCCESS
        }
        Err(KnightError::Exit(code)) => {
            tracing::debug!(code, "exiting via Q");
            ExitCode::from(code)
        }
        Err(e) => {
            eprintln!("knight: error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;

    use super::{Cli, read_source};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn expr_and_path_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["knight", "-e", "1", "prog.kn"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn one_of_expr_or_path_is_required() {
        let err = Cli::try_parse_from(["knight"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn inline_expr_is_read_verbatim() {
        let cli = Cli::try_parse_from(["knight", "-e", "+ 1 2"]).unwrap();
        assert_eq!(read_source(&cli).unwrap(), b"+ 1 2");
    }

    #[test]
    fn file_path_is_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"OUTPUT \"hi\"").unwrap();
        let cli = Cli::try_parse_from(["knight", file.path().to_str().unwrap()]).unwrap();
        assert_eq!(read_source(&cli).unwrap(), b"OUTPUT \"hi\"");
    }
}
