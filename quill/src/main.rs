//! Quill Interpreter CLI

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quill", version, about = "Quill - a small scripting language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Quill script
    Run {
        /// Script to execute (.ql)
        file: PathBuf,
    },
    /// Start an interactive session
    Repl,
    /// Parse and dump AST (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // no subcommand drops into the REPL
    let result = match cli.command {
        Some(Command::Run { file }) => run_file(&file),
        Some(Command::Repl) | None => run_repl(),
        Some(Command::Parse { file }) => parse_file(&file),
        Some(Command::Tokens { file }) => tokenize_file(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let filename = path.display().to_string();
    if path.extension().and_then(|e| e.to_str()) != Some("ql") {
        return Err(format!("quill only runs .ql files: \"{filename}\"").into());
    }
    let source = std::fs::read_to_string(path)?;

    let tokens = match quill::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(err) => {
            quill::error::report_error(&filename, &source, &err);
            std::process::exit(1);
        }
    };

    let program = match quill::parser::parse(tokens) {
        Ok(program) => program,
        Err(err) => {
            quill::error::report_error(&filename, &source, &err);
            std::process::exit(1);
        }
    };

    let interpreter = quill::interp::Interpreter::new();
    if let Err(err) = interpreter.interpret(&program) {
        quill::error::report_runtime_error(&filename, &source, &err);
        std::process::exit(1);
    }

    Ok(())
}

fn run_repl() -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = quill::repl::Repl::new()?;
    repl.run()?;
    Ok(())
}

fn parse_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let tokens = match quill::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(err) => {
            quill::error::report_error(&filename, &source, &err);
            std::process::exit(1);
        }
    };
    let program = match quill::parser::parse(tokens) {
        Ok(program) => program,
        Err(err) => {
            quill::error::report_error(&filename, &source, &err);
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}

fn tokenize_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = match quill::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(err) => {
            let filename = path.display().to_string();
            quill::error::report_error(&filename, &source, &err);
            std::process::exit(1);
        }
    };
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(())
}
