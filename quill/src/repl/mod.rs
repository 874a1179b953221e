//! Interactive Quill session.

use crate::interp::{display_value, Interpreter, Value};
use crate::lexer::tokenize;
use crate::parser::parse;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = ".quill_history";

/// REPL state. The editor and the interpreter live for the whole session,
/// so definitions and imports accumulate across lines.
pub struct Repl {
    editor: DefaultEditor,
    interpreter: Interpreter,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL
    pub fn new() -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let interpreter = Interpreter::new();

        // Try to find history file in home directory
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            interpreter,
            history_path,
        };

        // Load history if available
        if let Some(ref path) = repl.history_path {
            let _ = repl.editor.load_history(path);
        }

        Ok(repl)
    }

    /// Run the REPL
    pub fn run(&mut self) -> RlResult<()> {
        println!("Quill {}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    // Handle commands
                    if line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }

                    self.eval_line(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        // Save history
        if let Some(ref path) = self.history_path {
            let _ = self.editor.save_history(path);
        }

        Ok(())
    }

    /// Handle REPL commands (starting with :). Returns true to exit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":quit" | ":q" | ":exit" => {
                println!("Goodbye!");
                true
            }
            ":help" | ":h" | ":?" => {
                self.print_help();
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }

    /// Print help message
    fn print_help(&self) {
        println!("Quill REPL Commands:");
        println!("  :help, :h, :?   Show this help");
        println!("  :quit, :q       Exit the REPL");
        println!("  :clear          Clear the screen");
        println!();
        println!("Definitions persist across lines:");
        println!("  let total = 0;");
        println!("  fn add(a, b) {{ return a + b; }}");
        println!("  add(total, 2)");
        println!();
        println!("The trailing semicolon is optional for a single statement.");
        println!("The value of the last statement is echoed unless it is null.");
    }

    /// Parse and run one line against the persistent interpreter.
    fn eval_line(&mut self, line: &str) {
        // a lone expression or statement may omit its semicolon
        let mut source = line.to_string();
        if !source.ends_with(';') && !source.ends_with('}') {
            source.push(';');
        }

        let tokens = match tokenize(&source) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("{}", err.message());
                return;
            }
        };

        let program = match parse(tokens) {
            Ok(program) => program,
            Err(err) => {
                eprintln!("{}", err.message());
                return;
            }
        };

        match self.interpreter.run(&program) {
            // declarations and assignments carry their value here, so
            // `let x = 5` echoes 5
            Ok(Value::Null) => {}
            Ok(value) => println!("{}", display_value(self.interpreter.heap(), value)),
            Err(err) => eprintln!("{err}"),
        }
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new().expect("Failed to create REPL")
    }
}

/// Get home directory
fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
