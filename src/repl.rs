use crate::ast::Stmt;
use crate::error::MonkeyError;
use crate::evaluator::Evaluator;
use log::debug;
use std::io::{self, BufRead, Write};

/// Settings for an interactive session.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    pub prompt: String,
    pub show_banner: bool,
    /// Name the banner greets. Left out of the greeting when unknown.
    pub user: Option<String>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: ">> ".to_string(),
            show_banner: true,
            user: None,
        }
    }
}

/// Read-evaluate-print loop over one evaluator, so bindings persist between lines.
pub struct Repl {
    config: ReplConfig,
    evaluator: Evaluator,
}

impl Repl {
    pub fn new(config: ReplConfig) -> Self {
        Self {
            config,
            evaluator: Evaluator::new(),
        }
    }

    /// Run the session on standard input and output.
    pub fn start(&self) -> io::Result<()> {
        let stdin = io::stdin();
        self.run(stdin.lock(), io::stdout())
    }

    /// Run the session until end of input or `exit`. Diagnostics go to stderr.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> io::Result<()> {
        debug!("starting session with prompt {:?}", self.config.prompt);

        if self.config.show_banner {
            match &self.config.user {
                Some(user) => writeln!(
                    output,
                    "Hello {}! This is the Monkey programming language!",
                    user
                )?,
                None => writeln!(output, "Hello! This is the Monkey programming language!")?,
            }
            writeln!(output, "Type in commands")?;
        }

        loop {
            write!(output, "{}", self.config.prompt)?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                // EOF reached (Ctrl+D or piped input ended)
                writeln!(output)?;
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                writeln!(output, "Goodbye!")?;
                break;
            }

            match self.run_line(line) {
                Ok(Some(text)) => writeln!(output, "{}", text)?,
                Ok(None) => {}
                Err(errors) => {
                    for error in &errors {
                        error.report(line);
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse and evaluate one input. Returns the text to print, if any: nothing is
    /// printed for empty input or input ending in a `let`.
    pub fn run_line(&self, source: &str) -> Result<Option<String>, Vec<MonkeyError>> {
        let (program, errors) = crate::parse(source);
        if !errors.is_empty() {
            return Err(errors);
        }

        let value = self
            .evaluator
            .evaluate_program(&program)
            .map_err(|error| vec![error])?;

        let prints_value = !matches!(program.statements.last(), None | Some(Stmt::Let { .. }));
        Ok(prints_value.then(|| value.to_string()))
    }
}
