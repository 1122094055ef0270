use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use futures::executor::block_on;
use futures::future::LocalBoxFuture;

use formbasic::database::{QueryError, Row};
use formbasic::host::Host;
use formbasic::interpreter::Interpreter;
use formbasic::lexer;
use formbasic::parser::Parser;
use formbasic::runtime::{RuntimeContext, Value};

/// Interactive terminal host: dialogs and prompts go to stdout, answers
/// come from stdin, file builtins touch the working directory. There is
/// no database behind the CLI, so queries fail with a diagnostic.
struct ConsoleHost;

impl ConsoleHost {
    fn read_line(&self) -> String {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim_end_matches(['\r', '\n']).to_string()
    }
}

impl Host for ConsoleHost {
    fn property_changed(&self, component: &str, property: &str, value: &Value) {
        println!("[{component}.{property}] = {}", value.display());
    }

    fn console_log(&self, text: &str) {
        println!("{text}");
    }

    fn console_write(&self, text: &str) {
        print!("{text}");
        let _ = io::stdout().flush();
    }

    fn report_error(&self, message: &str, line: Option<usize>) {
        match line {
            Some(line) => eprintln!("Error (line {line}): {message}"),
            None => eprintln!("Error: {message}"),
        }
    }

    fn message_box(&self, text: String) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            print!("[MessageBox] {text} -- press Enter to continue ");
            let _ = io::stdout().flush();
            self.read_line();
        })
    }

    fn input_box(
        &self,
        prompt: String,
        title: Option<String>,
        default: Option<String>,
    ) -> LocalBoxFuture<'_, String> {
        Box::pin(async move {
            if let Some(title) = title {
                println!("[{title}]");
            }
            print!("{prompt} ");
            let _ = io::stdout().flush();
            let answer = self.read_line();
            if answer.is_empty() {
                default.unwrap_or_default()
            } else {
                answer
            }
        })
    }

    fn console_read_line(&self) -> LocalBoxFuture<'_, String> {
        Box::pin(async move { self.read_line() })
    }

    fn console_read_key(&self) -> LocalBoxFuture<'_, String> {
        Box::pin(async move { self.read_line().chars().next().map(String::from).unwrap_or_default() })
    }

    fn write_all_text(&self, name: &str, content: &str, extension: &str) {
        if let Err(error) = fs::write(format!("{name}.{extension}"), content) {
            self.report_error(&format!("Writing {name}.{extension}: {error}"), None);
        }
    }

    fn read_all_text(&self, name: &str, extension: &str) -> String {
        fs::read_to_string(format!("{name}.{extension}")).unwrap_or_default()
    }

    fn run_query(&self, _sql: &str) -> LocalBoxFuture<'_, Result<Vec<Row>, QueryError>> {
        Box::pin(async { Err(QueryError::new("no database available")) })
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next();
    if args.next().is_some() {
        bail!("Only one input file is supported");
    }

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let tokens = lexer::tokenize(&source);
    let block = Parser::new(tokens).parse().context("Parsing script")?;

    let ctx = Rc::new(std::cell::RefCell::new(RuntimeContext::new()));
    let interpreter = Interpreter::new(ctx, Rc::new(ConsoleHost));
    block_on(interpreter.execute_block(&block)).context("Running script")?;
    Ok(())
}
