//! Boundary between the interpreter and the surrounding application. The
//! interpreter pushes side effects (property changes, console text,
//! diagnostics) and awaits the calls that need a human response — those
//! return `LocalBoxFuture`s so the host decides when execution resumes.

use std::cell::RefCell;
use std::collections::VecDeque;

use futures::future::LocalBoxFuture;
use rustc_hash::FxHashMap;

use crate::database::{QueryError, Row};
use crate::runtime::value::Value;

pub trait Host {
    /// A component property was mutated. Fired on every write, before the
    /// next statement runs.
    fn property_changed(&self, component: &str, property: &str, value: &Value);

    /// `Console.WriteLine`.
    fn console_log(&self, text: &str);

    /// `Console.Write` — no trailing newline.
    fn console_write(&self, text: &str);

    /// Non-fatal diagnostic (parse errors, division by zero, loop cap).
    fn report_error(&self, message: &str, line: Option<usize>);

    /// `MsgBox` / `MessageBox.Show`; resolves when the user dismisses it.
    fn message_box(&self, text: String) -> LocalBoxFuture<'_, ()>;

    /// `InputBox`; resolves to the entered text.
    fn input_box(
        &self,
        prompt: String,
        title: Option<String>,
        default: Option<String>,
    ) -> LocalBoxFuture<'_, String>;

    /// `Console.ReadLine`.
    fn console_read_line(&self) -> LocalBoxFuture<'_, String>;

    /// `Console.ReadKey`; resolves to the pressed key.
    fn console_read_key(&self) -> LocalBoxFuture<'_, String>;

    /// `File.WriteAllText`.
    fn write_all_text(&self, name: &str, content: &str, extension: &str);

    /// `File.ReadAllText`; missing files read as empty text.
    fn read_all_text(&self, name: &str, extension: &str) -> String;

    /// Transport for the database emulation. Receives fully rendered SQL
    /// (parameters already substituted) and resolves to the result rows.
    fn run_query(&self, sql: &str) -> LocalBoxFuture<'_, Result<Vec<Row>, QueryError>>;
}

/// Everything observable that crossed the host boundary, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PropertyChanged {
        component: String,
        property: String,
        value: Value,
    },
    ConsoleLine(String),
    ConsoleWrite(String),
    Error {
        message: String,
        line: Option<usize>,
    },
    MessageBox(String),
    InputBox {
        prompt: String,
    },
    ReadLine,
    ReadKey,
    FileWritten {
        name: String,
        extension: String,
    },
    Query(String),
}

/// Replay host for headless runs: dialogs resolve immediately, prompts
/// answer from a queue, queries return canned results, and every boundary
/// crossing is recorded. Used by the fixture harness and unit tests, and
/// usable by embedders that want to run handlers without a UI.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    events: RefCell<Vec<HostEvent>>,
    output: RefCell<String>,
    inputs: RefCell<VecDeque<String>>,
    keys: RefCell<VecDeque<String>>,
    query_results: RefCell<VecDeque<Result<Vec<Row>, QueryError>>>,
    files: RefCell<FxHashMap<String, String>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an answer for the next `InputBox` or `Console.ReadLine`.
    pub fn push_input(&self, line: impl Into<String>) {
        self.inputs.borrow_mut().push_back(line.into());
    }

    /// Queue a key for the next `Console.ReadKey`.
    pub fn push_key(&self, key: impl Into<String>) {
        self.keys.borrow_mut().push_back(key.into());
    }

    /// Queue the outcome of the next query the script runs.
    pub fn push_query_result(&self, result: Result<Vec<Row>, QueryError>) {
        self.query_results.borrow_mut().push_back(result);
    }

    /// Seed a file for `File.ReadAllText`.
    pub fn seed_file(&self, name: &str, extension: &str, content: impl Into<String>) {
        self.files
            .borrow_mut()
            .insert(format!("{name}.{extension}"), content.into());
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.borrow().clone()
    }

    /// Console text accumulated so far (`WriteLine` lines plus raw writes).
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                HostEvent::Error { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn property_changes(&self) -> Vec<(String, String, Value)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                HostEvent::PropertyChanged {
                    component,
                    property,
                    value,
                } => Some((component.clone(), property.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn file_content(&self, name: &str, extension: &str) -> Option<String> {
        self.files.borrow().get(&format!("{name}.{extension}")).cloned()
    }

    fn record(&self, event: HostEvent) {
        self.events.borrow_mut().push(event);
    }

    fn next_input(&self) -> String {
        self.inputs.borrow_mut().pop_front().unwrap_or_default()
    }
}

impl Host for ScriptedHost {
    fn property_changed(&self, component: &str, property: &str, value: &Value) {
        self.record(HostEvent::PropertyChanged {
            component: component.to_string(),
            property: property.to_string(),
            value: value.clone(),
        });
    }

    fn console_log(&self, text: &str) {
        self.record(HostEvent::ConsoleLine(text.to_string()));
        let mut output = self.output.borrow_mut();
        output.push_str(text);
        output.push('\n');
    }

    fn console_write(&self, text: &str) {
        self.record(HostEvent::ConsoleWrite(text.to_string()));
        self.output.borrow_mut().push_str(text);
    }

    fn report_error(&self, message: &str, line: Option<usize>) {
        self.record(HostEvent::Error {
            message: message.to_string(),
            line,
        });
    }

    fn message_box(&self, text: String) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            self.record(HostEvent::MessageBox(text));
        })
    }

    fn input_box(
        &self,
        prompt: String,
        _title: Option<String>,
        default: Option<String>,
    ) -> LocalBoxFuture<'_, String> {
        Box::pin(async move {
            self.record(HostEvent::InputBox { prompt });
            let mut answer = self.next_input();
            if answer.is_empty()
                && let Some(default) = default
            {
                answer = default;
            }
            answer
        })
    }

    fn console_read_line(&self) -> LocalBoxFuture<'_, String> {
        Box::pin(async move {
            self.record(HostEvent::ReadLine);
            self.next_input()
        })
    }

    fn console_read_key(&self) -> LocalBoxFuture<'_, String> {
        Box::pin(async move {
            self.record(HostEvent::ReadKey);
            self.keys.borrow_mut().pop_front().unwrap_or_default()
        })
    }

    fn write_all_text(&self, name: &str, content: &str, extension: &str) {
        self.record(HostEvent::FileWritten {
            name: name.to_string(),
            extension: extension.to_string(),
        });
        self.files
            .borrow_mut()
            .insert(format!("{name}.{extension}"), content.to_string());
    }

    fn read_all_text(&self, name: &str, extension: &str) -> String {
        self.files
            .borrow()
            .get(&format!("{name}.{extension}"))
            .cloned()
            .unwrap_or_default()
    }

    fn run_query(&self, sql: &str) -> LocalBoxFuture<'_, Result<Vec<Row>, QueryError>> {
        self.record(HostEvent::Query(sql.to_string()));
        Box::pin(async move {
            self.query_results
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(QueryError::new("no query result scripted")))
        })
    }
}
