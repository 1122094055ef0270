//! Database emulation objects scripts manipulate through `New`, member
//! calls and the parameter bag. Query execution itself always goes
//! through the host boundary (`Host::run_query`); these types only hold
//! state and render parameterized SQL text.

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::runtime::value::Value;

/// One result row, in column order.
pub type Row = Vec<(String, Value)>;

/// Failure reported by the host's query transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
        }
    }
}

#[derive(Debug)]
pub struct SqlConnection {
    pub connection_string: String,
    pub state: ConnectionState,
}

impl SqlConnection {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            state: ConnectionState::Closed,
        }
    }

    pub fn open(&mut self) {
        self.state = ConnectionState::Open;
    }

    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn create_command(&self) -> SqlCommand {
        SqlCommand::default()
    }
}

#[derive(Debug, Default)]
pub struct SqlCommand {
    pub command_text: String,
    parameters: Vec<(String, Value)>,
}

impl SqlCommand {
    pub fn set_command_text(&mut self, text: impl Into<String>) {
        self.command_text = text.into();
    }

    /// Add or replace a named parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.parameters.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.parameters.push((name, value));
        }
    }

    /// Substitute `@name` placeholders into the command text. String
    /// values are SQL-quoted with embedded quotes doubled; Nothing becomes
    /// NULL; everything else uses its display form.
    pub fn render_query(&self) -> String {
        let mut query = self.command_text.clone();
        for (name, value) in &self.parameters {
            let placeholder = if name.starts_with('@') {
                name.clone()
            } else {
                format!("@{name}")
            };
            let replacement = match value {
                Value::Str(text) => format!("'{}'", text.replace('\'', "''")),
                Value::Nothing => "NULL".to_string(),
                other => other.display(),
            };
            query = query.replace(&placeholder, &replacement);
        }
        query
    }
}

/// Forward-only cursor over rows already fetched through the host.
#[derive(Debug)]
pub struct SqlDataReader {
    rows: Vec<Row>,
    next_index: usize,
    current: Option<Row>,
    closed: bool,
}

impl SqlDataReader {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            next_index: 0,
            current: None,
            closed: false,
        }
    }

    /// Advance to the next row; false once the rows are exhausted or the
    /// reader was closed.
    pub fn read(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if self.next_index < self.rows.len() {
            self.current = Some(self.rows[self.next_index].clone());
            self.next_index += 1;
            true
        } else {
            self.current = None;
            false
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.current = None;
    }

    pub fn get_value(&self, column: &str) -> Value {
        let Some(row) = &self.current else {
            return Value::Nothing;
        };
        row.iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Nothing)
    }

    pub fn get_int32(&self, column: &str) -> f64 {
        let number = self.get_value(column).as_number();
        if number.is_finite() { number } else { 0.0 }
    }

    pub fn get_string(&self, column: &str) -> String {
        self.get_value(column).display()
    }
}

#[derive(Debug, Default)]
pub struct DataTable {
    pub columns: Vec<String>,
    rows: Vec<Row>,
}

impl DataTable {
    pub fn add_row(&mut self, row: Row) {
        if self.columns.is_empty() {
            self.columns = row.iter().map(|(name, _)| name.clone()).collect();
        }
        self.rows.push(row);
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.rows.clear();
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// Pairs a command with a target table; `Fill` copies the whole result.
#[derive(Debug)]
pub struct SqlDataAdapter {
    pub command: Rc<RefCell<SqlCommand>>,
}

impl SqlDataAdapter {
    pub fn new(command: Rc<RefCell<SqlCommand>>) -> Self {
        Self { command }
    }
}

/// Shared handle to one collaborator object. `Parameters` and `Rows` are
/// structural markers the evaluator recognizes when member access reaches
/// `command.Parameters` or `table.Rows`; they wrap the same underlying
/// object rather than being objects of their own.
#[derive(Debug, Clone)]
pub enum DbHandle {
    Connection(Rc<RefCell<SqlConnection>>),
    Command(Rc<RefCell<SqlCommand>>),
    Reader(Rc<RefCell<SqlDataReader>>),
    Table(Rc<RefCell<DataTable>>),
    Adapter(Rc<RefCell<SqlDataAdapter>>),
    Parameters(Rc<RefCell<SqlCommand>>),
    Rows(Rc<RefCell<DataTable>>),
}

impl DbHandle {
    pub fn connection(connection_string: impl Into<String>) -> Self {
        Self::Connection(Rc::new(RefCell::new(SqlConnection::new(connection_string))))
    }

    pub fn command(command: SqlCommand) -> Self {
        Self::Command(Rc::new(RefCell::new(command)))
    }

    pub fn reader(rows: Vec<Row>) -> Self {
        Self::Reader(Rc::new(RefCell::new(SqlDataReader::new(rows))))
    }

    pub fn table() -> Self {
        Self::Table(Rc::new(RefCell::new(DataTable::default())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Connection(_) => "SqlConnection",
            Self::Command(_) => "SqlCommand",
            Self::Reader(_) => "SqlDataReader",
            Self::Table(_) => "DataTable",
            Self::Adapter(_) => "SqlDataAdapter",
            Self::Parameters(_) => "SqlParameters",
            Self::Rows(_) => "DataRows",
        }
    }

    /// Identity comparison; two handles are equal when they share the same
    /// underlying object in the same role.
    pub fn ptr_eq(&self, other: &DbHandle) -> bool {
        match (self, other) {
            (Self::Connection(a), Self::Connection(b)) => Rc::ptr_eq(a, b),
            (Self::Command(a), Self::Command(b)) => Rc::ptr_eq(a, b),
            (Self::Reader(a), Self::Reader(b)) => Rc::ptr_eq(a, b),
            (Self::Table(a), Self::Table(b)) => Rc::ptr_eq(a, b),
            (Self::Adapter(a), Self::Adapter(b)) => Rc::ptr_eq(a, b),
            (Self::Parameters(a), Self::Parameters(b)) => Rc::ptr_eq(a, b),
            (Self::Rows(a), Self::Rows(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn render_query_substitutes_and_quotes_parameters() {
        let mut command = SqlCommand::default();
        command.set_command_text("SELECT * FROM users WHERE name = @name AND age > @age");
        command.add_parameter("@name", Value::Str("O'Brien".to_string()));
        command.add_parameter("age", Value::Number(30.0));
        assert_eq!(
            command.render_query(),
            "SELECT * FROM users WHERE name = 'O''Brien' AND age > 30"
        );
    }

    #[test]
    fn render_query_writes_null_for_nothing() {
        let mut command = SqlCommand::default();
        command.set_command_text("UPDATE t SET x = @x");
        command.add_parameter("x", Value::Nothing);
        assert_eq!(command.render_query(), "UPDATE t SET x = NULL");
    }

    #[test]
    fn adding_a_parameter_twice_replaces_the_value() {
        let mut command = SqlCommand::default();
        command.set_command_text("@v");
        command.add_parameter("v", Value::Number(1.0));
        command.add_parameter("v", Value::Number(2.0));
        assert_eq!(command.render_query(), "2");
    }

    #[test]
    fn reader_walks_rows_once_and_stops_after_close() {
        let mut reader = SqlDataReader::new(vec![
            row(&[("id", Value::Number(1.0))]),
            row(&[("id", Value::Number(2.0))]),
        ]);
        assert!(reader.read());
        assert_eq!(reader.get_int32("id"), 1.0);
        assert_eq!(reader.get_value("missing"), Value::Nothing);
        assert!(reader.read());
        assert!(!reader.read());

        let mut closed = SqlDataReader::new(vec![row(&[("id", Value::Number(1.0))])]);
        closed.close();
        assert!(!closed.read());
    }

    #[test]
    fn data_table_captures_columns_from_the_first_row() {
        let mut table = DataTable::default();
        table.add_row(row(&[
            ("id", Value::Number(1.0)),
            ("name", Value::Str("a".to_string())),
        ]));
        table.add_row(row(&[
            ("id", Value::Number(2.0)),
            ("name", Value::Str("b".to_string())),
        ]));
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.row_count(), 2);
        table.clear();
        assert_eq!(table.row_count(), 0);
        assert!(table.columns.is_empty());
    }

    #[test]
    fn connection_tracks_open_state() {
        let mut connection = SqlConnection::new("server=local");
        assert_eq!(connection.state, ConnectionState::Closed);
        connection.open();
        assert_eq!(connection.state.as_str(), "Open");
        connection.close();
        assert_eq!(connection.state.as_str(), "Closed");
    }
}
