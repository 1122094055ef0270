//! Tree-walking executor. Statements run one at a time against the shared
//! [`RuntimeContext`]; the built-ins that need a human response await host
//! futures, so execution suspends there and resumes when the host resolves
//! them. All side effects strictly before a suspension point have already
//! been applied when it is reached.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::ast::{BinaryOp, Expression, Statement, UnaryOp};
use crate::builtins::{self, Builtin};
use crate::database::{DbHandle, SqlCommand, SqlDataAdapter};
use crate::host::Host;
use crate::parser::parse_handler_code;
use crate::runtime::component::canonical_property;
use crate::runtime::context::RuntimeContext;
use crate::runtime::value::Value;

mod error;

pub use error::RuntimeError;

/// Hard ceiling on loop repetitions; exceeding it reports a diagnostic and
/// aborts the loop, not the handler.
pub const MAX_LOOP_ITERATIONS: usize = 100_000;

pub struct Interpreter<H: Host> {
    ctx: Rc<RefCell<RuntimeContext>>,
    host: Rc<H>,
    /// Keys of handlers currently executing; re-entering one is a no-op.
    call_stack: RefCell<Vec<String>>,
}

impl<H: Host> Interpreter<H> {
    pub fn new(ctx: Rc<RefCell<RuntimeContext>>, host: Rc<H>) -> Self {
        Self {
            ctx,
            host,
            call_stack: RefCell::new(Vec::new()),
        }
    }

    pub fn context(&self) -> Rc<RefCell<RuntimeContext>> {
        self.ctx.clone()
    }

    /// Parse handler source and install it under `key`. A parse failure is
    /// reported once through the diagnostic channel, tagged with the
    /// handler key, and nothing is installed.
    pub fn install_handler_source(&self, key: &str, source: &str) -> bool {
        match parse_handler_code(source) {
            Ok(block) => {
                self.ctx.borrow_mut().install_handler(key, block);
                true
            }
            Err(error) => {
                let line = error.line;
                self.host
                    .report_error(&format!("Parse error in {key}: {error}"), Some(line));
                false
            }
        }
    }

    /// Parse and run a loose statement sequence. Parse and runtime errors
    /// are routed to the diagnostic channel; this never panics or throws.
    pub async fn parse_and_execute(&self, source: &str) {
        match parse_handler_code(source) {
            Ok(block) => {
                if let Err(error) = self.execute_block(&block).await {
                    self.host.report_error(&error.to_string(), None);
                }
            }
            Err(error) => {
                let line = error.line;
                self.host
                    .report_error(&format!("Parse error: {error}"), Some(line));
            }
        }
    }

    /// Run the handler stored under `key`, reporting any runtime error.
    /// Used by the embedding application whenever a UI event fires.
    pub async fn fire_event(&self, key: &str) {
        if let Err(error) = self.run_handler_guarded(key).await {
            self.host.report_error(&error.to_string(), None);
        }
    }

    pub fn execute_block<'a>(
        &'a self,
        block: &'a [Statement],
    ) -> LocalBoxFuture<'a, Result<(), RuntimeError>> {
        Box::pin(async move {
            for statement in block {
                if self.ctx.borrow().halted() {
                    return Ok(());
                }
                self.execute_statement(statement).await?;
            }
            Ok(())
        })
    }

    async fn run_handler_guarded(&self, key: &str) -> Result<(), RuntimeError> {
        let Some(block) = self.ctx.borrow().handler(key) else {
            return Ok(());
        };
        if self.call_stack.borrow().iter().any(|active| active == key) {
            return Ok(());
        }
        self.call_stack.borrow_mut().push(key.to_string());
        let result = self.execute_block(&block).await;
        self.call_stack.borrow_mut().pop();
        result
    }

    async fn execute_statement(&self, statement: &Statement) -> Result<(), RuntimeError> {
        if self.ctx.borrow().stopped {
            return Ok(());
        }
        match statement {
            Statement::Dim {
                name,
                declared_type,
                initializer,
                ..
            } => {
                let value = match initializer {
                    Some(initializer) => self.eval(initializer).await?,
                    None => Value::zero_for_type(declared_type),
                };
                self.ctx.borrow_mut().variables.insert(name.clone(), value);
            }
            Statement::Assignment { target, value, .. } => {
                let value = self.eval(value).await?;
                self.assign_to_target(target, value);
            }
            Statement::Call { target, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg).await?);
                }
                self.call_function(target, values).await?;
            }
            Statement::If {
                condition,
                then_block,
                else_if_clauses,
                else_block,
                ..
            } => {
                if self.eval(condition).await?.is_truthy() {
                    return self.execute_block(then_block).await;
                }
                for clause in else_if_clauses {
                    if self.eval(&clause.condition).await?.is_truthy() {
                        return self.execute_block(&clause.block).await;
                    }
                }
                if !else_block.is_empty() {
                    return self.execute_block(else_block).await;
                }
            }
            Statement::For {
                variable,
                start,
                end,
                step,
                body,
                ..
            } => {
                self.execute_for(variable, start, end, step.as_ref(), body)
                    .await?;
            }
            Statement::While {
                condition, body, ..
            } => {
                self.execute_while(condition, body).await?;
            }
            Statement::DoLoop {
                body, condition, ..
            } => {
                self.execute_do_loop(body, condition.as_ref()).await?;
            }
            // Parsed for source compatibility; handlers run to completion,
            // so there is no early-exit signal to propagate.
            Statement::Return { .. } | Statement::Exit { .. } => {}
        }
        Ok(())
    }

    async fn execute_for(
        &self,
        variable: &str,
        start: &Expression,
        end: &Expression,
        step: Option<&Expression>,
        body: &[Statement],
    ) -> Result<(), RuntimeError> {
        let start = self.eval(start).await?.as_number();
        let end = self.eval(end).await?.as_number();
        let step = match step {
            Some(step) => self.eval(step).await?.as_number(),
            None => 1.0,
        };
        self.ctx
            .borrow_mut()
            .variables
            .insert(variable.to_string(), Value::Number(start));

        let mut iterations = 0usize;
        let mut counter = start;
        loop {
            let in_range = if step > 0.0 {
                counter <= end
            } else if step < 0.0 {
                counter >= end
            } else {
                false
            };
            if !in_range || self.ctx.borrow().stopped {
                break;
            }
            if iterations == MAX_LOOP_ITERATIONS {
                self.report_runaway_loop("For");
                break;
            }
            iterations += 1;
            self.ctx
                .borrow_mut()
                .variables
                .insert(variable.to_string(), Value::Number(counter));
            self.execute_block(body).await?;
            counter += step;
        }
        Ok(())
    }

    async fn execute_while(
        &self,
        condition: &Expression,
        body: &[Statement],
    ) -> Result<(), RuntimeError> {
        let mut iterations = 0usize;
        while self.eval(condition).await?.is_truthy() && !self.ctx.borrow().stopped {
            if iterations == MAX_LOOP_ITERATIONS {
                self.report_runaway_loop("While");
                break;
            }
            iterations += 1;
            self.execute_block(body).await?;
        }
        Ok(())
    }

    async fn execute_do_loop(
        &self,
        body: &[Statement],
        condition: Option<&Expression>,
    ) -> Result<(), RuntimeError> {
        let mut iterations = 0usize;
        loop {
            if self.ctx.borrow().stopped {
                break;
            }
            if iterations == MAX_LOOP_ITERATIONS {
                self.report_runaway_loop("Do");
                break;
            }
            iterations += 1;
            self.execute_block(body).await?;
            // Post-test form: both `Loop Until` and `Loop While` exit on a
            // truthy condition (the parsed AST does not distinguish them).
            if let Some(condition) = condition
                && self.eval(condition).await?.is_truthy()
            {
                break;
            }
        }
        Ok(())
    }

    fn report_runaway_loop(&self, kind: &str) {
        self.host
            .report_error(&format!("Infinite loop detected in {kind} loop"), None);
    }

    fn assign_to_target(&self, target: &Expression, value: Value) {
        match target {
            Expression::Identifier(name) => {
                let mut ctx = self.ctx.borrow_mut();
                // A declared variable shadows a component of the same name;
                // bare component names are never reassigned wholesale.
                if !ctx.variables.contains_key(name) && ctx.components.contains_key(name) {
                    return;
                }
                ctx.variables.insert(name.clone(), value);
            }
            Expression::Member { object, property } => {
                if let Expression::Identifier(variable) = object.as_ref() {
                    let existing = self.ctx.borrow().variables.get(variable).cloned();
                    if let Some(Value::Object(DbHandle::Command(command))) = existing
                        && property.eq_ignore_ascii_case("commandtext")
                    {
                        command.borrow_mut().set_command_text(value.display());
                        return;
                    }
                }
                if let Some(component_name) = resolve_component_name(object) {
                    let property = canonical_property(property);
                    let stored = {
                        let mut ctx = self.ctx.borrow_mut();
                        match ctx.components.get_mut(&component_name) {
                            Some(component) => {
                                component.props.insert(property.clone(), value.clone());
                                true
                            }
                            None => false,
                        }
                    };
                    if stored {
                        self.host.property_changed(&component_name, &property, &value);
                    }
                }
            }
            _ => {}
        }
    }

    fn eval<'a>(&'a self, expr: &'a Expression) -> LocalBoxFuture<'a, Result<Value, RuntimeError>> {
        Box::pin(async move {
            match expr {
                Expression::Number(value) => Ok(Value::Number(*value)),
                Expression::Str(value) => Ok(Value::Str(value.clone())),
                Expression::Bool(value) => Ok(Value::Bool(*value)),
                Expression::Nothing => Ok(Value::Nothing),
                Expression::Identifier(name) => Ok(self.resolve_identifier(name)),
                Expression::Member { object, property } => self.eval_member(object, property).await,
                Expression::Call { target, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg).await?);
                    }
                    self.call_function(target, values).await
                }
                Expression::Binary { op, left, right } => {
                    // Both sides evaluate eagerly; And/Or never short-circuit.
                    let left = self.eval(left).await?;
                    let right = self.eval(right).await?;
                    Ok(self.eval_binary(*op, left, right))
                }
                Expression::Unary { op, operand } => {
                    let operand = self.eval(operand).await?;
                    Ok(match op {
                        UnaryOp::Neg => Value::Number(-operand.as_number()),
                        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
                    })
                }
                Expression::Index { object, index } => {
                    let object = self.eval(object).await?;
                    let index = self.eval(index).await?.as_number();
                    if let Value::List(items) = object
                        && index.is_finite()
                        && index >= 0.0
                        && (index as usize) < items.len()
                    {
                        return Ok(items[index as usize].clone());
                    }
                    Ok(Value::Nothing)
                }
            }
        })
    }

    fn resolve_identifier(&self, name: &str) -> Value {
        if name == "Me" {
            return Value::Str("Me".to_string());
        }
        let ctx = self.ctx.borrow();
        if let Some(value) = ctx.variables.get(name) {
            return value.clone();
        }
        // Component names evaluate to their own spelling (property access
        // goes through member syntax), and so do unknown names — the
        // tolerant fallback for partially typed scripts.
        Value::Str(name.to_string())
    }

    async fn eval_member(
        &self,
        object: &Expression,
        property: &str,
    ) -> Result<Value, RuntimeError> {
        let lower = property.to_ascii_lowercase();

        // Collaborator pseudo-properties on object-valued variables.
        if let Expression::Identifier(variable) = object {
            let value = self.ctx.borrow().variables.get(variable).cloned();
            if let Some(Value::Object(handle)) = value {
                match (&handle, lower.as_str()) {
                    (DbHandle::Connection(connection), "state") => {
                        return Ok(Value::Str(connection.borrow().state.as_str().to_string()));
                    }
                    (DbHandle::Command(command), "parameters") => {
                        return Ok(Value::Object(DbHandle::Parameters(command.clone())));
                    }
                    (DbHandle::Table(table), "rows") => {
                        return Ok(Value::Object(DbHandle::Rows(table.clone())));
                    }
                    (DbHandle::Parameters(_), _) => return Ok(Value::Object(handle.clone())),
                    _ => {}
                }
            }
        }

        // Component property through the alias table, with the synthetic
        // `count` of a list-valued `items`.
        if let Some(component_name) = resolve_component_name(object) {
            let ctx = self.ctx.borrow();
            if let Some(component) = ctx.components.get(&component_name) {
                let mapped = canonical_property(property);
                if mapped == "count"
                    && let Some(Value::List(items)) = component.props.get("items")
                {
                    return Ok(Value::Number(items.len() as f64));
                }
                return Ok(component
                    .props
                    .get(&mapped)
                    .cloned()
                    .unwrap_or(Value::Nothing));
            }
        }

        let object_value = self.eval(object).await?;
        if let Value::Str(text) = &object_value
            && lower == "length"
        {
            return Ok(Value::Number(text.chars().count() as f64));
        }
        if let Value::Object(DbHandle::Rows(table)) = &object_value
            && lower == "count"
        {
            return Ok(Value::Number(table.borrow().row_count() as f64));
        }
        Ok(Value::Nothing)
    }

    async fn call_function(
        &self,
        target: &Expression,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if let Expression::Member { object, property } = target {
            let method = property.to_ascii_lowercase();

            // Parameter bag reached through a chained member access
            // (`command.Parameters.Add(...)`).
            if matches!(object.as_ref(), Expression::Member { .. }) {
                let parent = self.eval(object).await?;
                if let Value::Object(DbHandle::Parameters(command)) = parent
                    && (method == "add" || method == "addwithvalue")
                {
                    return Ok(add_command_parameter(&command, &args));
                }
            }

            if let Expression::Identifier(variable) = object.as_ref() {
                let value = self.ctx.borrow().variables.get(variable).cloned();
                if let Some(Value::Object(handle)) = value
                    && let Some(result) = self.call_handle_method(&handle, &method, &args).await?
                {
                    return Ok(result);
                }
            }

            if let Some(object_name) = resolve_component_name(object)
                && let Some(result) = self
                    .call_static_or_component(&object_name, property, &method, &args)
                    .await?
            {
                return Ok(result);
            }

            let receiver = self.eval(object).await?;
            if let Value::Str(text) = receiver {
                return Ok(builtins::call_string_method(&text, property, &args));
            }
            return Ok(Value::Nothing);
        }

        if let Expression::Identifier(name) = target {
            return self.call_named(name, args).await;
        }

        Ok(Value::Nothing)
    }

    /// Methods on database collaborator handles. `None` means the method
    /// is not one of theirs and dispatch should continue down the chain.
    async fn call_handle_method(
        &self,
        handle: &DbHandle,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>, RuntimeError> {
        match handle {
            DbHandle::Parameters(command) if method == "add" || method == "addwithvalue" => {
                Ok(Some(add_command_parameter(command, args)))
            }
            DbHandle::Connection(connection) => match method {
                "open" => {
                    connection.borrow_mut().open();
                    Ok(Some(Value::Nothing))
                }
                "close" => {
                    connection.borrow_mut().close();
                    Ok(Some(Value::Nothing))
                }
                "createcommand" => {
                    let command = connection.borrow().create_command();
                    Ok(Some(Value::Object(DbHandle::command(command))))
                }
                _ => Ok(None),
            },
            DbHandle::Command(command) => match method {
                "executereader" => {
                    let sql = command.borrow().render_query();
                    let rows = self.host.run_query(&sql).await?;
                    Ok(Some(Value::Object(DbHandle::reader(rows))))
                }
                "executenonquery" => {
                    let sql = command.borrow().render_query();
                    let rows = self.host.run_query(&sql).await?;
                    Ok(Some(Value::Number(rows.len() as f64)))
                }
                "executescalar" => {
                    let sql = command.borrow().render_query();
                    let rows = self.host.run_query(&sql).await?;
                    let first = rows
                        .first()
                        .and_then(|row| row.first())
                        .map(|(_, value)| value.clone());
                    Ok(Some(first.unwrap_or(Value::Nothing)))
                }
                _ => Ok(None),
            },
            DbHandle::Reader(reader) => match method {
                "read" => Ok(Some(Value::Bool(reader.borrow_mut().read()))),
                "close" => {
                    reader.borrow_mut().close();
                    Ok(Some(Value::Nothing))
                }
                "getstring" => Ok(Some(Value::Str(
                    reader.borrow().get_string(&arg_text(args, 0)),
                ))),
                "getint32" => Ok(Some(Value::Number(
                    reader.borrow().get_int32(&arg_text(args, 0)),
                ))),
                "getvalue" => Ok(Some(reader.borrow().get_value(&arg_text(args, 0)))),
                _ => Ok(None),
            },
            DbHandle::Table(table) => match method {
                "clear" => {
                    table.borrow_mut().clear();
                    Ok(Some(Value::Nothing))
                }
                _ => Ok(None),
            },
            DbHandle::Adapter(adapter) => match method {
                "fill" => {
                    if let Some(Value::Object(DbHandle::Table(table))) = args.first() {
                        let sql = adapter.borrow().command.borrow().render_query();
                        let rows = self.host.run_query(&sql).await?;
                        let count = rows.len();
                        let mut table = table.borrow_mut();
                        for row in rows {
                            table.add_row(row);
                        }
                        Ok(Some(Value::Number(count as f64)))
                    } else {
                        Ok(Some(Value::Nothing))
                    }
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// The pseudo-object statics (`MessageBox`, `Console`, `File`) and the
    /// handful of component methods. `None` falls through to the string
    /// method dispatch.
    async fn call_static_or_component(
        &self,
        object_name: &str,
        property: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Option<Value>, RuntimeError> {
        match (object_name, property) {
            ("MessageBox", "Show") => {
                let text: String = args.iter().map(Value::display).collect();
                self.host.message_box(text).await;
                return Ok(Some(Value::Nothing));
            }
            ("Console", "WriteLine") => {
                let text: String = args.iter().map(Value::display).collect();
                self.ctx.borrow_mut().console_output.push(text.clone());
                self.host.console_log(&text);
                return Ok(Some(Value::Nothing));
            }
            ("Console", "Write") => {
                let text: String = args.iter().map(Value::display).collect();
                self.host.console_write(&text);
                return Ok(Some(Value::Nothing));
            }
            ("Console", "ReadLine") => {
                return Ok(Some(Value::Str(self.host.console_read_line().await)));
            }
            ("Console", "ReadKey") => {
                return Ok(Some(Value::Str(self.host.console_read_key().await)));
            }
            ("File", "WriteAllText") => {
                let name = arg_text(args, 0);
                let content = arg_text(args, 1);
                let extension = args
                    .get(2)
                    .map(Value::display)
                    .unwrap_or_else(|| "txt".to_string());
                self.host.write_all_text(&name, &content, &extension);
                return Ok(Some(Value::Nothing));
            }
            ("File", "ReadAllText") => {
                let name = arg_text(args, 0);
                let extension = args
                    .get(1)
                    .map(Value::display)
                    .unwrap_or_else(|| "txt".to_string());
                return Ok(Some(Value::Str(self.host.read_all_text(&name, &extension))));
            }
            _ => {}
        }

        let cleared = {
            let mut ctx = self.ctx.borrow_mut();
            match ctx.components.get_mut(object_name) {
                Some(component) if method == "clear" && component.type_tag == "ListBox" => {
                    component
                        .props
                        .insert("items".to_string(), Value::List(Vec::new()));
                    true
                }
                _ => false,
            }
        };
        if cleared {
            self.host
                .property_changed(object_name, "items", &Value::List(Vec::new()));
            return Ok(Some(Value::Nothing));
        }
        if method == "focus" && self.ctx.borrow().components.contains_key(object_name) {
            // No focusable surface in a headless core.
            return Ok(Some(Value::Nothing));
        }
        Ok(None)
    }

    /// Bare-name calls: collaborator constructors, dialogs, conversions,
    /// the builtin registry, then event handlers.
    async fn call_named(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "sqlconnection" => {
                return Ok(Value::Object(DbHandle::connection(arg_text(&args, 0))));
            }
            "sqlcommand" => {
                if args.len() == 2
                    && let Value::Object(DbHandle::Connection(connection)) = &args[1]
                {
                    let mut command = connection.borrow().create_command();
                    command.set_command_text(args[0].display());
                    return Ok(Value::Object(DbHandle::command(command)));
                }
                return Ok(Value::Object(DbHandle::command(SqlCommand::default())));
            }
            "datatable" => return Ok(Value::Object(DbHandle::table())),
            "sqldataadapter" => {
                if let Some(Value::Object(DbHandle::Command(command))) = args.first() {
                    return Ok(Value::Object(DbHandle::Adapter(Rc::new(RefCell::new(
                        SqlDataAdapter::new(command.clone()),
                    )))));
                }
                return Ok(Value::Nothing);
            }
            "msgbox" => {
                self.host.message_box(arg_text(&args, 0)).await;
                return Ok(Value::Nothing);
            }
            "inputbox" => {
                let prompt = arg_text(&args, 0);
                let title = args.get(1).map(Value::display);
                let default = args.get(2).map(Value::display);
                return Ok(Value::Str(self.host.input_box(prompt, title, default).await));
            }
            _ => {}
        }

        if let Some(builtin) = Builtin::from_name(&lower) {
            return Ok(builtins::apply(builtin, &args));
        }

        let is_handler = self.ctx.borrow().has_handler(name);
        if is_handler {
            self.run_handler_guarded(name).await?;
        }
        Ok(Value::Nothing)
    }

    fn eval_binary(&self, op: BinaryOp, left: Value, right: Value) -> Value {
        match op {
            BinaryOp::Add => Value::Number(left.as_number() + right.as_number()),
            BinaryOp::Sub => Value::Number(left.as_number() - right.as_number()),
            BinaryOp::Mul => Value::Number(left.as_number() * right.as_number()),
            BinaryOp::Div => {
                let divisor = right.as_number();
                if divisor == 0.0 {
                    self.host.report_error("Division by zero", None);
                    Value::Number(0.0)
                } else {
                    Value::Number(left.as_number() / divisor)
                }
            }
            BinaryOp::IntDiv => {
                let divisor = right.as_number();
                if divisor == 0.0 {
                    self.host.report_error("Division by zero", None);
                    Value::Number(0.0)
                } else {
                    Value::Number((left.as_number() / divisor).floor())
                }
            }
            BinaryOp::Mod => Value::Number(left.as_number() % right.as_number()),
            BinaryOp::Pow => Value::Number(left.as_number().powf(right.as_number())),
            BinaryOp::Concat => Value::Str(format!("{}{}", left.display(), right.display())),
            BinaryOp::Eq => Value::Bool(left.loose_eq(&right)),
            BinaryOp::Ne => Value::Bool(!left.loose_eq(&right)),
            BinaryOp::Lt => Value::Bool(left.as_number() < right.as_number()),
            BinaryOp::Gt => Value::Bool(left.as_number() > right.as_number()),
            BinaryOp::Le => Value::Bool(left.as_number() <= right.as_number()),
            BinaryOp::Ge => Value::Bool(left.as_number() >= right.as_number()),
            BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
            BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
        }
    }
}

/// Component addressed by an expression: a bare identifier (other than
/// `Me`) or a `Me.Name` member names the component directly.
fn resolve_component_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(name) if name != "Me" => Some(name.clone()),
        Expression::Member { object, property } => match object.as_ref() {
            Expression::Identifier(name) if name == "Me" => Some(property.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn add_command_parameter(command: &Rc<RefCell<SqlCommand>>, args: &[Value]) -> Value {
    let name = args.first().map(Value::display).unwrap_or_default();
    let value = args.get(1).cloned().unwrap_or(Value::Nothing);
    command.borrow_mut().add_parameter(name, value);
    Value::Nothing
}

fn arg_text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::display).unwrap_or_default()
}
