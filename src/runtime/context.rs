use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::Statement;

use super::component::Component;
use super::value::Value;

/// Shared mutable state of one run session: the component registry, the
/// flat global variable table, the parsed event-handler blocks and the
/// externally settable stop/pause flags. Every interpreter entered during
/// the session works against the same context through `Rc<RefCell<_>>`.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    pub components: FxHashMap<String, Component>,
    pub variables: FxHashMap<String, Value>,
    handlers: FxHashMap<String, Rc<[Statement]>>,
    /// Lines written through `Console.WriteLine`, in order.
    pub console_output: Vec<String>,
    /// Hard abort: checked before every statement and on every loop turn.
    pub stopped: bool,
    /// Soft abort: takes effect at block boundaries only.
    pub paused: bool,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component. Names are unique within a context; a second
    /// component with the same name replaces the first.
    pub fn add_component(&mut self, component: Component) {
        self.components.insert(component.name.clone(), component);
    }

    /// Store a parsed handler body under its `Component_Event` key.
    pub fn install_handler(&mut self, key: impl Into<String>, block: Vec<Statement>) {
        self.handlers.insert(key.into(), Rc::from(block));
    }

    pub fn handler(&self, key: &str) -> Option<Rc<[Statement]>> {
        self.handlers.get(key).cloned()
    }

    pub fn has_handler(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn halted(&self) -> bool {
        self.stopped || self.paused
    }
}
