pub mod component;
pub mod context;
pub mod value;

pub use component::{Component, canonical_property};
pub use context::RuntimeContext;
pub use value::Value;
