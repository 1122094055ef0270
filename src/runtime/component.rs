use rustc_hash::FxHashMap;

use super::value::Value;

/// One simulated form control. All component kinds share this shape; the
/// `type_tag` only matters where behavior differs (e.g. `Clear` on a
/// ListBox). Unknown properties are stored, never rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub type_tag: String,
    pub props: FxHashMap<String, Value>,
}

impl Component {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            props: FxHashMap::default(),
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }
}

/// Canonical spelling for a component property. Scripts write properties
/// in whatever case they like; the property bag stores one spelling so a
/// write through `backcolor` is visible to a read through `BackColor`.
/// Names outside the table pass through unchanged.
pub fn canonical_property(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "text" => "text",
        "value" => "value",
        "enabled" => "enabled",
        "visible" => "visible",
        "checked" => "checked",
        "backcolor" => "backColor",
        "forecolor" => "foreColor",
        "left" => "left",
        "top" => "top",
        "width" => "width",
        "height" => "height",
        "selectedindex" => "selectedIndex",
        "maximum" => "maximum",
        "minimum" => "minimum",
        "interval" => "interval",
        "items" => "items",
        "count" => "count",
        _ => return raw.to_string(),
    }
    .to_string()
}
