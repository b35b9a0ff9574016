//! Builders for fake documents and elements.

use std::collections::HashMap;

use serde_json::Value;

use crate::driver::{By, SelectOption};

/// What a click does besides the default checkbox/radio toggling.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickEffect {
    /// Make document `n` current (simulated navigation).
    GoTo(usize),
    Show(String),
    Hide(String),
    SetValue { key: String, value: String },
}

/// One element of a fake document.
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub key: String,
    pub tag: String,
    pub input_type: Option<String>,
    pub value: String,
    pub text: String,
    pub checked: bool,
    pub visible: bool,
    pub enabled: bool,
    pub read_only: bool,
    pub attributes: HashMap<String, String>,
    pub options: Vec<SelectOption>,
    pub(crate) selectors: Vec<By>,
    pub(crate) parent: Option<String>,
    pub(crate) on_click: Vec<ClickEffect>,
    /// Native clear leaves the value untouched.
    pub(crate) resists_clear: bool,
    /// Native typing does not reach the value (framework-bound input).
    pub(crate) ignores_typing: bool,
}

impl FakeElement {
    pub fn new(key: &str, tag: &str) -> Self {
        Self {
            key: key.to_string(),
            tag: tag.to_string(),
            input_type: None,
            value: String::new(),
            text: String::new(),
            checked: false,
            visible: true,
            enabled: true,
            read_only: false,
            attributes: HashMap::new(),
            options: Vec::new(),
            selectors: Vec::new(),
            parent: None,
            on_click: Vec::new(),
            resists_clear: false,
            ignores_typing: false,
        }
    }

    pub fn input(key: &str, input_type: &str) -> Self {
        let mut el = Self::new(key, "input");
        el.input_type = Some(input_type.to_string());
        el
    }

    pub fn text_input(key: &str) -> Self {
        Self::input(key, "text")
    }

    pub fn checkbox(key: &str) -> Self {
        Self::input(key, "checkbox")
    }

    pub fn radio(key: &str, group: &str, value: &str) -> Self {
        Self::input(key, "radio").attr("name", group).with_value(value)
    }

    pub fn file_input(key: &str) -> Self {
        Self::input(key, "file")
    }

    pub fn textarea(key: &str) -> Self {
        Self::new(key, "textarea")
    }

    /// Native `<select>` with `(value, text)` options; nothing selected.
    pub fn select(key: &str, options: &[(&str, &str)]) -> Self {
        let mut el = Self::new(key, "select");
        el.options = options
            .iter()
            .enumerate()
            .map(|(index, (value, text))| SelectOption {
                value: value.to_string(),
                text: text.to_string(),
                index,
                selected: false,
            })
            .collect();
        el
    }

    pub fn button(key: &str, text: &str) -> Self {
        Self::new(key, "button").with_text(text)
    }

    /// Extra lookup this element answers to.
    pub fn matching(mut self, by: By) -> Self {
        self.selectors.push(by);
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// ARIA checkbox (`role=checkbox`, state in `aria-checked`).
    pub fn aria_checkbox(key: &str, checked: bool) -> Self {
        Self::new(key, "div")
            .attr("role", "checkbox")
            .attr("aria-checked", if checked { "true" } else { "false" })
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn child_of(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn resists_clear(mut self) -> Self {
        self.resists_clear = true;
        self
    }

    pub fn ignores_typing(mut self) -> Self {
        self.ignores_typing = true;
        self
    }

    pub(crate) fn is_checkable_input(&self) -> bool {
        self.tag == "input"
            && matches!(self.input_type.as_deref(), Some("checkbox") | Some("radio"))
    }

    pub(crate) fn has_value(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "select" | "textarea")
    }

    pub(crate) fn matches(&self, by: &By) -> bool {
        if self.selectors.contains(by) {
            return true;
        }
        match by {
            By::Id(id) => *id == self.key,
            By::Css(css) => *css == format!("#{}", self.key),
            By::Name(name) => self.attributes.get("name") == Some(name),
            By::XPath(_) => false,
        }
    }
}

/// One page state of a fake browser tab.
#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
    pub url: String,
    pub title: String,
    pub html: String,
    pub elements: Vec<FakeElement>,
    /// `(needle, response)`: a script containing `needle` returns `response`.
    pub scripts: Vec<(String, Value)>,
}

impl FakeDocument {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_script(mut self, needle: &str, response: Value) -> Self {
        self.scripts.push((needle.to_string(), response));
        self
    }
}
