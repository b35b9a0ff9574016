//! [`PageDriver`] implementation over fake documents.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::element::{ClickEffect, FakeDocument, FakeElement};
use crate::driver::{By, DriverError, ElementRef, ElementState, PageDriver, ScriptArg, SelectOption};

/// Something the engine did to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeEvent {
    Navigate(String),
    Click(String),
    JsClick(String),
    DoubleClick(String),
    ContextClick(String),
    Hover(String),
    DragDrop { from: String, to: String },
    Clear(String),
    Typed { key: String, text: String },
    KeyDown(String),
    KeyUp(String),
    Focus(String),
    Blur(String),
    ScrollIntoView(String),
    ScrollBy(i64, i64),
    SetValueJs { key: String, value: String },
    SetCheckedJs { key: String, checked: bool },
    Dispatch { key: String, event: String },
    FilesSet { key: String, paths: Vec<PathBuf> },
    OptionSelected { key: String, index: usize, selected: bool },
    Frame(Option<String>),
    Script(String),
}

struct FakeState {
    documents: Vec<FakeDocument>,
    current: usize,
    events: Vec<FakeEvent>,
    focused: Option<String>,
    held: Vec<String>,
    select_all: bool,
    closed: bool,
}

/// In-memory [`PageDriver`].
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(documents: Vec<FakeDocument>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                documents,
                current: 0,
                events: Vec::new(),
                focused: None,
                held: Vec::new(),
                select_all: false,
                closed: false,
            }),
        }
    }

    pub fn single(document: FakeDocument) -> Self {
        Self::new(vec![document])
    }

    pub fn blank() -> Self {
        Self::single(FakeDocument::new("about:blank", ""))
    }

    /// Simulate the browser dying: every later call fails with `Closed`.
    pub fn kill(&self) {
        self.state.lock().closed = true;
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.state.lock().events.clone()
    }

    pub fn current_index(&self) -> usize {
        self.state.lock().current
    }

    /// Native plus script clicks on `key`.
    pub fn clicks(&self, key: &str) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| matches!(e, FakeEvent::Click(k) | FakeEvent::JsClick(k) if k == key))
            .count()
    }

    /// Keys pressed (keyDown), in order.
    pub fn keys_pressed(&self) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                FakeEvent::KeyDown(k) => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current value of an element in any document.
    pub fn value_of(&self, key: &str) -> Option<String> {
        self.with_any(key, |el| el.value.clone())
    }

    pub fn is_checked(&self, key: &str) -> Option<bool> {
        self.with_any(key, |el| {
            if el.is_checkable_input() {
                el.checked
            } else {
                el.attributes.get("aria-checked").map(String::as_str) == Some("true")
            }
        })
    }

    pub fn selected_values(&self, key: &str) -> Vec<String> {
        self.with_any(key, |el| {
            el.options
                .iter()
                .filter(|o| o.selected)
                .map(|o| o.value.clone())
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn attribute_of(&self, key: &str, name: &str) -> Option<String> {
        self.with_any(key, |el| el.attributes.get(name).cloned()).flatten()
    }

    fn with_any<T>(&self, key: &str, f: impl Fn(&FakeElement) -> T) -> Option<T> {
        let state = self.state.lock();
        let current = &state.documents[state.current];
        current
            .elements
            .iter()
            .find(|e| e.key == key)
            .or_else(|| {
                state
                    .documents
                    .iter()
                    .flat_map(|d| d.elements.iter())
                    .find(|e| e.key == key)
            })
            .map(f)
    }

    fn handle(index: usize, key: &str) -> ElementRef {
        ElementRef(format!("{}:{}", index, key))
    }

    /// Run `f` against a live element, enforcing staleness.
    fn with_element<T>(
        &self,
        el: &ElementRef,
        f: impl FnOnce(&mut FakeState, usize) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        let (doc, key) = el
            .id()
            .split_once(':')
            .ok_or_else(|| DriverError::StaleElement(el.to_string()))?;
        if doc.parse::<usize>().ok() != Some(state.current) {
            return Err(DriverError::StaleElement(el.to_string()));
        }
        let current = state.current;
        let position = state.documents[current]
            .elements
            .iter()
            .position(|e| e.key == key)
            .ok_or_else(|| DriverError::StaleElement(el.to_string()))?;
        f(&mut state, position)
    }

    fn live(&self) -> Result<(), DriverError> {
        if self.state.lock().closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn apply_click(state: &mut FakeState, position: usize) {
        let current = state.current;
        let el = state.documents[current].elements[position].clone();

        if el.is_checkable_input() {
            if el.input_type.as_deref() == Some("radio") {
                let group = el.attributes.get("name").cloned();
                for other in state.documents[current].elements.iter_mut() {
                    if other.input_type.as_deref() == Some("radio")
                        && other.attributes.get("name") == group.as_ref()
                    {
                        other.checked = false;
                    }
                }
                state.documents[current].elements[position].checked = true;
            } else {
                state.documents[current].elements[position].checked = !el.checked;
            }
        } else if let Some(aria) = el.attributes.get("aria-checked") {
            let flipped = if aria == "true" { "false" } else { "true" };
            state.documents[current].elements[position]
                .attributes
                .insert("aria-checked".to_string(), flipped.to_string());
        }

        for effect in el.on_click {
            match effect {
                ClickEffect::GoTo(index) if index < state.documents.len() => {
                    state.current = index;
                    state.focused = None;
                }
                ClickEffect::GoTo(_) => {}
                ClickEffect::Show(key) => Self::set_visible(state, &key, true),
                ClickEffect::Hide(key) => Self::set_visible(state, &key, false),
                ClickEffect::SetValue { key, value } => {
                    let current = state.current;
                    if let Some(target) = state.documents[current]
                        .elements
                        .iter_mut()
                        .find(|e| e.key == key)
                    {
                        target.value = value;
                    }
                }
            }
        }
    }

    fn set_visible(state: &mut FakeState, key: &str, visible: bool) {
        let current = state.current;
        if let Some(target) = state.documents[current]
            .elements
            .iter_mut()
            .find(|e| e.key == key)
        {
            target.visible = visible;
        }
    }

    fn native_interactable(state: &FakeState, position: usize, el: &ElementRef) -> Result<(), DriverError> {
        let element = &state.documents[state.current].elements[position];
        if !element.visible || !element.enabled {
            return Err(DriverError::NotInteractable(el.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        let index = state
            .documents
            .iter()
            .position(|d| d.url == url)
            .ok_or_else(|| DriverError::Navigation(format!("{}: net::ERR_NAME_NOT_RESOLVED", url)))?;
        state.current = index;
        state.focused = None;
        state.events.push(FakeEvent::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.live()?;
        let state = self.state.lock();
        Ok(state.documents[state.current].url.clone())
    }

    async fn title(&self) -> Result<String, DriverError> {
        self.live()?;
        let state = self.state.lock();
        Ok(state.documents[state.current].title.clone())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.live()?;
        let state = self.state.lock();
        Ok(state.documents[state.current].html.clone())
    }

    async fn execute_script(&self, script: &str, _args: &[ScriptArg]) -> Result<Value, DriverError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        let summary: String = script.chars().take(60).collect();
        state.events.push(FakeEvent::Script(summary));
        let current = state.current;
        Ok(state.documents[current]
            .scripts
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(Value::Null))
    }

    async fn find_elements(&self, by: &By) -> Result<Vec<ElementRef>, DriverError> {
        self.live()?;
        let state = self.state.lock();
        let current = state.current;
        Ok(state.documents[current]
            .elements
            .iter()
            .filter(|e| e.matches(by))
            .map(|e| Self::handle(current, &e.key))
            .collect())
    }

    async fn find_child_elements(
        &self,
        parent: &ElementRef,
        by: &By,
    ) -> Result<Vec<ElementRef>, DriverError> {
        self.with_element(parent, |state, position| {
            let current = state.current;
            let parent_key = state.documents[current].elements[position].key.clone();
            Ok(state.documents[current]
                .elements
                .iter()
                .filter(|e| e.parent.as_deref() == Some(parent_key.as_str()) && e.matches(by))
                .map(|e| Self::handle(current, &e.key))
                .collect())
        })
    }

    async fn element_state(&self, el: &ElementRef) -> Result<ElementState, DriverError> {
        self.with_element(el, |state, position| {
            let e = &state.documents[state.current].elements[position];
            Ok(ElementState {
                connected: true,
                displayed: e.visible,
                enabled: e.enabled,
                read_only: e.read_only,
                tag: e.tag.clone(),
                input_type: e.input_type.clone(),
                value: e.has_value().then(|| e.value.clone()),
                text: e.text.clone(),
                checked: e.is_checkable_input().then_some(e.checked),
                selected: None,
            })
        })
    }

    async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        self.with_element(el, |state, position| {
            let e = &state.documents[state.current].elements[position];
            Ok(match name {
                "value" if e.has_value() => Some(e.value.clone()),
                "type" => e.input_type.clone(),
                _ => e.attributes.get(name).cloned(),
            })
        })
    }

    async fn click(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            Self::native_interactable(state, position, el)?;
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::Click(key.clone()));
            state.focused = Some(key);
            Self::apply_click(state, position);
            Ok(())
        })
    }

    async fn double_click(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            Self::native_interactable(state, position, el)?;
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::DoubleClick(key));
            Ok(())
        })
    }

    async fn context_click(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            Self::native_interactable(state, position, el)?;
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::ContextClick(key));
            Ok(())
        })
    }

    async fn hover(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::Hover(key));
            Ok(())
        })
    }

    async fn drag_and_drop(&self, source: &ElementRef, target: &ElementRef) -> Result<(), DriverError> {
        let from = self.with_element(source, |state, position| {
            Ok(state.documents[state.current].elements[position].key.clone())
        })?;
        self.with_element(target, |state, position| {
            let to = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::DragDrop { from, to });
            Ok(())
        })
    }

    async fn clear(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let current = state.current;
            let element = &mut state.documents[current].elements[position];
            if !element.resists_clear {
                element.value.clear();
            }
            let key = element.key.clone();
            state.events.push(FakeEvent::Clear(key));
            Ok(())
        })
    }

    async fn send_keys(&self, el: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            Self::native_interactable(state, position, el)?;
            let current = state.current;
            let element = &mut state.documents[current].elements[position];
            if !element.ignores_typing && !element.read_only {
                element.value.push_str(text);
            }
            let key = element.key.clone();
            state.events.push(FakeEvent::Typed {
                key: key.clone(),
                text: text.to_string(),
            });
            state.focused = Some(key);
            state.select_all = false;
            Ok(())
        })
    }

    async fn key_down(&self, key: &str) -> Result<(), DriverError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return Err(DriverError::Closed);
        }
        let name = crate::keys::normalize_key(key);
        state.events.push(FakeEvent::KeyDown(name.clone()));

        if crate::keys::modifier_bit(&name).is_some() {
            state.held.push(name);
            return Ok(());
        }
        let command_held = state.held.iter().any(|k| k == "Control" || k == "Meta");

        match name.as_str() {
            "a" if command_held => state.select_all = true,
            "Backspace" | "Delete" => {
                let current = state.current;
                let target = state.focused.as_ref().and_then(|key| {
                    state.documents[current]
                        .elements
                        .iter_mut()
                        .find(|e| e.key == *key)
                });
                if let Some(element) = target {
                    if state.select_all {
                        element.value.clear();
                    } else if name == "Backspace" {
                        element.value.pop();
                    }
                }
                state.select_all = false;
            }
            _ => state.select_all = false,
        }
        Ok(())
    }

    async fn key_up(&self, key: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        let name = crate::keys::normalize_key(key);
        state.held.retain(|k| *k != name);
        state.events.push(FakeEvent::KeyUp(name));
        Ok(())
    }

    async fn focus(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::Focus(key.clone()));
            state.focused = Some(key);
            Ok(())
        })
    }

    async fn blur(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::Blur(key));
            state.focused = None;
            Ok(())
        })
    }

    async fn scroll_into_view(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::ScrollIntoView(key));
            Ok(())
        })
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.events.push(FakeEvent::ScrollBy(dx, dy));
        Ok(())
    }

    async fn set_files(&self, el: &ElementRef, paths: &[PathBuf]) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let current = state.current;
            let element = &mut state.documents[current].elements[position];
            element.value = paths
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let key = element.key.clone();
            state.events.push(FakeEvent::FilesSet {
                key,
                paths: paths.to_vec(),
            });
            Ok(())
        })
    }

    async fn select_options(&self, el: &ElementRef) -> Result<Vec<SelectOption>, DriverError> {
        self.with_element(el, |state, position| {
            Ok(state.documents[state.current].elements[position].options.clone())
        })
    }

    async fn set_option_selected(
        &self,
        el: &ElementRef,
        index: usize,
        selected: bool,
    ) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let current = state.current;
            let element = &mut state.documents[current].elements[position];
            if index >= element.options.len() {
                return Err(DriverError::NoSuchElement(format!("option index {}", index)));
            }
            let multiple = element.attributes.contains_key("multiple");
            if selected && !multiple {
                for option in element.options.iter_mut() {
                    option.selected = false;
                }
            }
            element.options[index].selected = selected;
            element.value = element
                .options
                .iter()
                .find(|o| o.selected)
                .map(|o| o.value.clone())
                .unwrap_or_default();
            let key = element.key.clone();
            state.events.push(FakeEvent::OptionSelected { key, index, selected });
            Ok(())
        })
    }

    async fn set_value_js(&self, el: &ElementRef, value: &str) -> Result<String, DriverError> {
        self.with_element(el, |state, position| {
            let current = state.current;
            let element = &mut state.documents[current].elements[position];
            element.value = value.to_string();
            if element.tag == "select" {
                for option in element.options.iter_mut() {
                    option.selected = option.value == value;
                }
            }
            let key = element.key.clone();
            state.events.push(FakeEvent::SetValueJs {
                key,
                value: value.to_string(),
            });
            Ok(value.to_string())
        })
    }

    async fn set_checked_js(&self, el: &ElementRef, checked: bool) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let current = state.current;
            let element = &mut state.documents[current].elements[position];
            if element.is_checkable_input() {
                element.checked = checked;
            } else {
                element.attributes.insert(
                    "aria-checked".to_string(),
                    if checked { "true" } else { "false" }.to_string(),
                );
            }
            let key = element.key.clone();
            state.events.push(FakeEvent::SetCheckedJs { key, checked });
            Ok(())
        })
    }

    async fn js_click(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::JsClick(key));
            Self::apply_click(state, position);
            Ok(())
        })
    }

    async fn dispatch_event(&self, el: &ElementRef, event: &str) -> Result<(), DriverError> {
        self.with_element(el, |state, position| {
            let key = state.documents[state.current].elements[position].key.clone();
            state.events.push(FakeEvent::Dispatch {
                key,
                event: event.to_string(),
            });
            Ok(())
        })
    }

    async fn switch_to_frame(&self, frame: Option<&ElementRef>) -> Result<(), DriverError> {
        let key = match frame {
            Some(el) => Some(self.with_element(el, |state, position| {
                Ok(state.documents[state.current].elements[position].key.clone())
            })?),
            None => None,
        };
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.events.push(FakeEvent::Frame(key));
        Ok(())
    }

    async fn switch_to_parent_frame(&self) -> Result<(), DriverError> {
        self.live()
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.live()?;
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }
}
