//! [`PageDriver`] over a CDP page session.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::cdp::{CallArgument, CdpClient, KeyEventType, MouseButton, PageSession};
use crate::keys::{key_definition, modifier_bit, normalize_key};

use super::scripts;
use super::{By, DriverError, ElementRef, ElementState, PageDriver, ScriptArg, SelectOption};

/// Drives one Chrome tab. Element handles are Runtime remote object ids.
pub struct CdpDriver {
    /// Keeps the socket and its receive task alive for the page.
    client: Arc<CdpClient>,
    page: PageSession,
    /// Iframe elements entered via `switch_to_frame`, outermost first.
    frames: Mutex<Vec<String>>,
    /// CDP modifier mask of keys currently held down.
    modifiers: Mutex<i32>,
}

impl CdpDriver {
    pub fn new(client: Arc<CdpClient>, page: PageSession) -> Self {
        Self {
            client,
            page,
            frames: Mutex::new(Vec::new()),
            modifiers: Mutex::new(0),
        }
    }

    /// Open a fresh tab on `client` and drive it.
    pub async fn open(client: Arc<CdpClient>) -> Result<Self, DriverError> {
        let page = client.new_page().await?;
        Ok(Self::new(client, page))
    }

    pub fn session(&self) -> &PageSession {
        &self.page
    }

    pub fn client(&self) -> &Arc<CdpClient> {
        &self.client
    }

    async fn search_root(&self) -> Result<String, DriverError> {
        let frame = self.frames.lock().last().cloned();
        let root = match frame {
            None => self.page.evaluate_handle("document").await?,
            Some(frame_id) => {
                self.page
                    .call_function_on_handle(&frame_id, scripts::CONTENT_DOCUMENT, Vec::new())
                    .await?
            }
        };
        root.object_id.ok_or_else(|| {
            DriverError::Script("Frame document is not accessible (cross-origin frame)".to_string())
        })
    }

    async fn call_on(
        &self,
        el: &ElementRef,
        function: &str,
        args: Vec<CallArgument>,
    ) -> Result<Value, DriverError> {
        Ok(self.page.call_function_on(el.id(), function, args).await?)
    }

    async fn lookup(&self, root: &str, by: &By) -> Result<Vec<ElementRef>, DriverError> {
        let array = self
            .page
            .call_function_on_handle(
                root,
                scripts::FIND,
                vec![CallArgument::value(by.kind()), CallArgument::value(by.query())],
            )
            .await?;

        let Some(array_id) = array.object_id else {
            return Ok(Vec::new());
        };
        let ids = self.page.array_elements(&array_id).await?;
        if let Err(e) = self.page.release_object(&array_id).await {
            trace!("releaseObject failed: {}", e);
        }
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn center(&self, el: &ElementRef) -> Result<(f64, f64), DriverError> {
        self.page.scroll_into_view_if_needed(el.id()).await?;
        self.page
            .element_center(el.id())
            .await?
            .ok_or_else(|| DriverError::NotInteractable(format!("{} has no layout box", el)))
    }

    fn to_call_args(args: &[ScriptArg]) -> Vec<CallArgument> {
        args.iter()
            .map(|arg| match arg {
                ScriptArg::Value(v) => CallArgument::value(v.clone()),
                ScriptArg::Element(el) => CallArgument::object(el.id()),
            })
            .collect()
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.frames.lock().clear();
        Ok(self.page.navigate(url).await?)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.get_url().await?)
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.page.get_title().await?)
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let root = self.search_root().await?;
        let html = self
            .page
            .call_function_on(
                &root,
                "function() { return this.documentElement ? this.documentElement.outerHTML : ''; }",
                Vec::new(),
            )
            .await?;
        Ok(html.as_str().unwrap_or_default().to_string())
    }

    async fn execute_script(&self, script: &str, args: &[ScriptArg]) -> Result<Value, DriverError> {
        let root = self.search_root().await?;
        Ok(self
            .page
            .call_function_on(&root, &scripts::wrap_body(script), Self::to_call_args(args))
            .await?)
    }

    async fn find_elements(&self, by: &By) -> Result<Vec<ElementRef>, DriverError> {
        let root = self.search_root().await?;
        self.lookup(&root, by).await
    }

    async fn find_child_elements(
        &self,
        parent: &ElementRef,
        by: &By,
    ) -> Result<Vec<ElementRef>, DriverError> {
        self.lookup(parent.id(), by).await
    }

    async fn element_state(&self, el: &ElementRef) -> Result<ElementState, DriverError> {
        let value = self.call_on(el, scripts::STATE, Vec::new()).await?;
        serde_json::from_value(value).map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn attribute(&self, el: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        let value = self
            .call_on(el, scripts::ATTRIBUTE, vec![CallArgument::value(name)])
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, el: &ElementRef) -> Result<(), DriverError> {
        let (x, y) = self.center(el).await?;
        Ok(self.page.click_at(x, y, MouseButton::Left, 1).await?)
    }

    async fn double_click(&self, el: &ElementRef) -> Result<(), DriverError> {
        let (x, y) = self.center(el).await?;
        Ok(self.page.click_at(x, y, MouseButton::Left, 2).await?)
    }

    async fn context_click(&self, el: &ElementRef) -> Result<(), DriverError> {
        let (x, y) = self.center(el).await?;
        Ok(self.page.click_at(x, y, MouseButton::Right, 1).await?)
    }

    async fn hover(&self, el: &ElementRef) -> Result<(), DriverError> {
        let (x, y) = self.center(el).await?;
        Ok(self.page.mouse_move(x, y).await?)
    }

    async fn drag_and_drop(&self, source: &ElementRef, target: &ElementRef) -> Result<(), DriverError> {
        let from = self.center(source).await?;
        let to = self.center(target).await?;
        Ok(self.page.mouse_drag(from, to).await?)
    }

    async fn clear(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.call_on(el, scripts::CLEAR, Vec::new()).await?;
        Ok(())
    }

    async fn send_keys(&self, el: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.focus(el).await?;
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() {
                self.page.insert_text(line).await?;
            }
            if lines.peek().is_some() {
                self.press_key("Enter").await?;
            }
        }
        Ok(())
    }

    async fn key_down(&self, key: &str) -> Result<(), DriverError> {
        let def = key_definition(key);
        let mask = {
            let mut held = self.modifiers.lock();
            if let Some(bit) = modifier_bit(&def.key) {
                *held |= bit;
            }
            *held
        };
        Ok(self.page.key_event(KeyEventType::KeyDown, &def, mask).await?)
    }

    async fn key_up(&self, key: &str) -> Result<(), DriverError> {
        let def = key_definition(key);
        let mask = *self.modifiers.lock();
        self.page.key_event(KeyEventType::KeyUp, &def, mask).await?;
        if let Some(bit) = modifier_bit(&normalize_key(key)) {
            *self.modifiers.lock() &= !bit;
        }
        Ok(())
    }

    async fn focus(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.call_on(el, scripts::FOCUS, Vec::new()).await?;
        Ok(())
    }

    async fn blur(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.call_on(el, scripts::BLUR, Vec::new()).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.call_on(el, scripts::SCROLL_INTO_VIEW, Vec::new()).await?;
        Ok(())
    }

    async fn scroll_by(&self, dx: i64, dy: i64) -> Result<(), DriverError> {
        self.execute_script(
            "(this.defaultView || window).scrollBy(arguments[0], arguments[1]);",
            &[ScriptArg::Value(json!(dx)), ScriptArg::Value(json!(dy))],
        )
        .await?;
        Ok(())
    }

    async fn set_files(&self, el: &ElementRef, paths: &[PathBuf]) -> Result<(), DriverError> {
        debug!(count = paths.len(), "Setting file input files");
        Ok(self.page.set_file_input_files(el.id(), paths).await?)
    }

    async fn select_options(&self, el: &ElementRef) -> Result<Vec<SelectOption>, DriverError> {
        let value = self.call_on(el, scripts::OPTIONS, Vec::new()).await?;
        serde_json::from_value(value).map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn set_option_selected(
        &self,
        el: &ElementRef,
        index: usize,
        selected: bool,
    ) -> Result<(), DriverError> {
        let ok = self
            .call_on(
                el,
                scripts::SELECT_OPTION,
                vec![CallArgument::value(index), CallArgument::value(selected)],
            )
            .await?;
        if ok.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::NoSuchElement(format!("option index {}", index)))
        }
    }

    async fn set_value_js(&self, el: &ElementRef, value: &str) -> Result<String, DriverError> {
        let read_back = self
            .call_on(el, scripts::SET_VALUE, vec![CallArgument::value(value)])
            .await?;
        Ok(read_back.as_str().unwrap_or_default().to_string())
    }

    async fn set_checked_js(&self, el: &ElementRef, checked: bool) -> Result<(), DriverError> {
        self.call_on(el, scripts::SET_CHECKED, vec![CallArgument::value(checked)])
            .await?;
        Ok(())
    }

    async fn js_click(&self, el: &ElementRef) -> Result<(), DriverError> {
        self.call_on(el, scripts::JS_CLICK, Vec::new()).await?;
        Ok(())
    }

    async fn dispatch_event(&self, el: &ElementRef, event: &str) -> Result<(), DriverError> {
        self.call_on(el, scripts::DISPATCH, vec![CallArgument::value(event)])
            .await?;
        Ok(())
    }

    async fn switch_to_frame(&self, frame: Option<&ElementRef>) -> Result<(), DriverError> {
        match frame {
            None => self.frames.lock().clear(),
            Some(el) => {
                let state = self.element_state(el).await?;
                if state.tag != "iframe" && state.tag != "frame" {
                    return Err(DriverError::NoSuchElement(format!(
                        "{} is a <{}>, not a frame",
                        el, state.tag
                    )));
                }
                self.frames.lock().push(el.id().to_string());
            }
        }
        Ok(())
    }

    async fn switch_to_parent_frame(&self) -> Result<(), DriverError> {
        self.frames.lock().pop();
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        Ok(self.page.screenshot_png().await?)
    }

    async fn is_alive(&self) -> bool {
        self.client.is_connected() && self.page.get_url().await.is_ok()
    }
}
