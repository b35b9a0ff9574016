//! Action handlers, one per [`ActionType`].
//!
//! A handler locates its element, scrolls it into view, tries the native
//! interaction and falls back to alternative strategies when the native path
//! does not take effect. Fallback chains are written as small strategy enums
//! walked in order with early exit on the first success.
//!
//! Handlers return the value actually applied; [`run_handler`] turns that
//! (or the error) into a [`FillResult`] with timing.

mod checkbox;
mod click;
mod date;
mod file;
mod keys;
mod select;
mod text;
mod utility;

pub use checkbox::{CheckHandler, SelectRadioHandler};
pub use click::{ClickHandler, DoubleClickHandler, RightClickHandler};
pub use date::{EnterDateHandler, convert_date, format_date, parse_date};
pub use file::UploadFileHandler;
pub use keys::PressKeyHandler;
pub use select::{SelectAutocompleteHandler, SelectMultipleHandler, SelectOptionHandler};
pub use text::{TypeNumberHandler, TypeTextHandler};
pub use utility::{
    BlurHandler, ClearHandler, DragDropHandler, ExecuteJsHandler, FocusHandler, HoverHandler,
    ScrollByHandler, ScrollToHandler, SetValueHandler, SwitchDefaultHandler, SwitchIframeHandler,
    WaitHandler,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jobfill_browser::{ElementRef, PageDriver};
use jobfill_config::AutofillConfig;
use serde_json::Value;
use tracing::{debug, trace};

use crate::command::{ActionType, FillCommand, FillResult};
use crate::error::AutofillError;
use crate::locator::ElementLocator;
use crate::registry::ActionRegistry;

/// What a handler works with: the page, a locator over it, and timings.
pub struct ActionContext {
    pub driver: Arc<dyn PageDriver>,
    pub locator: ElementLocator,
    pub config: AutofillConfig,
}

impl ActionContext {
    pub fn new(driver: Arc<dyn PageDriver>, config: AutofillConfig) -> Self {
        Self {
            locator: ElementLocator::new(driver.clone(), &config),
            driver,
            config,
        }
    }

    /// The command's wait budget, or the configured default.
    pub fn timeout_ms(&self, command: &FillCommand) -> u64 {
        command.timeout_ms.unwrap_or(self.config.default_timeout_ms)
    }

    pub async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Fire `input`, `change` and `blur` so framework listeners catch up.
    pub async fn trigger_events(&self, el: &ElementRef) {
        for event in ["input", "change", "blur"] {
            if let Err(e) = self.driver.dispatch_event(el, event).await {
                trace!(element = %el, event, "Event dispatch failed: {}", e);
                break;
            }
        }
    }

    /// Type `text`, one key at a time when a per-character delay is set.
    pub async fn type_into(&self, el: &ElementRef, text: &str, delay_ms: u64) -> Result<(), AutofillError> {
        let delay = if delay_ms > 0 { delay_ms } else { self.config.typing_delay_ms };
        if delay == 0 {
            self.driver.send_keys(el, text).await?;
            return Ok(());
        }
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.driver.send_keys(el, ch.encode_utf8(&mut buf)).await?;
            self.pause(delay).await;
        }
        Ok(())
    }

    /// Empty a text control, trying each [`ClearStrategy`] until it reads empty.
    pub async fn clear_field(&self, el: &ElementRef) -> bool {
        for strategy in ClearStrategy::ORDER {
            if let Err(e) = strategy.apply(self, el).await {
                trace!(element = %el, ?strategy, "Clear strategy failed: {}", e);
                continue;
            }
            if self.driver.value(el).await.map(|v| v.is_empty()).unwrap_or(false) {
                trace!(element = %el, ?strategy, "Field cleared");
                return true;
            }
        }
        false
    }

    /// Press `ctrl+a` then `key` with the element focused.
    pub async fn select_all_and(&self, el: &ElementRef, key: &str) -> Result<(), AutofillError> {
        self.driver.focus(el).await?;
        self.driver.key_down("Control").await?;
        let pressed = self.driver.press_key("a").await;
        self.driver.key_up("Control").await?;
        pressed?;
        self.driver.press_key(key).await?;
        Ok(())
    }
}

/// Ways of emptying a text control, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearStrategy {
    Native,
    SelectAllDelete,
    Backspace,
}

impl ClearStrategy {
    pub const ORDER: [ClearStrategy; 3] = [
        ClearStrategy::Native,
        ClearStrategy::SelectAllDelete,
        ClearStrategy::Backspace,
    ];

    async fn apply(self, ctx: &ActionContext, el: &ElementRef) -> Result<(), AutofillError> {
        match self {
            ClearStrategy::Native => ctx.driver.clear(el).await?,
            ClearStrategy::SelectAllDelete => ctx.select_all_and(el, "Backspace").await?,
            ClearStrategy::Backspace => {
                let current = ctx.driver.value(el).await?;
                ctx.driver.focus(el).await?;
                ctx.driver.press_key("End").await?;
                for _ in current.chars() {
                    ctx.driver.press_key("Backspace").await?;
                }
            }
        }
        Ok(())
    }
}

/// Applies one command kind.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform the action and return the value actually applied.
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError>;
}

/// Run a handler and fold its outcome into a [`FillResult`].
pub async fn run_handler(
    handler: &dyn ActionHandler,
    ctx: &ActionContext,
    command: &FillCommand,
) -> FillResult {
    let start = Instant::now();
    let outcome = handler.perform(ctx, command).await;
    let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

    match outcome {
        Ok(value_used) => {
            ctx.pause(command.wait_after_ms).await;
            FillResult::ok(command, value_used, elapsed(start))
        }
        Err(e) => {
            debug!(action = %command.action, selector = command.selector_str(), "Action failed: {}", e);
            let found = !e.is_not_found();
            FillResult::failed(command, e.to_string(), found, elapsed(start))
        }
    }
}

/// Register the built-in handler for every built-in kind.
pub(crate) fn register_builtin(registry: &ActionRegistry) {
    macro_rules! builtin {
        ($($action:ident => $handler:ident),* $(,)?) => {
            $(registry.register(ActionType::$action, || Arc::new($handler) as Arc<dyn ActionHandler>);)*
        };
    }

    builtin! {
        TypeText => TypeTextHandler,
        TypeNumber => TypeNumberHandler,
        SelectOption => SelectOptionHandler,
        SelectMultiple => SelectMultipleHandler,
        SelectAutocomplete => SelectAutocompleteHandler,
        Check => CheckHandler,
        SelectRadio => SelectRadioHandler,
        UploadFile => UploadFileHandler,
        EnterDate => EnterDateHandler,
        Click => ClickHandler,
        DoubleClick => DoubleClickHandler,
        RightClick => RightClickHandler,
        Hover => HoverHandler,
        Clear => ClearHandler,
        Focus => FocusHandler,
        Blur => BlurHandler,
        ScrollTo => ScrollToHandler,
        ScrollBy => ScrollByHandler,
        Wait => WaitHandler,
        PressKey => PressKeyHandler,
        DragDrop => DragDropHandler,
        SetValue => SetValueHandler,
        ExecuteJs => ExecuteJsHandler,
        SwitchIframe => SwitchIframeHandler,
        SwitchDefault => SwitchDefaultHandler,
    }
}

/// Selector of a command that [`FillCommand::validate`] guarantees is set.
pub(crate) fn required_selector(command: &FillCommand) -> Result<&str, AutofillError> {
    command
        .selector
        .as_deref()
        .ok_or_else(|| AutofillError::InvalidCommand(format!("{} requires a selector", command.action)))
}
