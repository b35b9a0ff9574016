//! Keyboard presses and chords.

use async_trait::async_trait;
use jobfill_browser::keys::parse_chord;
use serde_json::{Value, json};

use super::{ActionContext, ActionHandler};
use crate::command::FillCommand;
use crate::error::AutofillError;

/// `press_key`: a single key (`Enter`) or a chord (`ctrl+a`), optionally
/// aimed at an element which is focused first.
pub struct PressKeyHandler;

#[async_trait]
impl ActionHandler for PressKeyHandler {
    async fn perform(&self, ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
        let key = command
            .key
            .clone()
            .unwrap_or_else(|| command.value_text());
        if key.trim().is_empty() {
            return Err(AutofillError::InvalidCommand("press_key requires a key".to_string()));
        }

        if let Some(selector) = command.selector.as_deref().filter(|s| !s.trim().is_empty()) {
            let el = ctx
                .locator
                .find_visible(selector, command.selector_type, ctx.timeout_ms(command))
                .await?;
            ctx.driver.focus(&el).await?;
        }

        let (modifiers, main) = parse_chord(&key);
        for modifier in modifiers.iter() {
            ctx.driver.key_down(modifier).await?;
        }
        let pressed = ctx.driver.press_key(&main).await;
        for modifier in modifiers.iter().rev() {
            ctx.driver.key_up(modifier).await?;
        }
        pressed?;

        Ok(json!(key))
    }
}
