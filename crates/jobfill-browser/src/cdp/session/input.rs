//! Input domain: mouse and keyboard events.

use serde_json::json;
use tracing::trace;

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{KeyEventType, MouseButton, MouseEventType};
use crate::keys::KeyDefinition;

use super::core::PageSession;

impl PageSession {
    async fn mouse_event(
        &self,
        event: MouseEventType,
        x: f64,
        y: f64,
        button: MouseButton,
        click_count: u32,
    ) -> Result<(), CdpError> {
        self.call(
            "Input.dispatchMouseEvent",
            Some(json!({
                "type": event,
                "x": x,
                "y": y,
                "button": button,
                "clickCount": click_count,
            })),
        )
        .await?;
        Ok(())
    }

    /// Press and release `button` at a point, `clicks` times.
    pub async fn click_at(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        clicks: u32,
    ) -> Result<(), CdpError> {
        for click_count in 1..=clicks.max(1) {
            self.mouse_event(MouseEventType::MousePressed, x, y, button, click_count)
                .await?;
            self.mouse_event(MouseEventType::MouseReleased, x, y, button, click_count)
                .await?;
        }
        trace!("Mouse {:?} x{} at ({}, {})", button, clicks, x, y);
        Ok(())
    }

    pub async fn mouse_move(&self, x: f64, y: f64) -> Result<(), CdpError> {
        self.mouse_event(MouseEventType::MouseMoved, x, y, MouseButton::None, 0)
            .await
    }

    /// Press at `from`, move to `to`, release.
    pub async fn mouse_drag(&self, from: (f64, f64), to: (f64, f64)) -> Result<(), CdpError> {
        self.mouse_event(MouseEventType::MouseMoved, from.0, from.1, MouseButton::None, 0)
            .await?;
        self.mouse_event(MouseEventType::MousePressed, from.0, from.1, MouseButton::Left, 1)
            .await?;
        self.mouse_event(MouseEventType::MouseMoved, to.0, to.1, MouseButton::Left, 0)
            .await?;
        self.mouse_event(MouseEventType::MouseReleased, to.0, to.1, MouseButton::Left, 1)
            .await
    }

    /// Insert text at the focused element as if typed (no key events).
    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({"text": text})))
            .await?;
        Ok(())
    }

    /// Dispatch one key transition with the active modifier mask.
    pub async fn key_event(
        &self,
        event: KeyEventType,
        key: &KeyDefinition,
        modifiers: i32,
    ) -> Result<(), CdpError> {
        let mut params = json!({
            "type": event,
            "key": key.key,
            "code": key.code,
            "windowsVirtualKeyCode": key.key_code,
            "nativeVirtualKeyCode": key.key_code,
            "modifiers": modifiers,
        });
        // Only keyDown carries text, and only when no command modifier is held.
        if matches!(event, KeyEventType::KeyDown) && modifiers & !8 == 0 {
            if let Some(text) = key.text.as_deref() {
                params["text"] = json!(text);
            }
        }
        self.call("Input.dispatchKeyEvent", Some(params)).await?;
        Ok(())
    }
}
