//! Runtime domain: evaluation and remote object calls.

use serde_json::{Value, json};

use crate::cdp::error::CdpError;
use crate::cdp::protocol::{CallArgument, PropertyDescriptor, RemoteObject};

use super::core::PageSession;

fn exception_text(result: &Value) -> Option<String> {
    result.get("exceptionDetails").map(|exception| {
        exception["exception"]["description"]
            .as_str()
            .or_else(|| exception["text"].as_str())
            .unwrap_or("Unknown error")
            .to_string()
    })
}

impl PageSession {
    /// Evaluate a JavaScript expression and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(text) = exception_text(&result) {
            return Err(CdpError::JavaScript(text));
        }
        Ok(result["result"]["value"].clone())
    }

    /// Evaluate an expression and keep the result as a remote handle.
    pub async fn evaluate_handle(&self, expression: &str) -> Result<RemoteObject, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": false,
                })),
            )
            .await?;

        if let Some(text) = exception_text(&result) {
            return Err(CdpError::JavaScript(text));
        }
        Ok(serde_json::from_value(result["result"].clone())?)
    }

    /// Call `function` with `this` bound to `object_id`, returning by value.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<CallArgument>,
    ) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "arguments": args,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(text) = exception_text(&result) {
            return Err(CdpError::JavaScript(text));
        }
        Ok(result["result"]["value"].clone())
    }

    /// Same as [`call_function_on`](Self::call_function_on) but keeps the
    /// result remote (needed for element arrays).
    pub async fn call_function_on_handle(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<CallArgument>,
    ) -> Result<RemoteObject, CdpError> {
        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "arguments": args,
                    "returnByValue": false,
                })),
            )
            .await?;

        if let Some(text) = exception_text(&result) {
            return Err(CdpError::JavaScript(text));
        }
        Ok(serde_json::from_value(result["result"].clone())?)
    }

    /// Own properties of a remote object.
    pub async fn get_properties(&self, object_id: &str) -> Result<Vec<PropertyDescriptor>, CdpError> {
        let result = self
            .call(
                "Runtime.getProperties",
                Some(json!({"objectId": object_id, "ownProperties": true})),
            )
            .await?;
        Ok(serde_json::from_value(result["result"].clone())?)
    }

    /// Element handles held by a remote array, in index order.
    pub async fn array_elements(&self, array_id: &str) -> Result<Vec<String>, CdpError> {
        let mut indexed: Vec<(usize, String)> = self
            .get_properties(array_id)
            .await?
            .into_iter()
            .filter_map(|p| {
                let index = p.name.parse::<usize>().ok()?;
                let object = p.value?;
                if !object.is_node() {
                    return None;
                }
                Some((index, object.object_id?))
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, id)| id).collect())
    }

    pub async fn release_object(&self, object_id: &str) -> Result<(), CdpError> {
        self.call("Runtime.releaseObject", Some(json!({"objectId": object_id})))
            .await?;
        Ok(())
    }
}
