use super::*;

#[test]
fn test_request_omits_empty_fields() {
    let req = CdpRequest {
        id: 7,
        method: "Runtime.callFunctionOn".to_string(),
        params: None,
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("Runtime.callFunctionOn"));
    assert!(!json.contains("params"));
    assert!(!json.contains("sessionId"));
}

#[test]
fn test_request_carries_session_id() {
    let req = CdpRequest {
        id: 1,
        method: "Page.navigate".to_string(),
        params: Some(serde_json::json!({"url": "https://jobs.example.com"})),
        session_id: Some("S1".to_string()),
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("\"sessionId\":\"S1\""));
}

#[test]
fn test_error_response_deserialize() {
    let json = r#"{"id": 3, "error": {"code": -32000, "message": "Could not find object with given id"}}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    let err = resp.error.unwrap();
    assert_eq!(err.code, -32000);
}

#[test]
fn test_event_has_no_id() {
    let json = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.0}, "sessionId": "S1"}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert!(resp.id.is_none());
    assert_eq!(resp.session_id.as_deref(), Some("S1"));
}

#[test]
fn test_remote_object_node() {
    let json = r#"{"type": "object", "subtype": "node", "className": "HTMLInputElement", "objectId": "obj-1"}"#;
    let obj: RemoteObject = serde_json::from_str(json).unwrap();
    assert!(obj.is_node());
    assert_eq!(obj.object_id.as_deref(), Some("obj-1"));
}

#[test]
fn test_call_argument_shapes() {
    let value = serde_json::to_value(CallArgument::value("Texas")).unwrap();
    assert_eq!(value, serde_json::json!({"value": "Texas"}));

    let object = serde_json::to_value(CallArgument::object("obj-9")).unwrap();
    assert_eq!(object, serde_json::json!({"objectId": "obj-9"}));
}

#[test]
fn test_browser_version_pascal_case() {
    let json = r#"{
        "Browser": "Chrome/126.0",
        "Protocol-Version": "1.3",
        "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
    }"#;
    let version: BrowserVersion = serde_json::from_str(json).unwrap();
    assert!(version.web_socket_debugger_url.starts_with("ws://"));
}

#[test]
fn test_mouse_button_serialize() {
    assert_eq!(serde_json::to_string(&MouseButton::Right).unwrap(), "\"right\"");
}
