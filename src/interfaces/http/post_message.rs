use crate::domain::client_action::{ClientAction, ClientActionEnvelope};

/// Escapes a JSON document so it can sit inside an inline `<script>`.
fn script_safe(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
    }
    out
}

/// HTML page an iframe callback answers with. It hands the client action to
/// the embedding page and does nothing else.
pub fn render_post_message(action: ClientAction, target_origin: &str) -> String {
    let envelope = ClientActionEnvelope::from(action);
    let payload = serde_json::to_string(&envelope).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize client action");
        r#"{"clientAction":{"type":"Failure","context":{"errorCode":"InternalError","message":"unserializable client action"}}}"#.to_string()
    });
    let origin = serde_json::Value::String(target_origin.to_string()).to_string();

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head><body>\n<script>\nwindow.parent.postMessage({}, {});\n</script>\n</body></html>\n",
        script_safe(&payload),
        script_safe(&origin)
    )
}
