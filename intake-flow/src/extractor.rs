use serde_json::Value;

/// Normalize a raw LLM response payload into plain assistant text.
///
/// Fallback order, first match wins:
/// 1. a `content` array of typed blocks, where the text of every block with
///    `type == "text"` is newline-joined and trimmed;
/// 2. a flat `completion` string field;
/// 3. a flat `generated_text` string field;
/// 4. the raw payload verbatim.
///
/// Extraction never fails the request.
pub fn extract_reply(raw: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };

    if let Some(blocks) = parsed.get("content").and_then(Value::as_array) {
        return join_text_blocks(blocks);
    }

    if let Some(completion) = parsed.get("completion").and_then(Value::as_str) {
        return completion.to_string();
    }

    if let Some(generated) = parsed.get("generated_text").and_then(Value::as_str) {
        return generated.to_string();
    }

    raw.to_string()
}

fn join_text_blocks(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
