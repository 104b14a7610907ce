use serde_json::Value;

/// Flattens whatever a caller sent as "tags" into an ordered token list.
/// Strings split on comma/whitespace runs, lists and mappings recurse,
/// other scalars stringify. Blank tokens are dropped; order is first-seen
/// and duplicates survive (the tag listing op is where dedup happens).
pub fn normalize_tags(value: &Value) -> Vec<String> {
    let mut tags = Vec::new();
    extend_tags(value, &mut tags);
    tags
}

fn extend_tags(value: &Value, tags: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(text) => {
            for part in text.trim().split(|c: char| c == ',' || c.is_whitespace()) {
                if !part.is_empty() {
                    tags.push(part.to_string());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                extend_tags(item, tags);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                extend_tags(item, tags);
            }
        }
        Value::Bool(flag) => tags.push(flag.to_string()),
        Value::Number(number) => tags.push(number.to_string()),
    }
}
