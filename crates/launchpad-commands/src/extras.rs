use std::collections::HashMap;

use launchpad_common::recipe::RESERVED_EXTRA_ARG_KEYS;
use serde_json::Value;

fn kebab_to_snake(key: &str) -> String {
    key.replace('-', "_")
}

/// Recursively rewrite kebab-case object keys to snake_case. Arrays and
/// scalars pass through unchanged.
fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(kebab_to_snake(k), normalize_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        other => other.clone(),
    }
}

/// Append `extra_args` to `args` as CLI flags, skipping internal keys and any
/// key already emitted by the caller. Booleans emit the flag alone (and are
/// omitted when `false`); `null` is skipped; arrays/objects are emitted as a
/// normalized JSON string.
pub fn append_extras(args: &mut Vec<String>, extra_args: &HashMap<String, Value>, already_emitted: &[&str]) {
    for (key, value) in extra_args {
        let flag_key = kebab_to_snake(key);
        if RESERVED_EXTRA_ARG_KEYS.contains(&flag_key.as_str()) {
            continue;
        }
        if already_emitted.iter().any(|k| *k == flag_key) {
            continue;
        }
        let flag = format!("--{}", flag_key.replace('_', "-"));
        match value {
            Value::Null => continue,
            Value::Bool(true) => args.push(flag),
            Value::Bool(false) => continue,
            Value::String(s) => {
                args.push(flag);
                args.push(s.clone());
            }
            Value::Number(n) => {
                args.push(flag);
                args.push(n.to_string());
            }
            Value::Array(_) | Value::Object(_) => {
                args.push(flag);
                args.push(normalize_value(value).to_string());
            }
        }
    }
}
