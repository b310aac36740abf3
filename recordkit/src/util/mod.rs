use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Loose truthiness over dynamic values: null, false, 0, NaN and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over values: null < bool < number < string < array < object,
/// natural ordering within each kind.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let x = serde_json::to_string(x).unwrap_or_default();
            let y = serde_json::to_string(y).unwrap_or_default();
            x.cmp(&y)
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Human-readable rendering: strings unquoted, null as "", everything else as JSON.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Length used by min/max length rules: characters for strings, items for arrays.
pub fn value_length(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        other => display_string(other).chars().count(),
    }
}

/// Resolve a dotted path ("parent.child", "list.0") against a value.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut target = root;
    for segment in path.split('.') {
        target = match target {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(target)
}

/// Write a value at a dotted path, creating missing intermediate objects.
///
/// Returns `false` when the path runs through a scalar or an out-of-range
/// array index; the root is left untouched in that case.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut target = root;
    for segment in parents {
        target = match target {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return false,
            },
            _ => return false,
        };
    }

    match target {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Last path segment of a Rust type name, or `<closure>` for anonymous functions.
pub fn describe_fn<F: ?Sized>(_f: &F) -> String {
    let name = std::any::type_name::<F>();
    if name.contains("{{closure}}") {
        return "<closure>".to_string();
    }
    name.rsplit("::").next().unwrap_or(name).to_string()
}
