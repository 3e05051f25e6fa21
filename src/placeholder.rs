//! Placeholder resolution for string property values.
//!
//! Supports `${path.to.key}` references and `${path.to.key:default}` fallbacks.
//! Use `$${...}` to escape and produce a literal `${...}`.

use toml::Value;

use crate::ConfigError;

const MAX_DEPTH: usize = 32;

/// Resolves every `${...}` reference in `text`.
///
/// `lookup` returns the raw value of a canonical key, or `None` when the key is
/// absent or null. Resolved values are resolved again, so references may chain;
/// a chain deeper than the nesting limit is reported as a circular reference.
pub fn resolve_placeholders<F>(text: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<Value>,
{
    resolve_at_depth(text, lookup, 0)
}

fn resolve_at_depth<F>(text: &str, lookup: &F, depth: usize) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<Value>,
{
    if depth > MAX_DEPTH {
        return Err(ConfigError::CircularReference);
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                let reference =
                    consume_until(&mut chars, '}').ok_or(ConfigError::UnclosedReference)?;
                let (path, default) = match reference.split_once(':') {
                    Some((path, default)) => (path, Some(default)),
                    None => (reference.as_str(), None),
                };
                let path = path.trim();
                if path.is_empty() || path.split('.').any(str::is_empty) {
                    return Err(ConfigError::InvalidReferencePath(path.to_string()));
                }

                let resolved = match lookup(path) {
                    Some(value) => value_to_string(&value, path)?,
                    None => match default {
                        Some(default) => default.to_string(),
                        None => return Err(ConfigError::ReferenceNotFound(path.to_string())),
                    },
                };
                result.push_str(&resolve_at_depth(&resolved, lookup, depth + 1)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

/// Consumes characters until the delimiter, returning the collected string.
fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delim: char) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None
}

fn value_to_string(value: &Value, path: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(dt) => Ok(dt.to_string()),
        Value::Array(_) | Value::Table(_) => {
            Err(ConfigError::NonScalarReference(path.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(text: &str, values: &[(&str, Value)]) -> Result<String, ConfigError> {
        let values: HashMap<String, Value> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        resolve_placeholders(text, &|key: &str| values.get(key).cloned())
    }

    #[test]
    fn test_simple_reference() {
        let resolved = resolve(
            "http://${server.host}:${server.port}/api",
            &[
                ("server.host", Value::String("localhost".into())),
                ("server.port", Value::Integer(8080)),
            ],
        )
        .unwrap();
        assert_eq!(resolved, "http://localhost:8080/api");
    }

    #[test]
    fn test_default_value() {
        let resolved = resolve("${missing.key:fallback}/${other:}", &[]).unwrap();
        assert_eq!(resolved, "fallback/");
    }

    #[test]
    fn test_chained_references() {
        let resolved = resolve(
            "${c}",
            &[
                ("a", Value::String("hello".into())),
                ("b", Value::String("${a} world".into())),
                ("c", Value::String("${b}!".into())),
            ],
        )
        .unwrap();
        assert_eq!(resolved, "hello world!");
    }

    #[test]
    fn test_escape_sequence() {
        let resolved = resolve("use $${VAR} for $5", &[]).unwrap();
        assert_eq!(resolved, "use ${VAR} for $5");
    }

    #[test]
    fn test_circular_reference() {
        let result = resolve(
            "${a}",
            &[
                ("a", Value::String("${b}".into())),
                ("b", Value::String("${a}".into())),
            ],
        );
        assert!(matches!(result, Err(ConfigError::CircularReference)));
    }

    #[test]
    fn test_missing_reference() {
        let result = resolve("${nonexistent.path}", &[]);
        assert!(matches!(result, Err(ConfigError::ReferenceNotFound(_))));
    }

    #[test]
    fn test_invalid_and_unclosed_references() {
        assert!(matches!(
            resolve("${a..b}", &[]),
            Err(ConfigError::InvalidReferencePath(_))
        ));
        assert!(matches!(
            resolve("${a", &[]),
            Err(ConfigError::UnclosedReference)
        ));
    }

    #[test]
    fn test_non_scalar_reference() {
        let result = resolve("${list}", &[("list", Value::Array(vec![]))]);
        assert!(matches!(result, Err(ConfigError::NonScalarReference(_))));
    }
}
