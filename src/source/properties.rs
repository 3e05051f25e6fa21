//! `.properties` document loader.

use std::collections::BTreeMap;

use toml::Value;

use super::{coerce_value, source_name, source_order, PropertySource, PropertySourceLoader};
use crate::resource::{read_to_string, ResourceLoader};
use crate::ConfigError;

/// Loads `<base>.properties` and `<base>-<profile>.properties`.
///
/// Supports `key=value` and `key: value` lines, `#` and `!` comments, and
/// trailing-backslash continuation lines.
#[derive(Debug, Clone, Default)]
pub struct PropertiesPropertySourceLoader;

impl PropertiesPropertySourceLoader {
    pub const EXTENSION: &'static str = "properties";
}

impl PropertySourceLoader for PropertiesPropertySourceLoader {
    fn load(
        &self,
        base_name: &str,
        resources: &dyn ResourceLoader,
        profile: Option<&str>,
    ) -> Result<Option<PropertySource>, ConfigError> {
        let name = source_name(base_name, profile);
        let path = format!("{name}.{}", Self::EXTENSION);

        let Some(contents) = read_to_string(resources, &path)? else {
            tracing::trace!(path = %path, "no properties document");
            return Ok(None);
        };

        let mut source = PropertySource::new(name).with_order(source_order(profile));
        for (key, value) in parse_properties(&path, &contents)? {
            source = source.with_property(key, value);
        }
        tracing::debug!(path = %path, entries = source.len(), "loaded properties document");
        Ok(Some(source))
    }
}

fn parse_properties(name: &str, contents: &str) -> Result<BTreeMap<String, Value>, ConfigError> {
    let mut entries = BTreeMap::new();
    let mut pending = String::new();
    let mut start_line = 0;

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim_start();
        if pending.is_empty() {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            start_line = index + 1;
        }

        if let Some(continued) = strip_continuation(line) {
            pending.push_str(continued);
            continue;
        }
        pending.push_str(line);

        let (key, value) = split_entry(&pending).ok_or_else(|| ConfigError::MalformedProperties {
            name: name.to_string(),
            line: start_line,
            reason: "expected 'key=value' or 'key: value'".to_string(),
        })?;
        entries.insert(key.to_string(), coerce_value(value));
        pending.clear();
    }

    if !pending.is_empty() {
        return Err(ConfigError::MalformedProperties {
            name: name.to_string(),
            line: start_line,
            reason: "continuation at end of document".to_string(),
        });
    }

    Ok(entries)
}

/// Returns the line without its trailing backslash if it continues onto the next line.
///
/// An even run of trailing backslashes is a sequence of escaped backslashes, not a continuation.
fn strip_continuation(line: &str) -> Option<&str> {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    (trailing % 2 == 1).then(|| &line[..line.len() - 1])
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let separator = line.find(['=', ':'])?;
    let key = line[..separator].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[separator + 1..].trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::StaticResourceLoader;

    #[test]
    fn test_parses_both_separators_and_comments() {
        let entries = parse_properties(
            "application.properties",
            "# comment\n! also a comment\n\nserver.port=8080\nserver.host: example.com\n",
        )
        .unwrap();

        assert_eq!(entries["server.port"], Value::Integer(8080));
        assert_eq!(entries["server.host"], Value::String("example.com".into()));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_continuation_lines() {
        let entries = parse_properties("p", "greeting = hello \\\n    world\n").unwrap();
        assert_eq!(entries["greeting"], Value::String("hello world".into()));
    }

    #[test]
    fn test_value_may_contain_separators() {
        let entries = parse_properties("p", "url=jdbc:h2:mem:db;a=b\n").unwrap();
        assert_eq!(entries["url"], Value::String("jdbc:h2:mem:db;a=b".into()));
    }

    #[test]
    fn test_line_without_separator_is_malformed() {
        let result = parse_properties("p", "a=1\njust-a-key\n");
        assert!(matches!(
            result,
            Err(ConfigError::MalformedProperties { line: 2, .. })
        ));
    }

    #[test]
    fn test_loader_uses_profile_suffix() {
        let resources = StaticResourceLoader::new()
            .with_document("application.properties", "a=1")
            .with_document("application-dev.properties", "a=2");

        let loader = PropertiesPropertySourceLoader;
        let default = loader.load("application", &resources, None).unwrap().unwrap();
        let dev = loader
            .load("application", &resources, Some("dev"))
            .unwrap()
            .unwrap();

        assert_eq!(default.name(), "application");
        assert_eq!(dev.name(), "application-dev");
        assert!(dev.order() > default.order());
        assert!(loader
            .load("application", &resources, Some("prod"))
            .unwrap()
            .is_none());
    }
}
