//! TOML document loader.

use super::{source_name, source_order, PropertySource, PropertySourceLoader};
use crate::resource::{read_to_string, ResourceLoader};
use crate::ConfigError;

/// Loads `<base>.toml` and `<base>-<profile>.toml`.
///
/// This is the loader an [`Environment`](crate::Environment) falls back to when none
/// are registered. Missing documents are skipped; documents that fail to parse are errors.
#[derive(Debug, Clone, Default)]
pub struct TomlPropertySourceLoader;

impl TomlPropertySourceLoader {
    pub const EXTENSION: &'static str = "toml";
}

impl PropertySourceLoader for TomlPropertySourceLoader {
    fn load(
        &self,
        base_name: &str,
        resources: &dyn ResourceLoader,
        profile: Option<&str>,
    ) -> Result<Option<PropertySource>, ConfigError> {
        let name = source_name(base_name, profile);
        let path = format!("{name}.{}", Self::EXTENSION);

        let Some(contents) = read_to_string(resources, &path)? else {
            tracing::trace!(path = %path, "no toml document");
            return Ok(None);
        };

        let table = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            name: path.clone(),
            source: e,
        })?;

        let source = PropertySource::from_table(name, table).with_order(source_order(profile));
        tracing::debug!(path = %path, entries = source.len(), "loaded toml document");
        Ok(Some(source))
    }
}
