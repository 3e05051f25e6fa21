//! Property sources and the loaders that produce them.

mod env;
mod properties;
mod system;
mod toml_file;

use std::collections::BTreeMap;
use std::fmt;

use toml::{Table, Value};

use crate::resource::ResourceLoader;
use crate::ConfigError;

pub use self::env::EnvironmentPropertySource;
pub use self::properties::PropertiesPropertySourceLoader;
pub use self::system::SystemPropertiesPropertySource;
pub use self::toml_file::TomlPropertySourceLoader;

/// Well-known `order` values for the sources an [`Environment`](crate::Environment) discovers.
///
/// Sources are merged in ascending order, so larger values win conflicts.
pub mod order {
    /// Default document produced by a loader (`application.toml`).
    pub const LOADER_DEFAULT: i32 = -300;
    /// Profile-specific document produced by a loader (`application-test.toml`).
    pub const LOADER_PROFILE: i32 = -200;
    /// Programmatic sources that do not set an order.
    pub const PROGRAMMATIC: i32 = 0;
    /// `-Dkey=value` arguments.
    pub const SYSTEM_PROPERTIES: i32 = 100;
    /// Process environment variables.
    pub const ENVIRONMENT_VARIABLES: i32 = 200;
}

/// How a source writes multi-part keys natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyConvention {
    /// `datasource.url`
    #[default]
    DotSeparatedLowerCase,
    /// `DATASOURCE_URL`
    EnvironmentVariable,
}

impl PropertyConvention {
    /// Maps a native key to its canonical dotted, lower-case form.
    ///
    /// Empty segments are dropped, so `FOO__BAR` and `foo..bar` both become `foo.bar`.
    pub fn normalize(self, key: &str) -> String {
        let separator = match self {
            PropertyConvention::DotSeparatedLowerCase => '.',
            PropertyConvention::EnvironmentVariable => '_',
        };
        key.trim()
            .split(separator)
            .filter(|segment| !segment.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// A named, ordered bundle of flat key/value pairs.
///
/// An entry whose value is `None` is an explicit null: it overrides lower-precedence
/// values for the key but resolves to nothing when read.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySource {
    name: String,
    order: i32,
    convention: PropertyConvention,
    entries: BTreeMap<String, Option<Value>>,
}

impl PropertySource {
    pub const DEFAULT_ORDER: i32 = order::PROGRAMMATIC;

    /// Creates an empty source with the default order and dotted convention.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Self::DEFAULT_ORDER,
            convention: PropertyConvention::default(),
            entries: BTreeMap::new(),
        }
    }

    /// Creates a source from a TOML table, flattening nested tables into dotted keys.
    pub fn from_table(name: impl Into<String>, table: Table) -> Self {
        let mut source = Self::new(name);
        flatten_into(&mut source.entries, "", table);
        source
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_convention(mut self, convention: PropertyConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Adds or replaces an entry.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// Adds an explicit null for `key`.
    pub fn with_null(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), None);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn convention(&self) -> PropertyConvention {
        self.convention
    }

    /// Native keys and values, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Produces property sources for a base name and an optional profile.
///
/// Implementations return `Ok(None)` when the document for that profile does not
/// exist. Malformed content is an error and must not be swallowed.
pub trait PropertySourceLoader: Send + Sync + fmt::Debug {
    fn load(
        &self,
        base_name: &str,
        resources: &dyn ResourceLoader,
        profile: Option<&str>,
    ) -> Result<Option<PropertySource>, ConfigError>;
}

/// Name of the source a loader produces for `base_name` and `profile`.
pub(crate) fn source_name(base_name: &str, profile: Option<&str>) -> String {
    match profile {
        Some(profile) => format!("{base_name}-{profile}"),
        None => base_name.to_string(),
    }
}

pub(crate) fn source_order(profile: Option<&str>) -> i32 {
    if profile.is_some() {
        order::LOADER_PROFILE
    } else {
        order::LOADER_DEFAULT
    }
}

fn flatten_into(entries: &mut BTreeMap<String, Option<Value>>, prefix: &str, table: Table) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Table(nested) => flatten_into(entries, &path, nested),
            value => {
                entries.insert(path, Some(value));
            }
        }
    }
}

/// Coerces a textual value to the most specific scalar: boolean, integer, float or string.
pub(crate) fn coerce_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }

    if looks_like_integer(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
    }

    if s.contains('.') {
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
    }

    Value::String(s.to_string())
}

fn looks_like_integer(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
