//! Conversion of raw property values to typed results.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use toml::Value;

/// Runtime kind of a raw property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Datetime,
    Array,
    Table,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Datetime(_) => ValueKind::Datetime,
            Value::Array(_) => ValueKind::Array,
            Value::Table(_) => ValueKind::Table,
        }
    }
}

type Converter = Arc<dyn Fn(&Value) -> Option<Box<dyn Any>> + Send + Sync>;

/// Registry of converters keyed by source kind and target type.
///
/// [`convert`](Self::convert) uses a registered converter when one matches and
/// otherwise deserializes the value with serde, so any `DeserializeOwned` type
/// can be requested.
pub struct ConversionService {
    converters: RwLock<HashMap<(ValueKind, TypeId), Converter>>,
}

impl fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionService")
            .field("converters", &self.converters.read().len())
            .finish()
    }
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! parse_from_string {
    ($service:expr, $($ty:ty),+ $(,)?) => {
        $(
            $service.add_converter::<$ty, _>(ValueKind::String, |value| {
                value.as_str().and_then(|s| s.trim().parse::<$ty>().ok())
            });
        )+
    };
}

impl ConversionService {
    /// A service with the built-in converters registered.
    pub fn new() -> Self {
        let service = Self::empty();
        parse_from_string!(service, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

        service.add_converter::<bool, _>(ValueKind::String, |value| {
            let s = value.as_str()?.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                None
            }
        });
        service.add_converter::<Vec<String>, _>(ValueKind::String, |value| {
            let s = value.as_str()?;
            Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        });
        for kind in [
            ValueKind::Integer,
            ValueKind::Float,
            ValueKind::Boolean,
            ValueKind::Datetime,
        ] {
            service.add_converter::<String, _>(kind, scalar_to_string);
        }
        service
    }

    /// A service with no registered converters; only serde deserialization applies.
    pub fn empty() -> Self {
        Self {
            converters: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `converter` for values of kind `source` requested as `T`,
    /// replacing any previous converter for the pair.
    pub fn add_converter<T, F>(&self, source: ValueKind, converter: F)
    where
        T: 'static,
        F: Fn(&Value) -> Option<T> + Send + Sync + 'static,
    {
        let erased: Converter =
            Arc::new(move |value: &Value| converter(value).map(|t| Box::new(t) as Box<dyn Any>));
        self.converters
            .write()
            .insert((source, TypeId::of::<T>()), erased);
    }

    /// Whether a converter is registered for `source` to `T`.
    pub fn can_convert<T: 'static>(&self, source: ValueKind) -> bool {
        self.converters
            .read()
            .contains_key(&(source, TypeId::of::<T>()))
    }

    /// Converts `value` to `T`, returning `None` if no conversion succeeds.
    pub fn convert<T: DeserializeOwned + 'static>(&self, value: &Value) -> Option<T> {
        let converter = self
            .converters
            .read()
            .get(&(ValueKind::of(value), TypeId::of::<T>()))
            .cloned();

        if let Some(converter) = converter {
            return converter(value)
                .and_then(|converted| converted.downcast::<T>().ok())
                .map(|converted| *converted);
        }

        match value.clone().try_into::<T>() {
            Ok(converted) => Some(converted),
            Err(e) => {
                tracing::debug!(
                    target_type = std::any::type_name::<T>(),
                    error = %e,
                    "value could not be converted"
                );
                None
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::String(_) | Value::Array(_) | Value::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_string_to_number() {
        let service = ConversionService::new();
        let value = Value::String(" 5432 ".into());

        assert_eq!(service.convert::<u16>(&value), Some(5432));
        assert_eq!(service.convert::<f64>(&value), Some(5432.0));
        assert_eq!(service.convert::<u8>(&value), None);
    }

    #[test]
    fn test_scalar_to_string() {
        let service = ConversionService::new();

        assert_eq!(
            service.convert::<String>(&Value::Integer(8080)),
            Some("8080".to_string())
        );
        assert_eq!(
            service.convert::<String>(&Value::Boolean(true)),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_string_to_list() {
        let service = ConversionService::new();
        let value = Value::String("a, b,,c".into());

        assert_eq!(
            service.convert::<Vec<String>>(&value),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_falls_back_to_serde() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Pool {
            size: u32,
        }

        let service = ConversionService::empty();
        let table: toml::Table = toml::from_str("size = 4").unwrap();

        assert_eq!(
            service.convert::<Pool>(&Value::Table(table)),
            Some(Pool { size: 4 })
        );
        assert_eq!(service.convert::<i64>(&Value::String("4".into())), None);
    }

    #[test]
    fn test_custom_converter() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Millis(u64);

        let service = ConversionService::new();
        assert!(!service.can_convert::<Millis>(ValueKind::String));

        service.add_converter::<Millis, _>(ValueKind::String, |value| {
            let s = value.as_str()?;
            let seconds: u64 = s.strip_suffix('s')?.parse().ok()?;
            Some(Millis(seconds * 1000))
        });

        assert!(service.can_convert::<Millis>(ValueKind::String));
        assert_eq!(
            service.convert::<Millis>(&Value::String("3s".into())),
            Some(Millis(3000))
        );
        assert_eq!(service.convert::<Millis>(&Value::String("3m".into())), None);
    }
}
