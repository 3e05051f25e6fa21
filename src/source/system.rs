use super::{coerce_value, order, PropertySource};

/// Builds the system-properties source from `-Dkey=value` arguments.
///
/// Arguments that are not `-D` definitions are ignored. `-Dflag` with no value
/// defines `flag = true`.
#[derive(Debug, Clone, Default)]
pub struct SystemPropertiesPropertySource;

impl SystemPropertiesPropertySource {
    pub const NAME: &'static str = "system";

    pub fn from_args<I, S>(args: I) -> PropertySource
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut source = PropertySource::new(Self::NAME).with_order(order::SYSTEM_PROPERTIES);
        for arg in args {
            let Some(definition) = arg.as_ref().strip_prefix("-D") else {
                continue;
            };
            match definition.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    source = source.with_property(key, coerce_value(value));
                }
                Some(_) => {}
                None if !definition.is_empty() => {
                    source = source.with_property(definition, true);
                }
                None => {}
            }
        }
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::Value;

    #[test]
    fn test_parses_definitions() {
        let source = SystemPropertiesPropertySource::from_args([
            "--verbose",
            "-Dserver.port=9090",
            "-Ddebug",
            "-D=oops",
            "-Dname=a=b",
        ]);

        assert_eq!(source.order(), order::SYSTEM_PROPERTIES);
        assert_eq!(
            source.entries().collect::<Vec<_>>(),
            vec![
                ("debug", Some(&Value::Boolean(true))),
                ("name", Some(&Value::String("a=b".into()))),
                ("server.port", Some(&Value::Integer(9090))),
            ]
        );
    }
}
