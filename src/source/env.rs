use std::ffi::OsString;

use super::{coerce_value, order, PropertyConvention, PropertySource};

/// Builds the property source for process environment variables.
///
/// Keys keep their native `UPPER_SNAKE` spelling and are normalized with
/// [`PropertyConvention::EnvironmentVariable`] when merged, so `DATASOURCE_URL`
/// becomes `datasource.url`. With a prefix, only variables starting with
/// `<prefix>_` are kept and the prefix is stripped.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentPropertySource {
    prefix: Option<String>,
}

impl EnvironmentPropertySource {
    pub const NAME: &'static str = "env";

    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Snapshots the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn read(&self) -> PropertySource {
        self.read_from(utf8_vars(std::env::vars_os()))
    }

    pub fn read_from<I, K, V>(&self, vars: I) -> PropertySource
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix_with_sep = self.prefix.as_ref().map(|p| format!("{p}_"));
        let mut source = PropertySource::new(Self::NAME)
            .with_order(order::ENVIRONMENT_VARIABLES)
            .with_convention(PropertyConvention::EnvironmentVariable);

        for (key, value) in vars {
            let key = key.as_ref();
            let key = match &prefix_with_sep {
                Some(prefix) => match key.strip_prefix(prefix.as_str()) {
                    Some(rest) if !rest.is_empty() => rest,
                    _ => continue,
                },
                None => key,
            };
            source = source.with_property(key, coerce_value(value.as_ref()));
        }

        source
    }
}

fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                tracing::debug!(
                    key = %key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned()),
                    "skipping environment variable that is not valid UTF-8"
                );
                None
            }
        })
}
