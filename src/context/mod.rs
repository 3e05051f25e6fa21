//! Execution-context hints used to deduce active names.
//!
//! An [`Environment`](crate::Environment) built without explicit names asks its
//! hint which profiles apply: a test run activates `test`, a host platform marker
//! activates that platform's name, and any profiles listed in
//! `DRAGON_ENVIRONMENTS` are added as well.

/// Name activated for test runs.
pub const TEST: &str = "test";

/// Variable listing active names, comma separated.
pub const ENVIRONMENTS_VAR: &str = "DRAGON_ENVIRONMENTS";

/// Variable naming the default scan package.
pub const PACKAGE_VAR: &str = "DRAGON_PACKAGE";

/// What the caller knows about the context the environment runs in.
///
/// ## Example
///
/// ```no_run
/// use dragon_env::{Environment, ExecutionContext};
///
/// let env = Environment::builder()
///     .with_context(ExecutionContext::from_env().for_tests())
///     .build();
///
/// assert!(env.active_names().contains("test"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    test: bool,
    platform: Option<String>,
    package: Option<String>,
    names: Vec<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads [`ENVIRONMENTS_VAR`] and [`PACKAGE_VAR`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(ENVIRONMENTS_VAR).ok().as_deref(),
            std::env::var(PACKAGE_VAR).ok().as_deref(),
        )
    }

    fn from_vars(environments: Option<&str>, package: Option<&str>) -> Self {
        let names = environments
            .into_iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            names,
            package: package
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            ..Self::default()
        }
    }

    /// Marks the context as a test run.
    #[must_use]
    pub fn for_tests(mut self) -> Self {
        self.test = true;
        self
    }

    /// Marks the host platform, e.g. `android`.
    #[must_use]
    pub fn on_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Records the package of the entry point.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Names this context activates.
    pub fn deduce_names(&self) -> Vec<String> {
        let mut names = self.names.clone();
        if self.test {
            names.push(TEST.to_string());
        }
        if let Some(platform) = &self.platform {
            names.push(platform.clone());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduces_test_and_platform() {
        let context = ExecutionContext::new().for_tests().on_platform("android");
        assert_eq!(context.deduce_names(), vec!["test", "android"]);
    }

    #[test]
    fn test_reads_names_and_package_from_vars() {
        let context = ExecutionContext::from_vars(Some(" cloud, ,dev "), Some("com.example"));

        assert_eq!(context.deduce_names(), vec!["cloud", "dev"]);
        assert_eq!(context.package(), Some("com.example"));
    }

    #[test]
    fn test_empty_context_deduces_nothing() {
        let context = ExecutionContext::from_vars(None, Some("  "));

        assert!(context.deduce_names().is_empty());
        assert_eq!(context.package(), None);
    }
}
