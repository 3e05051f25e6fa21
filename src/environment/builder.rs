use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

use super::{Environment, EnvironmentVariables, State, DEFAULT_NAME};
use crate::catalog::Catalog;
use crate::context::ExecutionContext;
use crate::convert::ConversionService;
use crate::resource::{FileSystemResourceLoader, ResourceLoader};
use crate::source::{
    EnvironmentPropertySource, PropertySource, PropertySourceLoader, TomlPropertySourceLoader,
};

/// Builder for an [`Environment`].
///
/// Every knob has a default, so `Environment::builder().build()` reads
/// `application.toml` (and `application-<name>.toml` for each active name) from
/// the working directory, `-D` arguments of the process, and the live process
/// environment.
///
/// ## Active names
///
/// Names given with [`with_names`](Self::with_names) are used as-is. Without
/// them, names are deduced from the [`ExecutionContext`], which defaults to
/// [`ExecutionContext::from_env`].
///
/// ## Example
///
/// ```no_run
/// use dragon_env::{Environment, PropertiesPropertySourceLoader, TomlPropertySourceLoader};
/// use dragon_env::resource::FileSystemResourceLoader;
///
/// let env = Environment::builder()
///     .with_names(["prod"])
///     .with_resource_loader(FileSystemResourceLoader::new(["config"]))
///     .with_loader(TomlPropertySourceLoader)
///     .with_loader(PropertiesPropertySourceLoader)
///     .with_env_prefix("MYAPP")
///     .build();
///
/// env.start()?;
/// let port: Option<u16> = env.get("server.port");
/// # Ok::<(), dragon_env::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct EnvironmentBuilder {
    names: Vec<String>,
    context: Option<ExecutionContext>,
    root_name: Option<String>,
    resources: Option<Arc<dyn ResourceLoader>>,
    loaders: Vec<Arc<dyn PropertySourceLoader>>,
    conversion: Option<ConversionService>,
    system_args: Option<Vec<String>>,
    env_vars: Option<Vec<(String, String)>>,
    env_prefix: Option<String>,
    sources: Vec<PropertySource>,
}

impl EnvironmentBuilder {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Sets explicit active names, disabling deduction from the execution context.
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Supplies the execution-context hint used to deduce names and the default package.
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Base name loaders look up, `application` by default.
    pub fn with_root_name(mut self, name: impl Into<String>) -> Self {
        self.root_name = Some(name.into());
        self
    }

    pub fn with_resource_loader(mut self, resources: impl ResourceLoader + 'static) -> Self {
        self.resources = Some(Arc::new(resources));
        self
    }

    /// Registers a loader. Loaders run in registration order.
    ///
    /// When none are registered, [`TomlPropertySourceLoader`] is used.
    pub fn with_loader(mut self, loader: impl PropertySourceLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn with_conversion_service(mut self, conversion: ConversionService) -> Self {
        self.conversion = Some(conversion);
        self
    }

    /// Arguments scanned for `-Dkey=value` system properties.
    ///
    /// Defaults to the process arguments.
    pub fn with_system_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Uses a fixed set of environment variables instead of reading the process
    /// environment on every start and refresh.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Only reads environment variables starting with `<prefix>_`.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Registers a programmatic source before the environment starts.
    pub fn with_property_source(mut self, source: PropertySource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn build(self) -> Environment {
        let context = self.context.unwrap_or_else(ExecutionContext::from_env);
        let names: BTreeSet<String> = if self.names.is_empty() {
            context.deduce_names().into_iter().collect()
        } else {
            self.names.into_iter().collect()
        };

        let mut loaders = self.loaders;
        if loaders.is_empty() {
            loaders.push(Arc::new(TomlPropertySourceLoader));
        }

        let mut registered: Vec<Arc<PropertySource>> = Vec::new();
        for source in self.sources {
            super::register(&mut registered, Arc::new(source));
        }

        tracing::debug!(names = ?names, loaders = loaders.len(), "environment built");

        Environment {
            names,
            root_name: self.root_name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            resources: self
                .resources
                .unwrap_or_else(|| Arc::new(FileSystemResourceLoader::default())),
            loaders,
            conversion: self.conversion.unwrap_or_default(),
            system_args: self
                .system_args
                .unwrap_or_else(|| std::env::args().skip(1).collect()),
            env_source: EnvironmentPropertySource::new(self.env_prefix),
            env_vars: match self.env_vars {
                Some(vars) => EnvironmentVariables::Fixed(vars),
                None => EnvironmentVariables::Process,
            },
            packages: RwLock::new(context.package().map(str::to_string).into_iter().collect()),
            includes: RwLock::new(BTreeSet::new()),
            excludes: RwLock::new(BTreeSet::new()),
            state: Mutex::new(State {
                registered,
                generation: Vec::new(),
            }),
            running: AtomicBool::new(false),
            catalog: ArcSwap::from_pointee(Catalog::new()),
        }
    }
}
