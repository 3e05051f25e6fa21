//! The environment: active names, property sources and the live catalog.

mod builder;

use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::catalog::{Catalog, PropertyDiff};
use crate::convert::{ConversionService, ValueKind};
use crate::placeholder::resolve_placeholders;
use crate::resolver;
use crate::resource::ResourceLoader;
use crate::source::{
    EnvironmentPropertySource, PropertyConvention, PropertySource, PropertySourceLoader,
    SystemPropertiesPropertySource,
};
use crate::ConfigError;

pub use builder::EnvironmentBuilder;

/// Base name loaders look up unless the builder overrides it.
pub const DEFAULT_NAME: &str = "application";

#[derive(Debug)]
enum EnvironmentVariables {
    Process,
    Fixed(Vec<(String, String)>),
}

#[derive(Debug)]
struct State {
    /// Programmatic sources, in registration order.
    registered: Vec<Arc<PropertySource>>,
    /// Sources behind the published catalog, in merge order.
    generation: Vec<Arc<PropertySource>>,
}

/// Resolves configuration from layered property sources.
///
/// Sources are read and merged on [`start`](Self::start) and
/// [`refresh_and_diff`](Self::refresh_and_diff). Each merge builds a complete
/// catalog generation and publishes it atomically; reads never lock and always
/// see one whole generation. `start`, `stop`, `add_property_source` and
/// `refresh_and_diff` serialize on a single lock; `is_running` does not take it.
#[derive(Debug)]
pub struct Environment {
    names: BTreeSet<String>,
    root_name: String,
    resources: Arc<dyn ResourceLoader>,
    loaders: Vec<Arc<dyn PropertySourceLoader>>,
    conversion: ConversionService,
    system_args: Vec<String>,
    env_source: EnvironmentPropertySource,
    env_vars: EnvironmentVariables,
    packages: RwLock<Vec<String>>,
    includes: RwLock<BTreeSet<String>>,
    excludes: RwLock<BTreeSet<String>>,
    state: Mutex<State>,
    /// Written only while `state` is held.
    running: AtomicBool,
    catalog: ArcSwap<Catalog>,
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Active names, fixed at construction.
    pub fn active_names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Reads and merges every source, then marks the environment running.
    ///
    /// A no-op if already running. On error the environment stays stopped.
    pub fn start(&self) -> Result<(), ConfigError> {
        let mut state = self.state.lock();
        if self.running.load(Ordering::Acquire) {
            return Ok(());
        }

        let (sources, catalog) = self.read_generation(&state.registered)?;
        self.catalog.store(Arc::new(catalog));
        state.generation = sources;
        self.running.store(true, Ordering::Release);

        tracing::info!(
            names = ?self.names,
            sources = state.generation.len(),
            "environment started"
        );
        Ok(())
    }

    /// Marks the environment stopped and clears the catalog.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        self.running.store(false, Ordering::Release);
        state.generation.clear();
        self.catalog.store(Arc::new(Catalog::new()));
        tracing::info!("environment stopped");
    }

    /// Registers a programmatic source, replacing any registered source with the same name.
    ///
    /// While running, the source is also merged into the live catalog on top of
    /// everything else. If a source with the same name is live, the catalog is
    /// rebuilt without it first, so keys only the old source defined disappear.
    /// While stopped, the source takes effect on the next start.
    pub fn add_property_source(&self, source: PropertySource) {
        let source = Arc::new(source);
        let mut state = self.state.lock();
        register(&mut state.registered, source.clone());

        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let before = state.generation.len();
        state.generation.retain(|s| s.name() != source.name());
        let mut next = if state.generation.len() == before {
            Catalog::clone(&self.catalog.load())
        } else {
            let mut rebuilt = Catalog::new();
            for live in &state.generation {
                resolver::process(&mut rebuilt, live);
            }
            rebuilt
        };
        resolver::process(&mut next, &source);
        self.catalog.store(Arc::new(next));
        state.generation.push(source.clone());
        tracing::info!(source = source.name(), "property source added to running environment");
    }

    /// Sources behind the current catalog while running; the registered
    /// programmatic sources while stopped.
    pub fn property_sources(&self) -> Vec<Arc<PropertySource>> {
        let state = self.state.lock();
        if self.running.load(Ordering::Acquire) {
            state.generation.clone()
        } else {
            state.registered.clone()
        }
    }

    /// Re-reads every source and reports keys whose value changed.
    ///
    /// Additions carry the new value; removals and changes carry the old one.
    /// On error the previous generation stays published. A stopped environment
    /// is left untouched and reports no changes.
    pub fn refresh_and_diff(&self) -> Result<PropertyDiff, ConfigError> {
        let mut state = self.state.lock();
        if !self.running.load(Ordering::Acquire) {
            tracing::debug!("refresh requested on stopped environment");
            return Ok(PropertyDiff::new());
        }

        let previous = self.catalog.load_full();
        let (sources, catalog) = self.read_generation(&state.registered)?;
        let catalog = Arc::new(catalog);
        self.catalog.store(catalog.clone());
        state.generation = sources;

        let diff = Catalog::diff(&previous, &catalog);
        tracing::info!(changed = diff.len(), "environment refreshed");
        Ok(diff)
    }

    /// Reads `key` as `T`.
    ///
    /// Placeholders in string values are resolved first. When `key` is not a
    /// leaf, the table of everything below it is bound instead. Missing keys,
    /// explicit nulls and failed conversions all yield `None`.
    pub fn get<T: DeserializeOwned + 'static>(&self, key: &str) -> Option<T> {
        let key = PropertyConvention::DotSeparatedLowerCase.normalize(key);
        let catalog = self.catalog.load_full();

        let raw = match catalog.get(&key) {
            Some(Some(value)) => value.clone(),
            Some(None) => return None,
            None => {
                let table = catalog.table(&key);
                if table.is_empty() {
                    return None;
                }
                Value::Table(table)
            }
        };

        let value = match resolve_value(&catalog, raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to resolve placeholders");
                return None;
            }
        };

        let converted = self.conversion.convert::<T>(&value);
        if converted.is_none() {
            tracing::debug!(
                key = %key,
                target_type = std::any::type_name::<T>(),
                "property could not be converted"
            );
        }
        converted
    }

    /// Whether the catalog has an entry for `key`, explicit nulls included.
    pub fn contains_property(&self, key: &str) -> bool {
        let key = PropertyConvention::DotSeparatedLowerCase.normalize(key);
        self.catalog.load().contains(&key)
    }

    /// Nested table of every non-null property below `prefix`, placeholders unresolved.
    pub fn get_properties(&self, prefix: &str) -> Table {
        let prefix = PropertyConvention::DotSeparatedLowerCase.normalize(prefix);
        self.catalog.load().table(&prefix)
    }

    /// Resolves `${...}` placeholders in `text` against the current catalog.
    pub fn resolve_placeholders(&self, text: &str) -> Result<String, ConfigError> {
        let catalog = self.catalog.load_full();
        resolve_placeholders(text, &|path: &str| lookup(&catalog, path))
    }

    pub fn convert<T: DeserializeOwned + 'static>(&self, value: &Value) -> Option<T> {
        self.conversion.convert(value)
    }

    pub fn can_convert<T: 'static>(&self, source: ValueKind) -> bool {
        self.conversion.can_convert::<T>(source)
    }

    pub fn add_converter<T, F>(&self, source: ValueKind, converter: F)
    where
        T: 'static,
        F: Fn(&Value) -> Option<T> + Send + Sync + 'static,
    {
        self.conversion.add_converter(source, converter);
    }

    /// Adds a scan package unless already present.
    pub fn add_package(&self, package: impl Into<String>) {
        let package = package.into();
        let mut packages = self.packages.write();
        if !packages.contains(&package) {
            packages.push(package);
        }
    }

    pub fn packages(&self) -> Vec<String> {
        self.packages.read().clone()
    }

    pub fn add_configuration_includes<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.write().extend(names.into_iter().map(Into::into));
    }

    pub fn add_configuration_excludes<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.write().extend(names.into_iter().map(Into::into));
    }

    /// Whether the named configuration module is active.
    ///
    /// Excluded names are never active. With no includes, every other name is.
    pub fn is_active(&self, configuration: &str) -> bool {
        if self.excludes.read().contains(configuration) {
            return false;
        }
        let includes = self.includes.read();
        includes.is_empty() || includes.contains(configuration)
    }

    fn read_generation(
        &self,
        registered: &[Arc<PropertySource>],
    ) -> Result<(Vec<Arc<PropertySource>>, Catalog), ConfigError> {
        let mut sources = registered.to_vec();

        for loader in &self.loaders {
            self.load_from_loader(loader.as_ref(), &mut sources)?;
        }

        sources.push(Arc::new(SystemPropertiesPropertySource::from_args(
            &self.system_args,
        )));
        sources.push(Arc::new(match &self.env_vars {
            EnvironmentVariables::Process => self.env_source.read(),
            EnvironmentVariables::Fixed(vars) => self.env_source.read_from(vars.iter().cloned()),
        }));

        let catalog = resolver::merge(&mut sources);
        Ok((sources, catalog))
    }

    fn load_from_loader(
        &self,
        loader: &dyn PropertySourceLoader,
        sources: &mut Vec<Arc<PropertySource>>,
    ) -> Result<(), ConfigError> {
        let resources = self.resources.as_ref();
        if let Some(source) = loader.load(&self.root_name, resources, None)? {
            sources.push(Arc::new(source));
        }
        for name in &self.names {
            if let Some(source) = loader.load(&self.root_name, resources, Some(name))? {
                sources.push(Arc::new(source));
            }
        }
        Ok(())
    }
}

impl ResourceLoader for Environment {
    fn resource_as_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ConfigError> {
        self.resources.resource_as_stream(path)
    }

    fn resource(&self, path: &str) -> Option<PathBuf> {
        self.resources.resource(path)
    }

    fn resources(&self, path: &str) -> Vec<PathBuf> {
        self.resources.resources(path)
    }
}

/// Replaces the source with the same name in place, or appends.
fn register(sources: &mut Vec<Arc<PropertySource>>, source: Arc<PropertySource>) {
    match sources.iter_mut().find(|s| s.name() == source.name()) {
        Some(existing) => *existing = source,
        None => sources.push(source),
    }
}

/// Placeholder lookup; paths are normalized like keys passed to `get`.
fn lookup(catalog: &Catalog, path: &str) -> Option<Value> {
    let key = PropertyConvention::DotSeparatedLowerCase.normalize(path);
    catalog.get(&key).flatten().cloned()
}

fn resolve_value(catalog: &Catalog, value: Value) -> Result<Value, ConfigError> {
    match value {
        Value::String(s) if s.contains('$') => {
            resolve_placeholders(&s, &|path: &str| lookup(catalog, path)).map(Value::String)
        }
        Value::Array(items) => items
            .into_iter()
            .map(|item| resolve_value(catalog, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Table(table) => table
            .into_iter()
            .map(|(k, v)| resolve_value(catalog, v).map(|v| (k, v)))
            .collect::<Result<Table, _>>()
            .map(Value::Table),
        value => Ok(value),
    }
}
