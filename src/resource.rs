//! Resource loading used by property source loaders.
//!
//! The environment never opens files itself; loaders ask a [`ResourceLoader`]
//! for the bytes behind an opaque path.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Opens resources by path.
pub trait ResourceLoader: Send + Sync + fmt::Debug {
    /// Opens the first resource found at `path`.
    ///
    /// Returns `Ok(None)` if no such resource exists.
    fn resource_as_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ConfigError>;

    /// Locates the first resource found at `path`.
    fn resource(&self, path: &str) -> Option<PathBuf>;

    /// Locates every resource found at `path`, in search order.
    fn resources(&self, path: &str) -> Vec<PathBuf>;
}

/// Resolves paths against an ordered list of directories.
#[derive(Debug, Clone)]
pub struct FileSystemResourceLoader {
    roots: Vec<PathBuf>,
}

impl FileSystemResourceLoader {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }
}

impl Default for FileSystemResourceLoader {
    /// Searches the current working directory.
    fn default() -> Self {
        Self::new(["."])
    }
}

impl ResourceLoader for FileSystemResourceLoader {
    fn resource_as_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ConfigError> {
        let Some(found) = self.resource(path) else {
            return Ok(None);
        };
        match File::open(&found) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: found,
                source: e,
            }),
        }
    }

    fn resource(&self, path: &str) -> Option<PathBuf> {
        self.resources(path).into_iter().next()
    }

    fn resources(&self, path: &str) -> Vec<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(path))
            .filter(|candidate| candidate.is_file())
            .collect()
    }
}

/// Serves documents assembled at build time, e.g. with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceLoader {
    documents: BTreeMap<String, Vec<u8>>,
}

impl StaticResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(path.into(), contents.into());
        self
    }
}

impl ResourceLoader for StaticResourceLoader {
    fn resource_as_stream(&self, path: &str) -> Result<Option<Box<dyn Read + Send>>, ConfigError> {
        Ok(self
            .documents
            .get(path)
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>))
    }

    fn resource(&self, path: &str) -> Option<PathBuf> {
        self.documents.contains_key(path).then(|| PathBuf::from(path))
    }

    fn resources(&self, path: &str) -> Vec<PathBuf> {
        self.resource(path).into_iter().collect()
    }
}

/// Reads a whole resource as UTF-8 text.
pub(crate) fn read_to_string(
    resources: &dyn ResourceLoader,
    path: &str,
) -> Result<Option<String>, ConfigError> {
    let Some(mut stream) = resources.resource_as_stream(path)? else {
        return Ok(None);
    };
    let mut contents = String::new();
    stream
        .read_to_string(&mut contents)
        .map_err(|e| ConfigError::ReadError {
            path: PathBuf::from(path),
            source: e,
        })?;
    Ok(Some(contents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_system_loader_searches_roots_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let mut file = File::create(second.path().join("application.toml")).unwrap();
        writeln!(file, "a = 1").unwrap();
        File::create(first.path().join("application.toml")).unwrap();

        let loader = FileSystemResourceLoader::new([first.path(), second.path()]);

        let found = loader.resources("application.toml");
        assert_eq!(found.len(), 2);
        assert_eq!(
            loader.resource("application.toml"),
            Some(first.path().join("application.toml"))
        );
    }

    #[test]
    fn test_file_system_loader_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileSystemResourceLoader::new([dir.path()]);

        assert!(loader.resource_as_stream("missing.toml").unwrap().is_none());
        assert!(loader.resources("missing.toml").is_empty());
    }

    #[test]
    fn test_static_loader_reads_documents() {
        let loader = StaticResourceLoader::new().with_document("app.properties", "a=1");

        let text = read_to_string(&loader, "app.properties").unwrap();
        assert_eq!(text.as_deref(), Some("a=1"));
        assert!(read_to_string(&loader, "other.properties").unwrap().is_none());
    }
}
