//! Layered configuration for process bootstrap.
//!
//! An [`Environment`] gathers [`PropertySource`]s from loaders, `-D` arguments,
//! environment variables and the program itself, merges them into a catalog in
//! `order` sequence (last processed wins), and answers typed reads. It can be
//! stopped, restarted and refreshed, and a refresh reports which keys changed.

pub mod catalog;
pub mod context;
pub mod convert;
pub mod environment;
mod error;
pub mod placeholder;
pub mod resolver;
pub mod resource;
pub mod source;

pub use catalog::{Catalog, PropertyDiff};
pub use context::ExecutionContext;
pub use convert::{ConversionService, ValueKind};
pub use environment::{Environment, EnvironmentBuilder};
pub use error::ConfigError;
pub use source::{
    PropertiesPropertySourceLoader, PropertyConvention, PropertySource, PropertySourceLoader,
    TomlPropertySourceLoader,
};
