//! Merging property sources into a catalog.
//!
//! Sources are sorted by `order` ascending and processed in that sequence; each
//! one overwrites whatever earlier sources wrote for the same canonical key, so
//! the last source processed wins. Equal orders keep discovery order.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::source::PropertySource;

/// Sorts sources into merge sequence.
///
/// The sort is stable: sources with equal `order` keep their relative position.
pub fn sort_sources(sources: &mut [Arc<PropertySource>]) {
    sources.sort_by_key(|source| source.order());
}

/// Writes every entry of `source` into `catalog`, normalizing keys with the
/// source's convention.
pub fn process(catalog: &mut Catalog, source: &PropertySource) {
    let convention = source.convention();
    for (key, value) in source.entries() {
        let canonical = convention.normalize(key);
        if canonical.is_empty() {
            continue;
        }
        catalog.insert(canonical, value.cloned());
    }
    tracing::trace!(
        source = source.name(),
        order = source.order(),
        entries = source.len(),
        "processed property source"
    );
}

/// Builds a complete catalog generation from `sources`, sorted by order with
/// discovery order breaking ties.
pub fn merge(sources: &mut [Arc<PropertySource>]) -> Catalog {
    sort_sources(sources);
    let mut catalog = Catalog::new();
    for source in sources.iter() {
        process(&mut catalog, source);
    }
    catalog
}
