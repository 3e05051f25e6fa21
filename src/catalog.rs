//! The layered property catalog.
//!
//! A catalog is a fixed array of slots. Every canonical key lives in the slot
//! picked by hashing its first segment, so `datasource.url` and
//! `datasource.pool.size` share a slot and can be enumerated together under the
//! `datasource` prefix. Slot selection never depends on catalog contents, which
//! lets two generations be compared slot for slot.

use std::collections::BTreeMap;

use toml::{Table, Value};

/// Number of slots in every catalog.
pub const CATALOG_SIZE: usize = 57;

type Slot = BTreeMap<String, Option<Value>>;

/// Flat mapping of canonical keys to values, as returned by a diff.
///
/// `None` is an explicit null.
pub type PropertyDiff = BTreeMap<String, Option<Value>>;

/// One generation of merged properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    slots: Vec<Option<Slot>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            slots: vec![None; CATALOG_SIZE],
        }
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the slot holding `key`.
    pub fn slot_index(key: &str) -> usize {
        let head = key.split('.').next().unwrap_or_default();
        // FNV-1a
        let mut hash: u32 = 0x811c_9dc5;
        for byte in head.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        hash as usize % CATALOG_SIZE
    }

    /// Writes `value` for a canonical key, replacing any previous value.
    pub fn insert(&mut self, key: String, value: Option<Value>) {
        let index = Self::slot_index(&key);
        self.slots[index]
            .get_or_insert_with(BTreeMap::new)
            .insert(key, value);
    }

    /// Returns the entry for a canonical key; `Some(None)` is an explicit null.
    pub fn get(&self, key: &str) -> Option<Option<&Value>> {
        self.slots[Self::slot_index(key)]
            .as_ref()
            .and_then(|slot| slot.get(key))
            .map(Option::as_ref)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of canonical keys, nulls included.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().map(BTreeMap::len).sum()
    }

    /// Every key and value, slot by slot.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.slots
            .iter()
            .flatten()
            .flat_map(|slot| slot.iter().map(|(k, v)| (k.as_str(), v.as_ref())))
    }

    /// Builds the nested table of every non-null key below `prefix`.
    ///
    /// An empty prefix yields the whole catalog.
    pub fn table(&self, prefix: &str) -> Table {
        let mut table = Table::new();

        let entries: Box<dyn Iterator<Item = (&str, Option<&Value>)> + '_> = if prefix.is_empty() {
            Box::new(self.iter())
        } else {
            let slot = self.slots[Self::slot_index(prefix)].iter();
            Box::new(slot.flat_map(|slot| slot.iter().map(|(k, v)| (k.as_str(), v.as_ref()))))
        };

        for (key, value) in entries {
            let Some(value) = value else { continue };
            let relative = if prefix.is_empty() {
                key
            } else {
                match key
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
                {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            let path: Vec<String> = relative.split('.').map(str::to_string).collect();
            merge_at_path(&mut table, &path, value.clone());
        }

        table
    }

    /// Compares two generations and reports every key whose effective value changed.
    ///
    /// Additions are reported with the new value. Removals and changes are
    /// reported with the old value, i.e. what the caller is moving away from.
    pub fn diff(old: &Catalog, new: &Catalog) -> PropertyDiff {
        let mut changes = PropertyDiff::new();
        for (old_slot, new_slot) in old.slots.iter().zip(&new.slots) {
            match (old_slot, new_slot) {
                (None, Some(added)) => changes.extend(added.clone()),
                (Some(removed), None) => changes.extend(removed.clone()),
                (Some(old_slot), Some(new_slot)) => diff_slot(old_slot, new_slot, &mut changes),
                (None, None) => {}
            }
        }
        changes
    }
}

fn diff_slot(old: &Slot, new: &Slot, changes: &mut PropertyDiff) {
    for (key, new_value) in new {
        match old.get(key) {
            None => {
                changes.insert(key.clone(), new_value.clone());
            }
            Some(old_value) if old_value != new_value => {
                changes.insert(key.clone(), old_value.clone());
            }
            Some(_) => {}
        }
    }
    for (key, old_value) in old {
        if !new.contains_key(key) {
            changes.insert(key.clone(), old_value.clone());
        }
    }
}

fn merge_at_path(table: &mut Table, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        match (table.get_mut(first), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => deep_merge(base, overlay),
            (_, value) => {
                table.insert(first.clone(), value);
            }
        }
        return;
    }

    if !matches!(table.get(first), Some(Value::Table(_))) {
        table.insert(first.clone(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(first) {
        merge_at_path(nested, rest, value);
    }
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, Option<i64>)]) -> Catalog {
        let mut catalog = Catalog::new();
        for (key, value) in entries {
            catalog.insert(key.to_string(), value.map(Value::Integer));
        }
        catalog
    }

    #[test]
    fn test_slot_index_is_stable_and_shared_by_prefix() {
        assert_eq!(
            Catalog::slot_index("datasource.url"),
            Catalog::slot_index("datasource.pool.size")
        );
        assert_eq!(Catalog::slot_index("x"), Catalog::slot_index("x"));
        assert!(Catalog::slot_index("anything") < CATALOG_SIZE);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut catalog = catalog(&[("x", Some(1))]);
        catalog.insert("x".into(), Some(Value::Integer(2)));

        assert_eq!(catalog.get("x"), Some(Some(&Value::Integer(2))));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_explicit_null_is_present() {
        let catalog = catalog(&[("x", None)]);

        assert!(catalog.contains("x"));
        assert_eq!(catalog.get("x"), Some(None));
        assert_eq!(catalog.get("y"), None);
    }

    #[test]
    fn test_table_under_prefix() {
        let catalog = catalog(&[
            ("datasource.pool.size", Some(4)),
            ("datasource.port", Some(5432)),
            ("datasource.dropped", None),
            ("datasourcex", Some(1)),
        ]);

        let table = catalog.table("datasource");
        assert_eq!(table["port"].as_integer(), Some(5432));
        assert_eq!(table["pool"]["size"].as_integer(), Some(4));
        assert!(!table.contains_key("dropped"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_table_of_whole_catalog() {
        let catalog = catalog(&[("a.b", Some(1)), ("c", Some(2))]);

        let table = catalog.table("");
        assert_eq!(table["a"]["b"].as_integer(), Some(1));
        assert_eq!(table["c"].as_integer(), Some(2));
    }

    #[test]
    fn test_diff_addition_reports_new_value() {
        let old = catalog(&[]);
        let new = catalog(&[("y", Some(5))]);

        let diff = Catalog::diff(&old, &new);
        assert_eq!(diff, PropertyDiff::from([("y".into(), Some(Value::Integer(5)))]));
    }

    #[test]
    fn test_diff_removal_reports_old_value() {
        let old = catalog(&[("y", Some(5)), ("z", Some(1))]);
        let new = catalog(&[("z", Some(1))]);

        let diff = Catalog::diff(&old, &new);
        assert_eq!(diff, PropertyDiff::from([("y".into(), Some(Value::Integer(5)))]));
    }

    #[test]
    fn test_diff_removal_within_shared_slot() {
        let old = catalog(&[("a.one", Some(1)), ("a.two", Some(2))]);
        let new = catalog(&[("a.one", Some(1))]);

        let diff = Catalog::diff(&old, &new);
        assert_eq!(diff, PropertyDiff::from([("a.two".into(), Some(Value::Integer(2)))]));
    }

    #[test]
    fn test_diff_change_reports_old_value() {
        let old = catalog(&[("y", Some(5))]);
        let new = catalog(&[("y", Some(9))]);

        let diff = Catalog::diff(&old, &new);
        assert_eq!(diff, PropertyDiff::from([("y".into(), Some(Value::Integer(5)))]));
    }

    #[test]
    fn test_diff_null_transitions_report_old_value() {
        let old = catalog(&[("from.null", None), ("to.null", Some(3))]);
        let new = catalog(&[("from.null", Some(1)), ("to.null", None)]);

        let diff = Catalog::diff(&old, &new);
        assert_eq!(
            diff,
            PropertyDiff::from([
                ("from.null".into(), None),
                ("to.null".into(), Some(Value::Integer(3))),
            ])
        );
    }

    #[test]
    fn test_diff_of_equal_generations_is_empty() {
        let old = catalog(&[("y", Some(5)), ("n", None)]);
        assert!(Catalog::diff(&old, &old.clone()).is_empty());
    }
}
