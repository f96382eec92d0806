//! Conversion between nested trees and dot-joined flat keys.

use super::{FlatMap, Table, Value};

const SEPARATOR: char = '.';

/// Flatten a nested table into dot-joined keys.
///
/// Empty nested tables survive as a single `Map` entry so that "present but
/// empty" stays observable. Lists are copied as-is.
pub fn flatten(tree: &Table) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into("", tree, &mut out);
    out
}

fn flatten_into(prefix: &str, tree: &Table, out: &mut FlatMap) {
    for (segment, value) in tree {
        let key = if prefix.is_empty() {
            segment.clone()
        } else {
            format!("{}{}{}", prefix, SEPARATOR, segment)
        };

        match value {
            Value::Map(nested) if !nested.is_empty() => flatten_into(&key, nested, out),
            leaf => {
                out.insert(key, leaf.clone());
            }
        }
    }
}

/// Rebuild a nested table from dot-joined keys.
///
/// When an intermediate segment already holds a leaf, the leaf is replaced by
/// a fresh table.
pub fn unflatten(flat: &FlatMap) -> Table {
    let mut out = Table::new();
    for (key, value) in flat {
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut current = &mut out;
        for segment in parents {
            let slot = current
                .entry((*segment).to_string())
                .or_insert_with(Value::empty_map);
            if !matches!(slot, Value::Map(_)) {
                *slot = Value::empty_map();
            }
            current = match slot {
                Value::Map(nested) => nested,
                _ => unreachable!("slot was just replaced with a map"),
            };
        }
        current.insert((*last).to_string(), value.clone());
    }
    out
}
