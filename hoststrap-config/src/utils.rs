//! Helpers shared by the validators.

use std::{collections::HashSet, fmt::Display, hash::Hash, path::PathBuf};

/// Returns a sorted, human readable list of the items occurring more than once in `items`.
///
/// Returns [`None`] if all items are unique.
pub(crate) fn duplicates<'a, T>(items: impl IntoIterator<Item = &'a T>) -> Option<String>
where
    T: Display + Eq + Hash + 'a,
{
    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();

    for item in items {
        if !seen.insert(item) {
            duplicates.insert(format!("\"{item}\""));
        }
    }

    if duplicates.is_empty() {
        None
    } else {
        let mut duplicates = Vec::from_iter(duplicates);
        duplicates.sort();
        Some(duplicates.join(", "))
    }
}

/// Validates that `path` is absolute.
#[allow(clippy::ptr_arg)]
pub(crate) fn validate_absolute_path(path: &PathBuf, _: &()) -> garde::Result {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "must be an absolute path, but is {path:?}"
        )))
    }
}

/// Validates that `path` is absolute, if it is set.
pub(crate) fn validate_optional_absolute_path(path: &Option<PathBuf>, _: &()) -> garde::Result {
    match path {
        Some(path) => validate_absolute_path(path, &()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_sorted_and_quoted() {
        let items = ["b", "a", "b", "a", "c"];
        assert_eq!(duplicates(&items), Some("\"a\", \"b\"".to_string()));
    }

    #[test]
    fn unique_items_have_no_duplicates() {
        let items = ["a", "b"];
        assert_eq!(duplicates(&items), None);
    }
}
