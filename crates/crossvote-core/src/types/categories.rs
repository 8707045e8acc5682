//! Ordered category labels with an explicit label/index bijection.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::InputError;

/// An ordered list of category labels (one contest's choices).
///
/// Position `i` is matrix index `i`. Labels are non-empty and unique, so
/// the label-to-index map is a bijection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategorySet {
    labels: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl CategorySet {
    /// Build a category set, rejecting empty lists, blank and duplicate labels.
    pub fn new<I, S>(labels: I) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(InputError::InvalidCategories {
                message: "at least one category label is required".to_string(),
            });
        }
        let mut index = FxHashMap::default();
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(InputError::InvalidCategories {
                    message: format!("label at position {i} is blank"),
                });
            }
            if index.insert(label.clone(), i).is_some() {
                return Err(InputError::InvalidCategories {
                    message: format!("duplicate label '{label}'"),
                });
            }
        }
        Ok(Self { labels, index })
    }

    /// Labels `"{prefix}1"` through `"{prefix}{count}"`, used when no
    /// labels are configured.
    pub fn positional(prefix: &str, count: usize) -> Result<Self, InputError> {
        Self::new((1..=count).map(|i| format!("{prefix}{i}")))
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a validated set; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Matrix index of a label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Label at a matrix index.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// All labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Iterate `(index, label)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(String::as_str).enumerate()
    }
}

impl TryFrom<Vec<String>> for CategorySet {
    type Error = InputError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<CategorySet> for Vec<String> {
    fn from(set: CategorySet) -> Self {
        set.labels
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection() {
        let set = CategorySet::new(["Stein", "Robinson", "Other", "No Vote"]).unwrap();
        assert_eq!(set.len(), 4);
        for (i, label) in set.iter() {
            assert_eq!(set.index_of(label), Some(i));
            assert_eq!(set.label(i), Some(label));
        }
        assert_eq!(set.index_of("Harris"), None);
        assert_eq!(set.label(4), None);
    }

    #[test]
    fn test_positional_labels() {
        let set = CategorySet::positional("column ", 3).unwrap();
        assert_eq!(set.labels(), &["column 1", "column 2", "column 3"]);
        assert!(CategorySet::positional("row ", 0).is_err());
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = CategorySet::new(["a", "b", "a"]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_empty_and_blank() {
        assert!(CategorySet::new(Vec::<String>::new()).is_err());
        assert!(CategorySet::new(["a", "  "]).is_err());
    }
}
