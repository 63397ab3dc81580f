use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{AccentError, Result};

/// Bidirectional mapping between class labels and class indices.
///
/// Indices follow the sorted order of the distinct labels, so fitting the
/// same label set always yields the same encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEncoder {
    classes: Vec<String>,
}

impl ClassEncoder {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        Self {
            classes: classes.into_iter().map(str::to_owned).collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(label))
            .map_err(|_| AccentError::UnknownLabel(label.to_owned()))
    }

    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(AccentError::UnknownClassIndex(index))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let labels = ["Tamil", "Hindi", "Tamil", "Kannada", "Hindi"];
        let encoder = ClassEncoder::fit(&labels);

        assert_eq!(encoder.len(), 3);
        for label in labels {
            assert_eq!(encoder.decode(encoder.encode(label).unwrap()).unwrap(), label);
        }
    }

    #[test]
    fn test_sorted_indices() {
        let encoder = ClassEncoder::fit(&["telangana", "andhra_pradesh", "kerala"]);
        assert_eq!(encoder.classes(), ["andhra_pradesh", "kerala", "telangana"]);
        assert_eq!(encoder.encode_all(&["kerala", "telangana"]).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_unknown_values() {
        let encoder = ClassEncoder::fit(&["a", "b"]);
        assert!(matches!(encoder.encode("c"), Err(AccentError::UnknownLabel(_))));
        assert!(matches!(encoder.decode(2), Err(AccentError::UnknownClassIndex(2))));
    }
}
