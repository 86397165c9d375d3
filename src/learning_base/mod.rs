//! Learning bases: named datasets plus their structural description.
//!
//! A learning base is described by a single positional line (see [`grammar`])
//! and persisted by the [`store`] as a dataset artifact next to a `key=value`
//! configuration file.

pub mod grammar;
pub mod store;

pub use grammar::{ParseError, parse};
pub use store::{LearningBaseStore, StoreError, StoredBasePaths};

/// Structural description of one learning base.
///
/// Counts are derived from the sequence lengths, so a constructed value always
/// has `target_count == target_precision.len()` and
/// `feature_count == feature_lengths.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningBaseConfig {
    name: String,
    sample_count: u64,
    target_precision: Vec<f64>,
    feature_lengths: Vec<u64>,
}

impl LearningBaseConfig {
    /// Build a config from its parts.
    ///
    /// The name must be a single non-empty token without control characters,
    /// since it is written verbatim into the stored `name=` line.
    pub fn new(
        name: impl Into<String>,
        sample_count: u64,
        target_precision: Vec<f64>,
        feature_lengths: Vec<u64>,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ParseError::EmptyName);
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ParseError::InvalidName { name });
        }
        Ok(Self {
            name,
            sample_count,
            target_precision,
            feature_lengths,
        })
    }

    /// Identifier, also used as the on-disk key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows in the dataset.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Number of predicted (Y) columns.
    pub fn target_count(&self) -> usize {
        self.target_precision.len()
    }

    /// Per-target precision hints, one per target.
    pub fn target_precision(&self) -> &[f64] {
        &self.target_precision
    }

    /// Number of input (X) feature groups.
    pub fn feature_count(&self) -> usize {
        self.feature_lengths.len()
    }

    /// Per-feature vector lengths, one per feature group.
    pub fn feature_lengths(&self) -> &[u64] {
        &self.feature_lengths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_sequence_lengths() {
        let config = LearningBaseConfig::new("Base1", 10, vec![0.5, 0.1], vec![4]).unwrap();
        assert_eq!(config.target_count(), 2);
        assert_eq!(config.feature_count(), 1);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = LearningBaseConfig::new("", 10, Vec::new(), Vec::new()).unwrap_err();
        assert_eq!(err, ParseError::EmptyName);
    }

    #[test]
    fn names_that_would_break_the_stored_config_are_rejected() {
        for name in ["Base 1", "Base1\nnum_samples=1", "tab\tbed", "bell\u{7}"] {
            let err = LearningBaseConfig::new(name, 10, Vec::new(), Vec::new()).unwrap_err();
            assert_eq!(
                err,
                ParseError::InvalidName {
                    name: name.to_string()
                }
            );
        }
    }
}
