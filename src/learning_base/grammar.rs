//! Parser for the positional learning-base description line.
//!
//! ```text
//! name sampleCount targetCount p_1 .. p_targetCount featureCount l_1 .. l_featureCount
//! ```
//!
//! Tokens are separated by whitespace and never quoted. Only parseability is
//! checked; values such as a zero sample count are accepted.

use std::str::FromStr;

use thiserror::Error;

use super::LearningBaseConfig;

/// Fewest tokens a line can have: name, sample count, target count, feature count.
const MIN_TOKENS: usize = 4;

/// Grammar violations reported by [`parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line ended before a required field.
    #[error("Missing fields: expected {field}")]
    MissingFields { field: &'static str },
    /// A numeric field did not parse.
    #[error("Invalid number for {field}: '{token}'")]
    InvalidNumber { field: &'static str, token: String },
    /// Tokens remained after the last declared feature length.
    #[error("Unexpected trailing tokens starting at '{first}' ({count} extra)")]
    TrailingTokens { first: String, count: usize },
    /// The base name was empty.
    #[error("Learning base name must not be empty")]
    EmptyName,
    /// The base name contains whitespace or control characters.
    #[error("Learning base name {name:?} contains whitespace or control characters")]
    InvalidName { name: String },
}

/// Parse one learning-base description line.
pub fn parse(line: &str) -> Result<LearningBaseConfig, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_TOKENS {
        return Err(ParseError::MissingFields {
            field: "name, sample count, target count and feature count",
        });
    }
    let mut cursor = Cursor::new(&tokens);

    let name = cursor.next("name")?;
    let sample_count: u64 = cursor.number("sample count")?;
    let target_count: usize = cursor.number("target count")?;
    let target_precision = cursor.numbers::<f64>(target_count, "target precision")?;
    let feature_count: usize = cursor.number("feature count")?;
    let feature_lengths = cursor.numbers::<u64>(feature_count, "feature length")?;
    cursor.finish()?;

    LearningBaseConfig::new(name, sample_count, target_precision, feature_lengths)
}

struct Cursor<'a> {
    tokens: &'a [&'a str],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [&'a str]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(ParseError::MissingFields { field })?;
        self.pos += 1;
        Ok(token)
    }

    fn number<T: FromStr>(&mut self, field: &'static str) -> Result<T, ParseError> {
        let token = self.next(field)?;
        token.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            token: token.to_string(),
        })
    }

    /// Read exactly `count` numbers, failing before parsing if the line is short.
    fn numbers<T: FromStr>(
        &mut self,
        count: usize,
        field: &'static str,
    ) -> Result<Vec<T>, ParseError> {
        if self.remaining() < count {
            return Err(ParseError::MissingFields { field });
        }
        (0..count).map(|_| self.number(field)).collect()
    }

    fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }

    fn finish(self) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(first) => Err(ParseError::TrailingTokens {
                first: first.to_string(),
                count: self.remaining(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_line() {
        let config = parse("Base1 1000 2 0.01 0.05 3 256 128 64").unwrap();
        assert_eq!(config.name(), "Base1");
        assert_eq!(config.sample_count(), 1000);
        assert_eq!(config.target_count(), 2);
        assert_eq!(config.target_precision(), &[0.01, 0.05]);
        assert_eq!(config.feature_count(), 3);
        assert_eq!(config.feature_lengths(), &[256, 128, 64]);
    }

    #[test]
    fn empty_and_short_lines_are_missing_fields() {
        assert!(matches!(parse(""), Err(ParseError::MissingFields { .. })));
        assert!(matches!(
            parse("onlythree fields here"),
            Err(ParseError::MissingFields { .. })
        ));
        assert!(matches!(parse("   \t "), Err(ParseError::MissingFields { .. })));
    }

    #[test]
    fn short_precision_list_is_missing_fields() {
        // Two targets declared, one precision given: "3" is read as the second
        // precision and "256" becomes the feature count.
        let err = parse("Base1 1000 2 0.01 3 256 128 64").unwrap_err();
        assert!(matches!(err, ParseError::MissingFields { .. }));
    }

    #[test]
    fn missing_feature_count_is_missing_fields() {
        let err = parse("Base1 1000 2 0.01 0.05").unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingFields {
                field: "feature count"
            }
        );
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("Base1 1000 0 3 256 128 64 extra").unwrap_err();
        assert_eq!(
            err,
            ParseError::TrailingTokens {
                first: "extra".to_string(),
                count: 1
            }
        );
    }

    #[test]
    fn non_numeric_counts_are_invalid_numbers() {
        let err = parse("Base1 lots 0 0").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                field: "sample count",
                token: "lots".to_string()
            }
        );
        let err = parse("Base1 10 1 fine 0").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber {
                field: "target precision",
                ..
            }
        ));
        let err = parse("Base1 10 0 1 1.5").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber {
                field: "feature length",
                ..
            }
        ));
    }

    #[test]
    fn negative_counts_are_invalid_numbers() {
        let err = parse("Base1 10 -1 0").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber {
                field: "target count",
                ..
            }
        ));
    }

    #[test]
    fn zero_targets_and_features_are_valid() {
        let config = parse("Empty 0 0 0").unwrap();
        assert_eq!(config.sample_count(), 0);
        assert!(config.target_precision().is_empty());
        assert!(config.feature_lengths().is_empty());
    }

    #[test]
    fn extra_whitespace_is_ignored() {
        let config = parse("  Base2\t5  1 0.5\n1   7 ").unwrap();
        assert_eq!(config.name(), "Base2");
        assert_eq!(config.feature_lengths(), &[7]);
    }

    #[test]
    fn parsing_is_deterministic() {
        let line = "Base1 1000 2 0.01 0.05 3 256 128 64";
        assert_eq!(parse(line), parse(line));
        let bad = "Base1 1000 2 0.01";
        assert_eq!(parse(bad), parse(bad));
    }
}
