// Line parser: raw text from the sensor link into validated samples

use crate::types::{ParseError, Sample};

/// Converts one raw line into a reading.
///
/// The parser never looks at the clock. The caller supplies the elapsed time,
/// so one parser can be shared by runs with different epochs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleParser;

impl SampleParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse the numeric reading carried by `raw`.
    ///
    /// Surrounding whitespace, carriage returns and NUL padding (common right
    /// after a microcontroller resets) are ignored. Non-finite values such as
    /// `nan` or `inf` are treated as malformed.
    pub fn parse_value(&self, raw: &str) -> Result<f64, ParseError> {
        let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ParseError::Malformed(trimmed.to_string())),
        }
    }

    /// Parse `raw` into a sample stamped with `elapsed_seconds`.
    pub fn parse(&self, raw: &str, elapsed_seconds: f64) -> Result<Sample, ParseError> {
        self.parse_value(raw)
            .map(|value| Sample::new(elapsed_seconds, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_numbers() {
        let parser = SampleParser::new();
        assert_eq!(parser.parse_value("3.5"), Ok(3.5));
        assert_eq!(parser.parse_value("-0.25"), Ok(-0.25));
        assert_eq!(parser.parse_value("12"), Ok(12.0));
        assert_eq!(parser.parse_value("1e3"), Ok(1000.0));
    }

    #[test]
    fn test_parse_strips_line_noise() {
        let parser = SampleParser::new();
        assert_eq!(parser.parse_value("  4.75\r\n"), Ok(4.75));
        assert_eq!(parser.parse_value("\0\07.0"), Ok(7.0));
    }

    #[test]
    fn test_empty_and_blank_lines() {
        let parser = SampleParser::new();
        assert_eq!(parser.parse_value(""), Err(ParseError::Empty));
        assert_eq!(parser.parse_value("   \t\r\n"), Err(ParseError::Empty));
    }

    #[test]
    fn test_malformed_lines() {
        let parser = SampleParser::new();
        assert_eq!(
            parser.parse_value("abc"),
            Err(ParseError::Malformed("abc".to_string()))
        );
        assert!(matches!(
            parser.parse_value("1.2.3"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parser.parse_value("Force: 3.2"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let parser = SampleParser::new();
        for raw in ["nan", "NaN", "inf", "-inf", "infinity"] {
            assert!(
                matches!(parser.parse_value(raw), Err(ParseError::Malformed(_))),
                "{} should be malformed",
                raw
            );
        }
    }

    #[test]
    fn test_parse_stamps_caller_time() {
        let parser = SampleParser::new();
        let sample = parser.parse("2.0", 1.25).unwrap();
        assert_eq!(sample, Sample::new(1.25, 2.0));
    }
}
