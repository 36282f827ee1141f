use crate::error::CoordinateError;
use crate::models::{Axis, CoordinateRecord, CoordinateValue, Failure};
use tracing::{debug, warn};

/// Result of one normalization pass. Both sets keep input order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Normalized {
    pub normalized: Vec<CoordinateRecord>,
    pub failed: Vec<Failure>,
}

impl Normalized {
    pub fn merge(&mut self, other: Normalized) {
        self.normalized.extend(other.normalized);
        self.failed.extend(other.failed);
    }

    pub fn len(&self) -> usize {
        self.normalized.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn normalize(records: &[CoordinateRecord]) -> Normalized {
    let mut out = Normalized {
        normalized: Vec::with_capacity(records.len()),
        failed: Vec::new(),
    };

    for record in records {
        match normalize_record(record) {
            Ok(record) => out.normalized.push(record),
            Err(failure) => {
                warn!(
                    id = %failure.id,
                    axis = %failure.axis,
                    reason = %failure.reason,
                    "Could not convert GPS coordinates: {}",
                    failure.detail
                );
                out.failed.push(failure);
            }
        }
    }

    debug!(normalized = out.normalized.len(), failed = out.failed.len(), "normalized batch");
    out
}

/// Latitude is checked first; only the first problem is reported.
pub fn normalize_record(record: &CoordinateRecord) -> Result<CoordinateRecord, Failure> {
    let checked = normalize_value(Axis::Latitude, &record.latitude)
        .and_then(|lat| normalize_value(Axis::Longitude, &record.longitude).map(|lon| (lat, lon)));

    match checked {
        Ok((latitude, longitude)) => Ok(CoordinateRecord {
            id: record.id.clone(),
            latitude: CoordinateValue::Number(latitude),
            longitude: CoordinateValue::Number(longitude),
            extra: record.extra.clone(),
        }),
        Err(err) => Err(Failure {
            id: record.id.clone(),
            reason: err.reason(),
            axis: err.axis(),
            detail: err.to_string(),
            record: record.clone(),
        }),
    }
}

pub fn normalize_value(axis: Axis, value: &CoordinateValue) -> Result<f64, CoordinateError> {
    let number = match value {
        CoordinateValue::Number(number) => *number,
        CoordinateValue::Text(text) => parse_decimal(text).ok_or_else(|| CoordinateError::Unparseable {
            axis,
            input: text.clone(),
        })?,
        CoordinateValue::Other(other) => {
            return Err(CoordinateError::Unparseable {
                axis,
                input: other.to_string(),
            });
        }
    };

    let (min, max) = axis.bounds();
    // NaN fails both comparisons, so test for the in-range case
    if number.is_finite() && number >= min && number <= max {
        Ok(number)
    } else {
        Err(CoordinateError::OutOfRange { axis, value: number, min, max })
    }
}

/// Plain decimal degrees: optional sign, digits, at most one decimal point.
/// Exponents, `inf`, `nan` and separators are not accepted.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let body = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);

    let mut digits = 0usize;
    let mut points = 0usize;
    for b in body.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => points += 1,
            _ => return None,
        }
    }
    if digits == 0 || points > 1 {
        return None;
    }

    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureReason;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("45.123", Some(45.123))]
    #[case("-122.5", Some(-122.5))]
    #[case("  12.5\t", Some(12.5))]
    #[case("+7", Some(7.0))]
    #[case(".5", Some(0.5))]
    #[case("5.", Some(5.0))]
    #[case("-0", Some(-0.0))]
    #[case("", None)]
    #[case("   ", None)]
    #[case("abc", None)]
    #[case("1.2.3", None)]
    #[case(".", None)]
    #[case("-", None)]
    #[case("+-1", None)]
    #[case("1e5", None)]
    #[case("inf", None)]
    #[case("NaN", None)]
    #[case("1,5", None)]
    #[case("12 34", None)]
    fn parse_decimal_cases(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_decimal(input), expected);
    }

    #[rstest]
    #[case(Axis::Latitude, 90.0)]
    #[case(Axis::Latitude, -90.0)]
    #[case(Axis::Longitude, 180.0)]
    #[case(Axis::Longitude, -180.0)]
    fn bounds_are_inclusive(#[case] axis: Axis, #[case] value: f64) {
        assert_eq!(normalize_value(axis, &CoordinateValue::Number(value)), Ok(value));
    }

    #[rstest]
    #[case(Axis::Latitude, CoordinateValue::Number(90.0001))]
    #[case(Axis::Latitude, CoordinateValue::Text("91.0".to_string()))]
    #[case(Axis::Longitude, CoordinateValue::Text("-180.5".to_string()))]
    #[case(Axis::Longitude, CoordinateValue::Number(f64::NAN))]
    #[case(Axis::Latitude, CoordinateValue::Number(f64::INFINITY))]
    fn out_of_range_values(#[case] axis: Axis, #[case] value: CoordinateValue) {
        let err = normalize_value(axis, &value).unwrap_err();

        assert_eq!(err.reason(), FailureReason::OutOfRange);
        assert_eq!(err.axis(), axis);
    }

    #[rstest]
    #[case(CoordinateValue::Text("abc".to_string()))]
    #[case(CoordinateValue::Text("".to_string()))]
    #[case(CoordinateValue::Other(serde_json::Value::Null))]
    #[case(CoordinateValue::Other(serde_json::Value::Bool(true)))]
    fn unparseable_values(#[case] value: CoordinateValue) {
        let err = normalize_value(Axis::Longitude, &value).unwrap_err();

        assert_eq!(err.reason(), FailureReason::Unparseable);
    }

    #[test]
    fn numeric_in_range_records_pass_through_unchanged() {
        let records = vec![
            CoordinateRecord::new("1", 51.8615899, 4.3580323),
            CoordinateRecord::new("2", -33.8688, 151.2093),
        ];

        let result = normalize(&records);

        assert_eq!(result.normalized, records);
        assert!(result.failed.is_empty());
    }

    #[test]
    fn decimal_strings_become_numbers() {
        let records = vec![CoordinateRecord::new("1", "45.123", "-122.5")];

        let result = normalize(&records);

        assert_eq!(result.normalized, vec![CoordinateRecord::new("1", 45.123, -122.5)]);
    }

    #[test]
    fn latitude_out_of_range_is_reported() {
        let record = CoordinateRecord::new("9", "91.0", "10.0");

        let result = normalize(std::slice::from_ref(&record));

        assert!(result.normalized.is_empty());
        assert_eq!(result.failed.len(), 1);
        let failure = &result.failed[0];
        assert_eq!(failure.reason, FailureReason::OutOfRange);
        assert_eq!(failure.axis, Axis::Latitude);
        assert_eq!(failure.record, record);
    }

    #[test]
    fn unparseable_longitude_is_reported() {
        let result = normalize(&[CoordinateRecord::new("3", "10.0", "abc")]);

        assert_eq!(result.failed[0].reason, FailureReason::Unparseable);
        assert_eq!(result.failed[0].axis, Axis::Longitude);
        assert_eq!(result.failed[0].id.0, "3");
    }

    #[test]
    fn latitude_failure_wins_over_longitude() {
        let result = normalize(&[CoordinateRecord::new("4", "x", "500")]);

        assert_eq!(result.failed[0].axis, Axis::Latitude);
        assert_eq!(result.failed[0].reason, FailureReason::Unparseable);
    }

    #[test]
    fn mixed_batch_keeps_relative_order() {
        let records = vec![
            CoordinateRecord::new("a", "1.0", "1.0"),
            CoordinateRecord::new("b", "bad", "1.0"),
            CoordinateRecord::new("c", 2.0, "2.0"),
            CoordinateRecord::new("d", "95", "1.0"),
            CoordinateRecord::new("e", "3.0", 3.0),
        ];

        let result = normalize(&records);

        let ok_ids: Vec<_> = result.normalized.iter().map(|r| r.id.0.as_str()).collect();
        let failed_ids: Vec<_> = result.failed.iter().map(|f| f.id.0.as_str()).collect();
        assert_eq!(ok_ids, vec!["a", "c", "e"]);
        assert_eq!(failed_ids, vec!["b", "d"]);
    }

    #[test]
    fn input_is_left_untouched() {
        let records = vec![CoordinateRecord::new("a", " 1.5 ", "2")];
        let before = records.clone();

        let _ = normalize(&records);

        assert_eq!(records, before);
    }

    #[test]
    fn normalize_is_idempotent() {
        let records = vec![
            CoordinateRecord::new("a", "1.25", " -2.5 "),
            CoordinateRecord::new("b", "nope", "1"),
            CoordinateRecord::new("c", 89.999, "179.999"),
        ];

        let first = normalize(&records);
        let second = normalize(&first.normalized);

        assert_eq!(second.normalized, first.normalized);
        assert!(second.failed.is_empty());
    }

    #[test]
    fn extra_fields_survive_normalization() {
        let mut record = CoordinateRecord::new("a", "1", "2");
        record.extra.insert("accuracy".to_string(), serde_json::json!(100));

        let result = normalize(&[record]);

        assert_eq!(result.normalized[0].extra.get("accuracy"), Some(&serde_json::json!(100)));
    }

    #[test]
    fn merge_appends_in_order() {
        let mut total = normalize(&[CoordinateRecord::new("a", 1.0, 1.0)]);
        total.merge(normalize(&[CoordinateRecord::new("b", "x", 1.0), CoordinateRecord::new("c", 2.0, 2.0)]));

        assert_eq!(total.len(), 3);
        assert_eq!(total.normalized[1].id.0, "c");
        assert_eq!(total.failed[0].id.0, "b");
    }
}
