//! Shared coercion and cross-field check helpers used by every entity
//! schema. One schema module per entity kind owns the specifics; this
//! module is the common vocabulary they're built from -- coerce strings to
//! typed fields, reject out-of-range foreign keys, and clamp percentage-like
//! fields to their documented convention ([0,100] vs [0,1] depending on
//! the field).

use serde_json::Value;

/// One field-level validation failure within a row. Several of these make
/// up a row's rejection trace written to quarantine.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Accumulates field errors for one row; `is_ok()` distinguishes validated
/// sibling rows from rejected ones.
#[derive(Debug, Default, Clone)]
pub struct RowValidation {
    pub errors: Vec<FieldError>,
}

impl RowValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// A one-line summary naming the failing field(s), for the quarantine
    /// record's error trace.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Required positive-integer id field, e.g. a player or team FK column.
/// Rejects missing, non-integer, zero, and negative values.
pub fn require_positive_id(payload: &Value, field: &'static str) -> Result<i64, FieldError> {
    let raw = payload.get(field).ok_or_else(|| FieldError::new(field, "missing"))?;
    let value = raw
        .as_i64()
        .or_else(|| raw.as_str().and_then(|s| s.parse::<i64>().ok()))
        .ok_or_else(|| FieldError::new(field, "not an integer"))?;
    if value <= 0 {
        return Err(FieldError::new(field, "must be a positive integer"));
    }
    Ok(value)
}

/// Required string field, rejecting absence and blank strings.
pub fn require_str<'a>(payload: &'a Value, field: &'static str) -> Result<&'a str, FieldError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| FieldError::new(field, "missing or blank"))
}

/// Optional string field.
pub fn optional_str<'a>(payload: &'a Value, field: &'static str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// Required ISO-8601 date string; only checks shape (`YYYY-MM-DD`), not
/// calendar validity, since the stats API sometimes truncates.
pub fn require_iso_date<'a>(payload: &'a Value, field: &'static str) -> Result<&'a str, FieldError> {
    let raw = require_str(payload, field)?;
    let ok = raw.len() == 10 && raw.as_bytes()[4] == b'-' && raw.as_bytes()[7] == b'-';
    if ok {
        Ok(raw)
    } else {
        Err(FieldError::new(field, "not an ISO-8601 date"))
    }
}

/// Non-negative count field (e.g. points, rebounds). Rejects negatives.
pub fn require_non_negative_count(payload: &Value, field: &'static str) -> Result<i64, FieldError> {
    let raw = payload.get(field).ok_or_else(|| FieldError::new(field, "missing"))?;
    let value = raw
        .as_i64()
        .ok_or_else(|| FieldError::new(field, "not an integer"))?;
    if value < 0 {
        return Err(FieldError::new(field, "negative counts are not valid"));
    }
    Ok(value)
}

/// Percentage-field convention: some source fields are already 0-1
/// fractions, others are 0-100 whole percentages. Each schema declares
/// which convention a field follows and this clamps/validates accordingly.
#[derive(Debug, Clone, Copy)]
pub enum PercentConvention {
    ZeroToOne,
    ZeroToHundred,
}

pub fn require_percentage(
    payload: &Value,
    field: &'static str,
    convention: PercentConvention,
) -> Result<f64, FieldError> {
    let raw = payload.get(field).ok_or_else(|| FieldError::new(field, "missing"))?;
    let value = raw.as_f64().ok_or_else(|| FieldError::new(field, "not a number"))?;
    let (lo, hi) = match convention {
        PercentConvention::ZeroToOne => (0.0, 1.0),
        PercentConvention::ZeroToHundred => (0.0, 100.0),
    };
    if value < lo || value > hi {
        return Err(FieldError::new(
            field,
            format!("out of range [{lo},{hi}]: {value}"),
        ));
    }
    Ok(value)
}

/// Cross-field check: a lineup's five player ids must be distinct.
pub fn require_distinct(ids: &[i64], field: &'static str) -> Result<(), FieldError> {
    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if !seen.insert(*id) {
            return Err(FieldError::new(field, "player ids must be distinct"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_required_field() {
        let payload = json!({});
        assert!(require_positive_id(&payload, "player_id").is_err());
    }

    #[test]
    fn rejects_non_positive_fk() {
        let payload = json!({"team_id": -3});
        assert!(require_positive_id(&payload, "team_id").is_err());
    }

    #[test]
    fn accepts_positive_fk_as_string_or_number() {
        assert_eq!(require_positive_id(&json!({"player_id": 201}), "player_id").unwrap(), 201);
        assert_eq!(require_positive_id(&json!({"player_id": "201"}), "player_id").unwrap(), 201);
    }

    #[test]
    fn percentage_conventions_are_enforced_independently() {
        assert!(require_percentage(&json!({"fg_pct": 0.55}), "fg_pct", PercentConvention::ZeroToOne).is_ok());
        assert!(require_percentage(&json!({"fg_pct": 55.0}), "fg_pct", PercentConvention::ZeroToOne).is_err());
        assert!(require_percentage(&json!({"usage": 28.4}), "usage", PercentConvention::ZeroToHundred).is_ok());
    }

    #[test]
    fn lineup_ids_must_be_distinct() {
        assert!(require_distinct(&[1, 2, 3, 4, 5], "player_ids").is_ok());
        assert!(require_distinct(&[1, 2, 3, 4, 1], "player_ids").is_err());
    }

    #[test]
    fn negative_counts_rejected() {
        assert!(require_non_negative_count(&json!({"pts": -1}), "pts").is_err());
        assert!(require_non_negative_count(&json!({"pts": 0}), "pts").is_ok());
    }
}
