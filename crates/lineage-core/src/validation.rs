//! Validation rules for lineage identifiers, scores, and traversal bounds.
//!
//! Every write path and every traversal entry point funnels through these
//! checks so the rules live in exactly one place.

use crate::{LineageError, Result};

/// Maximum length for asset identifiers
pub const MAX_ASSET_ID_LEN: usize = 255;

/// Maximum length for column names
pub const MAX_COLUMN_NAME_LEN: usize = 255;

/// Maximum length for transformation labels
pub const MAX_TRANSFORMATION_LABEL_LEN: usize = 100;

/// Maximum length for transformation logic / SQL text
pub const MAX_SQL_TEXT_LEN: usize = 65_536;

/// Default traversal depth when the caller does not specify one
pub const DEFAULT_TRAVERSAL_DEPTH: u32 = 10;

/// Ceiling on traversal depth for upstream/downstream queries
pub const MAX_TRAVERSAL_DEPTH: u32 = 50;

/// Ceiling on traversal depth for impact analysis
pub const MAX_IMPACT_DEPTH: u32 = 100;

/// Validate an asset identifier.
///
/// Identifiers are opaque to the engine (they may carry namespaces, URIs,
/// dotted paths), so only emptiness, length, and control characters are
/// rejected.
pub fn validate_asset_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LineageError::ValidationError(
            "Asset id cannot be empty".to_string(),
        ));
    }

    if id.len() > MAX_ASSET_ID_LEN {
        return Err(LineageError::ValidationError(format!(
            "Asset id exceeds maximum length of {} characters",
            MAX_ASSET_ID_LEN
        )));
    }

    if id.chars().any(|c| c.is_control()) {
        return Err(LineageError::ValidationError(format!(
            "Asset id contains control characters: {:?}",
            id
        )));
    }

    Ok(())
}

/// Validate a column name.
pub fn validate_column_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LineageError::ValidationError(
            "Column name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_COLUMN_NAME_LEN {
        return Err(LineageError::ValidationError(format!(
            "Column name exceeds maximum length of {} characters",
            MAX_COLUMN_NAME_LEN
        )));
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(LineageError::ValidationError(format!(
            "Column name contains control characters: {:?}",
            name
        )));
    }

    Ok(())
}

/// Validate an optional transformation label.
pub fn validate_transformation_label(label: Option<&str>) -> Result<()> {
    let Some(label) = label else {
        return Ok(());
    };

    if label.trim().is_empty() {
        return Err(LineageError::ValidationError(
            "Transformation type cannot be empty".to_string(),
        ));
    }

    if label.len() > MAX_TRANSFORMATION_LABEL_LEN {
        return Err(LineageError::ValidationError(format!(
            "Transformation type exceeds maximum length of {} characters",
            MAX_TRANSFORMATION_LABEL_LEN
        )));
    }

    Ok(())
}

/// Validate optional transformation logic (usually raw SQL; any characters
/// are allowed, only length is bounded).
pub fn validate_transformation_logic(logic: Option<&str>) -> Result<()> {
    let Some(logic) = logic else {
        return Ok(());
    };

    if logic.len() > MAX_SQL_TEXT_LEN {
        return Err(LineageError::ValidationError(format!(
            "Transformation logic exceeds maximum length of {} characters",
            MAX_SQL_TEXT_LEN
        )));
    }

    Ok(())
}

/// Validate SQL text submitted for extraction.
pub fn validate_sql_text(sql: &str) -> Result<()> {
    if sql.trim().is_empty() {
        return Err(LineageError::ValidationError(
            "SQL text cannot be empty".to_string(),
        ));
    }

    if sql.len() > MAX_SQL_TEXT_LEN {
        return Err(LineageError::ValidationError(format!(
            "SQL text exceeds maximum length of {} characters",
            MAX_SQL_TEXT_LEN
        )));
    }

    Ok(())
}

/// Validate a confidence score. Must be a finite value in [0.0, 1.0].
pub fn validate_confidence(confidence: f64) -> Result<()> {
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(LineageError::ValidationError(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            confidence
        )));
    }
    Ok(())
}

/// Reject asset-level self-loops.
pub fn validate_no_self_loop(source_asset_id: &str, target_asset_id: &str) -> Result<()> {
    if source_asset_id == target_asset_id {
        return Err(LineageError::ValidationError(format!(
            "Asset cannot derive from itself: {}",
            source_asset_id
        )));
    }
    Ok(())
}

/// Reject column-level self-loops.
///
/// A column pair within the same asset is valid as long as the columns
/// differ (e.g. `orders.amount -> orders.amount_usd`).
pub fn validate_no_column_self_loop(
    source_asset_id: &str,
    source_column: &str,
    target_asset_id: &str,
    target_column: &str,
) -> Result<()> {
    if source_asset_id == target_asset_id && source_column == target_column {
        return Err(LineageError::ValidationError(format!(
            "Column cannot derive from itself: {}.{}",
            source_asset_id, source_column
        )));
    }
    Ok(())
}

/// Validate a traversal depth against a route-specific ceiling.
///
/// Depth 0 is rejected rather than treated as "no results": a zero or
/// negative depth is always a caller mistake.
pub fn validate_depth(depth: u32, ceiling: u32) -> Result<()> {
    if depth == 0 {
        return Err(LineageError::ValidationError(
            "Traversal depth must be at least 1".to_string(),
        ));
    }

    if depth > ceiling {
        return Err(LineageError::ValidationError(format!(
            "Traversal depth exceeds maximum of {}",
            ceiling
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_asset_ids() {
        assert!(validate_asset_id("orders").is_ok());
        assert!(validate_asset_id("analytics.prod.orders").is_ok());
        assert!(validate_asset_id("warehouse:sales_summary").is_ok());
        assert!(validate_asset_id("s3://bucket/path/file.parquet").is_ok());
    }

    #[test]
    fn test_invalid_asset_ids() {
        assert!(validate_asset_id("").is_err());
        assert!(validate_asset_id("   ").is_err());
        assert!(validate_asset_id("bad\nid").is_err());
        assert!(validate_asset_id(&"x".repeat(MAX_ASSET_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_valid_column_names() {
        assert!(validate_column_name("amount").is_ok());
        assert!(validate_column_name("total_amount_usd").is_ok());
        assert!(validate_column_name("*").is_ok());
    }

    #[test]
    fn test_invalid_column_names() {
        assert!(validate_column_name("").is_err());
        assert!(validate_column_name("a\tb").is_err());
        assert!(validate_column_name(&"c".repeat(MAX_COLUMN_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_transformation_label() {
        assert!(validate_transformation_label(None).is_ok());
        assert!(validate_transformation_label(Some("SQL_TRANSFORM")).is_ok());
        assert!(validate_transformation_label(Some("")).is_err());
        assert!(
            validate_transformation_label(Some(&"t".repeat(MAX_TRANSFORMATION_LABEL_LEN + 1)))
                .is_err()
        );
    }

    #[test]
    fn test_transformation_logic_allows_multiline_sql() {
        let sql = "INSERT INTO t\nSELECT a,\n       b\nFROM s";
        assert!(validate_transformation_logic(Some(sql)).is_ok());
        assert!(validate_transformation_logic(None).is_ok());
        assert!(validate_transformation_logic(Some(&"s".repeat(MAX_SQL_TEXT_LEN + 1))).is_err());
    }

    #[test]
    fn test_sql_text() {
        assert!(validate_sql_text("SELECT 1").is_ok());
        assert!(validate_sql_text("").is_err());
        assert!(validate_sql_text("  \n ").is_err());
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(validate_confidence(0.0).is_ok());
        assert!(validate_confidence(0.5).is_ok());
        assert!(validate_confidence(1.0).is_ok());
        assert!(validate_confidence(-0.01).is_err());
        assert!(validate_confidence(1.01).is_err());
        assert!(validate_confidence(f64::NAN).is_err());
        assert!(validate_confidence(f64::INFINITY).is_err());
    }

    #[test]
    fn test_self_loops() {
        assert!(validate_no_self_loop("a", "b").is_ok());
        assert!(validate_no_self_loop("a", "a").is_err());

        assert!(validate_no_column_self_loop("t", "a", "t", "b").is_ok());
        assert!(validate_no_column_self_loop("t", "a", "u", "a").is_ok());
        assert!(validate_no_column_self_loop("t", "a", "t", "a").is_err());
    }

    #[test]
    fn test_depth_bounds() {
        assert!(validate_depth(1, MAX_TRAVERSAL_DEPTH).is_ok());
        assert!(validate_depth(50, MAX_TRAVERSAL_DEPTH).is_ok());
        assert!(validate_depth(0, MAX_TRAVERSAL_DEPTH).is_err());
        assert!(validate_depth(51, MAX_TRAVERSAL_DEPTH).is_err());
        assert!(validate_depth(100, MAX_IMPACT_DEPTH).is_ok());
        assert!(validate_depth(101, MAX_IMPACT_DEPTH).is_err());
    }
}
