//! Attribute value encoding for anoncreds commitments
//!
//! Booleans become `"1"`/`"0"`, values inside the 32 bit signed integer range (numbers or
//! numeric strings) keep their decimal form, everything else is the big endian decimal of
//! its sha256 digest. `null` is hashed as the literal `"None"`.
//!
//! Numeric strings follow JavaScript number parsing so encodings agree with other agents:
//! `"0x1A"` is `26` and a blank `" "` is `0`. Only the empty string is hashed.
use std::collections::BTreeSet;

use primitive_types::U256;
use sha2::{Digest, Sha256};

use rst_common::standard::serde_json::Value;

use crate::ledger::Schema;
use crate::wallet::anoncreds::{CredentialValue, CredentialValues};

use super::preview::{CredentialPreview, CredentialPreviewAttribute};
use super::types::CredentialError;

fn int32_of(value: f64) -> Option<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }

    if value < i32::MIN as f64 || value > i32::MAX as f64 {
        return None;
    }

    Some(value as i64)
}

/// `parse_number` reads a numeric string the way a JavaScript `Number()` cast does: the
/// text is trimmed, blank text is zero and `0x`, `0o`, `0b` prefixes switch the radix
fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };

    match radix {
        Some(radix) => {
            let digits = &trimmed[2..];
            if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
                return None;
            }

            u64::from_str_radix(digits, radix).ok().map(|val| val as f64)
        }
        None => trimmed.parse::<f64>().ok(),
    }
}

fn parse_int32(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }

    parse_number(text).and_then(int32_of)
}

fn hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    U256::from_big_endian(digest.as_slice()).to_string()
}

pub fn encode(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => hash("None"),
        Value::Number(number) => match number.as_f64().and_then(int32_of) {
            Some(int) => int.to_string(),
            None => hash(&number.to_string()),
        },
        Value::String(text) => match parse_int32(text) {
            Some(int) => int.to_string(),
            None => hash(text),
        },
        other => hash(&other.to_string()),
    }
}

pub fn encode_raw(raw: &str) -> String {
    encode(&Value::String(raw.to_string()))
}

/// `check_valid_encoding` holds when `encoded` is exactly the encoding of `raw`
pub fn check_valid_encoding(raw: &str, encoded: &str) -> bool {
    encode_raw(raw) == encoded
}

pub fn convert_attributes_to_values(attributes: &[CredentialPreviewAttribute]) -> CredentialValues {
    attributes
        .iter()
        .map(|attr| {
            (
                attr.name.to_owned(),
                CredentialValue {
                    raw: attr.value.to_owned(),
                    encoded: encode_raw(&attr.value),
                },
            )
        })
        .collect()
}

/// `assert_values_match` requires the same keys with identical raw and encoded values
pub fn assert_values_match(
    first: &CredentialValues,
    second: &CredentialValues,
) -> Result<(), CredentialError> {
    if first.len() != second.len() {
        return Err(CredentialError::ValidationError(format!(
            "number of credential values {} does not match {}",
            first.len(),
            second.len()
        )));
    }

    for (key, value) in first {
        let other = second.get(key).ok_or_else(|| {
            CredentialError::ValidationError(format!("credential value {} was missing", key))
        })?;

        if value.encoded != other.encoded {
            return Err(CredentialError::ValidationError(format!(
                "encoded credential value of {} does not match",
                key
            )));
        }

        if value.raw != other.raw {
            return Err(CredentialError::ValidationError(format!(
                "raw credential value of {} does not match",
                key
            )));
        }
    }

    Ok(())
}

/// `check_attributes_match` fails when the preview and the schema disagree on names
pub fn check_attributes_match(
    schema: &Schema,
    preview: &CredentialPreview,
) -> Result<(), CredentialError> {
    let schema_names: BTreeSet<String> = schema.attr_names.iter().cloned().collect();
    let preview_names: BTreeSet<String> = preview.attribute_names().into_iter().collect();

    let difference: Vec<String> = schema_names
        .symmetric_difference(&preview_names)
        .cloned()
        .collect();

    if !difference.is_empty() {
        return Err(CredentialError::ValidationError(format!(
            "credential preview attributes do not match schema {} attributes, difference: {}",
            schema.id,
            difference.join(", ")
        )));
    }

    Ok(())
}
