// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Administrator settings document and its write whitelist.
//!
//! The document is a small JSON tree:
//!
//! ```text
//! usageQuotas
//! ├── global   { globalComputeMinutesLimit, globalModelCountLimit }
//! └── newUser  { newUserComputeMinutesLimit, newUserModelCountLimit }
//! registration
//! └── type     "invite-only" | "self-service"
//! ```
//!
//! Writes address a dotted key path (`usageQuotas.global`,
//! `registration.type`, ...). Both the path and the value must pass
//! [`validate`]; every rejection is the same `BadRequest` so callers learn
//! nothing about the tree beyond what they already sent.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::CoreError;

/// Message of every settings validation failure.
pub const INVALID_REQUEST_STRUCTURE: &str = "Invalid request structure";

const USAGE_QUOTAS: &str = "usageQuotas";
const REGISTRATION: &str = "registration";
const GLOBAL: &str = "global";
const NEW_USER: &str = "newUser";
const GLOBAL_FIELDS: [&str; 2] = ["globalComputeMinutesLimit", "globalModelCountLimit"];
const NEW_USER_FIELDS: [&str; 2] = ["newUserComputeMinutesLimit", "newUserModelCountLimit"];
const REGISTRATION_TYPES: [&str; 2] = ["invite-only", "self-service"];

fn reject(reason: &str) -> CoreError {
    warn!(reason, "Rejected settings update");
    CoreError::bad_request(INVALID_REQUEST_STRUCTURE)
}

/// Validate a write of `value` at the dotted `key` path.
pub fn validate(key: &str, value: &Value) -> Result<(), CoreError> {
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        [USAGE_QUOTAS] => validate_usage_quotas(value),
        [USAGE_QUOTAS, group] => validate_quota_group(group, value),
        [USAGE_QUOTAS, group, field] => {
            if !quota_fields(group)?.contains(field) {
                return Err(reject("unknown quota field"));
            }
            validate_quota_value(value)
        }
        [USAGE_QUOTAS, ..] => Err(reject("usage quotas key path too deep")),
        [REGISTRATION] => validate_registration(value),
        [REGISTRATION, "type"] => validate_registration_type(value),
        [REGISTRATION, ..] => Err(reject("unknown registration field")),
        _ => Err(reject("unknown top-level key")),
    }
}

fn quota_fields(group: &str) -> Result<&'static [&'static str; 2], CoreError> {
    match group {
        GLOBAL => Ok(&GLOBAL_FIELDS),
        NEW_USER => Ok(&NEW_USER_FIELDS),
        _ => Err(reject("unknown usage quotas group")),
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, CoreError> {
    value
        .as_object()
        .ok_or_else(|| reject("expected an object"))
}

/// Require exactly `allowed` keys, each present and non-null.
fn require_exact_keys(object: &Map<String, Value>, allowed: &[&str]) -> Result<(), CoreError> {
    if allowed
        .iter()
        .any(|key| object.get(*key).is_none_or(Value::is_null))
    {
        return Err(reject("missing required key"));
    }
    if object.keys().any(|key| !allowed.contains(&key.as_str())) {
        return Err(reject("unexpected key"));
    }
    Ok(())
}

fn validate_usage_quotas(value: &Value) -> Result<(), CoreError> {
    let object = as_object(value)?;
    require_exact_keys(object, &[GLOBAL, NEW_USER])?;
    validate_quota_group(GLOBAL, &object[GLOBAL])?;
    validate_quota_group(NEW_USER, &object[NEW_USER])
}

fn validate_quota_group(group: &str, value: &Value) -> Result<(), CoreError> {
    let fields = quota_fields(group)?;
    let object = as_object(value)?;
    require_exact_keys(object, fields)?;
    fields
        .iter()
        .try_for_each(|field| validate_quota_value(&object[*field]))
}

/// A quota is an integer, or a string holding one, no lower than -1.
fn validate_quota_value(value: &Value) -> Result<(), CoreError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| reject("quota must be a number or numeric string"))?;

    if number.fract() != 0.0 {
        return Err(reject("quota must be an integer"));
    }
    if number < -1.0 {
        return Err(reject("quota must be -1 (unlimited) or 0 or greater"));
    }
    Ok(())
}

fn validate_registration(value: &Value) -> Result<(), CoreError> {
    let object = as_object(value)?;
    require_exact_keys(object, &["type"])?;
    validate_registration_type(&object["type"])
}

fn validate_registration_type(value: &Value) -> Result<(), CoreError> {
    match value.as_str() {
        Some(kind) if REGISTRATION_TYPES.contains(&kind) => Ok(()),
        _ => Err(reject("unknown registration type")),
    }
}

/// The settings tree with whitelisted writes.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    root: Value,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl SettingsDocument {
    /// Wrap an existing tree. Non-object roots are replaced by an empty one.
    pub fn new(root: Value) -> Self {
        if root.is_object() {
            Self { root }
        } else {
            Self::default()
        }
    }

    /// The whole tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Read the value at a dotted key path.
    pub fn get(&self, key: &str) -> Result<&Value, CoreError> {
        key.split('.')
            .try_fold(&self.root, |node, part| node.get(part))
            .ok_or_else(|| CoreError::not_found("Setting", key))
    }

    /// Validate and write `value` at a dotted key path, creating
    /// intermediate objects as needed.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), CoreError> {
        validate(key, &value)?;

        let mut node = &mut self.root;
        for part in key.split('.') {
            // Indexing a non-object panics; scalars on the path get replaced.
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = &mut node[part];
        }
        *node = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_rejected(key: &str, value: Value) {
        let err = validate(key, &value).expect_err(key);
        assert_eq!(err, CoreError::bad_request(INVALID_REQUEST_STRUCTURE));
    }

    #[test]
    fn test_unknown_paths_are_rejected() {
        for key in [
            "",
            "database",
            "usageQuotas.invalid",
            "usageQuotas.global.invalidField",
            "usageQuotas.newUser.globalModelCountLimit",
            "usageQuotas.global.globalComputeMinutesLimit.tooDeep",
            "registration.invalidField",
            "registration.type.tooDeep",
        ] {
            assert_rejected(key, json!("1"));
        }
    }

    #[test]
    fn test_quota_field_values() {
        let key = "usageQuotas.global.globalComputeMinutesLimit";
        for ok in [json!("-1"), json!("0"), json!("100"), json!(-1), json!(3.0)] {
            assert!(validate(key, &ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [
            json!("abc"),
            json!("12.5.3"),
            json!("3.14"),
            json!(0.5),
            json!(-2),
            json!("-10"),
            json!(true),
            json!({}),
            json!([]),
            Value::Null,
        ] {
            assert_rejected(key, bad);
        }
    }

    #[test]
    fn test_whole_usage_quotas_object() {
        let valid = json!({
            "global": { "globalComputeMinutesLimit": "-1", "globalModelCountLimit": "10" },
            "newUser": { "newUserComputeMinutesLimit": "600", "newUserModelCountLimit": 3 }
        });
        assert!(validate("usageQuotas", &valid).is_ok());

        let mut missing = valid.clone();
        missing.as_object_mut().unwrap().remove("newUser");
        assert_rejected("usageQuotas", missing);

        let mut extra = valid.clone();
        extra["extraKey"] = json!("nope");
        assert_rejected("usageQuotas", extra);

        let mut bad_nested = valid;
        bad_nested["global"]["globalModelCountLimit"] = json!(-5);
        assert_rejected("usageQuotas", bad_nested);

        assert_rejected("usageQuotas", json!("invalid string"));
        assert_rejected("usageQuotas", json!([]));
    }

    #[test]
    fn test_quota_group_requires_both_fields() {
        assert!(
            validate(
                "usageQuotas.newUser",
                &json!({ "newUserComputeMinutesLimit": 60, "newUserModelCountLimit": 1 })
            )
            .is_ok()
        );
        assert_rejected(
            "usageQuotas.newUser",
            json!({ "newUserComputeMinutesLimit": 60 }),
        );
        assert_rejected(
            "usageQuotas.global",
            json!({ "globalComputeMinutesLimit": 60, "globalModelCountLimit": null }),
        );
    }

    #[test]
    fn test_registration_type() {
        assert!(validate("registration.type", &json!("invite-only")).is_ok());
        assert!(validate("registration", &json!({ "type": "self-service" })).is_ok());
        assert_rejected("registration.type", json!("open"));
        assert_rejected("registration.type", json!(1));
        assert_rejected("registration", json!({ "type": "self-service", "extra": 1 }));
        assert_rejected("registration", json!({}));
    }

    #[test]
    fn test_document_set_and_get() {
        let mut settings = SettingsDocument::default();
        settings
            .set("usageQuotas.global.globalComputeMinutesLimit", json!("600"))
            .unwrap();
        settings.set("registration.type", json!("invite-only")).unwrap();

        assert_eq!(
            settings
                .get("usageQuotas.global.globalComputeMinutesLimit")
                .unwrap(),
            &json!("600")
        );
        assert_eq!(
            settings.get("registration").unwrap(),
            &json!({ "type": "invite-only" })
        );
        assert!(settings.get("usageQuotas.newUser").unwrap_err().is_not_found());
    }

    #[test]
    fn test_rejected_set_leaves_document_untouched() {
        let mut settings = SettingsDocument::new(json!({ "registration": { "type": "invite-only" } }));
        let before = settings.clone();

        assert!(settings.set("registration.type", json!("open")).is_err());
        assert!(settings.set("users", json!({})).is_err());
        assert_eq!(settings, before);
    }
}
