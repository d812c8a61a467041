use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::{Error, ErrorCode, Result};

const CUSTOMFIELD_TYPES_PREFIX: &str = "com.atlassian.jira.plugin.system.customfieldtypes:";

/// One entry from the tracker's global field list.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub schema: Option<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Fully-qualified custom field type, present for custom fields.
    #[serde(default)]
    pub custom: Option<String>,
}

/// Resolve a human-supplied field name/value pair against the tracker's
/// metadata and merge the result into the request payload.
///
/// `field_lookup` is the global field list keyed by lowercased display name;
/// `screen_meta` is the create or edit metadata for the target issue type,
/// keyed by internal field key. Resolution is deterministic: allowed-value
/// matching is case-insensitive exact match only.
pub fn resolve_and_set(
    fields: &mut Map<String, Value>,
    raw_field_name: &str,
    raw_value: &str,
    field_lookup: &HashMap<String, FieldDescriptor>,
    screen_meta: &HashMap<String, Value>,
) -> Result<()> {
    let descriptor = field_lookup
        .get(&raw_field_name.trim().to_lowercase())
        .ok_or_else(|| Error::jira_unknown_field(raw_field_name.trim()))?;

    let schema = descriptor
        .schema
        .as_ref()
        .ok_or_else(|| Error::jira_unsupported_field_type(&descriptor.name, "unknown"))?;
    let key = descriptor.id.clone();

    match schema.schema_type.as_str() {
        "number" => {
            let number: i64 = raw_value.trim().parse().map_err(|_| {
                Error::new(
                    ErrorCode::JiraFieldValidation,
                    format!(
                        "Field '{}' expects an integer. Given '{}'",
                        descriptor.name, raw_value
                    ),
                    json!({ "field": descriptor.name, "given": raw_value }),
                )
            })?;
            fields.insert(key, json!(number));
        }
        "string" | "date" => {
            fields.insert(key, Value::String(raw_value.to_string()));
        }
        "priority" | "array" if !descriptor.custom => {
            let meta = screen_meta_for(screen_meta, &key, &descriptor.name)?;
            let resolved = resolve_allowed_value(raw_value, meta, &descriptor.name, "name")?;
            fields.insert(key, resolved);
        }
        "option" | "array" if descriptor.custom => {
            let meta = screen_meta_for(screen_meta, &key, &descriptor.name)?;
            let custom_type = schema.custom.as_deref().unwrap_or("");
            let resolved = resolve_option_values(raw_value, meta, &descriptor.name, custom_type)?;
            fields.insert(key, resolved);
        }
        other => {
            return Err(Error::jira_unsupported_field_type(&descriptor.name, other));
        }
    }

    Ok(())
}

/// Look up a field's entry in the create/edit screen metadata.
fn screen_meta_for<'a>(
    screen_meta: &'a HashMap<String, Value>,
    key: &str,
    display_name: &str,
) -> Result<&'a Value> {
    screen_meta.get(key).ok_or_else(|| {
        Error::new(
            ErrorCode::JiraUnknownField,
            format!(
                "Field '{}' is not present in the create or edit metadata",
                display_name
            ),
            json!({ "field": display_name, "key": key }),
        )
    })
}

/// Match a raw value against the field's allowed values by the given key
/// (`name` for built-in enumerated fields, `value` for custom options).
/// Returns the resolved value object, e.g. `{"name": "High"}`.
fn resolve_allowed_value(
    raw_value: &str,
    field_meta: &Value,
    display_name: &str,
    value_key: &str,
) -> Result<Value> {
    let allowed: Vec<String> = field_meta["allowedValues"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v[value_key].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let wanted = raw_value.trim();
    let matches: Vec<&String> = allowed
        .iter()
        .filter(|a| a.eq_ignore_ascii_case(wanted))
        .collect();

    match matches.as_slice() {
        [resolved] => Ok(json!({ value_key: resolved })),
        _ => Err(Error::jira_field_validation(display_name, wanted, allowed)),
    }
}

/// Resolve a custom option field. Single-select fields require exactly one
/// value; multiselect fields accept a comma-separated list resolved in order.
fn resolve_option_values(
    raw_value: &str,
    field_meta: &Value,
    display_name: &str,
    custom_type: &str,
) -> Result<Value> {
    let field_type = custom_type
        .strip_prefix(CUSTOMFIELD_TYPES_PREFIX)
        .ok_or_else(|| Error::jira_unsupported_field_type(display_name, custom_type))?;

    let values: Vec<&str> = raw_value.split(',').map(|v| v.trim()).collect();

    match field_type {
        "select" => {
            if values.len() != 1 {
                return Err(Error::new(
                    ErrorCode::JiraFieldValidation,
                    format!("Field '{}' only supports single selection", display_name),
                    json!({ "field": display_name, "given": raw_value }),
                ));
            }
            resolve_allowed_value(values[0], field_meta, display_name, "value")
        }
        "multiselect" => {
            let resolved = values
                .iter()
                .map(|v| resolve_allowed_value(v, field_meta, display_name, "value"))
                .collect::<Result<Vec<Value>>>()?;
            Ok(Value::Array(resolved))
        }
        other => Err(Error::jira_unsupported_field_type(display_name, other)),
    }
}
