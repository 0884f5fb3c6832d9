//! Translation between canonical field names/values and the tracker's native representation.
//!
//! Canonical names are what callers use (`status`, `severity`, ...). Custom fields have
//! opaque native names (`customfield_10010`) configured through a [`FieldMap`]; every
//! other name is passed through unchanged.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::error::{Result, TrackerError};
use crate::user::{resolve_user, UserRef, UserResolver};

/// Fields captured when an issue is constructed, before any configured custom fields.
pub const ESSENTIAL_FIELDS: [&str; 9] = [
    "created",
    "updated",
    "status",
    "resolution",
    "priority",
    "reporter",
    "assignee",
    "summary",
    "description",
];

/// Fields written as `{"name": value}` objects.
const NAMED_FIELDS: [&str; 3] = ["status", "resolution", "priority"];

/// Native name -> canonical name, for the custom fields of one request.
pub type ReverseMap = HashMap<String, String>;

/// Normalized field values keyed by canonical name.
pub type FieldSet = BTreeMap<String, FieldValue>;

/// A field value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Timestamp(DateTime<Utc>),
    /// Enumerated values such as status, priority and resolution.
    Name(String),
    User(UserRef),
    /// Anything else, passed through as the tracker sent it.
    Json(Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null | FieldValue::Json(Value::Null))
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            FieldValue::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(at) => Some(*at),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&UserRef> {
        match self {
            FieldValue::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Canonical -> native aliases for custom fields, with the reverse lookup kept alongside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    aliases: BTreeMap<String, String>,
    reverse: BTreeMap<String, String>,
}

impl FieldMap {
    pub fn new<I, K, V>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = FieldMap::default();
        for (canonical, native) in aliases {
            let (canonical, native) = (canonical.into(), native.into());
            if let Some(previous) = map.reverse.insert(native.clone(), canonical.clone()) {
                tracing::warn!(
                    "custom field {native} is aliased by both {previous} and {canonical}; using {canonical}"
                );
            }
            map.aliases.insert(canonical, native);
        }
        map
    }

    /// Reads a JSON object of `{"canonical": "native"}` pairs.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            TrackerError::Configuration(format!(
                "cannot read custom field definitions {}: {err}",
                path.display()
            ))
        })?;
        let aliases: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|err| {
            TrackerError::Configuration(format!(
                "invalid custom field definitions {}: {err}",
                path.display()
            ))
        })?;
        Ok(Self::new(aliases))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Native name for `canonical`, or `canonical` itself when it has no alias.
    pub fn native_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.aliases
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    pub fn canonical_name(&self, native: &str) -> Option<&str> {
        self.reverse.get(native).map(String::as_str)
    }

    /// Canonical names of all configured custom fields.
    pub fn custom_names(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    /// Canonical names fetched when constructing an issue.
    pub fn essential_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ESSENTIAL_FIELDS.iter().map(|name| name.to_string()).collect();
        names.extend(self.custom_names().map(str::to_string));
        names
    }

    /// Translates canonical names to native ones, keeping input order.
    ///
    /// The returned map restores canonical names for aliased fields only.
    pub fn to_native_names<S: AsRef<str>>(&self, canonical: &[S]) -> (Vec<String>, ReverseMap) {
        let mut reverse = ReverseMap::new();
        let natives = canonical
            .iter()
            .map(|name| {
                let name = name.as_ref();
                match self.aliases.get(name) {
                    Some(native) => {
                        reverse.insert(native.clone(), name.to_string());
                        native.clone()
                    }
                    None => name.to_string(),
                }
            })
            .collect();
        (natives, reverse)
    }

    /// Builds the outgoing `fields` object for a write, keyed by native names.
    pub fn denormalize_fields<I, K>(&self, fields: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        fields
            .into_iter()
            .map(|(name, value)| {
                let name = name.as_ref();
                (
                    self.native_name(name).to_string(),
                    denormalize_field_value(name, value),
                )
            })
            .collect()
    }
}

/// Wraps enumerated values as `{"name": value}`; everything else is written as given.
pub fn denormalize_field_value(canonical: &str, value: Value) -> Value {
    if NAMED_FIELDS.contains(&canonical) {
        let mut wrapped = Map::new();
        wrapped.insert("name".to_string(), value);
        Value::Object(wrapped)
    } else {
        value
    }
}

/// Normalizes one raw field, returning its canonical name and value.
pub fn normalize_field_value(
    native: &str,
    raw: Value,
    reverse: &ReverseMap,
    resolver: &dyn UserResolver,
) -> Result<(String, FieldValue)> {
    let value = match native {
        "reporter" | "assignee" => match resolve_user(&raw, resolver) {
            Some(user) => FieldValue::User(user),
            None => FieldValue::Null,
        },
        "created" | "updated" => FieldValue::Timestamp(parse_timestamp(&raw)?),
        "status" | "priority" | "resolution" => match extract_name(native, &raw)? {
            Some(name) => FieldValue::Name(name),
            None => FieldValue::Null,
        },
        _ => {
            let canonical = reverse
                .get(native)
                .cloned()
                .unwrap_or_else(|| native.to_string());
            return Ok((canonical, FieldValue::Json(raw)));
        }
    };
    Ok((native.to_string(), value))
}

/// Normalizes a whole native field object.
pub fn normalize_fields(
    raw: Map<String, Value>,
    reverse: &ReverseMap,
    resolver: &dyn UserResolver,
) -> Result<FieldSet> {
    raw.into_iter()
        .map(|(native, value)| normalize_field_value(&native, value, reverse, resolver))
        .collect()
}

/// Parses tracker timestamps: RFC 3339, Jira's `+0000` offsets, or bare dates.
pub fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>> {
    let text = match raw {
        Value::String(text) => text.trim(),
        other => return Err(TrackerError::InvalidDate(other.to_string())),
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TrackerError::InvalidDate(text.to_string()))
}

fn extract_name(field: &str, raw: &Value) -> Result<Option<String>> {
    match raw {
        Value::Null => Ok(None),
        Value::String(name) => Ok(Some(name.clone())),
        Value::Object(object) => match object.get("name") {
            Some(Value::String(name)) => Ok(Some(name.clone())),
            _ => Err(TrackerError::MalformedField {
                field: field.to_string(),
                message: format!("expected an object with a name, got {raw}"),
            }),
        },
        other => Err(TrackerError::MalformedField {
            field: field.to_string(),
            message: format!("expected an object with a name, got {other}"),
        }),
    }
}
