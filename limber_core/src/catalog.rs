//! Catalog parsing and validation.
//!
//! A catalog source is YAML in one of two shapes:
//! - a bare list of item records, or
//! - a mapping with an `items` (or `stretches`) list and an optional
//!   `regimens` mapping holding exactly `short` and `full`.
//!
//! Every rule is fail-fast: the first violation aborts the parse with an
//! [`Error::CatalogValidation`] naming the offending path. No partial catalog
//! is ever returned.

use crate::{
    Catalog, Error, ItemTemplate, Measurement, RegimenConfig, RegimenDefinition, RegimenMode,
    Result,
};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::{Uuid, Variant};

/// Built-in starter catalog, written out by `limber init`
pub const DEFAULT_CATALOG_YAML: &str = include_str!("../assets/default_catalog.yaml");

/// Weekday numbers run 0 (Sunday) through 6 (Saturday)
pub const WEEKDAYS: std::ops::RangeInclusive<u8> = 0..=6;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    id: Option<String>,
    name: Option<String>,
    #[serde(alias = "defaultDuration")]
    default_duration_seconds: Option<f64>,
    default_weight: Option<f64>,
    default_reps: Option<f64>,
    hold_labels: Option<Vec<String>>,
    sets: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegimen {
    label: Option<String>,
    order: Option<Vec<String>>,
    auto_week_days: Option<Vec<i64>>,
}

/// Parse and validate a catalog document
pub fn parse_catalog(text: &str) -> Result<Catalog> {
    let doc: Value = serde_yaml::from_str(text)?;

    let (raw_items, raw_regimens) = match doc {
        Value::Sequence(items) => (items, None),
        Value::Mapping(map) => split_document(map)?,
        Value::Null => return Err(Error::validation("catalog source is empty")),
        _ => {
            return Err(Error::validation(
                "catalog must be a list of items or a mapping with an `items` list",
            ))
        }
    };

    let items = parse_items(raw_items)?;
    let regimens = match raw_regimens {
        Some(value) => Some(parse_regimens(value, &items)?),
        None => None,
    };

    tracing::debug!(
        "Parsed catalog with {} items ({})",
        items.len(),
        if regimens.is_some() {
            "with regimens"
        } else {
            "no regimens"
        }
    );

    Ok(Catalog { items, regimens })
}

fn split_document(map: Mapping) -> Result<(Vec<Value>, Option<Value>)> {
    let items = match (map.get("items"), map.get("stretches")) {
        (Some(_), Some(_)) => {
            return Err(Error::validation(
                "catalog defines both `items` and `stretches`; use one",
            ))
        }
        (Some(v), None) | (None, Some(v)) => v.clone(),
        (None, None) => {
            return Err(Error::validation(
                "catalog mapping is missing an `items` list",
            ))
        }
    };

    let items = match items {
        Value::Sequence(items) => items,
        _ => return Err(Error::validation("catalog `items` must be a list")),
    };

    Ok((items, map.get("regimens").cloned()))
}

// ============================================================================
// Items
// ============================================================================

fn parse_items(raw: Vec<Value>) -> Result<Vec<ItemTemplate>> {
    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut items = Vec::with_capacity(raw.len());

    for (idx, value) in raw.into_iter().enumerate() {
        let path = format!("items[{}]", idx);
        if !value.is_mapping() {
            return Err(Error::validation(format!("{} is not a mapping", path)));
        }
        let raw: RawItem = serde_yaml::from_value(value)
            .map_err(|e| Error::validation(format!("{}: {}", path, e)))?;

        let item = validate_item(raw, &path)?;

        if !seen_ids.insert(item.id) {
            return Err(Error::validation(format!(
                "{}.id duplicates item id \"{}\"",
                path, item.id
            )));
        }
        if !seen_names.insert(item.name.clone()) {
            return Err(Error::validation(format!(
                "{}.name duplicates item name \"{}\"",
                path, item.name
            )));
        }

        items.push(item);
    }

    Ok(items)
}

fn validate_item(raw: RawItem, path: &str) -> Result<ItemTemplate> {
    let id_text = raw
        .id
        .ok_or_else(|| Error::validation(format!("{}.id is missing", path)))?;
    let id = parse_item_id(&id_text).ok_or_else(|| {
        Error::validation(format!(
            "{}.id \"{}\" is not a valid UUID",
            path,
            id_text.trim()
        ))
    })?;

    let name = raw.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(Error::validation(format!(
            "{}.name must be a non-empty string",
            path
        )));
    }

    let default = parse_default(
        raw.default_duration_seconds,
        raw.default_weight,
        raw.default_reps,
        name,
    )?;

    if raw.sets == Some(0) {
        return Err(Error::validation(format!(
            "item \"{}\" sets must be at least 1",
            name
        )));
    }

    Ok(ItemTemplate {
        id,
        name: name.to_string(),
        default,
        hold_labels: normalize_labels(raw.hold_labels),
        sets: raw.sets,
    })
}

fn parse_default(
    duration: Option<f64>,
    weight: Option<f64>,
    reps: Option<f64>,
    name: &str,
) -> Result<Measurement> {
    match (duration, weight, reps) {
        (Some(seconds), None, None) => {
            let seconds = finite(seconds, name, "defaultDurationSeconds")?;
            Ok(Measurement::duration(non_negative_int(seconds)))
        }
        (None, Some(weight), Some(reps)) => {
            let weight = finite(weight, name, "defaultWeight")?;
            let reps = finite(reps, name, "defaultReps")?;
            Ok(Measurement::load(weight.max(0.0), non_negative_int(reps)))
        }
        (Some(_), _, _) => Err(Error::validation(format!(
            "item \"{}\" defines both defaultDurationSeconds and defaultWeight/defaultReps",
            name
        ))),
        (None, Some(_), None) | (None, None, Some(_)) => Err(Error::validation(format!(
            "item \"{}\" needs both defaultWeight and defaultReps",
            name
        ))),
        (None, None, None) => Err(Error::validation(format!(
            "item \"{}\" is missing a numeric defaultDurationSeconds (or defaultWeight and defaultReps)",
            name
        ))),
    }
}

fn finite(value: f64, name: &str, field: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::validation(format!(
            "item \"{}\" {} must be a finite number",
            name, field
        )))
    }
}

/// Round, then clamp at zero. `as` saturates at the top end.
fn non_negative_int(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

fn normalize_labels(labels: Option<Vec<String>>) -> Option<Vec<String>> {
    let cleaned: Vec<String> = labels?
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Parse an item id: hyphenated 8-4-4-4-12 hex, version 1-5, RFC 4122 variant
pub fn parse_item_id(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    // 36 characters rules out the simple, braced and urn forms
    if raw.len() != 36 {
        return None;
    }
    let id = Uuid::try_parse(raw).ok()?;
    let version_ok = (1..=5).contains(&id.get_version_num());
    let variant_ok = id.get_variant() == Variant::RFC4122;
    (version_ok && variant_ok).then_some(id)
}

// ============================================================================
// Regimens
// ============================================================================

fn parse_regimens(value: Value, items: &[ItemTemplate]) -> Result<RegimenConfig> {
    let map = match value {
        Value::Mapping(map) => map,
        _ => return Err(Error::validation("regimens must be a mapping")),
    };

    let mut raw: BTreeMap<RegimenMode, Value> = BTreeMap::new();
    for (key, value) in map {
        let mode = match key.as_str() {
            Some("short") => RegimenMode::Short,
            Some("full") => RegimenMode::Full,
            _ => {
                return Err(Error::validation(format!(
                    "regimens has unrecognized key {}; mode keys must be \"short\" or \"full\"",
                    describe_key(&key)
                )))
            }
        };
        raw.insert(mode, value);
    }

    let known_ids: HashSet<Uuid> = items.iter().map(|i| i.id).collect();
    let mut parsed = BTreeMap::new();
    for mode in RegimenMode::ALL {
        let value = raw.remove(&mode).ok_or_else(|| {
            Error::validation("regimens must include both \"short\" and \"full\" entries")
        })?;
        parsed.insert(mode, parse_regimen(value, mode, &known_ids)?);
    }

    check_weekday_coverage(&parsed)?;

    let (Some(short), Some(full)) = (
        parsed.remove(&RegimenMode::Short),
        parsed.remove(&RegimenMode::Full),
    ) else {
        return Err(Error::validation(
            "regimens must include both \"short\" and \"full\" entries",
        ));
    };

    Ok(RegimenConfig { short, full })
}

fn describe_key(key: &Value) -> String {
    match key.as_str() {
        Some(s) => format!("\"{}\"", s),
        None => format!("{:?}", key),
    }
}

fn parse_regimen(
    value: Value,
    mode: RegimenMode,
    known_ids: &HashSet<Uuid>,
) -> Result<RegimenDefinition> {
    let path = format!("regimens.{}", mode);
    if !value.is_mapping() {
        return Err(Error::validation(format!("{} must be a mapping", path)));
    }
    let raw: RawRegimen = serde_yaml::from_value(value)
        .map_err(|e| Error::validation(format!("{}: {}", path, e)))?;

    let label = raw.label.as_deref().map(str::trim).unwrap_or_default();
    if label.is_empty() {
        return Err(Error::validation(format!(
            "{}.label must be a non-empty string",
            path
        )));
    }

    let order_raw = raw
        .order
        .ok_or_else(|| Error::validation(format!("{}.order must be a list", path)))?;
    if order_raw.is_empty() {
        return Err(Error::validation(format!(
            "{}.order must include at least one item",
            path
        )));
    }
    let mut order = Vec::with_capacity(order_raw.len());
    for entry in &order_raw {
        let id = parse_item_id(entry).ok_or_else(|| {
            Error::validation(format!(
                "{}.order entry \"{}\" is not a valid UUID",
                path,
                entry.trim()
            ))
        })?;
        if !known_ids.contains(&id) {
            return Err(Error::validation(format!(
                "{}.order references unknown item id \"{}\"",
                path, id
            )));
        }
        order.push(id);
    }

    let days_raw = raw.auto_week_days.ok_or_else(|| {
        Error::validation(format!(
            "{}.autoWeekDays must be a list of weekday numbers (0-6)",
            path
        ))
    })?;
    let mut auto_week_days = BTreeSet::new();
    for day in days_raw {
        let day = u8::try_from(day)
            .ok()
            .filter(|d| WEEKDAYS.contains(d))
            .ok_or_else(|| {
                Error::validation(format!(
                    "{}.autoWeekDays must only include integers from 0 to 6 (found {})",
                    path, day
                ))
            })?;
        auto_week_days.insert(day);
    }

    Ok(RegimenDefinition {
        label: label.to_string(),
        order,
        auto_week_days,
    })
}

fn check_weekday_coverage(regimens: &BTreeMap<RegimenMode, RegimenDefinition>) -> Result<()> {
    let mut assigned: BTreeMap<u8, RegimenMode> = BTreeMap::new();
    for (mode, def) in regimens {
        for &day in &def.auto_week_days {
            if let Some(existing) = assigned.insert(day, *mode) {
                return Err(Error::validation(format!(
                    "weekday {} appears in both regimens.{}.autoWeekDays and regimens.{}.autoWeekDays",
                    day, existing, mode
                )));
            }
        }
    }

    for day in WEEKDAYS {
        if !assigned.contains_key(&day) {
            return Err(Error::validation(format!(
                "weekday {} is not assigned in regimen autoWeekDays",
                day
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Lookups
// ============================================================================

impl Catalog {
    /// Parse and validate the built-in starter catalog
    pub fn builtin() -> Result<Catalog> {
        parse_catalog(DEFAULT_CATALOG_YAML)
    }

    pub fn find_by_id(&self, id: &Uuid) -> Option<&ItemTemplate> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ItemTemplate> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Display label for a logged hold, looked up by item name.
    ///
    /// Items without labels have none; items with labels fall back to
    /// `"Hold n"` past the end of their label list.
    pub fn hold_label(&self, name: &str, ordinal: u32) -> Option<String> {
        let labels = self.find_by_name(name)?.hold_labels.as_ref()?;
        Some(label_for(labels, ordinal))
    }
}

pub(crate) fn label_for(labels: &[String], ordinal: u32) -> String {
    ordinal
        .checked_sub(1)
        .and_then(|idx| labels.get(idx as usize))
        .cloned()
        .unwrap_or_else(|| format!("Hold {}", ordinal))
}
