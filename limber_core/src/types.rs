//! Core domain types for Limber.
//!
//! This module defines the fundamental types used throughout the system:
//! - Measurements (hold durations, weight and reps)
//! - Catalog items and regimen definitions
//! - History log entries and their composite key
//! - The derived per-day session view

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Measurement Types
// ============================================================================

/// What gets recorded for one hold or set.
///
/// Serialized flattened into the owning record, so a duration shows up as a
/// `durationSeconds` field and a load as `weight` plus `reps`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Measurement {
    /// A timed hold (stretches)
    Duration {
        #[serde(rename = "durationSeconds")]
        duration_seconds: u32,
    },
    /// A weighted set (exercises)
    Load { weight: f64, reps: u32 },
}

/// Discriminant of [`Measurement`], used to match history against templates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasurementKind {
    Duration,
    Load,
}

impl Measurement {
    pub fn duration(seconds: u32) -> Self {
        Measurement::Duration {
            duration_seconds: seconds,
        }
    }

    pub fn load(weight: f64, reps: u32) -> Self {
        Measurement::Load { weight, reps }
    }

    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Duration { .. } => MeasurementKind::Duration,
            Measurement::Load { .. } => MeasurementKind::Load,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::Duration { duration_seconds } => write!(f, "{}s", duration_seconds),
            Measurement::Load { weight, reps } => write!(f, "{} x {}", weight, reps),
        }
    }
}

// ============================================================================
// Catalog Types
// ============================================================================

/// A stretch or exercise definition from the catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemTemplate {
    pub id: Uuid,
    pub name: String,
    pub default: Measurement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
}

/// The two regimen flavours a catalog defines
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RegimenMode {
    Short,
    Full,
}

impl RegimenMode {
    pub const ALL: [RegimenMode; 2] = [RegimenMode::Short, RegimenMode::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimenMode::Short => "short",
            RegimenMode::Full => "full",
        }
    }
}

impl fmt::Display for RegimenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A named, ordered subset of the catalog with the weekdays it auto-selects
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegimenDefinition {
    pub label: String,
    pub order: Vec<Uuid>,
    /// Weekday numbers, 0 = Sunday through 6 = Saturday
    pub auto_week_days: BTreeSet<u8>,
}

/// Both regimens. A validated config assigns every weekday to exactly one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RegimenConfig {
    pub short: RegimenDefinition,
    pub full: RegimenDefinition,
}

impl RegimenConfig {
    pub fn get(&self, mode: RegimenMode) -> &RegimenDefinition {
        match mode {
            RegimenMode::Short => &self.short,
            RegimenMode::Full => &self.full,
        }
    }
}

/// The validated catalog: items in source order plus optional regimens
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    pub items: Vec<ItemTemplate>,
    pub regimens: Option<RegimenConfig>,
}

/// Opaque freshness marker for the catalog source (modification time in
/// nanoseconds since the Unix epoch). Equal tokens mean "no reparse needed".
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct VersionToken(pub u64);

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// History Types
// ============================================================================

/// One logged hold or set. Immutable once appended.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(alias = "stretch", alias = "exercise")]
    pub item: String,
    #[serde(alias = "holdNumber", alias = "setNumber")]
    pub ordinal: u32,
    #[serde(flatten)]
    pub measurement: Measurement,
    pub timestamp: String,
}

/// Composite identity of a history entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub item: String,
    pub ordinal: u32,
    pub timestamp: String,
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.item, self.ordinal, self.timestamp)
    }
}

impl HistoryEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey {
            item: self.item.clone(),
            ordinal: self.ordinal,
            timestamp: self.timestamp.clone(),
        }
    }

    pub fn matches_key(&self, key: &EntryKey) -> bool {
        self.item == key.item && self.ordinal == key.ordinal && self.timestamp == key.timestamp
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// One ordinal slot (hold or set) within today's session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub ordinal: u32,
    #[serde(flatten)]
    pub measurement: Measurement,
    pub completed: bool,
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A catalog item materialized for a given day. Never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub id: Uuid,
    pub name: String,
    pub entries: Vec<SessionEntry>,
    pub default: Measurement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_labels: Option<Vec<String>>,
}

impl SessionItem {
    pub fn completed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.completed).count()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.completed)
    }
}
