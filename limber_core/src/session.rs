//! Session materialization.
//!
//! Merges an ordered template with the history log into today's session
//! view. Pure: the only hidden input, "today", is passed in as a
//! [`SessionDate`].

use crate::catalog::label_for;
use crate::{HistoryEntry, ItemTemplate, Measurement, MeasurementKind, SessionEntry, SessionItem};
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, Utc};

/// Sets per weighted item when the catalog gives neither `sets` nor labels
pub const DEFAULT_SETS_PER_EXERCISE: u32 = 3;

/// A calendar day as seen from a fixed UTC offset.
///
/// Timestamps are converted to `offset` before their date is compared, so the
/// day boundary is local midnight rather than a rolling 24 hour window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionDate {
    date: NaiveDate,
    offset: FixedOffset,
}

impl SessionDate {
    pub fn new(date: NaiveDate, offset: FixedOffset) -> Self {
        Self { date, offset }
    }

    pub fn utc(date: NaiveDate) -> Self {
        Self::new(date, Utc.fix())
    }

    /// Today according to the system clock and local time zone
    pub fn local_today() -> Self {
        let now = Local::now();
        Self::new(now.date_naive(), now.offset().fix())
    }

    /// Same offset, different day
    pub fn with_date(self, date: NaiveDate) -> Self {
        Self { date, ..self }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Weekday number, 0 = Sunday through 6 = Saturday
    pub fn weekday(&self) -> u8 {
        // num_days_from_sunday is always 0..=6
        self.date.weekday().num_days_from_sunday() as u8
    }

    /// Whether `timestamp` falls on this day. Unparseable timestamps never do.
    pub fn contains(&self, timestamp: &str) -> bool {
        timestamp_date(timestamp, self.offset) == Some(self.date)
    }
}

/// Parse a history timestamp.
///
/// RFC 3339 timestamps keep their own offset; zone-less ones are taken as
/// wall-clock time at `offset`.
pub fn parse_timestamp(timestamp: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let timestamp = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .and_then(|ndt| ndt.and_local_timezone(offset).single())
}

/// Calendar date of a timestamp at `offset`
pub fn timestamp_date(timestamp: &str, offset: FixedOffset) -> Option<NaiveDate> {
    parse_timestamp(timestamp, offset).map(|dt| dt.with_timezone(&offset).date_naive())
}

/// Build today's session for `template`, preserving its order
pub fn build_session(
    template: &[ItemTemplate],
    history: &[HistoryEntry],
    today: &SessionDate,
) -> Vec<SessionItem> {
    template
        .iter()
        .map(|item| build_item(item, history, today))
        .collect()
}

fn build_item(item: &ItemTemplate, history: &[HistoryEntry], today: &SessionDate) -> SessionItem {
    let default = carry_over_default(item, history);

    let entries = (1..=ordinal_count(item))
        .map(|ordinal| {
            let label = item
                .hold_labels
                .as_deref()
                .map(|labels| label_for(labels, ordinal));

            let logged_today = history.iter().find(|h| {
                h.item == item.name && h.ordinal == ordinal && today.contains(&h.timestamp)
            });

            match logged_today {
                Some(logged) => SessionEntry {
                    ordinal,
                    measurement: logged.measurement.clone(),
                    completed: true,
                    timestamp: Some(logged.timestamp.clone()),
                    label,
                },
                None => SessionEntry {
                    ordinal,
                    measurement: default.clone(),
                    completed: false,
                    timestamp: None,
                    label,
                },
            }
        })
        .collect();

    SessionItem {
        id: item.id,
        name: item.name.clone(),
        entries,
        default,
        hold_labels: item.hold_labels.clone(),
    }
}

/// Default for un-logged slots: the first history entry for this item name
/// with the same measurement kind, else the template default.
///
/// First match wins, so callers pass history newest first. `limber log`
/// refuses entries whose kind differs from the template, so the kind filter
/// only skips entries from hand-edited or imported logs, or from a catalog
/// edit that changed the item's kind.
pub fn carry_over_default(item: &ItemTemplate, history: &[HistoryEntry]) -> Measurement {
    let kind = item.default.kind();
    history
        .iter()
        .find(|h| h.item == item.name && h.measurement.kind() == kind)
        .map(|h| h.measurement.clone())
        .unwrap_or_else(|| item.default.clone())
}

/// Number of holds/sets for an item, never less than one
pub fn ordinal_count(item: &ItemTemplate) -> u32 {
    let labelled = item
        .hold_labels
        .as_ref()
        .map_or(0, |labels| u32::try_from(labels.len()).unwrap_or(u32::MAX));

    let sets = item.sets.unwrap_or(match item.default.kind() {
        MeasurementKind::Load if labelled == 0 => DEFAULT_SETS_PER_EXERCISE,
        _ => 1,
    });

    labelled.max(sets).max(1)
}
