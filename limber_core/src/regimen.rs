//! Regimen resolution.
//!
//! Maps a weekday to the regimen that claims it, and narrows the catalog to
//! that regimen's item order.

use crate::{Catalog, Error, ItemTemplate, RegimenConfig, RegimenDefinition, RegimenMode, Result};
use std::fmt;
use std::str::FromStr;

/// How to pick the items for a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Selection {
    /// Use whichever regimen claims the weekday; the whole catalog if there
    /// are no regimens
    #[default]
    Auto,
    /// Force a specific regimen
    Mode(RegimenMode),
    /// Every catalog item in catalog order
    All,
}

impl FromStr for Selection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Selection::Auto),
            "short" => Ok(Selection::Mode(RegimenMode::Short)),
            "full" => Ok(Selection::Mode(RegimenMode::Full)),
            "all" => Ok(Selection::All),
            other => Err(Error::Config(format!(
                "unknown regimen selection \"{}\" (expected auto, short, full or all)",
                other
            ))),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Auto => f.write_str("auto"),
            Selection::Mode(mode) => write!(f, "{}", mode),
            Selection::All => f.write_str("all"),
        }
    }
}

/// The ordered item list for one session
#[derive(Clone, Debug)]
pub struct SelectedItems {
    /// Regimen in effect, if any
    pub mode: Option<RegimenMode>,
    pub label: Option<String>,
    pub items: Vec<ItemTemplate>,
}

/// Find the regimen whose `auto_week_days` contains `weekday` (0 = Sunday).
///
/// Cannot fail for a config produced by the catalog parser. Hand-built or
/// out-of-range input yields [`Error::NotAssigned`].
pub fn resolve_for_day(
    config: &RegimenConfig,
    weekday: u8,
) -> Result<(RegimenMode, &RegimenDefinition)> {
    RegimenMode::ALL
        .into_iter()
        .map(|mode| (mode, config.get(mode)))
        .find(|(_, def)| def.auto_week_days.contains(&weekday))
        .ok_or(Error::NotAssigned(weekday))
}

/// Catalog items in the regimen's order
pub fn ordered_items(catalog: &Catalog, regimen: &RegimenDefinition) -> Result<Vec<ItemTemplate>> {
    regimen
        .order
        .iter()
        .map(|id| {
            catalog.find_by_id(id).cloned().ok_or_else(|| {
                Error::CatalogValidation(format!(
                    "regimen \"{}\" references unknown item id \"{}\"",
                    regimen.label, id
                ))
            })
        })
        .collect()
}

/// Resolve a [`Selection`] against a catalog for the given weekday
pub fn select_items(catalog: &Catalog, selection: Selection, weekday: u8) -> Result<SelectedItems> {
    let regimens = match (selection, catalog.regimens.as_ref()) {
        (Selection::All, _) => return Ok(all_items(catalog)),
        (Selection::Auto, None) => {
            tracing::debug!("Catalog has no regimens, using every item");
            return Ok(all_items(catalog));
        }
        (Selection::Mode(mode), None) => {
            return Err(Error::Config(format!(
                "regimen \"{}\" requested but the catalog defines no regimens",
                mode
            )))
        }
        (_, Some(regimens)) => regimens,
    };

    let (mode, def) = match selection {
        Selection::Mode(mode) => (mode, regimens.get(mode)),
        _ => resolve_for_day(regimens, weekday)?,
    };

    tracing::debug!("Selected {} regimen \"{}\" for weekday {}", mode, def.label, weekday);

    Ok(SelectedItems {
        mode: Some(mode),
        label: Some(def.label.clone()),
        items: ordered_items(catalog, def)?,
    })
}

/// Every item in catalog order. Used for `all`, and as the compatibility
/// path for bare item-list catalogs that define no regimens.
fn all_items(catalog: &Catalog) -> SelectedItems {
    SelectedItems {
        mode: None,
        label: None,
        items: catalog.items.clone(),
    }
}
