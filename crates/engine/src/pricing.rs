use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::model::RentalItem;

// ---------------------------------------------------------------------------
// Duration price tables
// ---------------------------------------------------------------------------

/// Prices keyed by duration in minutes. On the wire the keys are strings
/// (`{"30": 1000, "60": 1800}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<String, u64>")]
pub struct DurationPriceTable(BTreeMap<u32, u64>);

impl TryFrom<HashMap<String, u64>> for DurationPriceTable {
    type Error = GridError;

    fn try_from(raw: HashMap<String, u64>) -> Result<Self, Self::Error> {
        let mut table = BTreeMap::new();
        for (key, price) in raw {
            let mins: u32 = key
                .trim()
                .parse()
                .map_err(|_| GridError::InvalidPriceTable(key.clone()))?;
            table.insert(mins, price);
        }
        Ok(DurationPriceTable(table))
    }
}

impl FromIterator<(u32, u64)> for DurationPriceTable {
    fn from_iter<I: IntoIterator<Item = (u32, u64)>>(iter: I) -> Self {
        DurationPriceTable(iter.into_iter().collect())
    }
}

impl DurationPriceTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Price for a booking of `duration_mins`.
    ///
    /// Exact key if configured; otherwise the nearest configured duration not
    /// exceeding it; below every key, the smallest. `None` for an empty table.
    pub fn lookup(&self, duration_mins: u32) -> Option<u64> {
        self.0
            .range(..=duration_mins)
            .next_back()
            .or_else(|| self.0.iter().next())
            .map(|(_, price)| *price)
    }
}

/// Externally configured prices for courts and rentable items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingCatalog {
    #[serde(default)]
    pub resources: HashMap<String, DurationPriceTable>,
    #[serde(default)]
    pub rental_items: HashMap<String, DurationPriceTable>,
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuoteSubject {
    #[serde(rename_all = "camelCase")]
    Resource { resource_id: String },
    #[serde(rename_all = "camelCase")]
    RentalItem { item_id: String, quantity: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    #[serde(flatten)]
    pub subject: QuoteSubject,
    pub amount: u64,
    /// No table was configured; `amount` is zero and a price must be entered.
    pub manual_price_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub duration_mins: u32,
    pub lines: Vec<QuoteLine>,
    pub total: u64,
    pub manual_price_required: bool,
}

impl Quote {
    /// The line charging one resource, rentals excluded.
    pub fn resource_line(&self, resource_id: &str) -> Option<&QuoteLine> {
        self.lines.iter().find(|l| {
            matches!(&l.subject, QuoteSubject::Resource { resource_id: id } if id == resource_id)
        })
    }

    pub fn rentals_total(&self) -> u64 {
        self.lines
            .iter()
            .filter(|l| matches!(l.subject, QuoteSubject::RentalItem { .. }))
            .map(|l| l.amount)
            .sum()
    }
}

/// Price every selected resource for `duration_mins`, plus rentals.
pub fn quote(
    catalog: &PricingCatalog,
    resource_ids: &[String],
    duration_mins: u32,
    rentals: &[RentalItem],
) -> Quote {
    let mut lines = Vec::with_capacity(resource_ids.len() + rentals.len());

    for resource_id in resource_ids {
        let found = catalog
            .resources
            .get(resource_id)
            .and_then(|t| t.lookup(duration_mins));
        lines.push(QuoteLine {
            subject: QuoteSubject::Resource {
                resource_id: resource_id.clone(),
            },
            amount: found.unwrap_or(0),
            manual_price_required: found.is_none(),
        });
    }

    for rental in rentals {
        let found = catalog
            .rental_items
            .get(&rental.item_id)
            .and_then(|t| t.lookup(duration_mins));
        lines.push(QuoteLine {
            subject: QuoteSubject::RentalItem {
                item_id: rental.item_id.clone(),
                quantity: rental.quantity,
            },
            amount: found.unwrap_or(0) * rental.quantity as u64,
            manual_price_required: found.is_none(),
        });
    }

    let total = lines.iter().map(|l| l.amount).sum();
    let manual_price_required = lines.iter().any(|l| l.manual_price_required);
    if manual_price_required {
        log::debug!("quote for {} mins needs a manual price", duration_mins);
    }
    Quote {
        duration_mins,
        lines,
        total,
        manual_price_required,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
