use std::fmt::Display;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    tracker::entities::{duration_ser, Category},
    utils::percentage::Percentage,
};

use super::{
    aggregate::GroupedAggregate,
    money::Money,
    pricing::{round_to_quarter_hour, RateTable},
};

/// Who sends or receives an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingIdentity {
    pub name: String,
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Company registration number, printed under the address when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
}

/// `YYYYMM-NNN`. The sequence is random, two invoices issued in the same month may collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct InvoiceNumber {
    year: i32,
    month: u32,
    sequence: u16,
}

impl InvoiceNumber {
    pub fn new(date: NaiveDate, sequence: u16) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            sequence: sequence % 1000,
        }
    }

    pub fn generate(date: NaiveDate, rng: &mut impl Rng) -> Self {
        Self::new(date, rng.gen_range(0..1000))
    }
}

impl Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:02}-{:03}", self.year, self.month, self.sequence)
    }
}

impl From<InvoiceNumber> for String {
    fn from(value: InvoiceNumber) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub category: Category,
    pub sessions: usize,
    #[serde(with = "duration_ser")]
    pub tracked: Duration,
    #[serde(with = "duration_ser")]
    pub billed: Duration,
    pub rate: Money,
    pub price: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnbilledReason {
    /// The category isn't in the rate table, typically a label from older data.
    NoRate,
    ZeroRate,
    /// Less than 7.5 minutes were tracked.
    RoundedToZero,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnbilledItem {
    pub category: Category,
    #[serde(with = "duration_ser")]
    pub tracked: Duration,
    pub reason: UnbilledReason,
}

/// Fixed parts of an invoice that don't depend on the sessions.
#[derive(Debug, Clone, Default)]
pub struct InvoiceSettings {
    pub rates: RateTable,
    pub tax_rate: Percentage,
    pub sender: BillingIdentity,
    pub recipient: BillingIdentity,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub number: InvoiceNumber,
    pub issued_at: DateTime<Utc>,
    pub sender: BillingIdentity,
    pub recipient: BillingIdentity,
    pub lines: Vec<LineItem>,
    pub unbilled: Vec<UnbilledItem>,
    pub subtotal: Money,
    pub tax_rate: Percentage,
    pub tax: Money,
    pub total: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

/// Prices every group of `aggregate`. Each category is billed on its quarter hour rounded total
/// at its hourly rate; categories that would come out as zero are listed as unbilled instead.
pub fn build_invoice(
    aggregate: &GroupedAggregate,
    settings: &InvoiceSettings,
    number: InvoiceNumber,
    issued_at: DateTime<Utc>,
) -> Invoice {
    let mut lines = vec![];
    let mut unbilled = vec![];

    for group in aggregate.groups() {
        let billed = round_to_quarter_hour(group.total_duration);
        let reason = match settings.rates.rate_for(&group.category) {
            None => Some(UnbilledReason::NoRate),
            Some(rate) if rate.is_zero() => Some(UnbilledReason::ZeroRate),
            Some(_) if billed.is_zero() => Some(UnbilledReason::RoundedToZero),
            Some(rate) => {
                lines.push(LineItem {
                    category: group.category.clone(),
                    sessions: group.sessions.len(),
                    tracked: group.total_duration,
                    billed,
                    rate,
                    price: rate.per_hour(billed),
                });
                None
            }
        };
        if let Some(reason) = reason {
            unbilled.push(UnbilledItem {
                category: group.category.clone(),
                tracked: group.total_duration,
                reason,
            });
        }
    }

    let subtotal = lines.iter().map(|v| v.price).sum::<Money>();
    let tax = subtotal.percent(settings.tax_rate);

    Invoice {
        number,
        issued_at,
        sender: settings.sender.clone(),
        recipient: settings.recipient.clone(),
        lines,
        unbilled,
        subtotal,
        tax_rate: settings.tax_rate,
        tax,
        total: subtotal + tax,
        footer: settings.footer.clone(),
    }
}
