use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use tracing::warn;

use crate::tracker::entities::Category;

use super::money::Money;

/// Billing granularity.
pub const QUARTER_HOUR: Duration = Duration::seconds(15 * 60);

/// Rounds to the nearest quarter hour, halves going up. The result is always a multiple of
/// [QUARTER_HOUR] and at most 7.5 minutes away from `duration`.
pub fn round_to_quarter_hour(duration: Duration) -> Duration {
    let quarter = QUARTER_HOUR.num_seconds();
    let quarters = (duration.num_seconds() + quarter / 2).div_euclid(quarter);
    Duration::seconds(quarters * quarter)
}

/// Hourly rate of every billable category. Categories outside the table, and any
/// [Category::Unmapped] label, have no rate at all instead of a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: HashMap<Category, Money>,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            rates: HashMap::from([
                (Category::Gwen, Money::from_units(22)),
                (Category::Smartback, Money::from_units(25)),
                (Category::Jb, Money::from_units(20)),
                (Category::Admin, Money::from_units(25)),
                (Category::Compta, Money::from_units(20)),
                (Category::Factures, Money::from_units(22)),
            ]),
        }
    }
}

impl RateTable {
    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Default table with the configured overrides applied. Overrides for labels that aren't
    /// known categories are ignored.
    pub fn with_overrides(overrides: &BTreeMap<String, Money>) -> Self {
        let mut table = Self::default();
        for (label, rate) in overrides {
            match label.parse::<Category>() {
                Ok(category) => {
                    table.rates.insert(category, *rate);
                }
                Err(e) => warn!("Ignoring rate override: {e}"),
            }
        }
        table
    }

    pub fn set(&mut self, category: Category, rate: Money) -> &mut Self {
        if category.is_mapped() {
            self.rates.insert(category, rate);
        } else {
            warn!("Refusing to price unmapped category {category}");
        }
        self
    }

    pub fn rate_for(&self, category: &Category) -> Option<Money> {
        self.rates.get(category).copied()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Duration;

    use super::{round_to_quarter_hour, RateTable, QUARTER_HOUR};
    use crate::{billing::money::Money, tracker::entities::Category};

    #[test]
    fn quarter_hour_rounding_examples() {
        let cases = [
            (0, 0),
            (449, 0),
            (450, 900),
            (899, 900),
            (1349, 900),
            (1350, 1800),
            (3900, 3600),
            (3700 + 200, 3600),
            (4049, 3600),
            (4050, 4500),
        ];
        for (input, expected) in cases {
            assert_eq!(
                round_to_quarter_hour(Duration::seconds(input)),
                Duration::seconds(expected),
                "rounding {input}"
            );
        }
    }

    #[test]
    fn quarter_hour_rounding_bounds() {
        for seconds in (0..20_000).step_by(7) {
            let rounded = round_to_quarter_hour(Duration::seconds(seconds));
            assert_eq!(rounded.num_seconds() % QUARTER_HOUR.num_seconds(), 0);
            assert!((rounded.num_seconds() - seconds).abs() <= 450);
        }
    }

    #[test]
    fn unmapped_categories_have_no_rate() {
        let table = RateTable::default();
        assert_eq!(table.rate_for(&Category::Gwen), Some(Money::from_units(22)));
        assert_eq!(table.rate_for(&Category::Unmapped("acme".into())), None);

        let mut table = RateTable::empty();
        table.set(Category::Unmapped("acme".into()), Money::from_units(10));
        assert_eq!(table.rate_for(&Category::Unmapped("acme".into())), None);
    }

    #[test]
    fn overrides_apply_to_known_labels_only() {
        let overrides = BTreeMap::from([
            ("jb".to_string(), Money::from_units(40)),
            ("acme".to_string(), Money::from_units(99)),
        ]);
        let table = RateTable::with_overrides(&overrides);
        assert_eq!(table.rate_for(&Category::Jb), Some(Money::from_units(40)));
        assert_eq!(table.rate_for(&Category::Smartback), Some(Money::from_units(25)));
        assert_eq!(table.rate_for(&Category::Unmapped("acme".into())), None);
    }
}
