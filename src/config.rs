use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    billing::{
        format::Locale,
        invoice::{BillingIdentity, InvoiceSettings},
        money::Money,
        pricing::RateTable,
        render::RenderOptions,
    },
    utils::percentage::Percentage,
};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Billing configuration loaded from `<app dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Language of reports and of the timer output.
    pub locale: Locale,
    /// Symbol appended to every amount.
    pub currency: String,
    /// Tax applied on the invoice subtotal.
    pub tax_rate: Percentage,
    /// Free text printed at the bottom of invoices.
    pub footer: Option<String>,
    pub sender: BillingIdentity,
    pub recipient: BillingIdentity,
    /// Hourly rate overrides keyed by category label, e.g. `gwen = 30`.
    pub rates: BTreeMap<String, Money>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            locale: Locale::Fr,
            currency: "€".into(),
            tax_rate: Percentage::ZERO,
            footer: Some("TVA non applicable, art. 293 B du CGI".into()),
            sender: BillingIdentity {
                name: "Your name".into(),
                address: vec!["Street".into(), "Postcode City".into()],
                email: None,
                registration: None,
            },
            recipient: BillingIdentity {
                name: "Client".into(),
                address: vec![],
                email: None,
                registration: None,
            },
            rates: BTreeMap::new(),
        }
    }
}

impl BillingConfig {
    pub fn rate_table(&self) -> RateTable {
        RateTable::with_overrides(&self.rates)
    }

    pub fn invoice_settings(&self) -> InvoiceSettings {
        InvoiceSettings {
            rates: self.rate_table(),
            tax_rate: self.tax_rate,
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            footer: self.footer.clone(),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            locale: self.locale,
            currency: self.currency.clone(),
        }
    }
}

pub fn config_path(app_dir: &Path) -> PathBuf {
    app_dir.join(CONFIG_FILE_NAME)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init(app_dir: &Path) -> Result<BillingConfig> {
    let path = config_path(app_dir);
    if !path.exists() {
        let default_cfg = BillingConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        fs::create_dir_all(app_dir)?;
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: BillingConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::tracker::entities::Category;

    #[test]
    fn default_config_is_written_and_read_back() {
        let dir = tempdir().unwrap();
        let created = load_or_init(dir.path()).unwrap();
        assert!(config_path(dir.path()).exists());
        let loaded = load_or_init(dir.path()).unwrap();
        assert_eq!(loaded.currency, created.currency);
        assert_eq!(loaded.sender, created.sender);
        assert_eq!(loaded.locale, Locale::Fr);
        assert!(loaded.tax_rate.is_zero());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            locale = "en"
            currency = "$"
            tax_rate = 20

            [sender]
            name = "Jane Doe"
            address = ["1 Main St"]
            registration = "SIRET 123"

            [recipient]
            name = "Smartback"

            [rates]
            smartback = 32.5
        "#;
        let cfg: BillingConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.locale, Locale::En);
        assert_eq!(*cfg.tax_rate, 20.);
        assert_eq!(cfg.sender.registration.as_deref(), Some("SIRET 123"));
        assert!(cfg.recipient.address.is_empty());
        assert_eq!(
            cfg.rate_table().rate_for(&Category::Smartback),
            Some(Money::from_cents(3250))
        );
        assert_eq!(
            cfg.rate_table().rate_for(&Category::Gwen),
            Some(Money::from_units(22))
        );
        // untouched fields keep their defaults
        assert!(cfg.footer.is_some());
    }

    #[test]
    fn negative_tax_rate_is_rejected() {
        assert!(toml::from_str::<BillingConfig>("tax_rate = -5").is_err());
    }
}
