use std::fmt::{Display, Write};

use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use clap::ValueEnum;
use serde::Serialize;

use crate::tracker::entities::{duration_ser, Category};

use super::{
    aggregate::GroupedAggregate,
    format::{format_duration, DurationStyle, Locale},
    invoice::{BillingIdentity, Invoice, UnbilledReason},
    money::Money,
    pricing::{round_to_quarter_hour, RateTable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DocumentFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "txt",
            DocumentFormat::Markdown => "md",
            DocumentFormat::Json => "json",
        }
    }
}

impl Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Text => write!(f, "text"),
            DocumentFormat::Markdown => write!(f, "markdown"),
            DocumentFormat::Json => write!(f, "json"),
        }
    }
}

/// Everything printed on a document that isn't data.
struct Labels {
    summary_title: &'static str,
    invoice_title: &'static str,
    date: &'static str,
    from: &'static str,
    to: &'static str,
    category: &'static str,
    duration: &'static str,
    rate: &'static str,
    total: &'static str,
    subtotal: &'static str,
    tax: &'static str,
    grand_total: &'static str,
    unbilled: &'static str,
    per_hour: &'static str,
    no_rate: &'static str,
    zero_rate: &'static str,
    rounded_to_zero: &'static str,
}

impl Labels {
    fn for_locale(locale: Locale) -> &'static Labels {
        match locale {
            Locale::Fr => &Labels {
                summary_title: "Récapitulatif des sessions",
                invoice_title: "Facture",
                date: "Date",
                from: "Émetteur",
                to: "Destinataire",
                category: "Catégorie",
                duration: "Durée",
                rate: "Taux",
                total: "Total",
                subtotal: "Sous-total",
                tax: "TVA",
                grand_total: "Total TTC",
                unbilled: "Non facturé",
                per_hour: "/ h",
                no_rate: "pas de taux",
                zero_rate: "taux nul",
                rounded_to_zero: "moins d'un quart d'heure",
            },
            Locale::En => &Labels {
                summary_title: "Timer Sessions Report",
                invoice_title: "Invoice",
                date: "Date",
                from: "From",
                to: "To",
                category: "Category",
                duration: "Duration",
                rate: "Rate",
                total: "Total",
                subtotal: "Subtotal",
                tax: "Tax",
                grand_total: "Total due",
                unbilled: "Not billed",
                per_hour: "/ h",
                no_rate: "no rate",
                zero_rate: "zero rate",
                rounded_to_zero: "under a quarter hour",
            },
        }
    }

    fn reason(&self, reason: UnbilledReason) -> &'static str {
        match reason {
            UnbilledReason::NoRate => self.no_rate,
            UnbilledReason::ZeroRate => self.zero_rate,
            UnbilledReason::RoundedToZero => self.rounded_to_zero,
        }
    }
}

/// How money is printed.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub locale: Locale,
    pub currency: String,
}

impl RenderOptions {
    fn money(&self, value: Money) -> String {
        format!("{value}{}", self.currency)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryLine {
    pub category: Category,
    pub sessions: usize,
    #[serde(with = "duration_ser")]
    pub tracked: Duration,
    #[serde(with = "duration_ser")]
    pub billed: Duration,
    pub rate: Option<Money>,
    pub price: Option<Money>,
}

/// Per category duration summary, the lighter document next to a full invoice.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub generated_at: DateTime<Utc>,
    pub lines: Vec<SummaryLine>,
    #[serde(with = "duration_ser")]
    pub tracked: Duration,
    pub total: Money,
}

pub fn summarize(
    aggregate: &GroupedAggregate,
    rates: &RateTable,
    generated_at: DateTime<Utc>,
) -> Summary {
    let lines = aggregate
        .groups()
        .iter()
        .map(|group| {
            let billed = round_to_quarter_hour(group.total_duration);
            let rate = rates.rate_for(&group.category);
            SummaryLine {
                category: group.category.clone(),
                sessions: group.sessions.len(),
                tracked: group.total_duration,
                billed,
                rate,
                price: rate.map(|v| v.per_hour(billed)),
            }
        })
        .collect::<Vec<_>>();
    let total = lines.iter().filter_map(|v| v.price).sum();
    Summary {
        generated_at,
        lines,
        tracked: aggregate.total_duration(),
        total,
    }
}

pub fn render_summary(
    summary: &Summary,
    format: DocumentFormat,
    options: &RenderOptions,
) -> Result<String> {
    let labels = Labels::for_locale(options.locale);
    let mut out = String::new();
    match format {
        DocumentFormat::Json => return Ok(serde_json::to_string_pretty(summary)?),
        DocumentFormat::Text => {
            writeln!(out, "{}", labels.summary_title)?;
            writeln!(out, "{}", "=".repeat(labels.summary_title.chars().count()))?;
            writeln!(out, "{}: {}", labels.date, local_date(summary.generated_at))?;
            for line in &summary.lines {
                writeln!(out)?;
                match line.rate {
                    Some(rate) => writeln!(
                        out,
                        "{}  ({}{})",
                        line.category,
                        options.money(rate),
                        labels.per_hour
                    )?,
                    None => writeln!(out, "{}  ({})", line.category, labels.no_rate)?,
                }
                writeln!(
                    out,
                    "  {}: {}",
                    labels.duration,
                    format_duration(line.billed, DurationStyle::Quarters, options.locale)
                )?;
                if let Some(price) = line.price {
                    writeln!(out, "  {}: {}", labels.total, options.money(price))?;
                }
            }
            writeln!(out)?;
            writeln!(out, "{}: {}", labels.total, options.money(summary.total))?;
        }
        DocumentFormat::Markdown => {
            writeln!(out, "# {}", labels.summary_title)?;
            writeln!(out)?;
            writeln!(out, "{}: {}", labels.date, local_date(summary.generated_at))?;
            writeln!(out)?;
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                labels.category, labels.duration, labels.rate, labels.total
            )?;
            writeln!(out, "|---|---|---:|---:|")?;
            for line in &summary.lines {
                writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    line.category,
                    format_duration(line.billed, DurationStyle::Quarters, options.locale),
                    line.rate
                        .map(|v| format!("{}{}", options.money(v), labels.per_hour))
                        .unwrap_or_else(|| labels.no_rate.to_string()),
                    line.price.map(|v| options.money(v)).unwrap_or_default(),
                )?;
            }
            writeln!(out)?;
            writeln!(out, "**{}: {}**", labels.total, options.money(summary.total))?;
        }
    }
    Ok(out)
}

pub fn render_invoice(
    invoice: &Invoice,
    format: DocumentFormat,
    options: &RenderOptions,
) -> Result<String> {
    let labels = Labels::for_locale(options.locale);
    let mut out = String::new();
    match format {
        DocumentFormat::Json => return Ok(serde_json::to_string_pretty(invoice)?),
        DocumentFormat::Text => {
            writeln!(out, "{} {}", labels.invoice_title, invoice.number)?;
            writeln!(out, "{}: {}", labels.date, local_date(invoice.issued_at))?;
            writeln!(out)?;
            write_identity(&mut out, labels.from, &invoice.sender, "")?;
            writeln!(out)?;
            write_identity(&mut out, labels.to, &invoice.recipient, "")?;
            writeln!(out)?;
            for line in &invoice.lines {
                writeln!(
                    out,
                    "{:<12} {:>10} x {:>10}{} = {:>10}",
                    line.category.label(),
                    format_duration(line.billed, DurationStyle::Quarters, options.locale),
                    options.money(line.rate),
                    labels.per_hour,
                    options.money(line.price),
                )?;
            }
            writeln!(out)?;
            writeln!(out, "{:<12} {:>10}", labels.subtotal, options.money(invoice.subtotal))?;
            writeln!(
                out,
                "{:<12} {:>10}",
                format!("{} {}", labels.tax, invoice.tax_rate),
                options.money(invoice.tax)
            )?;
            writeln!(out, "{:<12} {:>10}", labels.grand_total, options.money(invoice.total))?;
            write_unbilled(&mut out, invoice, labels, options, "")?;
            if let Some(footer) = &invoice.footer {
                writeln!(out)?;
                writeln!(out, "{footer}")?;
            }
        }
        DocumentFormat::Markdown => {
            writeln!(out, "# {} {}", labels.invoice_title, invoice.number)?;
            writeln!(out)?;
            writeln!(out, "{}: {}", labels.date, local_date(invoice.issued_at))?;
            writeln!(out)?;
            write_identity(&mut out, labels.from, &invoice.sender, "> ")?;
            writeln!(out)?;
            write_identity(&mut out, labels.to, &invoice.recipient, "> ")?;
            writeln!(out)?;
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                labels.category, labels.duration, labels.rate, labels.total
            )?;
            writeln!(out, "|---|---|---:|---:|")?;
            for line in &invoice.lines {
                writeln!(
                    out,
                    "| {} | {} | {}{} | {} |",
                    line.category,
                    format_duration(line.billed, DurationStyle::Quarters, options.locale),
                    options.money(line.rate),
                    labels.per_hour,
                    options.money(line.price),
                )?;
            }
            writeln!(out, "| {} | | | {} |", labels.subtotal, options.money(invoice.subtotal))?;
            writeln!(
                out,
                "| {} {} | | | {} |",
                labels.tax,
                invoice.tax_rate,
                options.money(invoice.tax)
            )?;
            writeln!(
                out,
                "| **{}** | | | **{}** |",
                labels.grand_total,
                options.money(invoice.total)
            )?;
            write_unbilled(&mut out, invoice, labels, options, "- ")?;
            if let Some(footer) = &invoice.footer {
                writeln!(out)?;
                writeln!(out, "_{footer}_")?;
            }
        }
    }
    Ok(out)
}

fn write_identity(
    out: &mut String,
    title: &str,
    identity: &BillingIdentity,
    prefix: &str,
) -> std::fmt::Result {
    writeln!(out, "{prefix}{title}:")?;
    writeln!(out, "{prefix}{}", identity.name)?;
    for line in &identity.address {
        writeln!(out, "{prefix}{line}")?;
    }
    if let Some(email) = &identity.email {
        writeln!(out, "{prefix}{email}")?;
    }
    if let Some(registration) = &identity.registration {
        writeln!(out, "{prefix}{registration}")?;
    }
    Ok(())
}

fn write_unbilled(
    out: &mut String,
    invoice: &Invoice,
    labels: &Labels,
    options: &RenderOptions,
    prefix: &str,
) -> std::fmt::Result {
    if invoice.unbilled.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "{}:", labels.unbilled)?;
    for item in &invoice.unbilled {
        writeln!(
            out,
            "{prefix}{} {} ({})",
            item.category,
            format_duration(item.tracked, DurationStyle::Long, options.locale),
            labels.reason(item.reason)
        )?;
    }
    Ok(())
}

fn local_date(value: DateTime<Utc>) -> String {
    value.with_timezone(&Local).format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{render_invoice, render_summary, summarize, DocumentFormat, RenderOptions};
    use crate::{
        billing::{
            aggregate::group,
            format::Locale,
            invoice::{build_invoice, BillingIdentity, InvoiceNumber, InvoiceSettings},
            money::Money,
            pricing::RateTable,
        },
        tracker::entities::{Category, Session, SessionId},
    };

    fn sessions() -> Vec<Session> {
        let start = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap();
        [
            ("a", Category::Gwen, 3700),
            ("b", Category::Gwen, 200),
            ("c", Category::Unmapped("acme".into()), 1800),
        ]
        .into_iter()
        .map(|(id, category, seconds)| {
            Session::from_span(
                SessionId::from(id),
                category,
                start,
                start + Duration::seconds(seconds),
            )
            .unwrap()
        })
        .collect()
    }

    fn options(locale: Locale) -> RenderOptions {
        RenderOptions {
            locale,
            currency: "€".into(),
        }
    }

    #[test]
    fn summary_text() {
        let sessions = sessions();
        let summary = summarize(&group(&sessions), &RateTable::default(), Utc::now());
        assert_eq!(summary.total, Money::from_units(22));
        let text = render_summary(&summary, DocumentFormat::Text, &options(Locale::En)).unwrap();
        assert!(text.starts_with("Timer Sessions Report\n"));
        assert!(text.contains("gwen  (22.00€/ h)"));
        assert!(text.contains("  Duration: 1h\n"));
        assert!(text.contains("  Total: 22.00€\n"));
        assert!(text.contains("acme  (no rate)"));
    }

    #[test]
    fn invoice_text_and_markdown() {
        let sessions = sessions();
        let settings = InvoiceSettings {
            sender: BillingIdentity {
                name: "Jane Doe".into(),
                address: vec!["1 rue de la Paix".into(), "75002 Paris".into()],
                ..Default::default()
            },
            recipient: BillingIdentity {
                name: "Gwen SARL".into(),
                ..Default::default()
            },
            footer: Some("TVA non applicable".into()),
            ..Default::default()
        };
        let number = InvoiceNumber::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 7);
        let invoice = build_invoice(&group(&sessions), &settings, number, Utc::now());

        let text = render_invoice(&invoice, DocumentFormat::Text, &options(Locale::Fr)).unwrap();
        assert!(text.starts_with("Facture 202503-007\n"));
        assert!(text.contains("Jane Doe\n1 rue de la Paix\n75002 Paris\n"));
        assert!(text.contains("Total TTC"));
        assert!(text.contains("22.00€"));
        assert!(text.contains("acme 30 minutes (pas de taux)"));
        assert!(text.trim_end().ends_with("TVA non applicable"));

        let markdown =
            render_invoice(&invoice, DocumentFormat::Markdown, &options(Locale::En)).unwrap();
        assert!(markdown.contains("| gwen | 1h | 22.00€/ h | 22.00€ |"));
        assert!(markdown.contains("| **Total due** | | | **22.00€** |"));
    }

    #[test]
    fn invoice_json() {
        let sessions = sessions();
        let number = InvoiceNumber::new(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 7);
        let invoice = build_invoice(
            &group(&sessions),
            &InvoiceSettings::default(),
            number,
            Utc::now(),
        );
        let json = render_invoice(&invoice, DocumentFormat::Json, &options(Locale::En)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["number"], "202503-007");
        assert_eq!(value["lines"][0]["category"], "gwen");
        assert_eq!(value["lines"][0]["billed"], 3600);
        assert_eq!(value["total"], 22.0);
        assert_eq!(value["unbilled"][0]["reason"], "no_rate");
    }
}
