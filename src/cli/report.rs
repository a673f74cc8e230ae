use std::path::PathBuf;

use anyhow::Result;
use clap::ValueEnum;
use rand::Rng;
use tracing::info;

use crate::{
    billing::{
        aggregate::group,
        format::Locale,
        invoice::{build_invoice, InvoiceNumber},
        render::{render_invoice, render_summary, summarize, DocumentFormat},
    },
    config::BillingConfig,
    tracker::entities::Session,
    utils::{
        clock::{Clock, DefaultClock},
        percentage::Percentage,
    },
};

use super::Context;

#[derive(Debug, clap::Args)]
pub struct ReportCommand {
    #[arg(long, help = "Language of the report. Defaults to the configured locale")]
    locale: Option<Locale>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DocumentKind {
    #[default]
    Invoice,
    Summary,
}

#[derive(Debug, clap::Args)]
pub struct ExportCommand {
    #[arg(long, default_value_t = DocumentKind::Invoice, value_enum)]
    kind: DocumentKind,
    #[arg(short, long, default_value_t = DocumentFormat::Text, value_enum)]
    format: DocumentFormat,
    #[arg(
        short,
        long,
        help = "Destination file. Defaults to invoice-<number> or timer-sessions in the current directory"
    )]
    output: Option<PathBuf>,
    #[arg(long, help = "Language of the document. Defaults to the configured locale")]
    locale: Option<Locale>,
    #[arg(
        long,
        help = "Tax applied on the invoice, for example 20%. Defaults to the configured rate"
    )]
    tax_rate: Option<Percentage>,
}

pub fn process_report_command(command: ReportCommand, context: &Context) -> Result<()> {
    let store = context.open_store()?;
    let mut options = context.config.render_options();
    if let Some(locale) = command.locale {
        options.locale = locale;
    }
    let summary = summarize(
        &group(store.sessions()),
        &context.config.rate_table(),
        DefaultClock.time(),
    );
    print!("{}", render_summary(&summary, DocumentFormat::Text, &options)?);
    Ok(())
}

pub fn process_export_command(command: ExportCommand, context: &Context) -> Result<()> {
    let store = context.open_store()?;
    let (document, default_name) = build_document(
        &command,
        store.sessions(),
        &context.config,
        &DefaultClock,
        &mut rand::thread_rng(),
    )?;

    let path = command.output.unwrap_or_else(|| {
        PathBuf::from(format!("{default_name}.{}", command.format.extension()))
    });
    std::fs::write(&path, document)?;
    info!("Exported {:?} to {}", command.kind, path.display());
    println!("Written {}", path.display());
    Ok(())
}

/// Renders the requested document and the file name it's saved under by default.
fn build_document(
    command: &ExportCommand,
    sessions: &[Session],
    config: &BillingConfig,
    clock: &dyn Clock,
    rng: &mut impl Rng,
) -> Result<(String, String)> {
    let mut options = config.render_options();
    if let Some(locale) = command.locale {
        options.locale = locale;
    }
    let aggregate = group(sessions);
    let now = clock.time();

    match command.kind {
        DocumentKind::Summary => {
            let summary = summarize(&aggregate, &config.rate_table(), now);
            Ok((
                render_summary(&summary, command.format, &options)?,
                "timer-sessions".to_string(),
            ))
        }
        DocumentKind::Invoice => {
            let number = InvoiceNumber::generate(clock.local_time().date_naive(), rng);
            let mut settings = config.invoice_settings();
            if let Some(tax_rate) = command.tax_rate {
                settings.tax_rate = tax_rate;
            }
            let invoice = build_invoice(&aggregate, &settings, number, now);
            Ok((
                render_invoice(&invoice, command.format, &options)?,
                format!("invoice-{number}"),
            ))
        }
    }
}
