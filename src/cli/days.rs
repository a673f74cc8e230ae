use anyhow::Result;
use chrono::Local;
use now::DateTimeNow;

use crate::calendar::count_days;

use super::Context;

#[derive(Debug, clap::Args)]
pub struct DaysCommand {
    #[arg(
        long = "from",
        help = "First day of the range. Defaults to the start of the current month"
    )]
    start_date: Option<String>,
    #[arg(
        long = "to",
        help = "Last day of the range, included. Defaults to the end of the current month"
    )]
    end_date: Option<String>,
}

pub fn process_days_command(command: DaysCommand, context: &Context) -> Result<()> {
    let now = Local::now();
    let start = match command.start_date {
        Some(v) => context.parse_date(&v, "start date")?,
        None => now.beginning_of_month().date_naive(),
    };
    let end = match command.end_date {
        Some(v) => context.parse_date(&v, "end date")?,
        None => now.end_of_month().date_naive(),
    };

    let count = count_days(start, end);
    println!("{} - {}", start.format("%d/%m/%Y"), end.format("%d/%m/%Y"));
    println!("Days\t\t{}", count.days);
    println!("Sundays\t\t{}", count.sundays);
    println!("Holidays\t{}", count.holidays);
    println!("Billable\t{}", count.billable);
    Ok(())
}
