//! Terminal time tracker for freelance work. Sessions are recorded per client category, either
//! with a live timer or by hand, and turned into a priced summary or an invoice billed in
//! quarter hours.
//!

pub mod billing;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod tracker;
pub mod utils;
