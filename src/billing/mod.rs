//! Turns recorded sessions into something that can be billed.
//!  - [aggregate] groups sessions per category.
//!  - [pricing] rounds durations to quarter hours and applies hourly rates.
//!  - [invoice] assembles line items, totals and billing identities.
//!  - [render] writes summaries and invoices as text, markdown or json.

pub mod aggregate;
pub mod format;
pub mod invoice;
pub mod money;
pub mod pricing;
pub mod render;
