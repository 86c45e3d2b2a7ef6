//! CLI command implementations.

pub mod check;
pub mod common;
pub mod inspect;
pub mod run;
pub mod units;
