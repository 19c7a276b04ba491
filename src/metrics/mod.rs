//! Derived metric calculators
//!
//! Each calculator is a pair of pure functions (per-commit and/or per-day)
//! plus a `run` stage that reads its upstream tables, derives, and replaces
//! its output tables in one transaction.

pub mod bus_factor;
pub mod density;
pub mod productivity;
pub mod project_size;
pub mod spoilage;

pub use bus_factor::{BusFactorPolicy, ContributionUnit};
