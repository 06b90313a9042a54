pub mod account;
pub mod metrics;
