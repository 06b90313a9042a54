pub mod cleanup;
pub mod delivery;
pub mod hashing;
pub mod metrics;
pub mod rate_limit;
pub mod security;
pub mod session;
pub mod tokens;
pub mod validation;
pub mod verification;
