use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

pub const CODE_LENGTH: usize = 6;
pub const SESSION_TOKEN_LENGTH: usize = 48;

/// Human-enterable decimal code.
pub fn numeric_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Opaque alphanumeric bearer token.
pub fn opaque_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Hex SHA-256 of a secret; the only form in which codes and tokens are stored.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
