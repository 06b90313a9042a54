use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid hashing parameters: {0}")]
    Params(argon2::Error),

    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("stored credential is malformed: {0}")]
    Malformed(argon2::password_hash::Error),
}

/// Argon2id password hashing. Each hash carries its own random salt; the
/// verifier compares in constant time.
#[derive(Clone)]
pub struct CredentialManager {
    argon2: Argon2<'static>,
}

impl CredentialManager {
    /// `memory_kib`, `iterations` and `parallelism` are the Argon2 cost knobs.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(CredentialError::Params)?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(CredentialError::Hash)?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, credential: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(credential).map_err(CredentialError::Malformed)?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

impl Default for CredentialManager {
    // m=8MB, t=2, p=1
    fn default() -> Self {
        Self {
            argon2: Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                Params::new(8192, 2, 1, None).unwrap_or_default(),
            ),
        }
    }
}
