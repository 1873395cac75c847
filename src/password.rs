//! Password hashing via bcrypt.
//!
//! Hashing is CPU bound, so both operations run on the blocking pool.

/// bcrypt cost used in production.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let cost = self.cost;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| PasswordError::TaskFailed)?
            .map_err(PasswordError::Bcrypt)
    }

    /// Returns `Ok(false)` on mismatch; errors only for malformed hashes.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|_| PasswordError::TaskFailed)?
            .map_err(PasswordError::Bcrypt)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

#[derive(Debug)]
pub enum PasswordError {
    Bcrypt(bcrypt::BcryptError),
    TaskFailed,
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Bcrypt(e) => write!(f, "bcrypt: {}", e),
            PasswordError::TaskFailed => write!(f, "Password hashing task failed"),
        }
    }
}

impl std::error::Error for PasswordError {}
