//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::{config::PasswordConfig, errors::Error};

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl From<&PasswordConfig> for Argon2Params {
    fn from(config: &PasswordConfig) -> Self {
        Self {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Hash a password with Argon2id and a fresh random salt, returning a PHC string.
pub fn hash_string_with_params(input: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.to_argon2()?;

    let hash = argon2.hash_password(input.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// Parameters are read from the hash itself. A hash that cannot be parsed never verifies.
pub fn verify_string(input: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {e}");
            return false;
        }
    };

    Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok()
}

/// Hash on the blocking pool; argon2 is deliberately slow and would stall the executor.
pub async fn hash_password(input: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_string_with_params(&input, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify on the blocking pool.
pub async fn verify_password(input: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_string(&input, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })
}

/// Check a candidate password against the configured length bounds.
pub fn validate_length(password: &str, config: &PasswordConfig) -> Result<(), Error> {
    let len = password.chars().count();
    if len < config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters long", config.min_length),
        });
    }
    if len > config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at most {} characters long", config.max_length),
        });
    }
    Ok(())
}
