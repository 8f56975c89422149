//! Credential Manager
//!
//! Derives and verifies password hashes. Records carry their own salt and
//! KDF parameters so they stay verifiable after the configured cost changes.

use crate::config::AuthConfig;
use crate::error::AuthError;

use argon2::{Argon2, Params, Version};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Shortest salt accepted for new records
pub const MIN_SALT_LENGTH: usize = 16;

/// Lowest PBKDF2-HMAC-SHA256 round count accepted for new records
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Lowest Argon2id time cost accepted for new records
pub const MIN_ARGON2_TIME_COST: u32 = 2;

/// Lowest Argon2id memory cost (KiB) accepted for new records
pub const MIN_ARGON2_MEMORY_KIB: u32 = 19_456;

/// Derived hash length in bytes
const HASH_LENGTH: usize = 32;

// ============================================
// Record Types
// ============================================

/// Password KDF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KdfAlgorithm {
    Pbkdf2Sha256,
    Argon2id,
}

impl KdfAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfAlgorithm::Pbkdf2Sha256 => "pbkdf2-sha256",
            KdfAlgorithm::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KdfAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pbkdf2-sha256" | "pbkdf2" => Ok(KdfAlgorithm::Pbkdf2Sha256),
            "argon2id" | "argon2" => Ok(KdfAlgorithm::Argon2id),
            other => Err(AuthError::Config(format!("Unknown password KDF: {}", other))),
        }
    }
}

/// KDF parameters stored alongside each hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    /// PBKDF2 rounds, or Argon2 time cost
    pub iterations: u32,
    /// Argon2 memory cost in KiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_kib: Option<u32>,
    /// Argon2 lanes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
}

impl KdfParams {
    pub fn pbkdf2_sha256(iterations: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Pbkdf2Sha256,
            iterations,
            memory_kib: None,
            parallelism: None,
        }
    }

    pub fn argon2id(time_cost: u32, memory_kib: u32, parallelism: u32) -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            iterations: time_cost,
            memory_kib: Some(memory_kib),
            parallelism: Some(parallelism),
        }
    }

    /// Parameters for new records under the given configuration
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.password_kdf {
            KdfAlgorithm::Pbkdf2Sha256 => Self::pbkdf2_sha256(config.pbkdf2_iterations),
            KdfAlgorithm::Argon2id => Self::argon2id(
                config.argon2_time_cost,
                config.argon2_memory_cost,
                config.argon2_parallelism,
            ),
        }
    }

    /// `i=100000` or `m=19456,t=2,p=1`
    fn encode(&self) -> Result<String, AuthError> {
        match self.algorithm {
            KdfAlgorithm::Pbkdf2Sha256 => Ok(format!("i={}", self.iterations)),
            KdfAlgorithm::Argon2id => {
                let (memory, lanes) = self.argon2_costs()?;
                Ok(format!("m={},t={},p={}", memory, self.iterations, lanes))
            }
        }
    }

    fn decode(algorithm: KdfAlgorithm, encoded: &str) -> Result<Self, AuthError> {
        let mut iterations = None;
        let mut memory_kib = None;
        let mut parallelism = None;

        for pair in encoded.split(',') {
            let (key, value) = pair.split_once('=').ok_or(AuthError::InvalidRecord)?;
            let value: u32 = value.parse().map_err(|_| AuthError::InvalidRecord)?;
            match (algorithm, key) {
                (KdfAlgorithm::Pbkdf2Sha256, "i") | (KdfAlgorithm::Argon2id, "t") => {
                    iterations = Some(value)
                }
                (KdfAlgorithm::Argon2id, "m") => memory_kib = Some(value),
                (KdfAlgorithm::Argon2id, "p") => parallelism = Some(value),
                _ => return Err(AuthError::InvalidRecord),
            }
        }

        let params = Self {
            algorithm,
            iterations: iterations.ok_or(AuthError::InvalidRecord)?,
            memory_kib,
            parallelism,
        };
        params.check()?;
        Ok(params)
    }

    fn argon2_costs(&self) -> Result<(u32, u32), AuthError> {
        match (self.memory_kib, self.parallelism) {
            (Some(memory), Some(lanes)) => Ok((memory, lanes)),
            _ => Err(AuthError::InvalidRecord),
        }
    }

    /// Structural check: enough to run the KDF, says nothing about strength
    fn check(&self) -> Result<(), AuthError> {
        if self.iterations == 0 {
            return Err(AuthError::InvalidRecord);
        }
        if self.algorithm == KdfAlgorithm::Argon2id {
            self.argon2_costs()?;
        }
        Ok(())
    }
}

/// Stored credential for one identity
///
/// Replaced wholesale (fresh salt) on password change; never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub identity: String,
    #[serde(with = "hex::serde")]
    pub salt: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub derived_hash: Vec<u8>,
    pub kdf_params: KdfParams,
}

impl CredentialRecord {
    /// Single-column storage form: `<algorithm>$<params>$<salt-hex>$<hash-hex>`
    pub fn encode(&self) -> Result<String, AuthError> {
        self.check()?;
        Ok(format!(
            "{}${}${}${}",
            self.kdf_params.algorithm,
            self.kdf_params.encode()?,
            hex::encode(&self.salt),
            hex::encode(&self.derived_hash)
        ))
    }

    /// Rebuild a record from [`encode`](Self::encode) output
    pub fn decode(identity: impl Into<String>, encoded: &str) -> Result<Self, AuthError> {
        let mut parts = encoded.split('$');
        let (Some(algorithm), Some(params), Some(salt), Some(hash), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(AuthError::InvalidRecord);
        };

        let algorithm: KdfAlgorithm = algorithm.parse().map_err(|_| AuthError::InvalidRecord)?;
        let record = Self {
            identity: identity.into(),
            salt: hex::decode(salt).map_err(|_| AuthError::InvalidRecord)?,
            derived_hash: hex::decode(hash).map_err(|_| AuthError::InvalidRecord)?,
            kdf_params: KdfParams::decode(algorithm, params)?,
        };
        record.check()?;
        Ok(record)
    }

    fn check(&self) -> Result<(), AuthError> {
        if self.salt.len() < MIN_SALT_LENGTH || self.derived_hash.len() < HASH_LENGTH {
            return Err(AuthError::InvalidRecord);
        }
        self.kdf_params.check()
    }
}

// ============================================
// Credential Manager
// ============================================

/// Hashes new passwords and verifies presented ones
pub struct CredentialManager {
    params: KdfParams,
    salt_length: usize,
}

impl CredentialManager {
    /// Create a credential manager from validated configuration
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        Ok(Self {
            params: KdfParams::from_config(config),
            salt_length: config.salt_length,
        })
    }

    /// Parameters new records are created with
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Hash a password under a freshly generated salt
    pub fn hash(&self, identity: &str, password: &str) -> Result<CredentialRecord, AuthError> {
        let mut salt = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut salt);

        let mut derived_hash = vec![0u8; HASH_LENGTH];
        derive(password.as_bytes(), &salt, &self.params, &mut derived_hash).map_err(|e| {
            tracing::error!("Password hashing error: {:?}", e);
            AuthError::Internal
        })?;

        Ok(CredentialRecord {
            identity: identity.to_string(),
            salt,
            derived_hash,
            kdf_params: self.params.clone(),
        })
    }

    /// Verify a password against a stored record
    ///
    /// A wrong password is `Ok(false)`; only a malformed record is an error.
    pub fn verify(&self, password: &str, record: &CredentialRecord) -> Result<bool, AuthError> {
        record.check()?;

        let mut computed = vec![0u8; record.derived_hash.len()];
        derive(password.as_bytes(), &record.salt, &record.kdf_params, &mut computed).map_err(
            |e| {
                tracing::error!(identity = %record.identity, "Stored KDF parameters rejected: {:?}", e);
                AuthError::InvalidRecord
            },
        )?;

        Ok(computed.ct_eq(&record.derived_hash).into())
    }

    /// Spend one KDF computation without a record to compare against
    ///
    /// Used for unknown identities so login latency does not reveal which
    /// identities exist.
    pub fn burn_verification(&self, password: &str) {
        let salt = vec![0u8; self.salt_length];
        let mut scratch = vec![0u8; HASH_LENGTH];
        if let Err(e) = derive(password.as_bytes(), &salt, &self.params, &mut scratch) {
            tracing::debug!("Dummy verification failed: {:?}", e);
        }
    }

    /// Whether a record was made with weaker or different settings than today's
    pub fn needs_rehash(&self, record: &CredentialRecord) -> bool {
        let stored = &record.kdf_params;
        if stored.algorithm != self.params.algorithm || stored.iterations < self.params.iterations
        {
            return true;
        }
        if record.salt.len() < self.salt_length {
            return true;
        }
        match self.params.algorithm {
            KdfAlgorithm::Pbkdf2Sha256 => false,
            KdfAlgorithm::Argon2id => {
                stored.memory_kib < self.params.memory_kib
                    || stored.parallelism != self.params.parallelism
            }
        }
    }
}

fn derive(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
    out: &mut [u8],
) -> Result<(), argon2::Error> {
    match params.algorithm {
        KdfAlgorithm::Pbkdf2Sha256 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, params.iterations, out);
            Ok(())
        }
        KdfAlgorithm::Argon2id => {
            let memory = params.memory_kib.ok_or(argon2::Error::MemoryTooLittle)?;
            let lanes = params.parallelism.ok_or(argon2::Error::ThreadsTooFew)?;
            let argon2_params = Params::new(memory, params.iterations, lanes, None)?;
            Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(password, salt, out)
        }
    }
}
