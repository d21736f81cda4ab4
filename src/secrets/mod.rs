// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signing Key Loader
//!
//! Loads the JWKS key-set file that every token-verifying component shares.
//!
//! ## Behaviour by environment
//!
//! - `testing` (and custom environments with the testing profile): skipped,
//!   no file is touched and verification is disabled
//! - every other environment: the file must exist and be valid UTF-8 JWKS,
//!   otherwise startup aborts with the resolved path in the diagnostic

pub mod error;
pub mod jwks;

use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::config::{EnvVars, DEFAULT_JWKS_KEYPAIR_FILE, JWKS_KEYPAIR_FILE_ENV};
use crate::environment::{CustomProfile, Environment};

pub use error::SigningKeyError;
pub use jwks::{SigningKeys, VerificationKey};

/// Resolve the key-set file path under the working directory.
///
/// The file name is always appended to `working_dir`, even when it starts
/// with a root: `/etc/keys.jwks` resolves to `<working_dir>/etc/keys.jwks`.
pub fn resolve_key_path(working_dir: &Path, file_override: Option<&str>) -> PathBuf {
    let name = Path::new(file_override.unwrap_or(DEFAULT_JWKS_KEYPAIR_FILE));
    let relative: PathBuf = name
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    working_dir.join(relative)
}

/// Load the signing key registry for `environment`.
///
/// Returns `Ok(None)` when the environment does not use signing keys.
pub fn load(
    environment: &Environment,
    working_dir: &Path,
    vars: &EnvVars,
) -> Result<Option<SigningKeys>, SigningKeyError> {
    match environment {
        Environment::Testing
        | Environment::Custom {
            profile: CustomProfile::LikeTesting,
            ..
        } => Ok(None),
        Environment::Development
        | Environment::Production
        | Environment::Custom {
            profile: CustomProfile::LikeProduction,
            ..
        } => {
            let path = match vars.try_get(JWKS_KEYPAIR_FILE_ENV) {
                Ok(file_override) => resolve_key_path(working_dir, file_override),
                Err(e) => {
                    return Err(SigningKeyError::KeyPathNotUtf8 {
                        path: resolve_key_path(working_dir, Some(&e.lossy)),
                    })
                }
            };
            load_file(&path).map(Some)
        }
    }
}

/// Read and parse a JWKS file.
pub fn load_file(path: &Path) -> Result<SigningKeys, SigningKeyError> {
    let bytes = std::fs::read(path).map_err(|source| SigningKeyError::KeyFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| SigningKeyError::KeyFileNotUtf8 {
        path: path.to_path_buf(),
    })?;

    let keys = SigningKeys::from_jwks_json(&text).map_err(|e| SigningKeyError::InvalidKeySet {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    info!(path = %path.display(), keys = keys.len(), "Found JWKS.");
    Ok(keys)
}

#[cfg(test)]
pub(crate) const TEST_JWKS: &str = r#"{
        "keys": [
            {
                "kty": "RSA",
                "kid": "2011-04-29",
                "alg": "RS256",
                "use": "sig",
                "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
                "e": "AQAB"
            },
            {
                "kty": "EC",
                "kid": "1",
                "crv": "P-256",
                "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
                "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
            }
        ]
    }"#;
