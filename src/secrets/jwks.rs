// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) parsing into a verification key registry.
//!
//! ## Security
//!
//! - Keys are loaded once at startup and never refreshed
//! - Keys are looked up by the token header's `kid`
//! - Tokens without a `kid` are only accepted when the set has exactly one
//!   key without a `kid`

use std::collections::HashMap;
use std::fmt;

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::error::SigningKeyError;

/// A single verification key and the algorithm it verifies.
#[derive(Clone)]
pub struct VerificationKey {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl VerificationKey {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// Read-only registry of verification keys, keyed by key id.
#[derive(Clone, Default)]
pub struct SigningKeys {
    by_kid: HashMap<String, VerificationKey>,
    unnamed: Vec<VerificationKey>,
}

impl SigningKeys {
    /// Parse a JWKS document.
    ///
    /// Keys of unsupported types are skipped with a warning. A set without
    /// any usable key is an error.
    pub fn from_jwks_json(json: &str) -> Result<Self, SigningKeyError> {
        let set: JwkSet =
            serde_json::from_str(json).map_err(|e| SigningKeyError::Malformed(e.to_string()))?;

        let mut keys = Self::default();
        for jwk in &set.keys {
            let kid = jwk.common.key_id.clone();
            match jwk_to_verification_key(jwk) {
                Ok(key) => match kid {
                    Some(kid) => {
                        keys.by_kid.insert(kid, key);
                    }
                    None => keys.unnamed.push(key),
                },
                Err(e) => {
                    warn!(kid = ?kid, error = %e, "Skipping unusable JWKS entry");
                }
            }
        }

        if keys.is_empty() {
            return Err(SigningKeyError::NoUsableKeys);
        }
        Ok(keys)
    }

    pub fn len(&self) -> usize {
        self.by_kid.len() + self.unnamed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.by_kid.get(kid)
    }

    /// Key ids present in the set, sorted.
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_kid.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Verify a token's signature and expiry and return its claims.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, SigningKeyError> {
        let header =
            decode_header(token).map_err(|e| SigningKeyError::MalformedToken(e.to_string()))?;

        let key = match header.kid.as_deref() {
            Some(kid) => self.get(kid),
            None => match self.unnamed.as_slice() {
                [only] => Some(only),
                _ => None,
            },
        }
        .ok_or(SigningKeyError::NoMatchingKey)?;

        let mut validation = Validation::new(key.algorithm);
        validation.validate_aud = false;

        decode::<C>(token, &key.key, &validation)
            .map(|data| data.claims)
            .map_err(|e| SigningKeyError::Verification(e.to_string()))
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("key_ids", &self.key_ids())
            .field("unnamed", &self.unnamed.len())
            .finish()
    }
}

/// Convert a JWK to a verification key.
fn jwk_to_verification_key(jwk: &Jwk) -> Result<VerificationKey, SigningKeyError> {
    let declared = jwk.common.key_algorithm;
    let invalid = |e: jsonwebtoken::errors::Error| SigningKeyError::Malformed(e.to_string());

    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(invalid)?;
            let algorithm = match declared {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                Some(KeyAlgorithm::PS384) => Algorithm::PS384,
                Some(KeyAlgorithm::PS512) => Algorithm::PS512,
                _ => Algorithm::RS256,
            };
            Ok(VerificationKey { key, algorithm })
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(invalid)?;
            let algorithm = match (declared, &ec.curve) {
                (Some(KeyAlgorithm::ES384), _) | (None, EllipticCurve::P384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok(VerificationKey { key, algorithm })
        }
        AlgorithmParameters::OctetKeyPair(okp) => {
            let key = DecodingKey::from_ed_components(&okp.x).map_err(invalid)?;
            Ok(VerificationKey {
                key,
                algorithm: Algorithm::EdDSA,
            })
        }
        AlgorithmParameters::OctetKey(oct) => {
            let key = DecodingKey::from_base64_secret(&oct.value).map_err(invalid)?;
            let algorithm = match declared {
                Some(KeyAlgorithm::HS384) => Algorithm::HS384,
                Some(KeyAlgorithm::HS512) => Algorithm::HS512,
                _ => Algorithm::HS256,
            };
            Ok(VerificationKey { key, algorithm })
        }
    }
}
