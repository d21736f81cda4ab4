// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing key errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningKeyError {
    /// The key-set file is missing or could not be read.
    #[error("Failed to load JWKS Keypair file at: {}", path.display())]
    KeyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `JWKS_KEYPAIR_FILE` is set to a value that is not UTF-8. The path
    /// is shown lossily decoded.
    #[error("Failed to load JWKS Keypair file at: {} (path is not valid UTF-8)", path.display())]
    KeyPathNotUtf8 { path: PathBuf },

    /// The key-set file is not UTF-8 text.
    #[error("Failed to load JWKS Keypair file at: {} (not valid UTF-8)", path.display())]
    KeyFileNotUtf8 { path: PathBuf },

    /// The key-set file is not a usable JWKS.
    #[error("Invalid JWKS in {}: {reason}", path.display())]
    InvalidKeySet { path: PathBuf, reason: String },

    /// JWKS JSON could not be parsed.
    #[error("Malformed JWKS: {0}")]
    Malformed(String),

    /// The key set contains no key this server can verify with.
    #[error("JWKS contains no usable verification keys")]
    NoUsableKeys,

    /// A token header could not be decoded.
    #[error("Token is malformed: {0}")]
    MalformedToken(String),

    /// No key matches the token's key id.
    #[error("No matching key found in JWKS")]
    NoMatchingKey,

    /// Signature, expiry or claim validation failed.
    #[error("Token verification failed: {0}")]
    Verification(String),
}
