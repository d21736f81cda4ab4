// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deployment environment.
//!
//! Every environment-dependent decision in bootstrap is an exhaustive
//! `match` on [`Environment`], so adding a variant forces each call site to
//! be revisited.

use std::fmt;

use crate::config::{EnvVars, APP_ENV_ENV, APP_ENV_PROFILE_ENV};

/// Behaviour of a named environment that is not one of the built-in three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomProfile {
    /// Skip signing keys and the queue backend, like `testing`.
    LikeTesting,
    /// Require signing keys and connect the queue backend, like `production`.
    LikeProduction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Testing,
    Development,
    Production,
    /// A named environment such as `staging` or `ci`.
    Custom { name: String, profile: CustomProfile },
}

impl Environment {
    /// Resolve the environment from `APP_ENV` and `APP_ENV_PROFILE`.
    ///
    /// Unset `APP_ENV` means development. Unknown profiles mean
    /// [`CustomProfile::LikeProduction`].
    pub fn from_vars(vars: &EnvVars) -> Self {
        let name = vars.get(APP_ENV_ENV).map(str::trim).unwrap_or("development");
        match name.to_ascii_lowercase().as_str() {
            "testing" | "test" => Self::Testing,
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            _ => {
                let profile = match vars.get(APP_ENV_PROFILE_ENV).map(str::trim) {
                    Some(p) if p.eq_ignore_ascii_case("testing") => CustomProfile::LikeTesting,
                    _ => CustomProfile::LikeProduction,
                };
                Self::Custom {
                    name: name.to_string(),
                    profile,
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Testing => "testing",
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom { name, .. } => name,
        }
    }

    /// Whether error responses hide internal details.
    pub fn redacts_internal_errors(&self) -> bool {
        match self {
            Self::Production => true,
            Self::Testing | Self::Development | Self::Custom { .. } => false,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
