// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Background job handlers.

pub mod email;

pub use email::EmailJob;
