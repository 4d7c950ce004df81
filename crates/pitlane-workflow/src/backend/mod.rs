// Copyright (C) 2025 The Pitlane Racing Authors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend module - remote job execution service.
//!
//! Only the trait and an in-process mock live here; production clients
//! implement [`JobBackend`] in the deployment that owns the credentials.

pub mod mock;
mod traits;

pub use mock::{BackendCall, MockBackend};
pub use traits::*;
