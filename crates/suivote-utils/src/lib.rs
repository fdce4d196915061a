// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for the suivote crates.

#[cfg(feature = "backoff")]
pub mod backoff;

#[cfg(feature = "config")]
pub mod config;

#[cfg(feature = "metrics")]
pub mod metrics;
