// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Bindings to read and call the voting dashboard contracts from Rust.

pub mod client;
pub mod config;
pub mod contracts;
pub mod decoder;
pub mod explorer;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod validation;
pub mod wallet;
