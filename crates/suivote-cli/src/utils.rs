// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Utilities for running the suivote binary.

use std::{
    env,
    io::{self, IsTerminal as _},
};

use anyhow::{Result, bail};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt as _, util::SubscriberInitExt};

/// Directives applied before the ones in `RUST_LOG`.
const DEFAULT_DIRECTIVES: &str = "info,jsonrpsee=warn,hyper=warn,h2=warn";

/// Initializes the tracing subscriber, logging to stderr.
///
/// The format is taken from the `LOG_FORMAT` env variable. If it is unset, logs are JSON when the
/// command output is JSON and human-readable otherwise.
pub(crate) fn init_tracing_subscriber(json_output: bool) -> Result<()> {
    let directive = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => format!("{DEFAULT_DIRECTIVES},{directives}"),
        _ => DEFAULT_DIRECTIVES.to_owned(),
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());

    let format = env::var("LOG_FORMAT")
        .ok()
        .map(|format| format.to_lowercase())
        .unwrap_or_else(|| if json_output { "json" } else { "compact" }.to_owned());
    let layer = match format.as_str() {
        "default" => layer.boxed(),
        "compact" => layer.compact().boxed(),
        "pretty" => layer.pretty().boxed(),
        "json" => layer.json().boxed(),
        other => bail!("LOG_FORMAT '{other}' is not supported"),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(EnvFilter::new(&directive)))
        .try_init()?;
    tracing::debug!(%directive, %format, "initialized tracing subscriber");
    Ok(())
}
