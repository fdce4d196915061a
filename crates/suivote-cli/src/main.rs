// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! The suivote client binary.

use std::process::ExitCode;

use clap::Parser;

mod args;
mod output;
mod runner;
mod utils;

use args::App;
use runner::ClientCommandRunner;

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();
    if let Err(error) = utils::init_tracing_subscriber(app.json) {
        eprintln!("failed to initialize logging: {error:#}");
        return ExitCode::FAILURE;
    }
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting suivote");

    let runner = ClientCommandRunner::new(&app);
    let result = runner.run(app.command.clone()).await;

    if app.print_metrics {
        if let Err(error) = runner.print_metrics() {
            tracing::warn!(%error, "failed to print the metrics");
        }
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            output::report_error(&error, app.json);
            ExitCode::FAILURE
        }
    }
}
