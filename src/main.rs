// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use clap::Parser;
use image_tagger::cli::{execute, Cli};
use std::env;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    tracing::info!("{}", image_tagger::version::get_version_string());

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}
