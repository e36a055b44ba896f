// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use shop_ledger_rs::config::Config;
use shop_ledger_rs::{JsonFileStorage, Shop, logging, server, shutdown};
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    // Values from a local .env file act as environment defaults
    dotenvy::dotenv().ok();

    let config = Config::parse();

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Error initialising logging: {}", e);
        process::exit(1);
    }

    let storage = match JsonFileStorage::open(&config.data_dir) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!(
                "Error opening data directory '{}': {}",
                config.data_dir.display(),
                e
            );
            process::exit(1);
        }
    };
    let uploads_dir = storage.uploads_dir().to_path_buf();

    let shop = match Shop::open(Arc::new(storage)) {
        Ok(shop) => Arc::new(shop),
        Err(e) => {
            eprintln!("Error loading shop state: {}", e);
            process::exit(1);
        }
    };

    let app = server::app(shop, uploads_dir);

    let listener = match TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {}", config.bind, e);
            process::exit(1);
        }
    };
    tracing::info!(
        address = %config.bind,
        data_dir = %config.data_dir.display(),
        "shop server listening"
    );

    let shutdown = async {
        if let Err(e) = shutdown::signal().await {
            // Without any handler the server runs until killed
            tracing::error!(error = %e, "no shutdown signal handler could be installed");
            std::future::pending::<()>().await;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
