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

//! Graceful shutdown signal handling.

use std::io;
use thiserror::Error;
use tokio::signal;

#[derive(Debug, Error)]
pub enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(#[source] io::Error),

    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    SigTerm(#[source] io::Error),
}

/// Resolves once Ctrl+C (or SIGTERM on Unix) is received.
///
/// If one handler cannot be installed the other is still awaited. An error is
/// returned only when neither can be.
pub async fn signal() -> Result<(), ShutdownSignalError> {
    let ctrl_c = async { signal::ctrl_c().await.map_err(ShutdownSignalError::CtrlC) };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::SigTerm)?
            .recv()
            .await;
        Ok::<(), ShutdownSignalError>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), ShutdownSignalError>>();

    first_signal(ctrl_c, terminate).await
}

async fn first_signal<C, T>(ctrl_c: C, terminate: T) -> Result<(), ShutdownSignalError>
where
    C: Future<Output = Result<(), ShutdownSignalError>>,
    T: Future<Output = Result<(), ShutdownSignalError>>,
{
    tokio::pin!(ctrl_c, terminate);

    tokio::select! {
        result = &mut ctrl_c => match result {
            Ok(()) => tracing::info!("ctrl_c signal received"),
            Err(err) => {
                tracing::warn!(error = %err, "waiting for SIGTERM only");
                terminate.await?;
                tracing::info!("terminate signal received");
            }
        },
        result = &mut terminate => match result {
            Ok(()) => tracing::info!("terminate signal received"),
            Err(err) => {
                tracing::warn!(error = %err, "waiting for Ctrl+C only");
                ctrl_c.await?;
                tracing::info!("ctrl_c signal received");
            }
        },
    }
    Ok(())
}
