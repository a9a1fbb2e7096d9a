//! Run store command handlers
//!
//! Implements `store serve`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::StoreServeArgs;
use crate::error::EscapeRoomError;
use crate::persistence::MemoryStore;
use crate::server;

/// Serve an in-memory run store until cancelled.
///
/// # Errors
///
/// Returns a usage error for a bad bind address, or an I/O error if the
/// listener cannot bind.
pub async fn serve(args: &StoreServeArgs, cancel: CancellationToken) -> Result<(), EscapeRoomError> {
    let addr = server::parse_bind_addr(&args.bind)?;

    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let store = Arc::new(MemoryStore::new());
    server::serve(store, addr, cancel, |bound| {
        eprintln!("run store listening on http://{bound}");
    })
    .await
}
