// Server loop module
// Accepts connections until shutdown, then waits for in-flight ones

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::handle_connection;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections may keep running after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept and serve connections until `shutdown` resolves
///
/// The listener is closed as soon as shutdown is requested. Connections
/// already accepted get [`SHUTDOWN_GRACE`] to finish before the loop returns.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        handle_connection(
                            stream,
                            peer_addr,
                            Arc::clone(&state),
                            Arc::clone(&active_connections),
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = &mut shutdown => {
                logger::log_shutdown();
                break;
            }
        }
    }

    drop(listener);
    drain(&active_connections).await;
}

async fn drain(active_connections: &AtomicUsize) {
    let waited = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while active_connections.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;

    if waited.is_err() {
        logger::log_warning(&format!(
            "{} connection(s) still open after {}s, exiting anyway",
            active_connections.load(Ordering::SeqCst),
            SHUTDOWN_GRACE.as_secs()
        ));
    }
}
