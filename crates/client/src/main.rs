//! Live data stream demo.
//!
//! Usage: `qa-playground-client [stream-channel]`
//!
//! Connects to `/stream/<channel>` (default `metrics`) on the configured
//! WebSocket base and logs every flushed batch until Ctrl-C.

use anyhow::Result;
use qa_playground_client::ws::{use_live_data, LiveDataOptions, SocketEndpoint};
use qa_playground_client::{AuthContext, ClientConfig, Storage};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("qa_playground_client=debug")),
        )
        .init();

    let channel = std::env::args().nth(1).unwrap_or_else(|| "metrics".to_string());
    let config = ClientConfig::from_env();

    let auth = match Storage::platform_default() {
        Some(storage) => AuthContext::with_storage(storage),
        None => AuthContext::new(),
    };

    // Authenticated channels connect on their own.
    let endpoint = SocketEndpoint::from_config(&config, auth.signal());
    let stream = use_live_data(endpoint, &channel, LiveDataOptions::default());
    if !auth.is_authenticated() {
        tracing::info!("No remembered session, connecting anonymously");
        stream.socket().connect();
    }
    tracing::info!("Streaming {} from {}", channel, config.ws_base_url);

    let mut points = stream.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = points.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = points.borrow_and_update();
                tracing::info!(
                    points = state.points.len(),
                    latest = ?state.latest(),
                    "Batch flushed"
                );
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    stream.teardown();
    Ok(())
}
