//! Event stream example
//!
//! Reads a stream of blank-line separated JSON messages. Callbacks are routed
//! through an owner queue and run on the main task, the way a UI loop would.
//! Press Ctrl-C to cancel.
//!
//! Run with: cargo run --example stream_events -- <url>

use anyhow::Context;
use apiclient_http::middleware::LoggingMiddleware;
use apiclient_http::{channel_sink, ApiClient, ApiRequest, MiddlewarePipeline};
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let url = std::env::args()
        .nth(1)
        .context("usage: stream_events <url>")?;

    let (sink, mut queue) = channel_sink();
    let client = ApiClient::new()
        .with_sink(Arc::new(sink))
        .with_middleware(MiddlewarePipeline::new().with(LoggingMiddleware));

    let request = ApiRequest::get(&url)?;
    let cancel = request.cancel_signal().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Cancelling");
            cancel.cancel();
        }
    });

    let reader = tokio::spawn(async move {
        client
            .send_stream::<Value, _, _>(
                &request,
                |response| match response.content() {
                    Some(message) => println!("message: {}", message),
                    None => println!("{} {:?} {:?}", response.kind(), response.status(), response.reason()),
                },
                |stalled| println!("no data for {:.1}s", stalled.as_secs_f64()),
            )
            .await
    });

    // The client (and its sink) drop when the reader finishes, closing the queue.
    queue.run_until_closed().await;
    reader.await??;
    println!("Stream closed");
    Ok(())
}
