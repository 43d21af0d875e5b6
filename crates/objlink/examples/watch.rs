//! Connects to a bridge endpoint, lists the exported objects, and follows
//! their property changes until interrupted.
//!
//! Usage: `watch [host:port]` (defaults to 127.0.0.1:12345)

use std::sync::Arc;

use objlink::client::transport::tcp::TcpLineTransport;
use objlink::client::Channel;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:12345".to_string());
    let transport = TcpLineTransport::connect(&addr).await?;
    tracing::info!(%addr, "connected");

    let _channel = Channel::with_init(transport, |channel: &Arc<Channel>| {
        for (name, object) in channel.objects() {
            tracing::info!(
                object = %name,
                methods = ?object.methods(),
                properties = ?object.properties(),
                signals = ?object.signal_names(),
                "exported object"
            );
            for property in object.properties() {
                let Some(signal) = object.notify_signal_for_property(&property) else {
                    continue;
                };
                let object_name = name.clone();
                let property_name = property.clone();
                let watched = Arc::downgrade(&object);
                object.connect(signal, move |args| {
                    let cached = watched
                        .upgrade()
                        .map(|object| object.property(&property_name).into_value());
                    tracing::info!(
                        object = %object_name,
                        property = %property_name,
                        args = ?args,
                        cached = ?cached,
                        "property changed"
                    );
                });
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    Ok(())
}
