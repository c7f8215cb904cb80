//! Outbound half of the channel, abstracted for injection.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

/// Sends events to the server.
///
/// Implemented by [`SocketHandle`](crate::SocketHandle); tests and
/// embedders can provide their own transport.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Emit `event` with `args` and wait for the correlated ack.
    ///
    /// Fails with [`Error::Timeout`] once `timeout` elapses, with
    /// [`Error::Disconnected`] if the link drops first, and with
    /// [`Error::Cancelled`] if the transport shuts down.
    async fn request(
        &self,
        event: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Vec<Value>, Error>;

    /// Fire-and-forget emit.
    fn emit(&self, event: &str, args: Vec<Value>) -> Result<(), Error>;

    /// Whether the namespace connection is currently up.
    fn is_connected(&self) -> bool;
}
