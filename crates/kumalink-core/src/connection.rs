// ── Connection lifecycle bookkeeping ──
//
// Tracks what the transport reports (connect / disconnect) and decides
// what a fresh connection needs: a cache reset on reconnects and either a
// silent token login or permission to show the login dialog.
// Reconnect attempts and backoff live in the transport, not here.

use tokio::sync::watch;

use crate::storage::StorageSelector;
use crate::store::LiveStore;
use crate::stream::StateStream;

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    /// Token accepted by the server for this session, if any.
    pub token: Option<String>,
    /// True until the first successful connect has been handled.
    pub first_connect: bool,
    pub connected: bool,
    /// Successful connects so far (not attempts).
    pub connect_count: u32,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            token: None,
            first_connect: true,
            connected: false,
            connect_count: 0,
        }
    }
}

/// What the session should do after a connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectAction {
    /// A persisted token exists; log in with it silently.
    TokenLogin(String),
    /// No token; the user may be asked for credentials.
    AwaitCredentials,
}

pub struct ConnectionManager {
    state: watch::Sender<ConnectionState>,
    storage: StorageSelector,
}

impl ConnectionManager {
    pub fn new(storage: StorageSelector) -> Self {
        let (state, _) = watch::channel(ConnectionState::default());
        Self { state, storage }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<ConnectionState> {
        StateStream::new(self.state.subscribe())
    }

    /// Handle a successful connect.
    ///
    /// Counts the connect, clears the heartbeat caches when this is a
    /// reconnect, and looks up the persisted token. The caller acts on the
    /// returned [`ConnectAction`] and then calls
    /// [`finish_connect`](Self::finish_connect).
    pub fn on_connected(&self, store: &LiveStore) -> ConnectAction {
        let mut count = 0;
        self.state.send_modify(|state| {
            state.connect_count = state.connect_count.saturating_add(1);
            state.connected = true;
            count = state.connect_count;
        });
        tracing::info!(connect_count = count, "connected");

        if count >= 2 {
            store.clear_heartbeat_caches();
        }

        match self.storage.token() {
            Ok(Some(token)) => ConnectAction::TokenLogin(token),
            Ok(None) => ConnectAction::AwaitCredentials,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read stored token");
                ConnectAction::AwaitCredentials
            }
        }
    }

    /// Marks the first connect as handled.
    pub fn finish_connect(&self) {
        self.state.send_if_modified(|state| {
            let changed = state.first_connect;
            state.first_connect = false;
            changed
        });
    }

    pub fn on_disconnected(&self) {
        tracing::info!("disconnected");
        self.state.send_modify(|state| state.connected = false);
    }

    pub fn set_token(&self, token: Option<String>) {
        self.state.send_modify(|state| state.token = token);
    }
}
