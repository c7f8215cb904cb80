// ── Session ──
//
// Root object tying the transport to the connection manager, auth
// handshake and live store. One dispatch task consumes channel events
// in arrival order, so every store mutation is serial.

use std::sync::Arc;

use kumalink_api::{ChannelEvent, Emitter, Monitor, MonitorId, Reply, SocketHandle};
use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{AuthHandshake, AuthState};
use crate::command::{Command, ensure_ok};
use crate::config::SessionConfig;
use crate::connection::{ConnectAction, ConnectionManager, ConnectionState};
use crate::error::CoreError;
use crate::host::Host;
use crate::storage::{AUTO_TIMEZONE, StorageSelector};
use crate::store::{LiveState, LiveStore};
use crate::stream::StateStream;

/// Cheaply cloneable handle to one server session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    storage: StorageSelector,
    host: Arc<dyn Host>,
    emitter: Arc<dyn Emitter>,
    store: Arc<LiveStore>,
    connection: Arc<ConnectionManager>,
    auth: Arc<AuthHandshake>,
    events: Mutex<Option<mpsc::Receiver<ChannelEvent>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Open a socket to `config.server`. The socket starts connecting
    /// immediately; events queue up until [`start`](Self::start).
    pub fn open(
        config: SessionConfig,
        storage: StorageSelector,
        host: Arc<dyn Host>,
    ) -> Result<Self, CoreError> {
        let cancel = CancellationToken::new();
        let (socket, events) =
            SocketHandle::spawn(&config.server, config.reconnect.clone(), cancel.child_token())?;
        Ok(Self::build(config, storage, host, Arc::new(socket), events, cancel))
    }

    /// Build a session over any transport.
    pub fn with_transport(
        config: SessionConfig,
        storage: StorageSelector,
        host: Arc<dyn Host>,
        emitter: Arc<dyn Emitter>,
        events: mpsc::Receiver<ChannelEvent>,
    ) -> Self {
        Self::build(config, storage, host, emitter, events, CancellationToken::new())
    }

    fn build(
        config: SessionConfig,
        storage: StorageSelector,
        host: Arc<dyn Host>,
        emitter: Arc<dyn Emitter>,
        events: mpsc::Receiver<ChannelEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let store = Arc::new(LiveStore::new(Arc::clone(&host)));
        let connection = Arc::new(ConnectionManager::new(storage.clone()));
        let auth = Arc::new(AuthHandshake::new(
            Arc::clone(&emitter),
            storage.clone(),
            Arc::clone(&connection),
            Arc::clone(&store),
            Arc::clone(&host),
            config.request_timeout,
        ));

        Self {
            inner: Arc::new(SessionInner {
                config,
                storage,
                host,
                emitter,
                store,
                connection,
                auth,
                events: Mutex::new(Some(events)),
                cancel,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn storage(&self) -> &StorageSelector {
        &self.inner.storage
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the dispatch task. Calling it again is a no-op.
    pub async fn start(&self) {
        let Some(rx) = self.inner.events.lock().await.take() else {
            debug!("session already started");
            return;
        };
        let session = self.clone();
        let handle = tokio::spawn(dispatch_task(session, rx));
        self.inner.task_handles.lock().await.push(handle);
        info!(server = %self.inner.config.server, "session started");
    }

    /// Stop the transport and every background task.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        // Token-login tasks may still be registered while we join.
        loop {
            let handles = std::mem::take(&mut *self.inner.task_handles.lock().await);
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
        debug!("session shut down");
    }

    /// Register a background task, dropping handles of finished ones.
    async fn track_task(&self, handle: JoinHandle<()>) {
        let mut handles = self.inner.task_handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Apply one channel event. Returns the token-login task it spawned.
    fn handle_event(&self, event: ChannelEvent) -> Option<JoinHandle<()>> {
        match event {
            ChannelEvent::Connected => self.handle_connected(),
            ChannelEvent::Disconnected => {
                self.inner.connection.on_disconnected();
                None
            }
            ChannelEvent::Push(push) => {
                self.inner.store.apply(push);
                None
            }
        }
    }

    fn handle_connected(&self) -> Option<JoinHandle<()>> {
        let connection = &self.inner.connection;
        let spawned = match connection.on_connected(&self.inner.store) {
            ConnectAction::TokenLogin(token) => {
                let auth = Arc::clone(&self.inner.auth);
                let cancel = self.inner.cancel.clone();
                Some(tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {}
                        _ = auth.login_by_token(&token) => {}
                    }
                }))
            }
            ConnectAction::AwaitCredentials => {
                self.inner.auth.allow_login_dialog();
                None
            }
        };
        connection.finish_connect();
        spawned
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> Arc<LiveState> {
        self.inner.store.snapshot()
    }

    pub fn subscribe_state(&self) -> StateStream<Arc<LiveState>> {
        self.inner.store.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn subscribe_connection(&self) -> StateStream<ConnectionState> {
        self.inner.connection.subscribe()
    }

    pub fn auth_state(&self) -> AuthState {
        self.inner.auth.state()
    }

    pub fn subscribe_auth(&self) -> StateStream<AuthState> {
        self.inner.auth.subscribe()
    }

    // ── Auth ─────────────────────────────────────────────────────────

    pub async fn login(&self, username: &str, password: &SecretString) -> Result<Reply, CoreError> {
        self.inner.auth.login(username, password).await
    }

    pub fn logout(&self) -> Result<(), CoreError> {
        self.inner.auth.logout()
    }

    // ── Preferences ──────────────────────────────────────────────────

    pub fn remember(&self) -> Result<bool, CoreError> {
        self.inner.storage.remember()
    }

    pub fn set_remember(&self, remember: bool) -> Result<(), CoreError> {
        self.inner.storage.set_remember(remember)
    }

    /// Effective display zone: the stored preference, or the host's zone
    /// when the preference is `auto`.
    pub fn timezone(&self) -> Result<String, CoreError> {
        let preference = self.inner.storage.timezone_preference()?;
        if preference == AUTO_TIMEZONE {
            Ok(self.inner.host.detect_timezone())
        } else {
            Ok(preference)
        }
    }

    pub fn set_timezone(&self, zone: &str) -> Result<(), CoreError> {
        self.inner.storage.set_timezone_preference(zone)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a command and return the server's reply verbatim.
    ///
    /// Requires a logged-in session; nothing is emitted otherwise.
    pub async fn execute(&self, command: Command) -> Result<Reply, CoreError> {
        if !self.inner.auth.is_logged_in() {
            return Err(CoreError::NotLoggedIn);
        }

        let (event, args) = command.into_request()?;
        let args = self
            .inner
            .emitter
            .request(event, args, self.inner.config.request_timeout)
            .await?;
        let reply = Reply::from_ack(event, args)?;
        debug!(event, ok = reply.ok, "command reply");
        Ok(reply)
    }

    pub async fn add_monitor(&self, monitor: Monitor) -> Result<Reply, CoreError> {
        self.execute(Command::AddMonitor { monitor }).await
    }

    pub async fn edit_monitor(&self, monitor: Monitor) -> Result<Reply, CoreError> {
        self.execute(Command::EditMonitor { monitor }).await
    }

    pub async fn delete_monitor(&self, id: MonitorId) -> Result<Reply, CoreError> {
        self.execute(Command::DeleteMonitor { id }).await
    }

    pub async fn pause_monitor(&self, id: MonitorId) -> Result<Reply, CoreError> {
        self.execute(Command::PauseMonitor { id }).await
    }

    pub async fn resume_monitor(&self, id: MonitorId) -> Result<Reply, CoreError> {
        self.execute(Command::ResumeMonitor { id }).await
    }

    /// Fetch one monitor's full record.
    pub async fn get_monitor(&self, id: MonitorId) -> Result<Monitor, CoreError> {
        let reply = ensure_ok(self.execute(Command::GetMonitor { id }).await?)?;
        let raw = reply
            .extra
            .get("monitor")
            .cloned()
            .ok_or_else(|| CoreError::Protocol {
                message: "getMonitor reply without a monitor".into(),
            })?;
        serde_json::from_value(raw).map_err(|e| CoreError::Protocol {
            message: format!("invalid monitor record: {e}"),
        })
    }

    pub async fn add_notification(
        &self,
        config: Map<String, Value>,
        id: Option<u64>,
    ) -> Result<Reply, CoreError> {
        self.execute(Command::AddNotification { config, id }).await
    }

    pub async fn delete_notification(&self, id: u64) -> Result<Reply, CoreError> {
        self.execute(Command::DeleteNotification { id }).await
    }

    pub async fn test_notification(&self, config: Map<String, Value>) -> Result<Reply, CoreError> {
        self.execute(Command::TestNotification { config }).await
    }

    pub async fn change_password(
        &self,
        current: SecretString,
        new: SecretString,
    ) -> Result<Reply, CoreError> {
        self.execute(Command::ChangePassword { current, new }).await
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Consume channel events in order until cancelled or the transport ends.
async fn dispatch_task(session: Session, mut rx: mpsc::Receiver<ChannelEvent>) {
    let cancel = session.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                if let Some(handle) = session.handle_event(event) {
                    session.track_task(handle).await;
                }
            }
        }
    }
    debug!("dispatch task exiting");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use kumalink_api::PushEvent;
    use serde_json::json;

    use super::*;
    use crate::auth::tests::ScriptedEmitter;
    use crate::store::live_state::tests::hb;
    use crate::store::live_store::tests::RecordingHost;

    struct Fixture {
        session: Session,
        emitter: Arc<ScriptedEmitter>,
        storage: StorageSelector,
        host: Arc<RecordingHost>,
    }

    fn fixture() -> Fixture {
        let emitter = Arc::new(ScriptedEmitter::default());
        let storage = StorageSelector::in_memory();
        let host = Arc::new(RecordingHost::default());
        let (_tx, rx) = mpsc::channel(8);
        let config = SessionConfig::new("http://localhost:3001".parse().unwrap())
            .with_request_timeout(Duration::from_secs(5));
        let session = Session::with_transport(
            config,
            storage.clone(),
            host.clone(),
            emitter.clone(),
            rx,
        );
        Fixture {
            session,
            emitter,
            storage,
            host,
        }
    }

    #[tokio::test]
    async fn connect_without_token_allows_dialog_immediately() {
        let f = fixture();
        let spawned = f.session.handle_event(ChannelEvent::Connected);
        assert!(spawned.is_none());
        assert!(f.session.auth_state().allow_login_dialog);
        assert!(!f.session.connection_state().first_connect);
        assert!(f.emitter.requests().is_empty());
    }

    #[tokio::test]
    async fn connect_with_token_logs_in_silently() {
        let f = fixture();
        f.storage.set_token("jwt").unwrap();
        f.emitter.reply(json!({"ok": true}));

        let handle = f
            .session
            .handle_event(ChannelEvent::Connected)
            .unwrap();
        handle.await.unwrap();

        assert_eq!(
            f.session.auth_state(),
            AuthState {
                logged_in: true,
                allow_login_dialog: true
            }
        );
        let (event, args) = f.emitter.requests().remove(0);
        assert_eq!(event, "loginByToken");
        assert_eq!(args, vec![json!("jwt")]);
    }

    #[tokio::test]
    async fn dropped_link_during_token_login_keeps_token() {
        let f = fixture();
        f.storage.set_token("valid-jwt").unwrap();
        f.session
            .handle_event(ChannelEvent::Push(PushEvent::Heartbeat(hb(
                1,
                1,
                false,
                "2024-01-01 00:00:10",
            ))));
        f.emitter.fail(kumalink_api::Error::Disconnected);

        let handle = f
            .session
            .handle_event(ChannelEvent::Connected)
            .unwrap();
        handle.await.unwrap();

        assert_eq!(f.storage.token().unwrap().as_deref(), Some("valid-jwt"));
        assert_eq!(f.session.state().heartbeats_for(MonitorId(1)).len(), 1);
        assert_eq!(
            f.session.auth_state(),
            AuthState {
                logged_in: false,
                allow_login_dialog: true
            }
        );
    }

    #[tokio::test]
    async fn finished_tasks_are_pruned() {
        let f = fixture();
        for _ in 0..3 {
            let handle = tokio::spawn(async {});
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
            f.session.track_task(handle).await;
        }
        assert_eq!(f.session.inner.task_handles.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn reconnect_resets_history_once() {
        let f = fixture();
        let session = &f.session;
        session.handle_event(ChannelEvent::Connected);
        session
            .handle_event(ChannelEvent::Push(PushEvent::Heartbeat(hb(
                1,
                1,
                true,
                "2024-01-01 00:00:10",
            ))));
        session.handle_event(ChannelEvent::Disconnected);
        assert_eq!(session.state().heartbeats.len(), 1);
        assert!(!session.connection_state().connected);

        session.handle_event(ChannelEvent::Connected);
        let state = session.state();
        assert!(state.heartbeats.is_empty());
        assert!(state.important_heartbeats.is_empty());
        assert_eq!(state.cache_epoch, 1);
        assert_eq!(session.connection_state().connect_count, 2);
        assert_eq!(f.host.toasts().len(), 1);
    }

    #[tokio::test]
    async fn commands_require_login() {
        let f = fixture();
        let err = f.session.delete_monitor(MonitorId(3)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotLoggedIn));
        assert!(f.emitter.requests().is_empty());
    }

    #[tokio::test]
    async fn command_reply_is_returned_verbatim() {
        let f = fixture();
        f.emitter.reply(json!({"ok": true, "token": "t"}));
        f.session
            .login("admin", &SecretString::from("pw".to_owned()))
            .await
            .unwrap();

        f.emitter
            .reply(json!({"ok": false, "msg": "You are not the owner"}));
        let reply = f.session.delete_monitor(MonitorId(3)).await.unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.message(), "You are not the owner");
        // No local mutation.
        assert!(f.session.state().monitors.is_empty());
    }

    #[tokio::test]
    async fn get_monitor_decodes_record() {
        let f = fixture();
        f.emitter.reply(json!({"ok": true, "token": "t"}));
        f.session
            .login("admin", &SecretString::from("pw".to_owned()))
            .await
            .unwrap();
        f.emitter.reply(json!({
            "ok": true,
            "monitor": {"id": 4, "name": "DB", "type": "port"}
        }));

        let monitor = f.session.get_monitor(MonitorId(4)).await.unwrap();
        assert_eq!(monitor.name, "DB");
        assert_eq!(monitor.kind(), Some("port"));
    }

    #[tokio::test]
    async fn timezone_resolves_auto_through_host() {
        let f = fixture();
        assert_eq!(f.session.timezone().unwrap(), "America/New_York");
        f.session.set_timezone("Europe/Paris").unwrap();
        assert_eq!(f.session.timezone().unwrap(), "Europe/Paris");
        assert!(f.session.set_timezone("Moon/Base").is_err());
    }

    #[tokio::test]
    async fn remember_toggle_redirects_logout() {
        let f = fixture();
        f.emitter.reply(json!({"ok": true, "token": "durable"}));
        f.session
            .login("admin", &SecretString::from("pw".to_owned()))
            .await
            .unwrap();

        f.session.set_remember(false).unwrap();
        assert!(!f.session.remember().unwrap());
        f.session.logout().unwrap();

        assert_eq!(
            f.storage
                .durable()
                .get(crate::storage::TOKEN_KEY)
                .unwrap()
                .as_deref(),
            Some("durable")
        );
        assert!(!f.session.auth_state().logged_in);
        assert_eq!(f.session.connection_state().token, None);
    }
}
