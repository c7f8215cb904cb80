// ── Auth handshake ──
//
// Credential login, silent token re-login on connect, and logout.
// `logged_in` gates the session's server requests; `allow_login_dialog`
// stays false until the first connect's auth attempt has resolved so a
// UI never flashes a login prompt for a user about to be restored.

use std::sync::Arc;
use std::time::Duration;

use kumalink_api::{Emitter, Reply};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::watch;

use crate::connection::ConnectionManager;
use crate::error::CoreError;
use crate::host::Host;
use crate::storage::StorageSelector;
use crate::store::LiveStore;
use crate::stream::StateStream;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthState {
    pub logged_in: bool,
    pub allow_login_dialog: bool,
}

pub struct AuthHandshake {
    emitter: Arc<dyn Emitter>,
    storage: StorageSelector,
    connection: Arc<ConnectionManager>,
    store: Arc<LiveStore>,
    host: Arc<dyn Host>,
    state: watch::Sender<AuthState>,
    request_timeout: Duration,
}

impl AuthHandshake {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        storage: StorageSelector,
        connection: Arc<ConnectionManager>,
        store: Arc<LiveStore>,
        host: Arc<dyn Host>,
        request_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            emitter,
            storage,
            connection,
            store,
            host,
            state,
            request_timeout,
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().logged_in
    }

    pub fn subscribe(&self) -> StateStream<AuthState> {
        StateStream::new(self.state.subscribe())
    }

    /// Log in with credentials.
    ///
    /// A rejected login is not an error: the server's reply comes back
    /// with `ok == false` and `logged_in` stays false. Transport failures
    /// (timeout, disconnect) are errors.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<Reply, CoreError> {
        let payload = json!({
            "username": username,
            "password": password.expose_secret(),
        });
        let args = self
            .emitter
            .request("login", vec![payload], self.request_timeout)
            .await?;
        let reply = Reply::from_ack("login", args)?;

        if !reply.ok {
            tracing::info!(username, "login rejected");
            return Ok(reply);
        }

        let token = reply.token.clone().ok_or_else(|| CoreError::Protocol {
            message: "login succeeded without a token".into(),
        })?;
        self.storage.set_token(&token)?;
        self.connection.set_token(Some(token));
        self.state.send_modify(|state| state.logged_in = true);
        tracing::info!(username, "logged in");

        self.host.save_credentials_hint();
        Ok(reply)
    }

    /// Silent re-login with a persisted token.
    ///
    /// A rejected token logs out. A transport failure keeps the token and
    /// the caches so the next connect can retry. Either way the login
    /// dialog is allowed once the outcome has been applied. Returns
    /// whether the session is now logged in.
    pub async fn login_by_token(&self, token: &str) -> bool {
        let result = self
            .emitter
            .request("loginByToken", vec![json!(token)], self.request_timeout)
            .await
            .map_err(CoreError::from)
            .and_then(|args| Reply::from_ack("loginByToken", args).map_err(CoreError::from));

        match result {
            Ok(reply) if reply.ok => {
                self.connection.set_token(Some(token.to_owned()));
                self.state.send_modify(|state| {
                    state.logged_in = true;
                    state.allow_login_dialog = true;
                });
                tracing::info!("session restored from stored token");
                return true;
            }
            Ok(reply) => {
                tracing::info!(msg = reply.message(), "stored token rejected");
                if let Err(e) = self.logout() {
                    tracing::warn!(error = %e, "cannot remove stored token");
                }
            }
            Err(e) => tracing::warn!(error = %e, "token login failed, keeping stored token"),
        }
        self.allow_login_dialog();
        false
    }

    /// Forget the token, drop logged-in state and heartbeat caches.
    ///
    /// Local state is always reset; only the storage removal can fail.
    pub fn logout(&self) -> Result<(), CoreError> {
        let removed = self.storage.remove_token();
        self.connection.set_token(None);
        self.state.send_if_modified(|state| {
            let changed = state.logged_in;
            state.logged_in = false;
            changed
        });
        self.store.clear_heartbeat_caches();

        if self.emitter.is_connected() {
            if let Err(e) = self.emitter.emit("logout", Vec::new()) {
                tracing::debug!(error = %e, "logout emit failed");
            }
        }
        tracing::info!("logged out");
        removed
    }

    pub fn allow_login_dialog(&self) {
        self.state.send_if_modified(|state| {
            let changed = !state.allow_login_dialog;
            state.allow_login_dialog = true;
            changed
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use kumalink_api::MonitorId;
    use serde_json::Value;

    use super::*;
    use crate::storage::TOKEN_KEY;
    use crate::store::live_state::tests::hb;
    use crate::store::live_store::tests::RecordingHost;

    /// Emitter that answers requests from a script and records everything.
    #[derive(Default)]
    pub(crate) struct ScriptedEmitter {
        pub replies: Mutex<VecDeque<Result<Value, kumalink_api::Error>>>,
        pub requests: Mutex<Vec<(String, Vec<Value>)>>,
        pub emitted: Mutex<Vec<String>>,
        pub disconnected: AtomicBool,
    }

    impl ScriptedEmitter {
        pub fn reply(&self, reply: Value) {
            self.replies.lock().unwrap().push_back(Ok(reply));
        }

        pub fn fail(&self, err: kumalink_api::Error) {
            self.replies.lock().unwrap().push_back(Err(err));
        }

        pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Emitter for ScriptedEmitter {
        async fn request(
            &self,
            event: &str,
            args: Vec<Value>,
            _timeout: Duration,
        ) -> Result<Vec<Value>, kumalink_api::Error> {
            self.requests.lock().unwrap().push((event.to_owned(), args));
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(reply)) => Ok(vec![reply]),
                Some(Err(e)) => Err(e),
                None => Err(kumalink_api::Error::Timeout { timeout_secs: 30 }),
            }
        }

        fn emit(&self, event: &str, _args: Vec<Value>) -> Result<(), kumalink_api::Error> {
            self.emitted.lock().unwrap().push(event.to_owned());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.disconnected.load(Ordering::Relaxed)
        }
    }

    struct Fixture {
        auth: AuthHandshake,
        emitter: Arc<ScriptedEmitter>,
        storage: StorageSelector,
        connection: Arc<ConnectionManager>,
        store: Arc<LiveStore>,
        host: Arc<RecordingHost>,
    }

    fn fixture() -> Fixture {
        let emitter = Arc::new(ScriptedEmitter::default());
        let storage = StorageSelector::in_memory();
        let host = Arc::new(RecordingHost::default());
        let store = Arc::new(LiveStore::new(host.clone()));
        let connection = Arc::new(ConnectionManager::new(storage.clone()));
        let auth = AuthHandshake::new(
            emitter.clone(),
            storage.clone(),
            connection.clone(),
            store.clone(),
            host.clone(),
            Duration::from_secs(30),
        );
        Fixture {
            auth,
            emitter,
            storage,
            connection,
            store,
            host,
        }
    }

    fn password() -> SecretString {
        SecretString::from("hunter2".to_owned())
    }

    #[tokio::test]
    async fn credential_login_persists_token() {
        let f = fixture();
        f.emitter
            .reply(json!({"ok": true, "token": "jwt-1", "msg": "Logged in"}));

        let reply = f.auth.login("admin", &password()).await.unwrap();

        assert!(reply.ok);
        assert!(f.auth.is_logged_in());
        assert_eq!(f.storage.token().unwrap().as_deref(), Some("jwt-1"));
        assert_eq!(f.connection.state().token.as_deref(), Some("jwt-1"));
        assert_eq!(*f.host.credential_hints.lock().unwrap(), 1);

        let (event, args) = f.emitter.requests().remove(0);
        assert_eq!(event, "login");
        assert_eq!(args[0], json!({"username": "admin", "password": "hunter2"}));
    }

    #[tokio::test]
    async fn rejected_login_is_returned_not_raised() {
        let f = fixture();
        f.emitter
            .reply(json!({"ok": false, "msg": "Incorrect username or password."}));

        let reply = f.auth.login("admin", &password()).await.unwrap();

        assert!(!reply.ok);
        assert_eq!(reply.message(), "Incorrect username or password.");
        assert!(!f.auth.is_logged_in());
        assert_eq!(f.storage.token().unwrap(), None);
    }

    #[tokio::test]
    async fn login_timeout_is_an_error() {
        let f = fixture();
        let err = f.auth.login("admin", &password()).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));
        assert!(!f.auth.is_logged_in());
    }

    #[tokio::test]
    async fn token_login_success_restores_session() {
        let f = fixture();
        f.emitter.reply(json!({"ok": true}));

        assert!(!f.auth.state().allow_login_dialog);
        assert!(f.auth.login_by_token("jwt-1").await);

        assert_eq!(
            f.auth.state(),
            AuthState {
                logged_in: true,
                allow_login_dialog: true
            }
        );
        assert_eq!(f.connection.state().token.as_deref(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn token_login_failure_logs_out() {
        let f = fixture();
        f.storage.set_token("stale").unwrap();
        f.store.on_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        f.emitter.reply(json!({"ok": false, "msg": "Invalid token"}));

        assert!(!f.auth.login_by_token("stale").await);

        assert_eq!(
            f.auth.state(),
            AuthState {
                logged_in: false,
                allow_login_dialog: true
            }
        );
        assert_eq!(f.storage.token().unwrap(), None);
        assert!(f.store.snapshot().heartbeats.is_empty());
    }

    #[tokio::test]
    async fn token_login_transport_failure_keeps_token_and_history() {
        let f = fixture();
        f.storage.set_token("tok").unwrap();
        f.store.on_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        f.emitter.fail(kumalink_api::Error::Disconnected);

        assert!(!f.auth.login_by_token("tok").await);

        assert_eq!(
            f.auth.state(),
            AuthState {
                logged_in: false,
                allow_login_dialog: true
            }
        );
        assert_eq!(f.storage.token().unwrap().as_deref(), Some("tok"));
        assert_eq!(f.store.snapshot().heartbeats_for(MonitorId(1)).len(), 1);
        assert!(f.emitter.emitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_login_timeout_keeps_token() {
        let f = fixture();
        f.storage.set_token("tok").unwrap();

        assert!(!f.auth.login_by_token("tok").await);
        assert!(f.auth.state().allow_login_dialog);
        assert_eq!(f.storage.token().unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn logout_uses_currently_selected_storage() {
        let f = fixture();
        f.storage.set_token("durable").unwrap();
        f.storage.set_remember(false).unwrap();
        f.storage.set_token("ephemeral").unwrap();

        f.auth.logout().unwrap();

        assert_eq!(f.storage.ephemeral().get(TOKEN_KEY).unwrap(), None);
        assert_eq!(
            f.storage.durable().get(TOKEN_KEY).unwrap().as_deref(),
            Some("durable")
        );
        assert_eq!(f.emitter.emitted.lock().unwrap().as_slice(), ["logout"]);
    }

    #[tokio::test]
    async fn logout_while_disconnected_skips_emit() {
        let f = fixture();
        f.emitter.disconnected.store(true, Ordering::Relaxed);
        f.auth.logout().unwrap();
        assert!(f.emitter.emitted.lock().unwrap().is_empty());
        assert!(!f.auth.is_logged_in());
    }
}
