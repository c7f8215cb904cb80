//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use kumalink_core::{AuthState, Session};

use crate::cli::{AuthArgs, GlobalOpts};
use crate::config::{self, ActiveProfile};
use crate::error::{CliError, prompt_err};
use crate::host::TerminalHost;

use super::Context;

/// Open a session for the active profile. Nothing is spawned until
/// [`connect`] starts it.
pub fn open_session(
    ctx: &Context,
    global: &GlobalOpts,
) -> Result<(Session, Arc<TerminalHost>), CliError> {
    let session_config = config::resolve_session_config(&ctx.active, &ctx.config, global)?;
    let host = Arc::new(TerminalHost::new(ctx.color));
    let session_host: Arc<dyn kumalink_core::Host> = host.clone();
    let session = Session::open(
        session_config,
        kumalink_config::default_storage(),
        session_host,
    )?;

    match session.timezone() {
        Ok(zone) => host.set_zone(&zone),
        Err(e) => tracing::warn!(error = %e, "cannot read timezone preference"),
    }
    Ok((session, host))
}

/// Start the session and wait until the first connect's auth attempt
/// has resolved: a stored token either restored the session or was
/// dropped.
pub async fn connect(session: &Session) -> Result<AuthState, CliError> {
    session.start().await;
    let bound = session.config().request_timeout;
    let url = session.config().server.to_string();

    let mut connection = session.subscribe_connection();
    tokio::time::timeout(bound, connection.wait_for(|c| c.connected))
        .await
        .ok()
        .flatten()
        .ok_or_else(|| CliError::ConnectionFailed {
            url: url.clone(),
            reason: format!("no connection within {}s", bound.as_secs()),
        })?;
    tracing::debug!(%url, "connected");

    // Token login is itself bounded by the request timeout; allow for
    // a reconnect in between.
    let mut auth = session.subscribe_auth();
    tokio::time::timeout(bound * 2, auth.wait_for(|s| s.allow_login_dialog))
        .await
        .ok()
        .flatten()
        .ok_or(CliError::Timeout {
            seconds: bound.as_secs() * 2,
        })
}

/// Log in with credentials unless a stored token already did.
pub async fn ensure_logged_in(
    session: &Session,
    active: &ActiveProfile,
    auth: &AuthArgs,
) -> Result<(), CliError> {
    if session.auth_state().logged_in {
        tracing::debug!("session restored from stored token");
        return Ok(());
    }
    let (username, password) = config::resolve_credentials(active, auth)?;
    login(session, &username, &password).await
}

/// Credential login; a rejected reply becomes [`CliError::AuthFailed`].
pub async fn login(
    session: &Session,
    username: &str,
    password: &SecretString,
) -> Result<(), CliError> {
    let reply = session.login(username, password).await?;
    if reply.ok {
        Ok(())
    } else {
        Err(CliError::AuthFailed {
            message: reply.message().to_owned(),
        })
    }
}

/// Open, connect and log in, ready for commands.
pub async fn logged_in_session(
    ctx: &Context,
    global: &GlobalOpts,
    auth: &AuthArgs,
) -> Result<(Session, Arc<TerminalHost>), CliError> {
    let (session, host) = open_session(ctx, global)?;
    if let Err(e) = connect(&session).await {
        session.shutdown().await;
        return Err(e);
    }
    if let Err(e) = ensure_logged_in(&session, &ctx.active, auth).await {
        session.shutdown().await;
        return Err(e);
    }
    Ok((session, host))
}

/// Wait up to `bound` for `predicate` to hold on the live state.
pub async fn settle(
    session: &Session,
    bound: Duration,
    predicate: impl FnMut(&Arc<kumalink_core::LiveState>) -> bool,
) -> Arc<kumalink_core::LiveState> {
    let mut state = session.subscribe_state();
    match tokio::time::timeout(bound, state.wait_for(predicate)).await {
        Ok(Some(snapshot)) => snapshot,
        _ => session.state(),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, global: &GlobalOpts, action: &str) -> Result<bool, CliError> {
    if global.yes {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}
