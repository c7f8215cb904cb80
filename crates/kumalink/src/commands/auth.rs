//! `login` / `logout` handlers.

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::{Context, util};

pub async fn login(ctx: &Context, args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _host) = util::open_session(ctx, global)?;

    // Applied before the login so the token lands in the chosen storage.
    if let Some(remember) = args.remember_choice() {
        session.set_remember(remember)?;
    }

    let result = async {
        util::connect(&session).await?;
        let (username, password) = config::resolve_credentials(&ctx.active, &args.auth)?;
        util::login(&session, &username, &password).await?;
        Ok::<_, CliError>(username)
    }
    .await;
    session.shutdown().await;
    let username = result?;

    let kept = if session.remember()? {
        "token saved"
    } else {
        "token kept for this process only"
    };
    output::notice(&format!("Logged in as {username} ({kept})"), global.quiet);
    Ok(())
}

pub async fn logout(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _host) = util::open_session(ctx, global)?;

    // Tell the server when it's reachable; the local token goes either way.
    if let Err(e) = util::connect(&session).await {
        tracing::info!(error = %e, "server unreachable, logging out locally");
    }
    let removed = session.logout();
    session.shutdown().await;
    removed?;

    output::notice("Logged out", global.quiet);
    Ok(())
}
