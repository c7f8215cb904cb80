//! Monitor command handlers.

use serde_json::json;

use kumalink_core::{Monitor, Reply, Session};

use crate::cli::{GlobalOpts, MonitorsArgs, MonitorsCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

/// Monitor record for `add`, with the server's defaults for the rest.
pub fn new_monitor(name: &str, kind: &str, url: &str, interval: u32) -> Result<Monitor, CliError> {
    let parsed: url::Url = url.parse().map_err(|_| CliError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {url}"),
    })?;
    if interval < 20 {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least 20 seconds".into(),
        });
    }
    Ok(serde_json::from_value(json!({
        "name": name,
        "type": kind,
        "url": parsed.as_str(),
        "interval": interval,
        "retryInterval": interval,
        "maxretries": 0,
        "notificationIDList": {},
        "accepted_statuscodes": ["200-299"],
    }))?)
}

fn detail(m: &Monitor) -> String {
    let mut lines = vec![
        format!("Name:     {}", m.name),
        format!("Type:     {}", m.kind().unwrap_or("-")),
        format!("Active:   {}", if m.is_active() { "yes" } else { "no" }),
    ];
    for key in ["id", "url", "hostname", "port", "interval"] {
        if let Some(value) = m.field(key).filter(|v| !v.is_null()) {
            let value = value.as_str().map_or_else(|| value.to_string(), str::to_owned);
            lines.push(format!("{:<9} {value}", format!("{key}:")));
        }
    }
    lines.join("\n")
}

fn report(reply: &Reply, fallback: &str, global: &GlobalOpts) {
    let msg = match reply.message() {
        "" => fallback,
        msg => msg,
    };
    output::notice(msg, global.quiet);
}

async fn run(
    session: &Session,
    command: MonitorsCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        MonitorsCommand::Add {
            name,
            kind,
            url,
            interval,
        } => {
            let monitor = new_monitor(&name, &kind, &url, interval)?;
            let reply = kumalink_core::ensure_ok(session.add_monitor(monitor).await?)?;
            report(&reply, "Monitor added", global);
            if let Some(id) = reply.monitor_id {
                output::print_output(&id.to_string(), global.quiet);
            }
            Ok(())
        }

        MonitorsCommand::Get { id } => {
            let monitor = session.get_monitor(id).await?;
            let out = output::render_single(global.output, &monitor, detail, |m| m.name.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MonitorsCommand::Delete { id } => {
            if !util::confirm(&format!("Delete monitor {id} and its history?"), global, "delete")? {
                return Ok(());
            }
            let reply = kumalink_core::ensure_ok(session.delete_monitor(id).await?)?;
            report(&reply, "Monitor deleted", global);
            Ok(())
        }

        MonitorsCommand::Pause { id } => {
            let reply = kumalink_core::ensure_ok(session.pause_monitor(id).await?)?;
            report(&reply, "Monitor paused", global);
            Ok(())
        }

        MonitorsCommand::Resume { id } => {
            let reply = kumalink_core::ensure_ok(session.resume_monitor(id).await?)?;
            report(&reply, "Monitor resumed", global);
            Ok(())
        }
    }
}

pub async fn handle(
    ctx: &Context,
    args: MonitorsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (session, _host) = util::logged_in_session(ctx, global, &args.auth).await?;
    let result = run(&session, args.command, global).await;
    session.shutdown().await;
    result
}
