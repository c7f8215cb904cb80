//! `watch`: stream toasts and status transitions until Ctrl-C.
//!
//! Toasts come out of the session's host on stderr; status changes and
//! connection transitions go to stdout (as JSON lines with `-o json`).

use std::collections::BTreeMap;

use owo_colors::OwoColorize;
use serde::Serialize;

use kumalink_core::{LiveState, MonitorId, MonitorStatus};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{Context, util};

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusChange {
    pub id: MonitorId,
    pub name: String,
    pub from: Option<MonitorStatus>,
    pub to: MonitorStatus,
    pub message: Option<String>,
}

/// Status transitions between two snapshots' status maps.
pub fn diff_statuses(
    previous: &BTreeMap<MonitorId, MonitorStatus>,
    state: &LiveState,
) -> Vec<StatusChange> {
    state
        .statuses()
        .into_iter()
        .filter(|(id, status)| previous.get(id) != Some(status))
        .map(|(id, to)| StatusChange {
            id,
            name: state.monitor_name(id),
            from: previous.get(&id).copied(),
            to,
            message: state
                .last_heartbeat(id)
                .map(|hb| hb.msg.clone())
                .filter(|m| !m.is_empty()),
        })
        .collect()
}

fn render_change(
    change: &StatusChange,
    format: OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(change)?,
        OutputFormat::Plain => format!("{}\t{}", change.id, change.to),
        OutputFormat::Table => {
            let mut line = format!(
                "{} {} → {}",
                change.name,
                change.from.map_or("-", MonitorStatus::label),
                output::paint_status(change.to, color),
            );
            if let Some(msg) = &change.message {
                line.push_str(&format!("  {msg}"));
            }
            line
        }
    })
}

pub async fn handle(ctx: &Context, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, _host) = util::logged_in_session(ctx, global, &args.auth).await?;
    let color = output::should_color(global.color, &std::io::stdout());
    output::notice(
        &format!("Watching {} (Ctrl-C to stop)", session.config().server),
        global.quiet,
    );

    let mut state = session.subscribe_state();
    let mut connection = session.subscribe_connection();
    let mut previous = state.current().statuses();
    let mut connected = connection.current().connected;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = 'watch: loop {
        tokio::select! {
            biased;

            signal = &mut ctrl_c => break signal.map_err(CliError::from),

            Some(conn) = connection.changed() => {
                if conn.connected != connected {
                    connected = conn.connected;
                    let msg = if connected {
                        "connection restored"
                    } else {
                        "connection lost, reconnecting"
                    };
                    let msg = if color && !connected {
                        msg.yellow().to_string()
                    } else {
                        msg.to_owned()
                    };
                    output::notice(&msg, global.quiet);
                }
            }

            snapshot = state.changed() => {
                let Some(snapshot) = snapshot else {
                    break Ok(());
                };
                for change in diff_statuses(&previous, &snapshot) {
                    match render_change(&change, global.output, color) {
                        Ok(line) => output::print_output(&line, global.quiet),
                        Err(e) => break 'watch Err(e),
                    }
                }
                previous = snapshot.statuses();
            }
        }
    };

    session.shutdown().await;
    result
}
