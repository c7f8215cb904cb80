//! `status`: one-shot table of every monitor's live status.

use serde::Serialize;
use tabled::Tabled;

use kumalink_core::{LiveState, MonitorId, MonitorStatus};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::host::TerminalHost;
use crate::output;

use super::{Context, util};

/// Uptime window shown in the table, in hours.
const UPTIME_PERIOD: &str = "24";

// ── Row model ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MonitorSummary {
    pub id: MonitorId,
    pub name: String,
    pub status: MonitorStatus,
    pub message: Option<String>,
    pub last_seen: Option<String>,
    pub avg_ping_ms: Option<f64>,
    pub uptime_24h: Option<f64>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Last Message")]
    message: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
    #[tabled(rename = "Avg Ping")]
    ping: String,
    #[tabled(rename = "24h Uptime")]
    uptime: String,
}

/// One summary per monitor known from the monitor list or history.
pub fn summarize(state: &LiveState, host: &TerminalHost) -> Vec<MonitorSummary> {
    state
        .statuses()
        .into_iter()
        .map(|(id, status)| {
            let last = state.last_heartbeat(id);
            MonitorSummary {
                id,
                name: state.monitor_name(id),
                status,
                message: last.map(|hb| hb.msg.clone()).filter(|m| !m.is_empty()),
                last_seen: last
                    .and_then(kumalink_core::Heartbeat::timestamp)
                    .map(|t| host.local_time(t)),
                avg_ping_ms: state.avg_ping(id),
                uptime_24h: state.uptime(id, UPTIME_PERIOD),
            }
        })
        .collect()
}

fn to_row(s: &MonitorSummary, color: bool) -> StatusRow {
    StatusRow {
        id: s.id.to_string(),
        name: s.name.clone(),
        status: output::paint_status(s.status, color),
        message: s.message.clone().unwrap_or_else(|| "-".into()),
        last_seen: s.last_seen.clone().unwrap_or_else(|| "-".into()),
        ping: s
            .avg_ping_ms
            .map_or_else(|| "-".into(), |ms| format!("{ms:.0} ms")),
        uptime: s
            .uptime_24h
            .map_or_else(|| "-".into(), |u| format!("{:.2}%", u * 100.0)),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (session, host) = util::logged_in_session(ctx, global, &args.auth).await?;

    // Catch-up is done once every listed monitor has history; paused
    // monitors never will, hence the bound.
    let snapshot = util::settle(&session, args.settle, |s| {
        !s.monitors.is_empty() && s.monitors.keys().all(|id| s.last_heartbeat(*id).is_some())
    })
    .await;
    session.shutdown().await;

    let color = output::should_color(global.color, &std::io::stdout());
    let summaries = summarize(&snapshot, &host);
    let out = output::render_list(
        global.output,
        &summaries,
        |s| to_row(s, color),
        |s| format!("{}\t{}", s.id, s.status),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
