// ── Derived views ──
//
// Pure read-only projections over a `LiveState` snapshot.

use std::collections::BTreeMap;

use kumalink_api::{Heartbeat, MonitorId};
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use super::live_state::{LiveState, uptime_key};

/// Tri-state monitor status shown in dashboards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
)]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl MonitorStatus {
    /// Status implied by a monitor's most recent heartbeat.
    pub fn from_last(heartbeat: Option<&Heartbeat>) -> Self {
        match heartbeat.map(|hb| hb.status) {
            Some(1) => Self::Up,
            Some(0) => Self::Down,
            _ => Self::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Colour class used when rendering the status badge.
    pub fn color(self) -> &'static str {
        match self {
            Self::Up => "primary",
            Self::Down => "danger",
            Self::Unknown => "secondary",
        }
    }
}

impl LiveState {
    /// Heartbeat history for one monitor, oldest first.
    pub fn heartbeats_for(&self, id: MonitorId) -> &[Heartbeat] {
        self.heartbeats
            .get(&id)
            .map(|list| list.as_slice())
            .unwrap_or_default()
    }

    /// Important heartbeats for one monitor, newest first.
    pub fn important_for(&self, id: MonitorId) -> impl Iterator<Item = &Heartbeat> {
        self.important_heartbeats
            .get(&id)
            .into_iter()
            .flat_map(|list| list.iter())
    }

    pub fn last_heartbeat(&self, id: MonitorId) -> Option<&Heartbeat> {
        self.heartbeats.get(&id).and_then(|list| list.last())
    }

    /// Latest heartbeat of every monitor that has history.
    pub fn last_heartbeats(&self) -> BTreeMap<MonitorId, &Heartbeat> {
        self.heartbeats
            .iter()
            .filter_map(|(id, list)| list.last().map(|hb| (*id, hb)))
            .collect()
    }

    pub fn status(&self, id: MonitorId) -> MonitorStatus {
        MonitorStatus::from_last(self.last_heartbeat(id))
    }

    /// Status of every monitor known from either the monitor list or history.
    pub fn statuses(&self) -> BTreeMap<MonitorId, MonitorStatus> {
        self.monitors
            .keys()
            .chain(self.heartbeats.keys())
            .map(|id| (*id, self.status(*id)))
            .collect()
    }

    pub fn uptime(&self, id: MonitorId, period: &str) -> Option<f64> {
        self.uptime.get(&uptime_key(id, period)).copied()
    }

    pub fn avg_ping(&self, id: MonitorId) -> Option<f64> {
        self.avg_ping.get(&id).copied().flatten()
    }

    /// Display name, `#id` when the monitor list hasn't mentioned it.
    pub fn monitor_name(&self, id: MonitorId) -> String {
        self.monitors
            .get(&id)
            .map_or_else(|| format!("#{id}"), |m| m.name.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::live_state::tests::hb;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_follows_last_heartbeat() {
        let mut state = LiveState::default();
        let m = MonitorId(1);
        assert_eq!(state.status(m), MonitorStatus::Unknown);

        state.push_heartbeat(hb(1, 1, false, "2024-01-01 00:00:10"));
        assert_eq!(state.status(m), MonitorStatus::Up);

        state.push_heartbeat(hb(1, 0, false, "2024-01-01 00:00:20"));
        assert_eq!(state.status(m), MonitorStatus::Down);

        state.push_heartbeat(hb(1, 2, false, "2024-01-01 00:00:30"));
        assert_eq!(state.status(m), MonitorStatus::Unknown);

        state.push_heartbeat(hb(1, 3, false, "2024-01-01 00:00:40"));
        assert_eq!(state.status(m), MonitorStatus::Unknown);
    }

    #[test]
    fn empty_history_list_is_unknown() {
        let mut state = LiveState::default();
        state.heartbeats.insert(MonitorId(4), Arc::new(Vec::new()));
        assert_eq!(state.status(MonitorId(4)), MonitorStatus::Unknown);
        assert!(state.last_heartbeats().is_empty());
        assert_eq!(state.statuses()[&MonitorId(4)], MonitorStatus::Unknown);
    }

    #[test]
    fn statuses_cover_listed_monitors() {
        let mut state = LiveState::default();
        state.monitors = Arc::new(
            serde_json::from_value(serde_json::json!({
                "1": {"name": "a"},
                "2": {"name": "b"}
            }))
            .unwrap(),
        );
        state.push_heartbeat(hb(2, 1, false, "2024-01-01 00:00:10"));

        let statuses = state.statuses();
        assert_eq!(statuses[&MonitorId(1)], MonitorStatus::Unknown);
        assert_eq!(statuses[&MonitorId(2)], MonitorStatus::Up);
        assert_eq!(state.monitor_name(MonitorId(2)), "b");
        assert_eq!(state.monitor_name(MonitorId(3)), "#3");
    }

    #[test]
    fn status_labels_and_colours() {
        assert_eq!(MonitorStatus::Up.label(), "Up");
        assert_eq!(MonitorStatus::Up.color(), "primary");
        assert_eq!(MonitorStatus::Down.label(), "Down");
        assert_eq!(MonitorStatus::Down.color(), "danger");
        assert_eq!(MonitorStatus::Unknown.to_string(), "Unknown");
        assert_eq!(MonitorStatus::Unknown.color(), "secondary");
    }

    #[test]
    fn null_avg_ping_reads_as_none() {
        let mut state = LiveState::default();
        state.avg_ping.insert(MonitorId(1), None);
        assert_eq!(state.avg_ping(MonitorId(1)), None);
        assert_eq!(state.uptime(MonitorId(1), "24"), None);
    }
}
