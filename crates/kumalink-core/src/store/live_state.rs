// ── Snapshot state and merge rules ──
//
// `LiveState` is cloned on write when a reader still holds the previous
// snapshot, so every per-monitor sequence sits behind its own `Arc` and
// only the touched monitor is copied.

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use kumalink_api::{Heartbeat, MonitorId, MonitorMap, Notification};

/// Everything the server has pushed, as of one point in time.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    pub monitors: Arc<MonitorMap>,
    pub notifications: Arc<Vec<Notification>>,
    /// Oldest first.
    pub heartbeats: BTreeMap<MonitorId, Arc<Vec<Heartbeat>>>,
    /// Newest first, important heartbeats only.
    pub important_heartbeats: BTreeMap<MonitorId, Arc<VecDeque<Heartbeat>>>,
    pub avg_ping: BTreeMap<MonitorId, Option<f64>>,
    /// Keyed by [`uptime_key`].
    pub uptime: BTreeMap<String, f64>,
    /// Bumped every time the heartbeat caches are cleared.
    pub cache_epoch: u64,
}

/// `"{monitor}_{period}"`, the key the uptime map is indexed by.
pub fn uptime_key(monitor_id: MonitorId, period: &str) -> String {
    format!("{monitor_id}_{period}")
}

impl LiveState {
    pub(crate) fn push_heartbeat(&mut self, heartbeat: Heartbeat) {
        let list = self.heartbeats.entry(heartbeat.monitor_id).or_default();
        insert_ascending(Arc::make_mut(list), heartbeat);
    }

    pub(crate) fn push_important(&mut self, heartbeat: Heartbeat) {
        let list = self
            .important_heartbeats
            .entry(heartbeat.monitor_id)
            .or_default();
        insert_descending(Arc::make_mut(list), heartbeat);
    }

    pub(crate) fn merge_heartbeats(&mut self, monitor_id: MonitorId, data: Vec<Heartbeat>) {
        let merged = match self.heartbeats.remove(&monitor_id) {
            None => data,
            Some(existing) => concat(data, Arc::unwrap_or_clone(existing)),
        };
        self.heartbeats
            .insert(monitor_id, Arc::new(sort_ascending(merged)));
    }

    pub(crate) fn merge_important(&mut self, monitor_id: MonitorId, data: Vec<Heartbeat>) {
        let merged = match self.important_heartbeats.remove(&monitor_id) {
            None => data,
            Some(existing) => concat(data, Arc::unwrap_or_clone(existing).into()),
        };
        self.important_heartbeats
            .insert(monitor_id, Arc::new(sort_descending(merged).into()));
    }

    pub(crate) fn clear_heartbeats(&mut self) {
        self.heartbeats.clear();
        self.important_heartbeats.clear();
        self.cache_epoch = self.cache_epoch.wrapping_add(1);
    }
}

// ── Ordering helpers ─────────────────────────────────────────────────
//
// Heartbeats order by parsed server time. In bulk merges unparsable
// times compare as `None`, i.e. older than anything real; sorts are
// stable, so equal times keep their arrival order. A single pushed
// heartbeat is only moved when its own time and its neighbour's parse,
// otherwise it lands at the newest end like any live heartbeat.

/// `data ++ existing`, never deduplicated.
fn concat(mut data: Vec<Heartbeat>, existing: Vec<Heartbeat>) -> Vec<Heartbeat> {
    data.extend(existing);
    data
}

fn sort_ascending(mut list: Vec<Heartbeat>) -> Vec<Heartbeat> {
    list.sort_by_cached_key(Heartbeat::timestamp);
    list
}

fn sort_descending(mut list: Vec<Heartbeat>) -> Vec<Heartbeat> {
    list.sort_by_cached_key(|hb| Reverse(hb.timestamp()));
    list
}

/// Append in the common case; walk back from the tail for late arrivals.
fn insert_ascending(list: &mut Vec<Heartbeat>, heartbeat: Heartbeat) {
    let late = match (heartbeat.timestamp(), list.last().and_then(Heartbeat::timestamp)) {
        (Some(key), Some(last)) if last > key => Some(key),
        _ => None,
    };
    let Some(key) = late else {
        list.push(heartbeat);
        return;
    };
    let at = list
        .iter()
        .rposition(|hb| hb.timestamp().is_none_or(|t| t <= key))
        .map_or(0, |i| i + 1);
    list.insert(at, heartbeat);
}

/// Prepend in the common case; walk forward from the head for late arrivals.
fn insert_descending(list: &mut VecDeque<Heartbeat>, heartbeat: Heartbeat) {
    let late = match (heartbeat.timestamp(), list.front().and_then(Heartbeat::timestamp)) {
        (Some(key), Some(first)) if first > key => Some(key),
        _ => None,
    };
    let Some(key) = late else {
        list.push_front(heartbeat);
        return;
    };
    let at = list
        .iter()
        .position(|hb| hb.timestamp().is_none_or(|t| t <= key))
        .unwrap_or(list.len());
    list.insert(at, heartbeat);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    pub(crate) fn hb(monitor: u64, status: i64, important: bool, time: &str) -> Heartbeat {
        serde_json::from_value(json!({
            "monitorID": monitor,
            "status": status,
            "msg": format!("status {status}"),
            "important": important,
            "time": time,
        }))
        .unwrap()
    }

    fn times(list: &[Heartbeat]) -> Vec<&str> {
        list.iter().map(|h| h.time.as_str()).collect()
    }

    #[test]
    fn history_list_prepends_and_sorts() {
        let mut state = LiveState::default();
        let m1 = MonitorId(1);
        state.push_heartbeat(hb(1, 1, false, "2024-01-01 00:00:30"));

        state.merge_heartbeats(
            m1,
            vec![
                hb(1, 1, false, "2024-01-01 00:00:10"),
                hb(1, 0, false, "2024-01-01 00:00:20"),
            ],
        );

        assert_eq!(
            times(&state.heartbeats[&m1]),
            vec![
                "2024-01-01 00:00:10",
                "2024-01-01 00:00:20",
                "2024-01-01 00:00:30"
            ]
        );
    }

    #[test]
    fn overlapping_catch_up_is_not_deduplicated() {
        let mut state = LiveState::default();
        let m1 = MonitorId(1);
        let held = hb(1, 1, false, "2024-01-01 00:00:20");
        state.push_heartbeat(held.clone());

        state.merge_heartbeats(m1, vec![hb(1, 1, false, "2024-01-01 00:00:10"), held]);

        let list = &state.heartbeats[&m1];
        assert_eq!(list.len(), 3);
        assert!(list.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
    }

    #[test]
    fn late_heartbeat_is_inserted_in_order() {
        let mut state = LiveState::default();
        for t in ["00:00:10", "00:00:30", "00:00:20", "00:00:40"] {
            state.push_heartbeat(hb(1, 1, false, &format!("2024-01-01 {t}")));
        }
        assert_eq!(
            times(&state.heartbeats[&MonitorId(1)]),
            vec![
                "2024-01-01 00:00:10",
                "2024-01-01 00:00:20",
                "2024-01-01 00:00:30",
                "2024-01-01 00:00:40"
            ]
        );
    }

    #[test]
    fn important_list_is_newest_first() {
        let mut state = LiveState::default();
        let m1 = MonitorId(1);
        state.push_important(hb(1, 1, true, "2024-01-01 00:00:10"));
        state.push_important(hb(1, 0, true, "2024-01-01 00:00:20"));
        state.merge_important(m1, vec![hb(1, 1, true, "2024-01-01 00:00:05")]);
        state.push_important(hb(1, 2, true, "2024-01-01 00:00:15"));

        let list: Vec<_> = state.important_heartbeats[&m1].iter().cloned().collect();
        assert_eq!(
            times(&list),
            vec![
                "2024-01-01 00:00:20",
                "2024-01-01 00:00:15",
                "2024-01-01 00:00:10",
                "2024-01-01 00:00:05"
            ]
        );
    }

    #[test]
    fn unparsable_times_sort_as_oldest() {
        let mut state = LiveState::default();
        let m1 = MonitorId(1);
        state.merge_heartbeats(
            m1,
            vec![hb(1, 1, false, "2024-01-01 00:00:10"), hb(1, 1, false, "garbage")],
        );
        assert_eq!(
            times(&state.heartbeats[&m1]),
            vec!["garbage", "2024-01-01 00:00:10"]
        );
    }

    #[test]
    fn pushed_heartbeat_with_odd_time_is_newest() {
        let mut state = LiveState::default();
        let m1 = MonitorId(1);
        state.push_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        state.push_heartbeat(hb(1, 0, true, "2024-01-01T00:00:20+0000"));
        state.push_important(hb(1, 1, true, "2024-01-01 00:00:10"));
        state.push_important(hb(1, 0, true, "2024-01-01T00:00:20+0000"));

        let statuses: Vec<_> = state.heartbeats[&m1].iter().map(|h| h.status).collect();
        assert_eq!(statuses, vec![1, 0]);
        assert_eq!(state.status(m1), crate::store::MonitorStatus::Down);
        assert_eq!(state.important_heartbeats[&m1][0].status, 0);
    }

    #[test]
    fn clear_bumps_epoch_and_empties_caches() {
        let mut state = LiveState::default();
        state.push_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        state.push_important(hb(1, 1, true, "2024-01-01 00:00:10"));
        state.avg_ping.insert(MonitorId(1), Some(12.0));

        state.clear_heartbeats();

        assert!(state.heartbeats.is_empty());
        assert!(state.important_heartbeats.is_empty());
        assert_eq!(state.cache_epoch, 1);
        // Metrics are only ever overwritten.
        assert_eq!(state.avg_ping[&MonitorId(1)], Some(12.0));
    }

    #[test]
    fn snapshot_is_not_affected_by_later_writes() {
        let mut state = LiveState::default();
        state.push_heartbeat(hb(1, 1, false, "2024-01-01 00:00:10"));
        let snapshot = state.clone();

        state.push_heartbeat(hb(1, 0, false, "2024-01-01 00:00:20"));

        assert_eq!(snapshot.heartbeats[&MonitorId(1)].len(), 1);
        assert_eq!(state.heartbeats[&MonitorId(1)].len(), 2);
    }
}
