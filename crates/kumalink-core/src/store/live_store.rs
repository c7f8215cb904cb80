// ── Live store ──
//
// Applies push events to `LiveState` and publishes each result through a
// `watch` channel. Toasts for important heartbeats go to the host after
// the snapshot has been published.

use std::sync::Arc;

use kumalink_api::{Heartbeat, MonitorId, MonitorMap, Notification, PushEvent};
use tokio::sync::watch;

use super::live_state::{LiveState, uptime_key};
use crate::host::{Host, Toast};
use crate::stream::StateStream;

pub struct LiveStore {
    state: watch::Sender<Arc<LiveState>>,
    host: Arc<dyn Host>,
}

impl LiveStore {
    pub fn new(host: Arc<dyn Host>) -> Self {
        let (state, _) = watch::channel(Arc::new(LiveState::default()));
        Self { state, host }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<LiveState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> StateStream<Arc<LiveState>> {
        StateStream::new(self.state.subscribe())
    }

    fn mutate(&self, f: impl FnOnce(&mut LiveState)) {
        self.state.send_modify(|state| f(Arc::make_mut(state)));
    }

    /// Route a push event to its mutator.
    pub fn apply(&self, event: PushEvent) {
        match event {
            PushEvent::MonitorList(monitors) => self.on_monitor_list(monitors),
            PushEvent::NotificationList(list) => self.on_notification_list(list),
            PushEvent::Heartbeat(heartbeat) => self.on_heartbeat(heartbeat),
            PushEvent::HeartbeatList {
                monitor_id,
                heartbeats,
            } => self.on_heartbeat_list(monitor_id, heartbeats),
            PushEvent::ImportantHeartbeatList {
                monitor_id,
                heartbeats,
            } => self.on_important_heartbeat_list(monitor_id, heartbeats),
            PushEvent::AvgPing { monitor_id, value } => self.on_avg_ping(monitor_id, value),
            PushEvent::Uptime {
                monitor_id,
                period,
                value,
            } => self.on_uptime(monitor_id, &period, value),
            PushEvent::Other { name, .. } => {
                tracing::debug!(event = %name, "ignoring unhandled push event");
            }
        }
    }

    // ── Mutators ─────────────────────────────────────────────────────

    pub fn on_monitor_list(&self, monitors: MonitorMap) {
        tracing::debug!(count = monitors.len(), "monitor list");
        self.mutate(|state| state.monitors = Arc::new(monitors));
    }

    pub fn on_notification_list(&self, notifications: Vec<Notification>) {
        self.mutate(|state| state.notifications = Arc::new(notifications));
    }

    pub fn on_heartbeat(&self, heartbeat: Heartbeat) {
        let mut toast = None;
        self.mutate(|state| {
            if heartbeat.important {
                let name = state.monitor_name(heartbeat.monitor_id);
                toast = Some(important_toast(&name, &heartbeat));
                state.push_important(heartbeat.clone());
            }
            state.push_heartbeat(heartbeat);
        });

        if let Some(toast) = toast {
            self.host.notify(toast);
        }
    }

    pub fn on_heartbeat_list(&self, monitor_id: MonitorId, heartbeats: Vec<Heartbeat>) {
        tracing::debug!(%monitor_id, count = heartbeats.len(), "heartbeat history");
        self.mutate(|state| state.merge_heartbeats(monitor_id, heartbeats));
    }

    pub fn on_important_heartbeat_list(&self, monitor_id: MonitorId, heartbeats: Vec<Heartbeat>) {
        self.mutate(|state| state.merge_important(monitor_id, heartbeats));
    }

    pub fn on_avg_ping(&self, monitor_id: MonitorId, value: Option<f64>) {
        self.mutate(|state| {
            state.avg_ping.insert(monitor_id, value);
        });
    }

    pub fn on_uptime(&self, monitor_id: MonitorId, period: &str, value: f64) {
        let key = uptime_key(monitor_id, period);
        self.mutate(|state| {
            state.uptime.insert(key, value);
        });
    }

    /// Drop all heartbeat history. Catch-up pushes repopulate it.
    pub fn clear_heartbeat_caches(&self) {
        tracing::debug!("resetting heartbeat lists");
        self.mutate(LiveState::clear_heartbeats);
    }
}

fn important_toast(name: &str, heartbeat: &Heartbeat) -> Toast {
    match heartbeat.status {
        0 => Toast::error(format!("[{name}] [DOWN] {}", heartbeat.msg)),
        1 => Toast::success(format!("[{name}] [Up] {}", heartbeat.msg)),
        _ => Toast::info(format!("[{name}] {}", heartbeat.msg)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::host::{ToastLevel, ToastTimeout};
    use crate::store::live_state::tests::hb;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Host that records every toast.
    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub toasts: Mutex<Vec<Toast>>,
        pub credential_hints: Mutex<u32>,
    }

    impl RecordingHost {
        pub fn toasts(&self) -> Vec<Toast> {
            self.toasts.lock().unwrap().clone()
        }
    }

    impl Host for RecordingHost {
        fn notify(&self, toast: Toast) {
            self.toasts.lock().unwrap().push(toast);
        }

        fn detect_timezone(&self) -> String {
            "America/New_York".into()
        }

        fn save_credentials_hint(&self) {
            *self.credential_hints.lock().unwrap() += 1;
        }
    }

    fn store() -> (LiveStore, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        (LiveStore::new(host.clone()), host)
    }

    fn monitors() -> MonitorMap {
        serde_json::from_value(json!({"1": {"id": 1, "name": "Homepage"}})).unwrap()
    }

    #[test]
    fn important_transitions_are_toasted() {
        let (store, host) = store();
        store.on_monitor_list(monitors());

        store.on_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        store.on_heartbeat(hb(1, 0, true, "2024-01-01 00:00:20"));
        store.on_heartbeat(hb(1, 2, true, "2024-01-01 00:00:30"));
        store.on_heartbeat(hb(1, 2, false, "2024-01-01 00:00:40"));

        let toasts = host.toasts();
        assert_eq!(toasts.len(), 3);
        assert_eq!(toasts[0].message, "[Homepage] [Up] status 1");
        assert_eq!(toasts[0].level, ToastLevel::Success);
        assert_eq!(toasts[1].message, "[Homepage] [DOWN] status 0");
        assert_eq!(toasts[1].timeout, ToastTimeout::Persistent);
        assert_eq!(toasts[2].message, "[Homepage] status 2");
        assert_eq!(toasts[2].level, ToastLevel::Info);
    }

    #[test]
    fn unknown_monitor_falls_back_to_id() {
        let (store, host) = store();
        store.on_heartbeat(hb(9, 0, true, "2024-01-01 00:00:10"));
        assert_eq!(host.toasts()[0].message, "[#9] [DOWN] status 0");
    }

    #[test]
    fn up_then_down_scenario() {
        let (store, _host) = store();
        store.on_monitor_list(monitors());
        store.on_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        store.on_heartbeat(hb(1, 0, true, "2024-01-01 00:00:20"));

        let snap = store.snapshot();
        let m1 = MonitorId(1);
        let statuses: Vec<i64> = snap.heartbeats[&m1].iter().map(|h| h.status).collect();
        let important: Vec<i64> = snap.important_heartbeats[&m1]
            .iter()
            .map(|h| h.status)
            .collect();
        assert_eq!(statuses, vec![1, 0]);
        assert_eq!(important, vec![0, 1]);
        assert_eq!(snap.status(m1), crate::store::MonitorStatus::Down);
    }

    #[test]
    fn catch_up_merges_before_held_heartbeat() {
        let (store, _host) = store();
        let m1 = MonitorId(1);
        store.on_heartbeat(hb(1, 1, false, "2024-01-01 00:00:30"));
        store.on_heartbeat_list(
            m1,
            vec![
                hb(1, 1, false, "2024-01-01 00:00:10"),
                hb(1, 1, false, "2024-01-01 00:00:20"),
            ],
        );

        let times: Vec<String> = store.snapshot().heartbeats[&m1]
            .iter()
            .map(|h| h.time.clone())
            .collect();
        assert_eq!(
            times,
            vec![
                "2024-01-01 00:00:10",
                "2024-01-01 00:00:20",
                "2024-01-01 00:00:30"
            ]
        );
    }

    #[test]
    fn metrics_are_replaced_per_key() {
        let (store, _host) = store();
        store.apply(PushEvent::AvgPing {
            monitor_id: MonitorId(1),
            value: Some(40.0),
        });
        store.apply(PushEvent::AvgPing {
            monitor_id: MonitorId(1),
            value: Some(22.5),
        });
        store.apply(PushEvent::Uptime {
            monitor_id: MonitorId(1),
            period: "24".into(),
            value: 0.99,
        });
        store.apply(PushEvent::Uptime {
            monitor_id: MonitorId(1),
            period: "720".into(),
            value: 0.98,
        });

        let snap = store.snapshot();
        assert_eq!(snap.avg_ping(MonitorId(1)), Some(22.5));
        assert_eq!(snap.uptime["1_24"], 0.99);
        assert_eq!(snap.uptime(MonitorId(1), "720"), Some(0.98));
    }

    #[test]
    fn clear_then_repopulate_leaves_no_residue() {
        let (store, _host) = store();
        store.on_heartbeat(hb(1, 1, true, "2024-01-01 00:00:10"));
        store.on_heartbeat(hb(2, 0, true, "2024-01-01 00:00:10"));

        store.clear_heartbeat_caches();
        let snap = store.snapshot();
        assert!(snap.heartbeats.is_empty());
        assert!(snap.important_heartbeats.is_empty());

        store.on_heartbeat_list(MonitorId(1), vec![hb(1, 0, false, "2024-01-01 00:01:00")]);
        let snap = store.snapshot();
        assert_eq!(snap.heartbeats.len(), 1);
        assert_eq!(snap.heartbeats[&MonitorId(1)].len(), 1);
        assert!(snap.important_heartbeats.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_each_mutation() {
        let (store, _host) = store();
        let mut sub = store.subscribe();
        assert!(sub.current().monitors.is_empty());

        store.on_monitor_list(monitors());
        let snap = sub.changed().await.unwrap();
        assert_eq!(snap.monitors.len(), 1);
    }
}
