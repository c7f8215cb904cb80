// ── Live monitoring store ──
//
// Mirror of server-pushed monitoring data. Mutations come from a single
// dispatch task; snapshots are published to readers via `watch`.

pub(crate) mod live_state;
pub(crate) mod live_store;
mod views;

pub use live_state::{LiveState, uptime_key};
pub use live_store::LiveStore;
pub use views::MonitorStatus;
