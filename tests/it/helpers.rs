use cotext_core::crdt::text::{Operation, TextReplica};
use cotext_core::sync::{MemoryRelay, RopeSurface, SessionDriver, SessionEvent, SessionHandle};
use cotext_core::SessionConfig;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Poll `$cond` until it holds, failing after five seconds
macro_rules! eventually {
    ($cond:expr) => {{
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            if $cond {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {}",
                stringify!($cond)
            );
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }};
}
pub(crate) use eventually;

/// Short timers so tests settle quickly
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        flush_interval_ms: 10,
        caret_probe_interval_ms: 10,
        reconnect_initial_delay_ms: 10,
        reconnect_max_delay_ms: 40,
        ..SessionConfig::default()
    }
}

/// Start a session on `relay` with a headless surface
pub fn start(
    relay: &MemoryRelay,
    document_id: &str,
    site_id: &str,
) -> (SessionHandle, UnboundedReceiver<SessionEvent>) {
    SessionDriver::spawn(
        Arc::new(relay.clone()),
        document_id.to_string(),
        site_id.to_string(),
        fast_config(),
        Box::new(RopeSurface::new()),
    )
    .expect("valid config")
}

/// Deliver every operation to `replica`
pub fn deliver(replica: &mut TextReplica, ops: &[Operation]) {
    for op in ops {
        replica.apply(op);
    }
}
