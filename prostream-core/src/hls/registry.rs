//! Registry of running transcoder processes.
//!
//! The single piece of mutable shared state in the engine. Transcoder
//! monitor tasks own their `Child` handles; the registry holds a kill
//! channel per logical track key, so stop/reap paths never reach into
//! another component's process handle directly.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::probe::TrackKind;

/// Logical key for one spawned transcoder process.
///
/// Renders as `video-{session}` or `audio-{session}-{ordinal}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessKey {
    kind: TrackKind,
    session_id: String,
    ordinal: Option<u32>,
}

impl ProcessKey {
    /// Key for a session's video track process.
    pub fn video(session_id: &str) -> Self {
        Self {
            kind: TrackKind::Video,
            session_id: session_id.to_string(),
            ordinal: None,
        }
    }

    /// Key for a session's n-th audio track process.
    pub fn audio(session_id: &str, ordinal: u32) -> Self {
        Self {
            kind: TrackKind::Audio,
            session_id: session_id.to_string(),
            ordinal: Some(ordinal),
        }
    }

    /// Whether this key belongs to the given session.
    pub fn belongs_to(&self, session_id: &str) -> bool {
        self.session_id == session_id
    }

    /// The session this key belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.kind {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        };
        match self.ordinal {
            Some(n) => write!(f, "{role}-{}-{n}", self.session_id),
            None => write!(f, "{role}-{}", self.session_id),
        }
    }
}

/// Handle to a registered process: enough to identify and terminate it.
struct RegisteredProcess {
    pid: Option<u32>,
    kill_tx: oneshot::Sender<()>,
}

/// Concurrency-safe table of running transcoder processes.
///
/// At most one process is registered per key at any time. Termination is
/// forceful: the kill signal tells the owning monitor task to SIGKILL its
/// child, since an abandoned transcoder has nothing to flush.
#[derive(Default)]
pub struct ProcessRegistry {
    processes: Mutex<HashMap<ProcessKey, RegisteredProcess>>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process under `key`.
    ///
    /// If a stale entry already occupies the key it is killed first,
    /// preserving the one-process-per-key invariant.
    pub fn register(&self, key: ProcessKey, pid: Option<u32>, kill_tx: oneshot::Sender<()>) {
        let previous = self
            .processes
            .lock()
            .insert(key.clone(), RegisteredProcess { pid, kill_tx });

        if let Some(stale) = previous {
            warn!("Replacing stale process entry for {} (pid {:?})", key, stale.pid);
            let _ = stale.kill_tx.send(());
        }

        debug!("Registered process {} (pid {:?})", key, pid);
    }

    /// Whether a process is currently registered under `key`.
    pub fn contains(&self, key: &ProcessKey) -> bool {
        self.processes.lock().contains_key(key)
    }

    /// Removes a key without killing its process.
    ///
    /// Used by monitor tasks when their child exits on its own.
    /// Returns `false` if the key was not registered.
    pub fn deregister(&self, key: &ProcessKey) -> bool {
        let removed = self.processes.lock().remove(key).is_some();
        if removed {
            debug!("Deregistered process {}", key);
        }
        removed
    }

    /// Forcefully terminates the process registered under `key`.
    ///
    /// No-op if the key is absent.
    pub fn kill(&self, key: &ProcessKey) {
        if let Some(process) = self.processes.lock().remove(key) {
            debug!("Killing process {} (pid {:?})", key, process.pid);
            let _ = process.kill_tx.send(());
        }
    }

    /// Kills every process belonging to a session.
    ///
    /// Returns the number of processes terminated.
    pub fn kill_session(&self, session_id: &str) -> usize {
        let drained: Vec<(ProcessKey, RegisteredProcess)> = {
            let mut processes = self.processes.lock();
            let keys: Vec<ProcessKey> = processes
                .keys()
                .filter(|key| key.belongs_to(session_id))
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| processes.remove_entry(&key))
                .collect()
        };

        let count = drained.len();
        for (key, process) in drained {
            debug!("Killing process {} (pid {:?})", key, process.pid);
            let _ = process.kill_tx.send(());
        }
        count
    }

    /// Number of currently registered processes.
    pub fn active_count(&self) -> usize {
        self.processes.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &ProcessRegistry, key: ProcessKey) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        registry.register(key, Some(42), tx);
        rx
    }

    #[test]
    fn test_key_rendering() {
        assert_eq!(ProcessKey::video("abc").to_string(), "video-abc");
        assert_eq!(ProcessKey::audio("abc", 1).to_string(), "audio-abc-1");
    }

    #[test]
    fn test_key_equality_and_hashing() {
        let mut map = HashMap::new();
        map.insert(ProcessKey::video("s1"), 1);
        map.insert(ProcessKey::audio("s1", 0), 2);
        map.insert(ProcessKey::audio("s1", 1), 3);

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&ProcessKey::video("s1")), Some(&1));
        assert_eq!(map.get(&ProcessKey::audio("s1", 1)), Some(&3));
    }

    #[test]
    fn test_register_and_deregister() {
        let registry = ProcessRegistry::new();
        let key = ProcessKey::video("s1");
        let _rx = register(&registry, key.clone());

        assert!(registry.contains(&key));
        assert!(registry.deregister(&key));
        assert!(!registry.contains(&key));
        assert!(!registry.deregister(&key));
    }

    #[test]
    fn test_kill_signals_monitor() {
        let registry = ProcessRegistry::new();
        let key = ProcessKey::video("s1");
        let mut rx = register(&registry, key.clone());

        registry.kill(&key);

        assert!(rx.try_recv().is_ok());
        assert!(!registry.contains(&key));
    }

    #[test]
    fn test_kill_absent_key_is_noop() {
        let registry = ProcessRegistry::new();
        registry.kill(&ProcessKey::video("ghost"));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_kill_session_scoped_by_session_id() {
        let registry = ProcessRegistry::new();
        let mut s1_video = register(&registry, ProcessKey::video("s1"));
        let mut s1_audio = register(&registry, ProcessKey::audio("s1", 0));
        let mut s2_video = register(&registry, ProcessKey::video("s2"));

        let killed = registry.kill_session("s1");

        assert_eq!(killed, 2);
        assert!(s1_video.try_recv().is_ok());
        assert!(s1_audio.try_recv().is_ok());
        assert!(s2_video.try_recv().is_err());
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_duplicate_register_kills_stale_entry() {
        let registry = ProcessRegistry::new();
        let key = ProcessKey::audio("s1", 2);
        let mut stale_rx = register(&registry, key.clone());
        let _fresh_rx = register(&registry, key.clone());

        assert!(stale_rx.try_recv().is_ok());
        assert_eq!(registry.active_count(), 1);
    }
}
