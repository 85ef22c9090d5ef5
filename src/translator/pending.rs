//! Completion handles for requests awaiting a bus reply.
//!
//! Each pending request is keyed by the exact topic its reply will arrive
//! on. A handle leaves the table exactly once: completed by the reply,
//! expired by the sweep, or failed because its device detached. Whatever
//! removes it delivers the outcome, so a late or duplicate reply finds
//! nothing and cannot be delivered twice.
//!
//! The mutex covers the map only. Sink callbacks run after it is released.

use crate::error::TranslateError;
use crate::matter::{ClusterId, CommandCompletion, CommandReply, EndpointId, Operation, ProtocolSink};
use crate::node_state::NodeStateMonitor;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Identifies one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionHandle(u64);

impl CompletionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Who asked, so the outcome can be addressed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub operation: Operation,
}

/// How a handle left the pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Completed,
    TimedOut,
    Detached,
}

struct PendingEntry {
    handle: CompletionHandle,
    unid: String,
    origin: RequestOrigin,
    deadline: Instant,
}

pub struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
    next_id: AtomicU64,
    timeout: Duration,
    sink: Arc<dyn ProtocolSink>,
}

impl PendingRequests {
    pub fn new(timeout: Duration, sink: Arc<dyn ProtocolSink>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
            sink,
        }
    }

    /// Register a request whose reply is expected on `reply_topic`.
    ///
    /// Must be called before the request is published. Fails with
    /// `RequestInFlight` if that topic already has a pending request.
    pub fn register(
        &self,
        reply_topic: String,
        unid: &str,
        origin: RequestOrigin,
    ) -> Result<CompletionHandle, TranslateError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&reply_topic) {
            return Err(TranslateError::RequestInFlight(reply_topic));
        }

        let handle = CompletionHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!("[Bridge] Handle {} waiting on {}", handle.0, reply_topic);
        entries.insert(
            reply_topic,
            PendingEntry {
                handle,
                unid: unid.to_string(),
                origin,
                deadline: Instant::now() + self.timeout,
            },
        );
        Ok(handle)
    }

    /// Drop a handle without delivering anything.
    ///
    /// Only for rolling back a registration whose publish failed; the caller
    /// reports that failure synchronously.
    pub fn discard(&self, reply_topic: &str, handle: CompletionHandle) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(reply_topic) {
            Some(entry) if entry.handle == handle => {
                entries.remove(reply_topic);
                true
            }
            _ => false,
        }
    }

    /// Complete the request waiting on `reply_topic`, if any.
    ///
    /// Returns false when nothing was waiting (late, duplicate or
    /// unsolicited reply).
    pub fn complete(&self, reply_topic: &str, reply: CommandReply) -> bool {
        let entry = self.entries.lock().remove(reply_topic);
        match entry {
            Some(entry) => {
                self.deliver(entry, Resolution::Completed, Ok(reply));
                true
            }
            None => false,
        }
    }

    /// Expire every request whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> usize {
        let expired = self.take_where(|entry| entry.deadline <= now);
        let count = expired.len();
        for entry in expired {
            self.deliver(entry, Resolution::TimedOut, Err(TranslateError::TimedOut));
        }
        count
    }

    /// Fail every request addressed to `unid`; the device left the bus.
    pub fn fail_device(&self, unid: &str) -> usize {
        let failed = self.take_where(|entry| entry.unid == unid);
        let count = failed.len();
        for entry in failed {
            let err = TranslateError::DeviceUnavailable(entry.origin.endpoint);
            self.deliver(entry, Resolution::Detached, Err(err));
        }
        count
    }

    /// Fail every request whose endpoint no longer resolves to the device
    /// it was sent to. Used when detach notifications may have been missed.
    pub fn fail_unreachable(&self, monitor: &dyn NodeStateMonitor) -> usize {
        let failed = self.take_where(|entry| {
            monitor
                .resolve_endpoint(entry.origin.endpoint)
                .is_none_or(|address| address.unid != entry.unid)
        });
        let count = failed.len();
        for entry in failed {
            let err = TranslateError::DeviceUnavailable(entry.origin.endpoint);
            self.deliver(entry, Resolution::Detached, Err(err));
        }
        count
    }

    pub fn is_pending(&self, handle: CompletionHandle) -> bool {
        self.entries.lock().values().any(|entry| entry.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_where(&self, pred: impl Fn(&PendingEntry) -> bool) -> Vec<PendingEntry> {
        let mut entries = self.entries.lock();
        let keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| pred(entry))
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter().filter_map(|key| entries.remove(key)).collect()
    }

    fn deliver(
        &self,
        entry: PendingEntry,
        resolution: Resolution,
        result: Result<CommandReply, TranslateError>,
    ) {
        match resolution {
            Resolution::Completed => debug!("[Bridge] Handle {} completed", entry.handle.0),
            Resolution::TimedOut => warn!(
                "[Bridge] Handle {} ({} {} {}) timed out after {:?}",
                entry.handle.0,
                entry.origin.endpoint,
                entry.origin.cluster,
                entry.origin.operation,
                self.timeout
            ),
            Resolution::Detached => info!(
                "[Bridge] Handle {} failed: {} detached",
                entry.handle.0, entry.unid
            ),
        }

        self.sink.command_completed(CommandCompletion {
            handle: entry.handle,
            endpoint: entry.origin.endpoint,
            cluster: entry.origin.cluster,
            operation: entry.origin.operation,
            result,
        });
    }
}
