//! Scan events and the in-process bus that fans them out.
//!
//! Each subscriber owns an unbounded queue. A publish pushes the event onto
//! every live queue in turn, so events from one producer arrive in emission
//! order at every subscriber. Events published while nobody is subscribed are
//! dropped.

use std::fmt;
use std::sync::Mutex;

use chrono::Local;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::target_manager::RootDomain;
use crate::SinkRef;

/// Current local time as `[HH:MM:SS]`.
pub fn timestamp() -> String {
    Local::now().format("[%H:%M:%S]").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ScanEvent {
    Log {
        level: LogLevel,
        message: String,
    },
    DomainInitialized {
        domain: RootDomain,
        total: usize,
    },
    ProgressUpdate {
        domain: RootDomain,
        checked: usize,
        found: usize,
    },
    ResultFound {
        domain: RootDomain,
        message: String,
    },
    StatusObserved {
        domain: RootDomain,
        code: u16,
        url: String,
        size: u64,
    },
}

impl ScanEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        ScanEvent::Log { level, message: message.into() }
    }

    /// Log line prefixed with the local wall-clock time, `[HH:MM:SS] message`.
    pub fn stamped(level: LogLevel, message: impl AsRef<str>) -> Self {
        Self::log(level, format!("{} {}", timestamp(), message.as_ref()))
    }
}

/// Receiving end of one subscription.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ScanEvent>,
}

impl EventStream {
    /// Waits for the next event. `None` once the bus is closed and drained.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        self.rx.recv().await
    }

    /// Returns an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ScanEvent> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ScanEvent>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        EventStream { rx }
    }

    /// Delivers `event` to every current subscriber. Subscribers whose stream
    /// was dropped are pruned here.
    pub fn publish(&self, event: ScanEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Spawns a task that forwards a fresh subscription into `sink` until the
    /// bus is closed.
    pub fn attach(&self, sink: SinkRef) -> JoinHandle<()> {
        let mut stream = self.subscribe();
        tokio::spawn(async move {
            while let Some(event) = stream.recv().await {
                sink.dispatch(&event);
            }
        })
    }

    /// Drops every subscriber queue. Streams still yield what was already
    /// queued, then end.
    pub fn close(&self) {
        self.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<ScanEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
