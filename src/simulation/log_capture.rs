//! Per-node log capture.
//!
//! Protocol code logs node-scoped events as `[node_id] message`, e.g.
//! `[3] OGM from origin 1 via 2 accepted (seq 7)`. [`TeeLogger`] forwards every
//! record to env_logger and additionally copies node-scoped records emitted from
//! the `simulation` module into a bounded global buffer. The driver drains that
//! buffer once per tick into each node's own history for the inspector.

use embassy_time::Instant;
use log::{Level, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::{LogLevel, NodeId};

/// Maximum number of entries held between two drains; oldest are dropped first.
const LOG_BUFFER_CAPACITY: usize = 10000;

/// Records from modules under this prefix are captured at every level,
/// independently of the terminal filter.
const CAPTURED_MODULE_PREFIX: &str = "batman_mesh_simulator::simulation";

/// A captured log line attributed to one node.
#[derive(Debug, Clone)]
pub struct CapturedLogEntry {
    pub node_id: NodeId,
    pub timestamp: Instant,
    pub content: String,
    pub level: LogLevel,
}

/// `None` until [`init_log_capture`] runs, so nothing accumulates when the
/// tee logger is not installed.
static CAPTURED_LOGS: Mutex<Option<VecDeque<CapturedLogEntry>>> = Mutex::new(None);

fn buffer() -> MutexGuard<'static, Option<VecDeque<CapturedLogEntry>>> {
    // A panic while holding the lock cannot leave the deque half-updated.
    CAPTURED_LOGS.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn init_log_capture() {
    *buffer() = Some(VecDeque::with_capacity(LOG_BUFFER_CAPACITY));
}

/// Take every buffered entry, oldest first.
pub fn drain_captured_logs() -> Vec<CapturedLogEntry> {
    match buffer().as_mut() {
        Some(entries) => entries.drain(..).collect(),
        None => Vec::new(),
    }
}

fn push_log_entry(entry: CapturedLogEntry) {
    if let Some(entries) = buffer().as_mut() {
        if entries.len() >= LOG_BUFFER_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

/// Split `[N] rest` into `(N, rest)`.
fn split_node_prefix(message: &str) -> Option<(NodeId, &str)> {
    let rest = message.trim_start().strip_prefix('[')?;
    let (id, rest) = rest.split_once(']')?;
    let node_id = id.parse().ok()?;
    Some((node_id, rest.trim_start()))
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => LogLevel::Error,
            Level::Warn => LogLevel::Warn,
            Level::Info => LogLevel::Info,
            Level::Debug => LogLevel::Debug,
            Level::Trace => LogLevel::Trace,
        }
    }
}

fn is_captured_module(module: &str) -> bool {
    module.starts_with(CAPTURED_MODULE_PREFIX)
}

/// Logger that writes through env_logger and captures node-scoped records.
pub struct TeeLogger {
    inner: env_logger::Logger,
}

impl TeeLogger {
    pub fn new(inner: env_logger::Logger) -> Self {
        Self { inner }
    }

    /// Level to hand to `log::set_max_level`: capture needs every level.
    pub fn filter(&self) -> log::LevelFilter {
        log::LevelFilter::Trace
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata) || is_captured_module(metadata.target())
    }

    fn log(&self, record: &Record) {
        // env_logger applies its own filter here.
        self.inner.log(record);

        if !record.module_path().is_some_and(is_captured_module) {
            return;
        }
        let message = record.args().to_string();
        if let Some((node_id, content)) = split_node_prefix(&message) {
            push_log_entry(CapturedLogEntry {
                node_id,
                timestamp: Instant::now(),
                content: content.to_string(),
                level: record.level().into(),
            });
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_prefix_is_split_off() {
        assert_eq!(split_node_prefix("[3] OGM accepted"), Some((3, "OGM accepted")));
        assert_eq!(split_node_prefix("  [12]   Received"), Some((12, "Received")));
        assert_eq!(split_node_prefix("[7] "), Some((7, "")));
        assert_eq!(split_node_prefix("Removed node 4"), None);
        assert_eq!(split_node_prefix("[x] bad id"), None);
        assert_eq!(split_node_prefix("[5 unterminated"), None);
    }

    #[test]
    fn only_simulation_modules_are_captured() {
        assert!(is_captured_module("batman_mesh_simulator::simulation::routing"));
        assert!(is_captured_module(module_path!()));
        assert!(!is_captured_module("batman_mesh_simulator::ui::map"));
        assert!(!is_captured_module("eframe::native"));
    }

    #[test]
    fn levels_map_one_to_one() {
        assert_eq!(LogLevel::from(Level::Trace), LogLevel::Trace);
        assert_eq!(LogLevel::from(Level::Error), LogLevel::Error);
    }
}
