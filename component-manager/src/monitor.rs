//! Per-component log monitor.
//!
//! One monitor runs per running component. It drains the worker's raw output
//! lines, parses them into structured [`LogEntry`] values, appends them to
//! the component's bounded buffer, and publishes them on the event bus. The
//! monitor never blocks component shutdown: a stop signal interrupts the
//! blocking read within the manager's grace period.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use hearth::event::{Event, EventBus, LogEntry, LogLevel};

use crate::component::SharedState;

pub struct LogMonitor;

impl LogMonitor {
    /// Spawn the monitor loop for a component.
    ///
    /// The loop exits when the stop signal flips, or when the line stream
    /// closes. A close while the worker was never asked to shut down is
    /// reported as a single ERROR entry noting the monitor's own
    /// termination; it never propagates further.
    pub fn spawn(
        component_id: String,
        mut lines: mpsc::Receiver<String>,
        state: SharedState,
        bus: Arc<EventBus>,
        shutdown: watch::Receiver<bool>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(component_id = %component_id, "Log monitor started");

            loop {
                tokio::select! {
                    line = lines.recv() => {
                        match line {
                            Some(line) => {
                                let entry = parse_line(&component_id, &line);
                                state.lock().await.push_log(entry.clone());
                                bus.publish(Event::LogEmitted(entry));
                            }
                            None => {
                                // The stream closes when the worker exits.
                                // During an ordered shutdown that is silent;
                                // otherwise record our own termination and
                                // leave the component untouched.
                                if !*shutdown.borrow() {
                                    let entry = LogEntry::new(
                                        component_id.clone(),
                                        LogLevel::Error,
                                        "log monitor terminated: output stream closed",
                                    );
                                    state.lock().await.push_log(entry.clone());
                                    bus.publish(Event::LogEmitted(entry));
                                }
                                break;
                            }
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            // Drain whatever is already queued, then exit.
                            while let Ok(line) = lines.try_recv() {
                                let entry = parse_line(&component_id, &line);
                                state.lock().await.push_log(entry.clone());
                                bus.publish(Event::LogEmitted(entry));
                            }
                            break;
                        }
                    }
                }
            }

            debug!(component_id = %component_id, "Log monitor stopped");
        })
    }
}

/// Parse a raw worker line of the form
/// `[2026-08-26 10:00:00] DATABASE INFO: Query executed`.
///
/// Severity detection is best-effort: unrecognized or missing tags fall back
/// to INFO with the whole line as the message. The source is always the
/// owning component's id, not whatever the line claims.
pub fn parse_line(component_id: &str, line: &str) -> LogEntry {
    let trimmed = line.trim();

    if let Some(rest) = trimmed
        .strip_prefix('[')
        .and_then(|r| r.split_once("] "))
        .map(|(_, rest)| rest)
    {
        if let Some((head, message)) = rest.split_once(": ") {
            // `head` is "TAG LEVEL"; the level is its last token.
            let level_tag = head.rsplit(' ').next().unwrap_or("");
            return LogEntry::new(
                component_id,
                LogLevel::parse_tag(level_tag),
                message.trim(),
            );
        }
    }

    LogEntry::new(component_id, LogLevel::Info, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_line() {
        let entry = parse_line("db", "[2026-08-26 10:00:00] DATABASE INFO: Query executed");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.source, "db");
        assert_eq!(entry.message, "Query executed");
    }

    #[test]
    fn test_parse_levels() {
        let warn = parse_line("mq", "[2026-08-26 10:00:00] MQTT_BROKER WARNING: High message volume detected");
        assert_eq!(warn.level, LogLevel::Warning);

        let err = parse_line("api", "[2026-08-26 10:00:00] API_SERVER ERROR: boom");
        assert_eq!(err.level, LogLevel::Error);

        let debug = parse_line("db", "[2026-08-26 10:00:00] DATABASE DEBUG: Connection pool status");
        assert_eq!(debug.level, LogLevel::Debug);
    }

    #[test]
    fn test_parse_untagged_line_falls_back_to_info() {
        let entry = parse_line("db", "something unstructured happened");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "something unstructured happened");
    }

    #[test]
    fn test_parse_unknown_severity_falls_back_to_info() {
        let entry = parse_line("db", "[2026-08-26 10:00:00] DATABASE NOTICE: vacuum done");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "vacuum done");
    }

    #[test]
    fn test_source_is_component_id_not_line_tag() {
        let entry = parse_line("db_primary", "[2026-08-26 10:00:00] DATABASE INFO: hello");
        assert_eq!(entry.source, "db_primary");
    }
}
