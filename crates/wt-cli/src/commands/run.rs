//! The tracker run loop.
//!
//! `wt run` speaks a line-delimited JSON protocol: the host adapter
//! writes one [`HostMessage`] per line on stdin, and focus-state
//! updates come back as one JSON object per line on stdout. The loop is
//! single-threaded; the engine decides what to do and hands back
//! [`Directive`]s, and this loop owns the three timers they control
//! (the backup flush interval, the debounced flush, and the 1 Hz focus
//! tick).

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;
use tokio::time::{Instant, interval_at};
use wt_core::engine::{Directive, Engine, FocusRequest};
use wt_core::host::{BusError, FocusBus, KeyValueStore, MemoryStore, Notifier};
use wt_core::tracker::{ActivityEvent, TabInfo};
use wt_core::{Domain, FocusState, InMemoryRuleEngine, RuleSynthesizer, SystemClock};
use wt_store::SqliteStore;

use crate::Config;

/// One line of the stdin protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// The active tab changed, or its URL changed in place.
    TabChanged { tab: TabInfo },
    /// The browser window gained or lost focus.
    WindowFocus { active: bool },
    /// Reconciliation snapshot of the actual active tab.
    ActiveTab {
        #[serde(default)]
        tab: Option<TabInfo>,
    },
    /// The host (re)started.
    Startup {
        #[serde(default)]
        tab: Option<TabInfo>,
    },
    StartFocus {
        #[serde(default)]
        duration_secs: Option<i64>,
    },
    StartBreak {
        #[serde(default)]
        duration_secs: Option<i64>,
    },
    StopFocus,
    BlockDistractions { sites: Vec<Domain> },
    UnblockDistractions,
    QueryFocus,
}

/// Notifier that logs instead of raising host notifications. The host
/// adapter, if any, surfaces these from the log stream.
struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, key: &str, title: &str, body: &str) {
        tracing::info!(key, title, body, "notification");
    }
}

/// Bus that writes focus-state updates to stdout as JSON lines.
struct StdoutBus;

impl FocusBus for StdoutBus {
    fn broadcast(&self, state: &FocusState) -> Result<(), BusError> {
        let line = serde_json::json!({
            "type": "FOCUS_STATE_UPDATE",
            "state": state,
        });
        println!("{line}");
        Ok(())
    }
}

/// Sleeps until `deadline`, or forever when there is none. Keeps the
/// debounce arm of the select loop free of conditional guards.
async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Timer state the engine's directives control.
struct Timers {
    debounce_at: Option<Instant>,
    ticking: bool,
}

impl Timers {
    fn apply(&mut self, directives: &[Directive], tick: &mut tokio::time::Interval) {
        for directive in directives {
            match directive {
                Directive::ScheduleFlush { delay_secs } => {
                    // a pending debounce is replaced, not stacked
                    self.debounce_at = Some(Instant::now() + Duration::from_secs(*delay_secs));
                }
                Directive::StartTicking => {
                    if !self.ticking {
                        tick.reset();
                        self.ticking = true;
                    }
                }
                Directive::StopTicking => self.ticking = false,
            }
        }
    }
}

fn dispatch(engine: &mut Engine<SystemClock>, message: HostMessage) -> Vec<Directive> {
    match message {
        HostMessage::TabChanged { tab } => engine.handle_activity(&ActivityEvent::TabChanged(tab)),
        HostMessage::WindowFocus { active } => {
            let event = if active {
                ActivityEvent::WindowFocusGained
            } else {
                ActivityEvent::WindowFocusLost
            };
            engine.handle_activity(&event)
        }
        HostMessage::ActiveTab { tab } => engine.handle_activity(&ActivityEvent::Reconcile(tab)),
        HostMessage::Startup { tab } => engine.handle_activity(&ActivityEvent::Startup(tab)),
        HostMessage::StartFocus { duration_secs } => {
            engine.handle_focus(&FocusRequest::StartFocus { duration_secs })
        }
        HostMessage::StartBreak { duration_secs } => {
            engine.handle_focus(&FocusRequest::StartBreak { duration_secs })
        }
        HostMessage::StopFocus => engine.handle_focus(&FocusRequest::StopFocus),
        HostMessage::BlockDistractions { sites } => {
            engine.handle_focus(&FocusRequest::BlockDistractions { sites })
        }
        HostMessage::UnblockDistractions => engine.handle_focus(&FocusRequest::UnblockDistractions),
        HostMessage::QueryFocus => engine.handle_focus(&FocusRequest::QueryState),
    }
}

pub async fn run(config: &Config, ephemeral: bool) -> Result<()> {
    let kv: Box<dyn KeyValueStore> = if ephemeral {
        tracing::info!("running with in-memory state");
        Box::new(MemoryStore::new())
    } else {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        Box::new(SqliteStore::open(&config.database_path).context("failed to open database")?)
    };

    let rules = RuleSynthesizer::new(
        Box::new(InMemoryRuleEngine::new()),
        config.block_page_url.clone(),
    );
    let mut engine = Engine::new(
        SystemClock,
        kv,
        rules,
        Box::new(LogNotifier),
        Box::new(StdoutBus),
    );

    let flush_period = Duration::from_secs(config.flush_interval_secs.max(1));
    let mut flush_interval = interval_at(Instant::now() + flush_period, flush_period);
    let mut tick = interval_at(Instant::now() + Duration::from_secs(1), Duration::from_secs(1));
    let mut timers = Timers {
        debounce_at: None,
        ticking: false,
    };

    let resumed = engine.resume();
    timers.apply(&resumed, &mut tick);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let debounce = timers.debounce_at;
        let directives = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    // host closed the pipe; flush whatever is open
                    engine.handle_activity(&ActivityEvent::Flush);
                    tracing::info!("stdin closed, shutting down");
                    return Ok(());
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostMessage>(trimmed) {
                    Ok(message) => dispatch(&mut engine, message),
                    Err(error) => {
                        tracing::warn!(%error, "unparseable host message");
                        continue;
                    }
                }
            }
            _ = flush_interval.tick() => {
                engine.handle_activity(&ActivityEvent::Flush)
            }
            () = maybe_sleep(debounce) => {
                timers.debounce_at = None;
                engine.handle_activity(&ActivityEvent::Flush)
            }
            _ = tick.tick(), if timers.ticking => {
                engine.focus_tick()
            }
        };
        timers.apply(&directives, &mut tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_messages_parse() {
        let message: HostMessage =
            serde_json::from_str(r#"{"type":"tab_changed","tab":{"id":7,"url":"https://example.com/"}}"#)
                .unwrap();
        assert!(matches!(
            message,
            HostMessage::TabChanged { tab: TabInfo { id: 7, .. } }
        ));

        let message: HostMessage =
            serde_json::from_str(r#"{"type":"window_focus","active":false}"#).unwrap();
        assert!(matches!(message, HostMessage::WindowFocus { active: false }));

        let message: HostMessage =
            serde_json::from_str(r#"{"type":"active_tab","tab":null}"#).unwrap();
        assert!(matches!(message, HostMessage::ActiveTab { tab: None }));

        let message: HostMessage =
            serde_json::from_str(r#"{"type":"start_focus","duration_secs":600}"#).unwrap();
        assert!(matches!(
            message,
            HostMessage::StartFocus {
                duration_secs: Some(600)
            }
        ));

        let message: HostMessage = serde_json::from_str(r#"{"type":"stop_focus"}"#).unwrap();
        assert!(matches!(message, HostMessage::StopFocus));

        let message: HostMessage = serde_json::from_str(
            r#"{"type":"block_distractions","sites":["social.example","www.videos.example"]}"#,
        )
        .unwrap();
        let HostMessage::BlockDistractions { sites } = message else {
            panic!("expected block_distractions");
        };
        assert_eq!(sites[1].as_str(), "videos.example");
    }

    #[test]
    fn unknown_message_type_is_an_error() {
        let result = serde_json::from_str::<HostMessage>(r#"{"type":"no_such_message"}"#);
        assert!(result.is_err());
    }
}
