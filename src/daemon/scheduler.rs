//! Periodic calendar → notification pass.
//!
//! Idle → Running → Stopping → Stopped

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::calendar::{fetch_all, CalendarSource};
use crate::config::ScheduleConfig;
use crate::models::Message;
use crate::notify::{FanOutReport, NotifyError, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// What one tick did.
#[derive(Debug)]
pub struct PassSummary {
    /// Messages handed to the fan-out engine.
    pub messages: usize,
    pub fetch_failures: usize,
    pub delivery: Result<FanOutReport, NotifyError>,
}

impl PassSummary {
    pub fn is_clean(&self) -> bool {
        self.fetch_failures == 0 && self.delivery.is_ok()
    }
}

pub struct Scheduler {
    notifier: Arc<Notifier>,
    accounts: Vec<Arc<dyn CalendarSource>>,
    config: ScheduleConfig,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        notifier: Arc<Notifier>,
        accounts: Vec<Arc<dyn CalendarSource>>,
        config: ScheduleConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            notifier,
            accounts,
            config,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SchedulerState) {
        let previous = self.state.send_replace(next);
        info!("Scheduler: {} → {}", previous, next);
    }

    /// Fetch upcoming events from every account and announce them.
    pub async fn run_pass(&self) -> PassSummary {
        let aggregated = fetch_all(
            &self.accounts,
            self.config.per_account,
            self.config.within,
        )
        .await;

        let locale = self.config.locale;
        let messages: Vec<String> = aggregated
            .events()
            .map(|event| Message::for_event(event, locale).text)
            .collect();

        let delivery = self
            .notifier
            .notify(&self.config.target, locale, &messages)
            .await;

        PassSummary {
            messages: messages.len(),
            fetch_failures: aggregated.errors.len(),
            delivery,
        }
    }

    /// Run one pass immediately, then one per tick until `shutdown` fires.
    ///
    /// Failed passes are logged and never end the loop. A pass already in
    /// flight when `shutdown` fires is finished under `Stopping`; the
    /// notifier shares the token, so it speaks nothing new.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        self.transition(SchedulerState::Running);

        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stopping = false;
        while !stopping {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            info!("Fetch plans and send notifications");
            let pass = self.run_pass();
            tokio::pin!(pass);
            let summary = tokio::select! {
                summary = &mut pass => summary,
                _ = shutdown.cancelled() => {
                    stopping = true;
                    self.transition(SchedulerState::Stopping);
                    (&mut pass).await
                }
            };
            log_pass(&summary);
        }

        if !stopping {
            self.transition(SchedulerState::Stopping);
        }
        self.transition(SchedulerState::Stopped);
        Ok(())
    }
}

fn log_pass(summary: &PassSummary) {
    if let Err(e) = &summary.delivery {
        warn!("Notification pass failed: {}", e);
    }
    if summary.fetch_failures > 0 {
        warn!("{} calendar account(s) could not be read", summary.fetch_failures);
    }
    if summary.is_clean() {
        info!("Pass complete: {} message(s)", summary.messages);
    }
}
