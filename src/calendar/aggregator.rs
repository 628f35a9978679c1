//! Concurrent fetch across every registered account.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use super::{CalendarError, CalendarSource};
use crate::models::Event;

/// Events from one account that returned at least one event.
#[derive(Debug)]
pub struct AccountEvents {
    /// Position of the account in the input list.
    pub account: usize,
    pub label: String,
    pub events: Vec<Event>,
}

#[derive(Debug)]
pub struct AccountFailure {
    pub account: usize,
    pub label: String,
    pub error: CalendarError,
}

/// Merged outcome of one fetch pass, grouped by account.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub accounts: Vec<AccountEvents>,
    pub errors: Vec<AccountFailure>,
}

impl Aggregated {
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.accounts.iter().flat_map(|a| a.events.iter())
    }

    pub fn event_count(&self) -> usize {
        self.accounts.iter().map(|a| a.events.len()).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_error(&self) -> Option<&AccountFailure> {
        self.errors.first()
    }
}

/// Fetch up to `max_per_account` upcoming events from every account at once.
///
/// A failing account is recorded and never blocks the others. Accounts
/// with no events contribute no entry.
pub async fn fetch_all(
    accounts: &[Arc<dyn CalendarSource>],
    max_per_account: u32,
    within: Option<Duration>,
) -> Aggregated {
    let fetches = accounts
        .iter()
        .map(|source| source.upcoming(max_per_account, within));
    let results = join_all(fetches).await;

    let mut merged = Aggregated::default();
    for (account, (source, result)) in accounts.iter().zip(results).enumerate() {
        let label = source.label().to_string();
        match result {
            Ok(events) if events.is_empty() => {}
            Ok(events) => merged.accounts.push(AccountEvents {
                account,
                label,
                events,
            }),
            Err(error) => {
                warn!("Fetching {} failed: {}", label, error);
                merged.errors.push(AccountFailure {
                    account,
                    label,
                    error,
                });
            }
        }
    }
    merged
}
