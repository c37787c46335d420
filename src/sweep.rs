//! Daily sweep job
//!
//! One pass per day: purge every product that expired before today, then
//! push one reminder per subscribed user listing products that expire
//! within the next week, grouped by date. A failed push is logged and the
//! sweep moves on to the next user.

use crate::date::{self, Ymd};
use crate::reply::{Notice, ReminderGroup, ReplyIntent, ReplySink};
use crate::store::{Repository, StoreError};

/// Products expiring within this many days of today get a reminder
pub const REMINDER_WINDOW_DAYS: u64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not a packed calendar date: {0}")]
    BadDate(Ymd),
}

/// What one sweep pass did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Expired products removed
    pub purged: u64,
    /// Users who received a reminder push
    pub reminded: usize,
}

/// Run one sweep pass as of `today`
pub fn run_sweep(
    repo: &dyn Repository,
    sink: &dyn ReplySink,
    today: Ymd,
) -> Result<SweepSummary, SweepError> {
    let purged = repo.delete_products_expiring_before(today)?;
    let cutoff =
        date::plus_days(today, REMINDER_WINDOW_DAYS).ok_or(SweepError::BadDate(today))?;

    let mut reminded = 0;
    for user in repo.subscribed_users()? {
        let soon: Vec<_> = repo
            .products_by_user(&user)?
            .into_iter()
            .filter(|p| p.expires_on < cutoff)
            .collect();
        if soon.is_empty() {
            continue;
        }

        // products_by_user is ordered by expiry, so grouping is one pass
        let mut groups: Vec<ReminderGroup> = Vec::new();
        for product in soon {
            match groups.last_mut() {
                Some(group) if group.expires_on == product.expires_on => {
                    group.names.push(product.name);
                }
                _ => groups.push(ReminderGroup {
                    expires_on: product.expires_on,
                    names: vec![product.name],
                }),
            }
        }

        match sink.push(&user, ReplyIntent::Text(Notice::ExpiryReminder { groups })) {
            Ok(()) => reminded += 1,
            Err(error) => {
                tracing::warn!(user = %user, %error, "reminder push failed");
            }
        }
    }

    tracing::info!(purged, reminded, "sweep finished");
    Ok(SweepSummary { purged, reminded })
}
