//! One-way "caught up" latch derived from [`BlockProgress`].

use tokio::sync::watch;
use tracing::info;

use crate::progress::BlockProgress;

/// Both values must be known; a missing side is never caught up.
pub fn is_caught_up(last_applied_block: Option<u64>, latest_chain_block: Option<u64>) -> bool {
    matches!(
        (last_applied_block, latest_chain_block),
        (Some(applied), Some(latest)) if applied >= latest
    )
}

#[derive(Debug, Clone)]
pub struct CaughtUp {
    latch: watch::Receiver<bool>,
}

impl CaughtUp {
    pub fn is_caught_up(&self) -> bool {
        *self.latch.borrow()
    }

    /// Resolves once the latch is set. Returns immediately when it already is.
    /// Never resolves if the progress source goes away first.
    pub async fn wait(&self) {
        let mut latch = self.latch.clone();
        if latch.wait_for(|set| *set).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Spawns a watcher that sets the latch the first time the applied block
/// reaches the chain head, then exits.
pub fn observe_caught_up(progress: &BlockProgress) -> CaughtUp {
    let (latch_tx, latch_rx) = watch::channel(false);
    let mut latest = progress.watch_latest_chain_block();
    let mut applied = progress.watch_last_applied_block();

    tokio::spawn(async move {
        loop {
            let last_applied = *applied.borrow_and_update();
            let latest_chain = *latest.borrow_and_update();

            if is_caught_up(last_applied, latest_chain) {
                info!(
                    last_applied_block = last_applied,
                    latest_chain_block = latest_chain,
                    "all caught up"
                );
                latch_tx.send_replace(true);
                return;
            }

            let changed = tokio::select! {
                res = applied.changed() => res,
                res = latest.changed() => res,
            };
            if changed.is_err() {
                return;
            }
        }
    });

    CaughtUp { latch: latch_rx }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        progress::ProgressPublisher,
        types::{AppliedBatch, BlockRange},
    };

    fn applied(to: u64) -> AppliedBatch {
        AppliedBatch {
            range: BlockRange::new(to, to).unwrap(),
            log_count: 0,
        }
    }

    #[test]
    fn predicate_needs_both_sides() {
        assert!(!is_caught_up(None, None));
        assert!(!is_caught_up(Some(10), None));
        assert!(!is_caught_up(None, Some(10)));
        assert!(!is_caught_up(Some(9), Some(10)));
        assert!(is_caught_up(Some(10), Some(10)));
        assert!(is_caught_up(Some(11), Some(10)));
    }

    #[tokio::test]
    async fn latches_once_applied_reaches_head() {
        let (publisher, progress) = ProgressPublisher::new(8);
        let caught_up = observe_caught_up(&progress);

        publisher.observe_head(105);
        publisher.seed_applied(100);
        tokio::task::yield_now().await;
        assert!(!caught_up.is_caught_up());

        publisher.record_applied(applied(105));
        tokio::time::timeout(Duration::from_secs(1), caught_up.wait())
            .await
            .expect("latch set");
        assert!(caught_up.is_caught_up());

        // The head moving on does not clear the latch.
        publisher.observe_head(200);
        tokio::task::yield_now().await;
        assert!(caught_up.is_caught_up());
    }

    #[tokio::test]
    async fn applied_ahead_of_head_counts() {
        let (publisher, progress) = ProgressPublisher::new(8);
        publisher.seed_applied(50);
        publisher.observe_head(40);

        let caught_up = observe_caught_up(&progress);
        tokio::time::timeout(Duration::from_secs(1), caught_up.wait())
            .await
            .expect("latch set");
    }

    #[tokio::test]
    async fn clones_share_the_latch() {
        let (publisher, progress) = ProgressPublisher::new(8);
        let caught_up = observe_caught_up(&progress);
        let other = caught_up.clone();

        publisher.observe_head(1);
        publisher.record_applied(applied(1));
        tokio::time::timeout(Duration::from_secs(1), other.wait())
            .await
            .expect("latch set");
        assert!(caught_up.is_caught_up());
    }
}
