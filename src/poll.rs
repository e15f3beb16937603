use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tracing::debug;

/// How a [`poll_until_stable`] loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Two consecutive measurements were equal.
    Stable(u64),
    /// `max_rounds` ran out while the measurement was still moving.
    Exhausted(u64),
    /// The step asked to stop.
    Stopped(u64),
}

impl Settled {
    pub fn value(self) -> u64 {
        match self {
            Settled::Stable(v) | Settled::Exhausted(v) | Settled::Stopped(v) => v,
        }
    }
}

/// Run `step` until it reports the same measurement twice in a row.
///
/// `step` receives the 1-based round number and returns the current
/// measurement (page height, collected item count). The first call
/// sets the baseline; every later call is compared with the previous one.
/// `ControlFlow::Break` ends the loop at once. Sleeps `interval` between rounds.
pub async fn poll_until_stable<F, Fut>(max_rounds: usize, interval: Duration, mut step: F) -> Settled
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = ControlFlow<u64, u64>>,
{
    let mut last = match step(1).await {
        ControlFlow::Continue(v) => v,
        ControlFlow::Break(v) => return Settled::Stopped(v),
    };
    for round in 2..=max_rounds.max(1) {
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        let current = match step(round).await {
            ControlFlow::Continue(v) => v,
            ControlFlow::Break(v) => return Settled::Stopped(v),
        };
        debug!(round, last, current, "poll");
        if current == last {
            return Settled::Stable(current);
        }
        last = current;
    }
    Settled::Exhausted(last)
}
