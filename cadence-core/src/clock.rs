//! Time source for coordinators and timers.
//!
//! Coordinators never read the clock themselves; the control actor passes
//! `now` in. Timers sleep through the same [`Clock`], so a paused tokio
//! runtime (or a custom clock) drives the whole state machine in tests.

use futures::future::BoxFuture;
use std::fmt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()>;
}

/// Clock backed by `tokio::time`, which honours `tokio::time::pause`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep_until(deadline))
    }
}

/// Arms a one-shot timer that posts `event` into `tx` at `deadline` unless
/// `token` is cancelled first. Cancelling after expiry is a no-op.
pub fn arm_timer<E>(
    clock: &dyn Clock,
    deadline: Instant,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<E>,
    event: E,
) where
    E: Send + 'static,
{
    let sleep = clock.sleep_until(deadline);
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = sleep => {
                let _ = tx.send(event);
            }
        }
    });
}
