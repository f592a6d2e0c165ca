use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::messages::{TimerEvent, TimerKind};
use crate::clock::{Clock, arm_timer};

/// A timer slot holding at most one armed timer.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    token: Option<CancellationToken>,
}

impl TimerSlot {
    /// Replaces any armed timer with a new one bound to `parent`.
    pub fn arm(
        &mut self,
        clock: &dyn Clock,
        parent: &CancellationToken,
        tx: &mpsc::UnboundedSender<TimerEvent>,
        deadline: Instant,
        generation: u64,
        kind: TimerKind,
    ) {
        self.cancel();
        let token = parent.child_token();
        arm_timer(
            clock,
            deadline,
            token.clone(),
            tx.clone(),
            TimerEvent { generation, kind },
        );
        self.token = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
