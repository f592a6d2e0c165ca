//! Resume from a saved position: models, the per-cycle retry loop and the
//! session-level flow.

pub mod attempt;
pub mod flow;
pub mod retry;

pub use attempt::{
    ObservationKind, ResumeAttempt, ResumeFailureReason, ResumeObservation, ResumeSuccess,
    RetryStep,
};
pub use flow::{ResumeDirective, ResumeFlowCoordinator};
pub use retry::ResumeRetryCoordinator;
