//! Anima baseline policies
//!
//! Table-driven collaborators that let the tick loop run end to end. Every
//! coefficient they consult lives in the life's own learning and adaptation
//! tables, so the slow learning passes feed back into interpretation,
//! decision and action.
//!
//! | collaborator          | reads                                      |
//! |-----------------------|--------------------------------------------|
//! | [`TableMeaning`]      | `sensitivity.*`                            |
//! | [`ThresholdDecision`] | `threshold.ignore/dampen`, `threshold.tension` |
//! | [`ScaledAction`]      | `coefficient.absorb/dampen`, `coefficient.recovery` |
//! | [`DelayedFeedback`]   | status views                               |
//! | [`BoundedLearning`]   | memory statistics                          |
//! | [`BoundedAdaptation`] | adaptation history, learning table         |

#![deny(unsafe_code)]

pub mod action;
pub mod config;
pub mod decision;
pub mod error;
pub mod feedback;
pub mod meaning;
pub mod source;
pub mod tuning;

pub use action::ScaledAction;
pub use config::PolicyConfig;
pub use decision::ThresholdDecision;
pub use error::{PolicyError, Result};
pub use feedback::DelayedFeedback;
pub use meaning::TableMeaning;
pub use source::{channel, ChannelEventSource, EventSender};
pub use tuning::{BoundedAdaptation, BoundedLearning};

use anima_runtime::{Collaborators, EventSource};

/// The full baseline set around `events`.
pub fn baseline(events: impl EventSource + 'static, config: &PolicyConfig) -> Result<Collaborators> {
    config.validate()?;
    Ok(Collaborators {
        events: Box::new(events),
        meaning: Box::new(TableMeaning::new()),
        decision: Box::new(ThresholdDecision::new(config.memory_bias)),
        action: Box::new(ScaledAction::new()),
        feedback: Box::new(DelayedFeedback::new(
            config.feedback_delay,
            config.max_pending_feedback,
        )),
        learning: Box::new(BoundedLearning::new(config.learning_rate)),
        adaptation: Box::new(BoundedAdaptation::new(config.adaptation_rate)),
    })
}
