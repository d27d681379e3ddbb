//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds events in, executes the returned effects and feeds their
//! outcomes back as new events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{TurnContext, TurnErrorKind, TurnState};
pub use transition::transition;
#[cfg(test)]
pub use transition::{TransitionError, ROUND_LIMIT_RESULT};
