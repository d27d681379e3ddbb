//! Events that drive a turn

use super::state::TurnErrorKind;
use crate::store::{CapabilityRequest, CapabilityResult, MessageContent};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UserQuestion {
        text: String,
    },

    ModelResponse {
        content: MessageContent,
        /// Tool requests in the order the model emitted them
        requests: Vec<CapabilityRequest>,
    },
    ModelError {
        message: String,
        kind: TurnErrorKind,
    },

    /// Every request of the batch has been answered, possibly with an error result
    ToolsComplete {
        results: Vec<CapabilityResult>,
    },
}
