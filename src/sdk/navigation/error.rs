use thiserror::Error;

use crate::sdk::routing::RouteError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// Malformed coordinates or an unresolvable place. State is unchanged.
    #[error("Invalid destination {input:?}: {reason}")]
    Input { input: String, reason: String },

    /// The geocoding service itself failed. The controller is back in Idle.
    #[error(transparent)]
    Provider(#[from] RouteError),

    #[error("Cannot {action} while {state}")]
    InvalidAction {
        action: &'static str,
        state: &'static str,
    },
}
