//! Lifecycle of one client-side subscription.

use serde::Serialize;

use crate::domain::foundation::StateMachine;

/// State of a reconnecting channel.
///
/// ```text
/// Disconnected ──connect──▶ Connecting ──open──▶ Connected
///                              │  ▲                 │
///                        error │  │ timer      error │
///                              ▼  │                 ▼
///                         AwaitingRetry ◀───────────┘ (retries left)
///                         Failed        ◀───────────  (budget spent)
/// ```
///
/// `disconnect()` returns to `Disconnected` from anywhere; a manual
/// `connect()` is still allowed from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    AwaitingRetry,
    Failed,
}

impl ChannelState {
    /// True while a transport is being opened or is open.
    pub fn is_active(&self) -> bool {
        matches!(self, ChannelState::Connecting | ChannelState::Connected)
    }

    /// True if `connect()` should open a transport from this state.
    pub fn accepts_connect(&self) -> bool {
        matches!(
            self,
            ChannelState::Disconnected | ChannelState::AwaitingRetry | ChannelState::Failed
        )
    }
}

impl StateMachine for ChannelState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ChannelState::*;
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, AwaitingRetry)
                | (Connecting, Failed)
                | (Connecting, Disconnected)
                | (Connected, AwaitingRetry)
                | (Connected, Failed)
                | (Connected, Disconnected)
                | (AwaitingRetry, Connecting)
                | (AwaitingRetry, Disconnected)
                | (Failed, Connecting)
                | (Failed, Disconnected)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ChannelState::*;
        match self {
            Disconnected => vec![Connecting],
            Connecting => vec![Connected, AwaitingRetry, Failed, Disconnected],
            Connected => vec![AwaitingRetry, Failed, Disconnected],
            AwaitingRetry => vec![Connecting, Disconnected],
            Failed => vec![Connecting, Disconnected],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChannelState; 5] = [
        ChannelState::Disconnected,
        ChannelState::Connecting,
        ChannelState::Connected,
        ChannelState::AwaitingRetry,
        ChannelState::Failed,
    ];

    #[test]
    fn initial_state_is_disconnected() {
        assert_eq!(ChannelState::default(), ChannelState::Disconnected);
    }

    #[test]
    fn cannot_skip_connecting() {
        assert!(ChannelState::Disconnected
            .transition_to(ChannelState::Connected)
            .is_err());
        assert!(ChannelState::AwaitingRetry
            .transition_to(ChannelState::Connected)
            .is_err());
    }

    #[test]
    fn no_state_is_terminal() {
        for state in ALL {
            assert!(!state.is_terminal(), "{:?} should allow recovery", state);
        }
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for state in ALL {
            for target in ALL {
                assert_eq!(
                    state.can_transition_to(&target),
                    state.valid_transitions().contains(&target),
                    "{:?} -> {:?}",
                    state,
                    target
                );
            }
        }
    }

    #[test]
    fn accepts_connect_matches_transitions_into_connecting() {
        for state in ALL {
            assert_eq!(
                state.accepts_connect(),
                state.can_transition_to(&ChannelState::Connecting)
            );
        }
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ChannelState::AwaitingRetry).unwrap();
        assert_eq!(json, "\"awaiting_retry\"");
    }
}
