//! Connection lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a sync instance is in its connection lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// No sessions open. Initial and terminal state.
    #[default]
    Disconnected,
    /// Establishing the RPC and peer sessions.
    Connecting,
    /// Catching up on historical blocks.
    Crawling,
    /// Caught up; relaying pushed blocks and mempool transactions.
    Listening,
}

impl State {
    /// Whether the lifecycle may move from `self` to `next`.
    ///
    /// Every state may fall back to `Disconnected`; otherwise only the
    /// forward edges of the connect → crawl → listen pipeline are legal.
    pub fn can_transition_to(&self, next: State) -> bool {
        use State::*;
        matches!(
            (self, next),
            (_, Disconnected)
                | (Disconnected, Connecting)
                | (Connecting, Crawling)
                | (Connecting, Listening)
                | (Crawling, Listening)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Crawling => "crawling",
            Self::Listening => "listening",
        }
    }

    /// Numeric code used by the state gauge.
    pub fn code(&self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Crawling => 2,
            Self::Listening => 3,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
