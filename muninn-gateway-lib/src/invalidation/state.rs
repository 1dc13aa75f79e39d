use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Subscribing,
    Subscribed,
}

impl ChannelState {
    fn as_u8(self) -> u8 {
        match self {
            ChannelState::Disconnected => 0,
            ChannelState::Subscribing => 1,
            ChannelState::Subscribed => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ChannelState::Subscribing,
            2 => ChannelState::Subscribed,
            _ => ChannelState::Disconnected,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Subscribing => "subscribing",
            ChannelState::Subscribed => "subscribed",
        };
        f.write_str(s)
    }
}

/// Atomic cell holding a [`ChannelState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: ChannelState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `next`, returning the previous state.
    pub(crate) fn set(&self, next: ChannelState) -> ChannelState {
        ChannelState::from_u8(self.0.swap(next.as_u8(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_previous_state() {
        let cell = StateCell::new(ChannelState::Disconnected);
        assert_eq!(cell.set(ChannelState::Subscribing), ChannelState::Disconnected);
        assert_eq!(cell.set(ChannelState::Subscribed), ChannelState::Subscribing);
        assert_eq!(cell.get(), ChannelState::Subscribed);
    }
}
