use crate::error::ChannelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ========== CHANNEL LIFECYCLE ==========
///
/// `WaitingForAnswer` -> `Answered` -> `ChannelEstablished`.
/// Closing is not a status: a closed channel is simply gone from the registry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    #[default]
    WaitingForAnswer,
    Answered,
    ChannelEstablished,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForAnswer => "WAITING_FOR_ANSWER",
            Self::Answered => "ANSWERED",
            Self::ChannelEstablished => "CHANNEL_ESTABLISHED",
        }
    }

    /// Status after the remote peer posts its answer
    pub fn answer(self) -> Result<Self, ChannelError> {
        match self {
            Self::WaitingForAnswer => Ok(Self::Answered),
            status => Err(ChannelError::InvalidState { status }),
        }
    }

    /// Status after the data channel opens, `None` when the event does not apply
    pub fn channel_open(self) -> Option<Self> {
        match self {
            Self::Answered => Some(Self::ChannelEstablished),
            Self::WaitingForAnswer | Self::ChannelEstablished => None,
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channels_wait_for_an_answer() {
        assert_eq!(ChannelStatus::default(), ChannelStatus::WaitingForAnswer);
    }

    #[test]
    fn answer_is_only_accepted_once() {
        let answered = ChannelStatus::WaitingForAnswer.answer().unwrap();
        assert_eq!(answered, ChannelStatus::Answered);

        match answered.answer() {
            Err(ChannelError::InvalidState { status }) => {
                assert_eq!(status, ChannelStatus::Answered)
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
        assert!(ChannelStatus::ChannelEstablished.answer().is_err());
    }

    #[test]
    fn channel_open_requires_an_answer() {
        assert_eq!(ChannelStatus::WaitingForAnswer.channel_open(), None);
        assert_eq!(
            ChannelStatus::Answered.channel_open(),
            Some(ChannelStatus::ChannelEstablished)
        );
        assert_eq!(ChannelStatus::ChannelEstablished.channel_open(), None);
    }

    #[test]
    fn status_serializes_like_the_wire_format() {
        let json = serde_json::to_string(&ChannelStatus::ChannelEstablished).unwrap();
        assert_eq!(json, "\"CHANNEL_ESTABLISHED\"");
        assert_eq!(ChannelStatus::Answered.to_string(), "ANSWERED");
    }
}
