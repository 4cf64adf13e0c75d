//! Logical channels between coordinator and workers
//!
//! Messages of different kinds travel on different channels so that, say, an
//! exam batch can never be read where a command is expected. Within one
//! channel to one peer, delivery is FIFO.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Command,
    AnswerKeys,
    Exams,
    Results,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Command,
        Channel::AnswerKeys,
        Channel::Exams,
        Channel::Results,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Command => "command",
            Channel::AnswerKeys => "answers",
            Channel::Exams => "exams",
            Channel::Results => "results",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tag byte carried by every frame of each channel.
///
/// Both ends of the pool must use the same tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelTags {
    pub answers: u8,
    pub exams: u8,
    pub results: u8,
    pub command: u8,
}

impl Default for ChannelTags {
    fn default() -> Self {
        Self {
            answers: 100,
            exams: 101,
            results: 102,
            command: 103,
        }
    }
}

impl ChannelTags {
    pub fn tag(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Command => self.command,
            Channel::AnswerKeys => self.answers,
            Channel::Exams => self.exams,
            Channel::Results => self.results,
        }
    }

    /// Reverse lookup of a tag byte
    pub fn channel(&self, tag: u8) -> Option<Channel> {
        Channel::ALL.into_iter().find(|&c| self.tag(c) == tag)
    }

    /// Every channel must have its own tag.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            let tag = self.tag(channel);
            if seen.contains(&tag) {
                return Err(DomainError::DuplicateChannelTag(tag));
            }
            seen.push(tag);
        }
        Ok(())
    }
}
