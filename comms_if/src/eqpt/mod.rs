//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the robot, whether it is
//! simulated or real.
//!
//! Messages are published as `"<topic> <json>"` strings so subscribers can filter on the topic.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod cmd_vel;
pub mod odom;

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Expected topic \"{expected}\" but the message has topic \"{found}\"")]
    WrongTopic {
        expected: &'static str,
        found: String
    },

    #[error("Message has no payload")]
    MissingPayload,

    #[error("Could not (de)serialise the message payload: {0}")]
    SerdeError(serde_json::Error)
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Build a topic-prefixed message from the given data.
pub fn to_message<T: Serialize>(topic: &'static str, data: &T) -> Result<String, MessageError> {
    let payload = serde_json::to_string(data).map_err(MessageError::SerdeError)?;

    Ok(format!("{} {}", topic, payload))
}

/// Parse a topic-prefixed message, checking the topic matches.
pub fn from_message<T: DeserializeOwned>(
    topic: &'static str,
    msg: &str
) -> Result<T, MessageError> {
    let (found, payload) = match msg.find(' ') {
        Some(i) => (&msg[..i], &msg[i + 1..]),
        None => return Err(MessageError::MissingPayload)
    };

    if found != topic {
        return Err(MessageError::WrongTopic {
            expected: topic,
            found: found.to_string()
        })
    }

    serde_json::from_str(payload).map_err(MessageError::SerdeError)
}
