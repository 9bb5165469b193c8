use super::*;
use agora_auth::Member;
use agora_core::ID;
use serde::Deserialize;
use serde::Serialize;

/// Frames sent from server to client. Serialized with external tagging
/// so each frame is a single-key JSON object, the shape chat clients
/// already speak: `{"message": ...}`, `{"user_join": id}`,
/// `{"user_left": id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    #[serde(rename = "message")]
    Message(String),
    #[serde(rename = "user_join")]
    UserJoin(ID<Member>),
    #[serde(rename = "user_left")]
    UserLeft(ID<Member>),
}

impl Frame {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("serialize chat frame")
    }
}

/// The only frame clients send.
#[derive(Debug, Deserialize)]
pub struct Inbound {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_single_key_objects() {
        assert_eq!(Frame::message("hi").to_json(), r#"{"message":"hi"}"#);
        assert_eq!(Frame::UserJoin(ID::from(5)).to_json(), r#"{"user_join":5}"#);
        assert_eq!(Frame::UserLeft(ID::from(5)).to_json(), r#"{"user_left":5}"#);
    }
    #[test]
    fn inbound_parses_message_frames() {
        let inbound: Inbound = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(inbound.message, "hello");
    }
    #[test]
    fn inbound_rejects_other_shapes() {
        assert!(serde_json::from_str::<Inbound>(r#"{"user_join":5}"#).is_err());
        assert!(serde_json::from_str::<Inbound>("not json").is_err());
    }
}
