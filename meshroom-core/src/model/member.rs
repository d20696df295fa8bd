use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque member identifier assigned by the relay.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a member presents to the room when authenticating with the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub username: String,
    pub handle: String,
    pub avatar_url: Option<String>,
}

impl MemberProfile {
    pub fn new(username: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            handle: handle.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// A room member as seen through the relay's presence tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    pub handle: String,
    pub avatar_url: Option<String>,
}

impl Member {
    pub fn new(id: MemberId, profile: MemberProfile) -> Self {
        Self {
            id,
            username: profile.username,
            handle: profile.handle,
            avatar_url: profile.avatar_url,
        }
    }
}
