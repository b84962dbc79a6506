//! Incoming chat session.
//!
//! A [`Session`] is the unit every context filter is evaluated against. It
//! carries the routing identifiers used by selection expressions plus the
//! optional user/channel records a command binding may ask for.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display information about the message author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Nickname inside the current guild, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Platform-wide user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A chat session as seen by filters, middleware and commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub platform: String,
    pub self_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    /// User record loaded from storage, if the host has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    /// Channel record loaded from storage, if the host has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Value>,
    #[serde(default)]
    pub content: String,
}

impl Session {
    /// Creates a private session for `platform` received by bot `self_id`.
    pub fn new(platform: impl Into<String>, self_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            self_id: self_id.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    pub fn with_user_record(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Returns `true` for direct messages (no guild).
    pub fn is_private(&self) -> bool {
        self.guild_id.is_none()
    }

    /// Reads a session field by name.
    ///
    /// Accepts both the wire name (`guildId`) and the Rust name (`guild_id`).
    /// Unknown or absent fields read as `Null`.
    pub fn field(&self, name: &str) -> Value {
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return Value::Null;
        };
        map.get(name)
            .or_else(|| map.get(&snake_to_camel(name)))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_accepts_both_spellings() {
        let session = Session::new("discord", "bot").with_guild("1111111111");
        assert_eq!(session.field("guildId"), Value::from("1111111111"));
        assert_eq!(session.field("guild_id"), Value::from("1111111111"));
        assert_eq!(session.field("selfId"), Value::from("bot"));
    }

    #[test]
    fn test_missing_field_is_null() {
        let session = Session::new("discord", "bot");
        assert_eq!(session.field("channelId"), Value::Null);
        assert_eq!(session.field("nope"), Value::Null);
        assert!(session.is_private());
    }
}
