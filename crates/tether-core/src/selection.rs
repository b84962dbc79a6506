//! Declarative selection expressions.
//!
//! A [`Selection`] describes which sessions a context accepts. Each atomic
//! key is interpreted as follows:
//!
//! | Value | Meaning |
//! |-------|---------|
//! | `true` | the field is present |
//! | `false` | the field is absent |
//! | `"id"` / `["a", "b"]` | the field equals one of the listed values |
//!
//! `$and`, `$or` and `$not` compose sub-selections.

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// The session attribute an atomic selector tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeKind {
    User,
    Guild,
    Channel,
    #[serde(rename = "self")]
    SelfId,
    Platform,
    Private,
}

impl ScopeKind {
    /// Tests `session` against this attribute.
    ///
    /// With an empty `values` list only presence is checked. `Private`
    /// requires a session without guild and then filters by user id.
    pub fn matches(self, session: &Session, values: &[String]) -> bool {
        let field = match self {
            Self::User => session.user_id.as_deref(),
            Self::Guild => session.guild_id.as_deref(),
            Self::Channel => session.channel_id.as_deref(),
            Self::SelfId => Some(session.self_id.as_str()).filter(|s| !s.is_empty()),
            Self::Platform => Some(session.platform.as_str()).filter(|s| !s.is_empty()),
            Self::Private => {
                if !session.is_private() {
                    return false;
                }
                session.user_id.as_deref()
            }
        };
        match field {
            Some(value) => values.is_empty() || values.iter().any(|v| v == value),
            None => false,
        }
    }
}

/// Value of an atomic selector key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorValue {
    Flag(bool),
    One(String),
    Many(Vec<String>),
}

impl From<bool> for SelectorValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for SelectorValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

impl From<String> for SelectorValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for SelectorValue {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

impl SelectorValue {
    fn matches(&self, kind: ScopeKind, session: &Session) -> bool {
        match self {
            Self::Flag(true) => kind.matches(session, &[]),
            Self::Flag(false) => !kind.matches(session, &[]),
            Self::One(value) => kind.matches(session, std::slice::from_ref(value)),
            Self::Many(values) => kind.matches(session, values),
        }
    }
}

/// A composable selection expression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SelectorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild: Option<SelectorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<SelectorValue>,
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_id: Option<SelectorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<SelectorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<SelectorValue>,
    #[serde(default, rename = "$and", skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<Selection>,
    #[serde(default, rename = "$or", skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<Selection>,
    #[serde(default, rename = "$not", skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Selection>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the atomic selector for `kind`.
    pub fn with(mut self, kind: ScopeKind, value: impl Into<SelectorValue>) -> Self {
        let slot = match kind {
            ScopeKind::User => &mut self.user,
            ScopeKind::Guild => &mut self.guild,
            ScopeKind::Channel => &mut self.channel,
            ScopeKind::SelfId => &mut self.self_id,
            ScopeKind::Platform => &mut self.platform,
            ScopeKind::Private => &mut self.private,
        };
        *slot = Some(value.into());
        self
    }

    pub fn and(mut self, other: Selection) -> Self {
        self.and.push(other);
        self
    }

    pub fn or(mut self, other: Selection) -> Self {
        self.or.push(other);
        self
    }

    pub fn not(mut self, other: Selection) -> Self {
        self.not = Some(Box::new(other));
        self
    }

    /// Evaluates the expression against `session`.
    ///
    /// An empty `$or` list is ignored rather than rejecting everything.
    pub fn matches(&self, session: &Session) -> bool {
        let atoms = [
            (ScopeKind::User, &self.user),
            (ScopeKind::Guild, &self.guild),
            (ScopeKind::Channel, &self.channel),
            (ScopeKind::SelfId, &self.self_id),
            (ScopeKind::Platform, &self.platform),
            (ScopeKind::Private, &self.private),
        ];
        for (kind, value) in atoms {
            if let Some(value) = value
                && !value.matches(kind, session)
            {
                return false;
            }
        }
        if !self.and.iter().all(|s| s.matches(session)) {
            return false;
        }
        if !self.or.is_empty() && !self.or.iter().any(|s| s.matches(session)) {
            return false;
        }
        match &self.not {
            Some(not) => !not.matches(session),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild_session(platform: &str, guild: &str) -> Session {
        Session::new(platform, "bot").with_user("u1").with_guild(guild)
    }

    #[test]
    fn test_atomic_membership() {
        let sel = Selection::new()
            .with(ScopeKind::Platform, "discord")
            .with(ScopeKind::Guild, vec!["1".to_owned(), "2".to_owned()]);
        assert!(sel.matches(&guild_session("discord", "2")));
        assert!(!sel.matches(&guild_session("discord", "3")));
        assert!(!sel.matches(&guild_session("qq", "1")));
    }

    #[test]
    fn test_boolean_flags() {
        let private_only = Selection::new().with(ScopeKind::Guild, false);
        assert!(private_only.matches(&Session::new("discord", "bot").with_user("u1")));
        assert!(!private_only.matches(&guild_session("discord", "1")));

        let private = Selection::new().with(ScopeKind::Private, true);
        assert!(private.matches(&Session::new("discord", "bot").with_user("u1")));
        assert!(!private.matches(&guild_session("discord", "1")));
    }

    #[test]
    fn test_composition() {
        let sel = Selection::new()
            .or(Selection::new().with(ScopeKind::Guild, "1"))
            .or(Selection::new().with(ScopeKind::Guild, "2"))
            .not(Selection::new().with(ScopeKind::User, "banned"));
        assert!(sel.matches(&guild_session("discord", "1")));
        assert!(!sel.matches(&guild_session("discord", "5")));
        let banned = Session::new("discord", "bot")
            .with_user("banned")
            .with_guild("1");
        assert!(!sel.matches(&banned));
    }

    #[test]
    fn test_deserializes_operator_keys() {
        let sel: Selection = serde_json::from_value(serde_json::json!({
            "platform": "discord",
            "$not": { "guild": ["9"] },
        }))
        .unwrap();
        assert!(sel.matches(&guild_session("discord", "1")));
        assert!(!sel.matches(&guild_session("discord", "9")));
    }
}
