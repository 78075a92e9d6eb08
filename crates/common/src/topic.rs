//! Topic derivation.
//!
//! Every identity listens on exactly three topics:
//! `broadcast`, `role/{role}` and `role/{role}/{id}`.

use crate::identity::{Identity, IdentityId, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const BROADCAST: &str = "broadcast";

/// An addressable pub/sub channel name
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Topic shared by every identity
    pub fn broadcast() -> Self {
        Self(BROADCAST.to_string())
    }

    /// Topic shared by every identity holding `role`
    pub fn role(role: Role) -> Self {
        Self(format!("role/{role}"))
    }

    /// Topic addressed to a single identity
    pub fn identity(role: Role, id: &IdentityId) -> Self {
        Self(format!("role/{role}/{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The ordered, duplicate-free set of topics an identity subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet(BTreeSet<Topic>);

impl TopicSet {
    /// Derive the topic set for `identity`. Deterministic: the same identity
    /// always yields the same three topics.
    pub fn for_identity(identity: &Identity) -> Self {
        let mut topics = BTreeSet::new();
        topics.insert(Topic::broadcast());
        topics.insert(Topic::role(identity.role));
        topics.insert(Topic::identity(identity.role, &identity.id));
        Self(topics)
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.0.contains(topic)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.0.iter()
    }
}

impl IntoIterator for TopicSet {
    type Item = Topic;
    type IntoIter = std::collections::btree_set::IntoIter<Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
