//! Opaque identifiers. A term is only a key to this crate; its text and
//! images live with whoever owns the content.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnerId(String);

impl TermId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl LearnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TermId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<&str> for LearnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One schedule row per (learner, term). Updates are serialized per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub learner_id: LearnerId,
    pub term_id: TermId,
}

impl ScheduleKey {
    pub fn new(learner_id: LearnerId, term_id: TermId) -> Self {
        Self {
            learner_id,
            term_id,
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.learner_id, self.term_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let term = TermId::new("perro");
        assert_eq!(serde_json::to_string(&term).unwrap(), "\"perro\"");

        let learner: LearnerId = serde_json::from_str("\"ana\"").unwrap();
        assert_eq!(learner.as_str(), "ana");
    }

    #[test]
    fn test_key_display() {
        let key = ScheduleKey::new("ana".into(), "perro".into());
        assert_eq!(key.to_string(), "ana/perro");
    }
}
