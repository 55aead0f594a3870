//! Audit — append-only records of who changed what.
//!
//! The acting user is an explicit [`Actor`] argument on every mutating
//! operation; nothing reads it from ambient context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{AuditRecordId, ProviderId};
use crate::time::Timestamp;

/// Username of whoever triggered an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(String);

impl Actor {
    /// Actor used by scheduled jobs and when no user is known.
    pub const SYSTEM: &'static str = "system";

    /// An actor for the given username; blank names fall back to `system`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Self::system()
        } else {
            Self(name)
        }
    }

    #[must_use]
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of record an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSubject {
    NetworkPoint,
    Provider,
    Vehicle,
}

impl fmt::Display for AuditSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NetworkPoint => "NETWORK_POINT",
            Self::Provider => "PROVIDER",
            Self::Vehicle => "VEHICLE",
        };
        f.write_str(text)
    }
}

impl FromStr for AuditSubject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NETWORK_POINT" => Ok(Self::NetworkPoint),
            "PROVIDER" => Ok(Self::Provider),
            "VEHICLE" => Ok(Self::Vehicle),
            other => Err(format!("unknown audit subject {other:?}")),
        }
    }
}

/// What happened to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Create,
    Update,
    Archive,
    Unarchive,
    Delete,
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Archive => "ARCHIVE",
            Self::Unarchive => "UNARCHIVE",
            Self::Delete => "DELETE",
        };
        f.write_str(text)
    }
}

impl FromStr for AuditOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "ARCHIVE" => Ok(Self::Archive),
            "UNARCHIVE" => Ok(Self::Unarchive),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown audit operation {other:?}")),
        }
    }
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub subject: AuditSubject,
    pub subject_id: uuid::Uuid,
    pub operation: AuditOperation,
    pub author: String,
    pub timestamp: Timestamp,
    /// Provider the subject was attributed to when the operation happened.
    pub provider_id: Option<ProviderId>,
    pub reason: Option<String>,
    /// Serialized state of the subject.
    pub snapshot: serde_json::Value,
}

impl AuditRecord {
    /// Build a record stamped with a fresh id.
    ///
    /// A snapshot that fails to serialize is stored as JSON `null`.
    #[must_use]
    pub fn new<T: Serialize>(
        subject: AuditSubject,
        subject_id: uuid::Uuid,
        operation: AuditOperation,
        actor: &Actor,
        timestamp: Timestamp,
        snapshot: &T,
    ) -> Self {
        Self {
            id: AuditRecordId::new(),
            subject,
            subject_id,
            operation,
            author: actor.name().to_string(),
            timestamp,
            provider_id: None,
            reason: None,
            snapshot: serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider_id: Option<ProviderId>) -> Self {
        self.provider_id = provider_id;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
