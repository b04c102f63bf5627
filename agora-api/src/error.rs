use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::Time;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Uuid already used {0}")]
    UuidAlreadyUsed(Uuid),

    #[error("Name already used {0}")]
    NameAlreadyUsed(String),

    #[error("No entity with id {0}")]
    EntityNotFound(Uuid),

    #[error("Entity {0} is deleted and can no longer be voted on")]
    VotingOnDeletedEntity(Uuid),

    #[error("Invalid filter parameter {0:?}")]
    InvalidFilterSpec(String),

    #[error("Invalid vote direction {0:?}")]
    InvalidVoteDirection(String),

    #[error("Comment {0} is part of a malformed thread")]
    MalformedThread(Uuid),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Text length {len} is outside the allowed {min}..={max} range")]
    InvalidTextLength {
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("Timestamp {0} is outside the serializable range")]
    InvalidTime(Time),
}

impl Error {
    /// Wraps a storage-layer failure the taxonomy has no better name for
    pub fn storage(err: anyhow::Error) -> Error {
        Error::Unknown(format!("storage: {err:#}"))
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::UuidAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::NameAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::EntityNotFound(_) => StatusCode::NOT_FOUND,
            Error::VotingOnDeletedEntity(_) => StatusCode::GONE,
            Error::InvalidFilterSpec(_) => StatusCode::BAD_REQUEST,
            Error::InvalidVoteDirection(_) => StatusCode::BAD_REQUEST,
            Error::MalformedThread(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
            Error::InvalidTextLength { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidTime(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::UuidAlreadyUsed(u) => json!({
                "message": "uuid conflict",
                "type": "conflict-uuid",
                "uuid": u,
            }),
            Error::NameAlreadyUsed(n) => json!({
                "message": "name already used",
                "type": "conflict-name",
                "name": n,
            }),
            Error::EntityNotFound(u) => json!({
                "message": "entity not found",
                "type": "entity-not-found",
                "uuid": u,
            }),
            Error::VotingOnDeletedEntity(u) => json!({
                "message": "entity is deleted and can no longer be voted on",
                "type": "voting-on-deleted-entity",
                "uuid": u,
            }),
            Error::InvalidFilterSpec(s) => json!({
                "message": "unrecognized filter parameter",
                "type": "invalid-filter-spec",
                "param": s,
            }),
            Error::InvalidVoteDirection(s) => json!({
                "message": "unrecognized vote direction",
                "type": "invalid-vote-direction",
                "direction": s,
            }),
            Error::MalformedThread(u) => json!({
                "message": "comment is part of a malformed thread",
                "type": "malformed-thread",
                "uuid": u,
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
            Error::InvalidTextLength { len, min, max } => json!({
                "message": "text length is out of range",
                "type": "invalid-text-length",
                "len": len,
                "min": min,
                "max": max,
            }),
            Error::InvalidTime(t) => json!({
                "message": "timestamp is outside the serializable range",
                "type": "invalid-time",
                "time": t.to_rfc3339(),
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let get_str = |field: &str| -> anyhow::Result<&str> {
            data.get(field)
                .and_then(|f| f.as_str())
                .ok_or_else(|| anyhow!("error contents has no string field {field:?}"))
        };
        let get_uuid = |field: &str| -> anyhow::Result<Uuid> {
            get_str(field).and_then(|u| Uuid::from_str(u).context("parsing uuid field"))
        };
        let get_usize = |field: &str| -> anyhow::Result<usize> {
            data.get(field)
                .and_then(|f| f.as_u64())
                .map(|f| f as usize)
                .ok_or_else(|| anyhow!("error contents has no integer field {field:?}"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(String::from(
                    data.get("message")
                        .and_then(|msg| msg.as_str())
                        .unwrap_or(""),
                )),
                "permission-denied" => Error::PermissionDenied,
                "conflict-uuid" => Error::UuidAlreadyUsed(get_uuid("uuid")?),
                "conflict-name" => Error::NameAlreadyUsed(String::from(get_str("name")?)),
                "entity-not-found" => Error::EntityNotFound(get_uuid("uuid")?),
                "voting-on-deleted-entity" => Error::VotingOnDeletedEntity(get_uuid("uuid")?),
                "invalid-filter-spec" => Error::InvalidFilterSpec(String::from(get_str("param")?)),
                "invalid-vote-direction" => {
                    Error::InvalidVoteDirection(String::from(get_str("direction")?))
                }
                "malformed-thread" => Error::MalformedThread(get_uuid("uuid")?),
                "null-byte" => Error::NullByteInString(String::from(get_str("string")?)),
                "invalid-text-length" => Error::InvalidTextLength {
                    len: get_usize("len")?,
                    min: get_usize("min")?,
                    max: get_usize("max")?,
                },
                "invalid-time" => Error::InvalidTime(
                    chrono::DateTime::parse_from_rfc3339(get_str("time")?)
                        .context("parsing time field")?
                        .with_timezone(&chrono::Utc),
                ),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}
