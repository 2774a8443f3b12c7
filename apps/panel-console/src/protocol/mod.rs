pub mod markup;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Panel-assigned log sequence marker. Everything up to and including the
/// cursor has been delivered once the panel reports it.
pub type LogCursor = u64;

/// One answer to a log poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub cursor: LogCursor,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub id: u64,
}

/// Full replacement view of the server status; there is no incremental form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status_text: String,
    pub players: Vec<PlayerRecord>,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct LogPayload {
    #[serde(deserialize_with = "deserialize_cursor")]
    log_seq: LogCursor,
    log: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
    players: Option<String>,
}

pub fn decode_log(body: &str) -> Result<LogChunk, ProtocolError> {
    let payload: LogPayload = serde_json::from_str(body)?;
    Ok(LogChunk {
        cursor: payload.log_seq,
        text: payload.log,
    })
}

pub fn decode_status(body: &str) -> Result<StatusSnapshot, ProtocolError> {
    let payload: StatusPayload = serde_json::from_str(body)?;
    let players = payload
        .players
        .as_deref()
        .map(markup::player_records)
        .unwrap_or_default();
    Ok(StatusSnapshot {
        status_text: payload.status,
        players,
    })
}

// PHP panels are inconsistent about quoting numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCursor {
    Number(u64),
    Text(String),
}

fn deserialize_cursor<'de, D>(deserializer: D) -> Result<LogCursor, D::Error>
where
    D: Deserializer<'de>,
{
    match RawCursor::deserialize(deserializer)? {
        RawCursor::Number(value) => Ok(value),
        RawCursor::Text(raw) => raw
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("log_seq '{raw}' is not a cursor"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_log_chunk() {
        let chunk = decode_log(r#"{"log_seq":5,"log":"Server started\n"}"#).unwrap();
        assert_eq!(
            chunk,
            LogChunk {
                cursor: 5,
                text: "Server started\n".into()
            }
        );
    }

    #[test]
    fn accepts_quoted_cursor() {
        let chunk = decode_log(r#"{"log_seq":"12","log":""}"#).unwrap();
        assert_eq!(chunk.cursor, 12);
        assert!(chunk.text.is_empty());
    }

    #[test]
    fn rejects_missing_fields_and_garbage() {
        assert!(decode_log(r#"{"log":"hello"}"#).is_err());
        assert!(decode_log(r#"{"log_seq":3}"#).is_err());
        assert!(decode_log(r#"{"log_seq":-1,"log":""}"#).is_err());
        assert!(decode_log(r#"{"log_seq":"abc","log":""}"#).is_err());
        assert!(decode_log("<html>session expired</html>").is_err());
    }

    #[test]
    fn decodes_status_with_players() {
        let body = r##"{
            "status": "Online",
            "players": "<a href=\"index.php?r=player/view&amp;id=42\">Alice</a>, <a href=\"#\">Ghost</a>"
        }"##;
        let snapshot = decode_status(body).unwrap();
        assert_eq!(snapshot.status_text, "Online");
        assert_eq!(
            snapshot.players,
            vec![PlayerRecord {
                name: "Alice".into(),
                id: 42
            }]
        );
    }

    #[test]
    fn null_player_markup_means_nobody_online() {
        let snapshot = decode_status(r#"{"status":"Offline","players":null}"#).unwrap();
        assert_eq!(snapshot.status_text, "Offline");
        assert!(snapshot.players.is_empty());
    }

    #[test]
    fn status_without_status_field_is_malformed() {
        assert!(matches!(
            decode_status(r#"{"players":""}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
