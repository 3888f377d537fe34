use serde::{Deserialize, Serialize};

// ============================================================================
// Chat Client <-> Server Events
// ============================================================================

/// Events sent from a chat client to the server.
///
/// The `type` tag and field casing match what browser clients already emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join the broadcast room for a classroom code. A connection is in at
    /// most one room; joining another room leaves the previous one.
    JoinClassroom { code: String },

    /// Post a message to a classroom's room.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        classroom_id: String,
        author: String,
        content: String,
    },
}

/// Events sent from the server to chat clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A message was persisted and is being fanned out to its room. Carries
    /// the stored record, including the server-assigned id and timestamp.
    NewMessage { message: ChatMessage },

    /// Something went wrong handling a client event.
    Error { message: String },
}

/// A persisted chat message as delivered to clients.
///
/// The same shape is returned by the message-log HTTP endpoint, so a client
/// can merge live events into a fetched history without translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub classroom_id: String,
    pub author: String,
    pub content: String,
    /// RFC 3339 UTC timestamp assigned by the server at persist time.
    pub timestamp: String,
}

// ============================================================================
// Helper implementations
// ============================================================================

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
