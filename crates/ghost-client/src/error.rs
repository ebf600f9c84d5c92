use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The room expired or was destroyed. Terminal for the session.
    #[error("session terminated: room no longer exists")]
    RoomGone,

    /// Never retried automatically.
    #[error("access denied: room is at capacity")]
    RoomFull,

    #[error("server rejected request ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gateway protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Transport-level failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::WebSocket(_) => true,
            ClientError::Api { status, .. } => *status == 503,
            _ => false,
        }
    }
}
