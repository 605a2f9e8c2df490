/// Client side of the shared availability grid: gesture handling, optimistic
/// view state and polling reconciliation against the slot server.
use thiserror::Error;

mod api;
pub use api::*;

mod http;
pub use http::*;

mod view;
pub use view::*;

mod selection;
pub use selection::*;

mod session;
pub use session::*;

mod scheduler;
pub use scheduler::*;

mod prefs;
pub use prefs::*;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    Grid(#[from] slots::GridError),

    #[error("selection in progress")]
    Busy,

    #[error("preferences error: {0}")]
    Prefs(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SyncError::Serialization(e.to_string())
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}
