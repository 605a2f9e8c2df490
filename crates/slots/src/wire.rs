/// JSON bodies exchanged over `/api`.
use serde::{Deserialize, Serialize};

use crate::{SlotAction, SlotKey, SlotMap, TimezoneOffset};

/// `POST /api/slots/{calendarId}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    pub slot_key: String,
    pub nickname: String,
    pub action: SlotAction,
}

impl MutationRequest {
    pub fn new(key: SlotKey, nickname: impl Into<String>, action: SlotAction) -> Self {
        Self {
            slot_key: key.to_string(),
            nickname: nickname.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    pub slots: SlotMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// `GET /api/timezone/{calendarId}` response; `null` when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneResponse {
    pub timezone: Option<TimezoneOffset>,
}

/// `POST /api/timezone/{calendarId}` body. Kept as raw JSON so that
/// non-integer or out-of-range values become a 400, not a parse rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneRequest {
    pub timezone: serde_json::Value,
}

impl TimezoneRequest {
    pub fn new(offset: TimezoneOffset) -> Self {
        Self {
            timezone: serde_json::Value::from(offset.hours()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTimezoneResponse {
    pub success: bool,
    pub timezone: TimezoneOffset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
