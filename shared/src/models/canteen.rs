//! Canteen Model

use serde::{Deserialize, Serialize};

/// Canteen (vendor location) as needed for checkout decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Canteen {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Owner's manual open/closed switch; absent means open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
    /// Backend-computed "open right now" flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_currently_open: Option<bool>,
    /// Opening time, `HH:mm` in the canteen's local timezone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_time: Option<String>,
    /// Closing time, `HH:mm` in the canteen's local timezone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl Canteen {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_open: None,
            is_currently_open: None,
            opening_time: None,
            closing_time: None,
            location: None,
            owner_id: None,
        }
    }

    pub fn with_hours(mut self, opening: impl Into<String>, closing: impl Into<String>) -> Self {
        self.opening_time = Some(opening.into());
        self.closing_time = Some(closing.into());
        self
    }

    /// `"09:00 - 17:00"` when both times are known
    pub fn hours_label(&self) -> Option<String> {
        match (&self.opening_time, &self.closing_time) {
            (Some(open), Some(close)) => Some(format!("{} - {}", open, close)),
            _ => None,
        }
    }
}
