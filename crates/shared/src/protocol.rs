use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CarId, Role, SessionId};

pub const CARS_PATH: &str = "/cars/";
pub const RUN_PATH: &str = "/run_sse";

pub fn car_path(car_id: CarId) -> String {
    format!("/cars/{car_id}")
}

pub fn sessions_path(app_name: &str, user_id: &str) -> String {
    format!("/apps/{app_name}/users/{user_id}/sessions")
}

pub fn session_path(app_name: &str, user_id: &str, session_id: &SessionId) -> String {
    format!("{}/{session_id}", sessions_path(app_name, user_id))
}

/// Writable vehicle attributes; the body of create and update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleFields {
    pub company: String,
    pub model: String,
    pub color: String,
    pub kms: u64,
    pub year: u32,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: CarId,
    #[serde(flatten)]
    pub fields: VehicleFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub events: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Message exchange request posted to [`RUN_PATH`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: SessionId,
    pub new_message: Content,
}

impl RunRequest {
    pub fn user_text(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: SessionId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id,
            new_message: Content {
                role: Role::User,
                parts: vec![Part {
                    text: Some(text.into()),
                }],
            },
        }
    }
}

/// Reply to a [`RunRequest`]. Only the first text part is shown to the user;
/// the role is carried through unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub content: Option<ReplyContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl RunResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}
