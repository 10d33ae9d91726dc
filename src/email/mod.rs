//! Outbound email events. Services publish; the mailer worker consumes.

pub mod mailer;
pub mod topic;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailData {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Payload published on the user-email topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEvent {
    pub to: String,
    pub subject: String,
    pub template: EmailTemplate,
    pub data: EmailData,
}

impl EmailEvent {
    pub fn verification(to: &str, token: &str, username: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Verify your email".into(),
            template: EmailTemplate::Verification,
            data: EmailData {
                token: token.to_string(),
                username: Some(username.to_string()),
            },
        }
    }

    pub fn password_reset(to: &str, token: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your password".into(),
            template: EmailTemplate::PasswordReset,
            data: EmailData {
                token: token.to_string(),
                username: None,
            },
        }
    }
}
