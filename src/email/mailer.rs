use tokio::sync::mpsc;
use tracing::{info, instrument};

use super::{topic::Envelope, EmailEvent, EmailTemplate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn render(event: &EmailEvent, app_url: &str) -> RenderedEmail {
    let (subject, body) = match event.template {
        EmailTemplate::Verification => (
            "Verify your email",
            format!(
                "Click this link to verify your email: {}/verify-email?token={}",
                app_url, event.data.token
            ),
        ),
        EmailTemplate::PasswordReset => (
            "Reset your password",
            format!(
                "Click this link to reset your password: {}/reset-password?token={}",
                app_url, event.data.token
            ),
        ),
    };
    let body = match &event.data.username {
        Some(name) => format!("Hi {name},\n\n{body}"),
        None => body,
    };
    RenderedEmail {
        to: event.to.clone(),
        subject: subject.to_string(),
        body,
    }
}

/// Consumes the email topic until every publisher is dropped.
pub async fn run_mailer(mut rx: mpsc::UnboundedReceiver<Envelope>, app_url: String) {
    info!("mailer started");
    while let Some(envelope) = rx.recv().await {
        let email = render(&envelope.event, &app_url);
        deliver(&envelope.message_id, envelope.event.template, &email).await;
    }
    info!("mailer stopped");
}

// Delivery transport is not wired in; record the send without the link.
#[instrument(skip(email), fields(to = %email.to))]
async fn deliver(message_id: &str, template: EmailTemplate, email: &RenderedEmail) {
    info!(subject = %email.subject, body_len = email.body.len(), "sending email");
}
