use crate::config::MailConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tera::Tera;

// `link` is built from the base URL and a JWT, both limited to URL-safe characters.
const CONFIRMATION_TEMPLATE: &str = "<p>Hi {{ username }},</p>\
<p>Thanks for signing up. Please confirm your email address:</p>\
<p><a href=\"{{ link | safe }}\">{{ link | safe }}</a></p>";

const PASSWORD_RESET_TEMPLATE: &str = "<p>Hi {{ username }},</p>\
<p>A password reset was requested for your account. Use this link to continue:</p>\
<p><a href=\"{{ link | safe }}\">{{ link | safe }}</a></p>\
<p>If you did not request it, ignore this email.</p>";

/// Outgoing transactional email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html: String,
}

/// Which link an email carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Confirmation,
    PasswordReset,
}

impl EmailKind {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailKind::Confirmation => "Email confirmation",
            EmailKind::PasswordReset => "Reset password",
        }
    }

    /// Link to the API route that consumes `token`. `base_url` ends with '/'.
    pub fn link(&self, base_url: &str, token: &str) -> String {
        match self {
            EmailKind::Confirmation => format!("{}api/auth/confirmed_email/{}", base_url, token),
            EmailKind::PasswordReset => {
                format!("{}api/auth/password-reset-verify/{}", base_url, token)
            }
        }
    }

    fn template(&self) -> (&'static str, &'static str) {
        match self {
            EmailKind::Confirmation => ("confirmation.html", CONFIRMATION_TEMPLATE),
            EmailKind::PasswordReset => ("password_reset.html", PASSWORD_RESET_TEMPLATE),
        }
    }

    /// Render the email for `username`. The username is HTML-escaped.
    pub fn compose(
        &self,
        to_email: &str,
        username: &str,
        base_url: &str,
        token: &str,
    ) -> Result<EmailMessage> {
        let (name, template) = self.template();
        let mut tera = Tera::default();
        tera.add_raw_template(name, template)
            .context("Failed to parse email template")?;

        let mut context = tera::Context::new();
        context.insert("username", username);
        context.insert("link", &self.link(base_url, token));
        let html = tera
            .render(name, &context)
            .with_context(|| format!("Failed to render {}", name))?;

        Ok(EmailMessage {
            to_email: to_email.to_string(),
            to_name: username.to_string(),
            subject: self.subject().to_string(),
            html,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Send `message` on a background task. Failures are logged.
pub fn send_in_background(mailer: Arc<dyn Mailer>, message: EmailMessage) {
    tokio::spawn(async move {
        match mailer.send(&message).await {
            Ok(()) => tracing::info!("Sent '{}' email to {}", message.subject, message.to_email),
            Err(e) => tracing::error!(
                "Failed to send '{}' email to {}: {:#}",
                message.subject,
                message.to_email,
                e
            ),
        }
    });
}

/// Used when no mail API is configured: the message is only logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::warn!(
            to = %message.to_email,
            subject = %message.subject,
            "Mail delivery not configured, dropping email"
        );
        tracing::debug!("Email body: {}", message.html);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

/// Transactional mail over a Brevo-compatible HTTP API
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn body<'a>(&'a self, message: &'a EmailMessage) -> SendEmailBody<'a> {
        SendEmailBody {
            sender: Address {
                email: &self.config.sender_email,
                name: Some(&self.config.sender_name),
            },
            to: vec![Address {
                email: &message.to_email,
                name: Some(&message.to_name),
            }],
            subject: &message.subject,
            html_content: &message.html,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let resp = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&self.body(message))
            .send()
            .await
            .context("Failed to reach mail API")?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Mail API send failed (status={}): {}", status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_point_at_api_routes() {
        assert_eq!(
            EmailKind::Confirmation.link("http://localhost:8000/", "abc"),
            "http://localhost:8000/api/auth/confirmed_email/abc"
        );
        assert_eq!(
            EmailKind::PasswordReset.link("https://x.io/", "t.k.n"),
            "https://x.io/api/auth/password-reset-verify/t.k.n"
        );
    }

    #[test]
    fn test_compose_confirmation() {
        let msg = EmailKind::Confirmation
            .compose("a@b.io", "alice", "http://h/", "tok")
            .unwrap();
        assert_eq!(msg.to_email, "a@b.io");
        assert_eq!(msg.to_name, "alice");
        assert_eq!(msg.subject, "Email confirmation");
        assert!(msg.html.contains("Hi alice"));
        assert!(msg.html.contains("http://h/api/auth/confirmed_email/tok"));
    }

    #[test]
    fn test_compose_reset() {
        let msg = EmailKind::PasswordReset
            .compose("a@b.io", "alice", "http://h/", "tok")
            .unwrap();
        assert_eq!(msg.subject, "Reset password");
        assert!(msg.html.contains("password-reset-verify/tok"));
    }

    #[test]
    fn test_username_is_html_escaped() {
        let msg = EmailKind::Confirmation
            .compose("a@b.io", "<a href=\"x\">win</a>", "http://h/", "tok")
            .unwrap();
        assert!(!msg.html.contains("<a href=\"x\">"));
        assert!(msg.html.contains("Hi &lt;a href=&quot;x&quot;&gt;win&lt;&#x2F;a&gt;,"));
        assert!(msg.html.contains("<a href=\"http://h/api/auth/confirmed_email/tok\">"));
        assert_eq!(msg.to_name, "<a href=\"x\">win</a>");
    }

    #[test]
    fn test_http_body_shape() {
        let mailer = HttpMailer::new(MailConfig {
            api_url: "http://localhost/none".to_string(),
            api_key: "k".to_string(),
            sender_email: "noreply@x.io".to_string(),
            sender_name: "Rolodex".to_string(),
        });
        let msg = EmailKind::Confirmation
            .compose("a@b.io", "alice", "http://h/", "tok")
            .unwrap();
        let value = serde_json::to_value(mailer.body(&msg)).unwrap();
        assert_eq!(value["sender"]["email"], "noreply@x.io");
        assert_eq!(value["sender"]["name"], "Rolodex");
        assert_eq!(value["to"][0]["email"], "a@b.io");
        assert_eq!(value["subject"], "Email confirmation");
        assert!(value["htmlContent"].as_str().unwrap().contains("tok"));
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let msg = EmailKind::PasswordReset
            .compose("a@b.io", "alice", "http://h/", "tok")
            .unwrap();
        assert!(LogMailer.send(&msg).await.is_ok());
    }
}
