use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::models::ContactEmail;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("mail API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Outbound notification channel owned by the dispatch worker.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, email: &ContactEmail) -> impl Future<Output = Result<(), MailError>> + Send;
}

// Body of the mail API call
#[derive(Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: &'a str,
    text: &'a str,
}

// Mail API client (Resend-compatible JSON)
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    to: String,
}

impl HttpMailer {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        api_key: String,
        from: String,
        to: String,
    ) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from,
            to,
        }
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, email: &ContactEmail) -> Result<(), MailError> {
        let body = SendEmailBody {
            from: &self.from,
            to: [&self.to],
            reply_to: &email.reply_to,
            subject: &email.subject,
            text: &email.text,
        };

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(SEND_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

// Used when no API key is configured: the email only goes to the log
pub struct LogMailer {
    to: String,
}

impl LogMailer {
    pub fn new(to: String) -> Self {
        Self { to }
    }
}

impl Mailer for LogMailer {
    async fn send(&self, email: &ContactEmail) -> Result<(), MailError> {
        info!(
            to = %self.to,
            reply_to = %email.reply_to,
            subject = %email.subject,
            "mail API key not set, logging email instead of sending\n{}",
            email.text
        );
        Ok(())
    }
}
