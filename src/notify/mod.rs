use std::env;

use anyhow::{Context, Result, bail};
use reqwest::Client;

/// Fields carried into the approval notification.
#[derive(Debug, Clone)]
pub struct ApprovalNotice {
    pub student_email: String,
    pub student_name: String,
    pub journal_title: String,
    pub publication_id: String,
    pub journal_link: String,
}

/// Outbound mail sink. Delivery goes through an HTTP mail API; the caller
/// only sees success or failure, and failure is never fatal to the
/// transaction that triggered the notification.
#[derive(Clone)]
pub struct MailClient {
    http: Client,
    config: MailConfig,
}

#[derive(Clone, Default)]
struct MailConfig {
    api_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
}

impl MailClient {
    /// Build a client using environment variables. Missing settings leave the
    /// sink unconfigured rather than failing startup; sends then report
    /// failure.
    pub fn from_env() -> Self {
        Self {
            http: Client::new(),
            config: MailConfig {
                api_url: env::var("MAIL_API_URL").ok(),
                api_key: env::var("MAIL_API_KEY").ok(),
                from_address: env::var("MAIL_FROM").ok(),
            },
        }
    }

    pub async fn send_approval(&self, notice: &ApprovalNotice) -> Result<()> {
        let Some(api_url) = self.config.api_url.as_ref() else {
            bail!("MAIL_API_URL is not configured; approval notification skipped");
        };
        let from_address = self
            .config
            .from_address
            .as_deref()
            .unwrap_or("journals@example.edu");

        let text_body = format!(
            "Dear {name},\n\n\
             Congratulations! Your journal has been approved and published.\n\n\
             Journal Title: {title}\n\
             Publication ID: {publication_id}\n\n\
             View your published journal: {link}\n",
            name = notice.student_name,
            title = notice.journal_title,
            publication_id = notice.publication_id,
            link = notice.journal_link,
        );

        let payload = serde_json::json!({
            "from": from_address,
            "to": notice.student_email,
            "subject": "Your Journal Has Been Accepted & Published",
            "text": text_body,
        });

        let mut request = self.http.post(api_url).json(&payload);
        if let Some(api_key) = self.config.api_key.as_ref() {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("mail API request failed to send")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("mail API call failed with status {status}: {body}");
        }

        Ok(())
    }
}
