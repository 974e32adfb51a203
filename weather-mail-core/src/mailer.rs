//! Outbound email: one request per recipient through SendGrid's v3 API.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Serialize;
use std::{fmt::Debug, time::Duration};
use tracing::{info, warn};

const SENDGRID_BASE_URL: &str = "https://api.sendgrid.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An image referenced from the HTML body as `cid:<content_id>`.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub content_id: String,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlineImage {
    pub fn png(content_id: &str, bytes: Vec<u8>) -> Self {
        Self {
            content_id: content_id.to_string(),
            filename: format!("{content_id}.png"),
            mime_type: "image/png".to_string(),
            bytes,
        }
    }

    /// The `src` value the HTML uses to show this image.
    pub fn cid(&self) -> String {
        format!("cid:{}", self.content_id)
    }
}

/// Recipient-independent part of an email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
    pub images: Vec<InlineImage>,
}

#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    /// Send `message` to a single recipient.
    async fn send(&self, to: &str, message: &EmailMessage) -> Result<()>;
}

/// Outcome of sending one message to every recipient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReport {
    pub sent: Vec<String>,
    /// Recipient and the error it failed with.
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len()
    }

    pub fn any_sent(&self) -> bool {
        !self.sent.is_empty()
    }
}

/// Send to each recipient in turn; failures are logged and counted, never
/// abort the remaining sends.
pub async fn deliver(
    mailer: &dyn Mailer,
    message: &EmailMessage,
    recipients: &[String],
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for to in recipients {
        match mailer.send(to, message).await {
            Ok(()) => {
                info!(%to, "email sent");
                report.sent.push(to.clone());
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(%to, error = %reason, "email failed");
                report.failed.push((to.clone(), reason));
            }
        }
    }

    report
}

#[derive(Debug, Clone)]
pub struct SendGridMailer {
    api_key: String,
    sender: String,
    base_url: String,
    http: Client,
}

impl SendGridMailer {
    pub fn new(api_key: String, sender: String) -> Result<Self> {
        Self::with_base_url(api_key, sender, SENDGRID_BASE_URL)
    }

    pub fn with_base_url(api_key: String, sender: String, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { api_key, sender, base_url: base_url.trim_end_matches('/').to_string(), http })
    }

    fn payload<'a>(&'a self, to: &'a str, message: &'a EmailMessage) -> SgMail<'a> {
        SgMail {
            personalizations: vec![SgPersonalization { to: vec![SgAddress { email: to }] }],
            from: SgAddress { email: &self.sender },
            subject: &message.subject,
            content: vec![SgContent { kind: "text/html", value: &message.html }],
            attachments: message
                .images
                .iter()
                .map(|image| SgAttachment {
                    content: STANDARD.encode(&image.bytes),
                    kind: &image.mime_type,
                    filename: &image.filename,
                    disposition: "inline",
                    content_id: &image.content_id,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SgAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct SgPersonalization<'a> {
    to: Vec<SgAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct SgContent<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct SgAttachment<'a> {
    content: String,
    #[serde(rename = "type")]
    kind: &'a str,
    filename: &'a str,
    disposition: &'a str,
    content_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SgMail<'a> {
    personalizations: Vec<SgPersonalization<'a>>,
    from: SgAddress<'a>,
    subject: &'a str,
    content: Vec<SgContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SgAttachment<'a>>,
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, to: &str, message: &EmailMessage) -> Result<()> {
        let url = format!("{}/v3/mail/send", self.base_url);

        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(to, message))
            .send()
            .await
            .context("Failed to send request to SendGrid")?;

        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.text().await.unwrap_or_default();
        Err(anyhow!("SendGrid rejected message with status {}: {}", status, body.trim()))
    }
}
