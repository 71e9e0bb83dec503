use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{InvitationEmail, InvitationMailer, SendResult};
use crate::config::email::EmailConfig;

/// SMTP invitation mailer
pub struct EmailProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    from_name: String,
}

impl EmailProvider {
    /// Build the SMTP transport; `None` when no SMTP host is configured
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, String> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| format!("Failed to create SMTP transport: {}", e))?
                .port(config.smtp_port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.smtp_port)
        };

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
        }))
    }

    async fn send_email(
        &self,
        to: &str,
        subject: String,
        text: String,
        html: String,
    ) -> SendResult {
        let from = format!("{} <{}>", self.from_name, self.from_address);

        let to_mailbox = match to.parse() {
            Ok(mbox) => mbox,
            Err(_) => return SendResult::failed("Invalid recipient email address"),
        };

        let from_mailbox = match from.parse() {
            Ok(mbox) => mbox,
            Err(_) => match self.from_address.parse() {
                Ok(mbox) => mbox,
                Err(_) => return SendResult::failed("Invalid from email address"),
            },
        };

        let email = match Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            ) {
            Ok(email) => email,
            Err(e) => return SendResult::failed(format!("Failed to build email: {}", e)),
        };

        match self.transport.send(email).await {
            Ok(_) => SendResult::ok(),
            Err(e) => SendResult::failed(format!("Failed to send email: {}", e)),
        }
    }
}

#[async_trait]
impl InvitationMailer for EmailProvider {
    async fn send_invitation(&self, email: &InvitationEmail) -> SendResult {
        let content = email.content();
        let result = self
            .send_email(&email.to, content.subject, content.text, content.html)
            .await;

        if result.success {
            tracing::info!(to = %email.to, "Invitation email sent");
        } else {
            tracing::warn!(to = %email.to, error = ?result.error, "Invitation email failed");
        }
        result
    }
}
