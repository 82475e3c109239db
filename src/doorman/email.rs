//! Confirmation mail delivery.
//!
//! Registration hands the notification to `spawn_confirmation` and moves on:
//! delivery happens on its own task and a failure is a log line, never a
//! failed signup. `SmtpMailer` talks to a relay via lettre; without a
//! configured host the server falls back to `LogMailer`, which only logs.

use crate::cli::globals::{GlobalArgs, MailSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info, warn};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver the account confirmation mail or return an error.
    async fn send_confirmation(&self, username: &str, email: &str) -> Result<()>;
}

/// Dev fallback, logs the mail instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, username: &str, email: &str) -> Result<()> {
        info!(username, email, "confirmation mail (log only)");
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    support_email: Option<String>,
    public_url: String,
}

impl SmtpMailer {
    /// Build the SMTP mailer from the configured transport settings.
    ///
    /// # Errors
    /// Returns an error for an unusable relay host or From address.
    pub fn new(mail: &MailSettings, support_email: Option<String>, public_url: String) -> Result<Self> {
        let host = mail
            .host
            .as_deref()
            .context("SMTP host is not configured")?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("Failed to configure SMTP relay for {host}"))?
            .port(mail.port);

        if let (Some(username), Some(password)) = (&mail.username, &mail.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        let from = mail
            .username
            .as_deref()
            .unwrap_or("no-reply@localhost")
            .parse::<Mailbox>()
            .context("Invalid From address")?;

        Ok(Self {
            transport: builder.build(),
            from,
            support_email,
            public_url,
        })
    }

    fn confirmation_link(&self, email: &str) -> String {
        format!("{}/confirm-email?email={email}", self.public_url)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(&self, username: &str, email: &str) -> Result<()> {
        let link = self.confirmation_link(email);
        let support = self
            .support_email
            .as_deref()
            .unwrap_or("our support team");

        let text = format!(
            "Hi, {username}!\n\nPlease click the following link to confirm your account:\n{link}\n"
        );
        let html = format!(
            "<html><body style=\"font-family: Arial, sans-serif; color: #333;\">\
             <h4>Dear {username},</h4>\
             <p>Thank you for registering with us! Please activate your account by clicking the link below:</p>\
             <p><a href=\"{link}\">Activate My Account</a></p>\
             <p>If you did not create an account, no action is required.</p>\
             <p><em>If you have any questions, feel free to contact {support}.</em></p>\
             </body></html>"
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(email.parse::<Mailbox>().context("Invalid recipient")?)
            .subject("Registration Confirmation")
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
            )
            .context("Failed to build confirmation mail")?;

        self.transport
            .send(message)
            .await
            .context("Failed to send confirmation mail")?;

        Ok(())
    }
}

/// Pick the mailer for the configured transport: SMTP when a host is set,
/// log-only otherwise.
pub fn from_globals(globals: &GlobalArgs) -> Result<Arc<dyn Mailer>> {
    if globals.mail.host.is_some() {
        Ok(Arc::new(SmtpMailer::new(
            &globals.mail,
            globals.support_email.clone(),
            globals.public_url.clone(),
        )?))
    } else {
        warn!("SMTP host not configured, confirmation mail will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// Fire-and-forget dispatch. Registration success is independent of mail
/// delivery; a failure here is an observability event only.
pub fn spawn_confirmation(mailer: Arc<dyn Mailer>, username: String, email: String) {
    tokio::spawn(async move {
        if let Err(err) = mailer.send_confirmation(&username, &email).await {
            error!("Failed to send confirmation mail to {email}: {err:?}");
        }
    });
}
