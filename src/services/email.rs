//! Outgoing email
//!
//! `Mailer` is the transport seam: `SmtpMailer` delivers through lettre's
//! async SMTP transport, `LogMailer` only logs (used when SMTP is disabled).
//! `Notifier` composes the marketplace's messages on top of a mailer.

use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::EmailConfig;
use crate::models::{Booking, BookingStatus};

/// A plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP delivery via lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(email.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Logs emails instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email delivery disabled, message logged\n{}", email.body);
        Ok(())
    }
}

/// Build the configured mailer, falling back to logging when SMTP is off
pub fn create_mailer(config: &EmailConfig) -> Result<Arc<dyn Mailer>> {
    if config.enabled {
        tracing::info!("Email delivery via SMTP host {}", config.smtp_host);
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        Ok(Arc::new(LogMailer))
    }
}

/// Generate a random 6-digit verification code
pub fn generate_verification_code() -> String {
    format!("{:06}", OsRng.next_u32() % 1_000_000)
}

/// Composes and sends the marketplace's notifications
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    site_name: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            site_name: "BharatTrips".to_string(),
        }
    }

    /// Send a sign-up verification code. Delivery errors are returned.
    pub async fn send_verification_code(&self, to: &str, code: &str, ttl_minutes: i64) -> Result<()> {
        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject: format!("[{}] Your verification code", self.site_name),
                body: format!(
                    "Hello,\n\nYour verification code is {}.\nIt expires in {} minutes.\n\nIf you did not request this, you can ignore this email.\n\nTeam {}",
                    code, ttl_minutes, self.site_name
                ),
            })
            .await
    }

    /// Tell the guest their booking request was received
    pub fn booking_received(&self, booking: &Booking, property_name: &str) {
        let email = OutgoingEmail {
            to: booking.guest_email.clone(),
            subject: format!("[{}] Booking #{} received", self.site_name, booking.id),
            body: format!(
                "Hi {},\n\nWe received your request for {} from {} to {} ({} night(s), {} room(s)).\n\nSubtotal: Rs {}\nTaxes: Rs {}\nService fee: Rs {}\nTotal: Rs {}\n\nThe host will confirm shortly.\n\nTeam {}",
                booking.guest_name,
                property_name,
                booking.check_in,
                booking.check_out,
                booking.nights,
                booking.rooms,
                booking.subtotal,
                booking.taxes,
                booking.service_fee,
                booking.total,
                self.site_name
            ),
        };
        self.dispatch(email);
    }

    /// Tell the guest their booking changed status
    pub fn booking_status_changed(&self, booking: &Booking, property_name: &str, status: BookingStatus) {
        let email = OutgoingEmail {
            to: booking.guest_email.clone(),
            subject: format!("[{}] Booking #{} is now {}", self.site_name, booking.id, status),
            body: format!(
                "Hi {},\n\nYour booking at {} from {} to {} is now {}.\n\nTeam {}",
                booking.guest_name, property_name, booking.check_in, booking.check_out, status, self.site_name
            ),
        };
        self.dispatch(email);
    }

    /// Send in the background; failures are logged and never surface
    fn dispatch(&self, email: OutgoingEmail) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let to = email.to.clone();
            if let Err(e) = mailer.send(email).await {
                tracing::warn!("Failed to send notification to {}: {}", to, e);
            }
        });
    }
}

/// Mailer that records messages, for tests
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: tokio::sync::Mutex<Vec<OutgoingEmail>>,
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}
