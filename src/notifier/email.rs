//! STARTTLS SMTP alerting via `lettre`.

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};

use crate::config::NotificationsConfig;
use crate::errors::NotifierError;

pub async fn send(
    config: &NotificationsConfig,
    to: &str,
    subject: &str,
    body_html: &str,
) -> Result<(), NotifierError> {
    let from: Mailbox = config
        .from_address
        .parse()
        .map_err(|e| NotifierError::Email(format!("invalid from address: {e}")))?;
    let to: Mailbox = to.parse().map_err(|e| NotifierError::Email(format!("invalid recipient: {e}")))?;

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(MultiPart::alternative().singlepart(SinglePart::html(body_html.to_string())))
        .map_err(|e| NotifierError::Email(e.to_string()))?;

    let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

    let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        .map_err(|e| NotifierError::Email(e.to_string()))?
        .port(config.smtp_port)
        .credentials(creds)
        .build();

    match transport.send(email).await {
        Ok(_) => {
            info!("[notifier:email] alert sent to {}", config.from_address);
            Ok(())
        }
        Err(e) => {
            error!("[notifier:email] send failed: {e}");
            Err(NotifierError::Email(e.to_string()))
        }
    }
}
