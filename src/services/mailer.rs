use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{
    AsyncFileTransport, AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};

use crate::config::{SmtpConfig, SmtpSecurity, TransportConfig, TransportKind};
use crate::error::{AppError, Result};

const EPUB_MIME: &str = "application/epub+zip";

/// A finished EPUB ready to be attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EpubFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, from: &str, to: &str, subject: &str, attachment: &EpubFile) -> Result<()>;
}

pub enum Mailer {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Sendmail(AsyncSendmailTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl Mailer {
    pub fn from_config(config: &TransportConfig, kind: TransportKind) -> Result<Self> {
        config.validate(kind)?;

        match kind {
            TransportKind::Smtp => {
                let smtp = config
                    .smtp
                    .as_ref()
                    .ok_or_else(|| AppError::Config("missing smtp block".to_string()))?;
                Ok(Mailer::Smtp(smtp_transport(smtp)?))
            }
            TransportKind::Sendmail => {
                let transport = match config.sendmail.as_ref().and_then(|s| s.command.as_ref()) {
                    Some(command) => AsyncSendmailTransport::<Tokio1Executor>::new_with_command(command),
                    None => AsyncSendmailTransport::<Tokio1Executor>::new(),
                };
                Ok(Mailer::Sendmail(transport))
            }
            TransportKind::File => {
                let file = config
                    .file
                    .as_ref()
                    .ok_or_else(|| AppError::Config("missing file block".to_string()))?;
                std::fs::create_dir_all(&file.dir)?;
                Ok(Mailer::File(AsyncFileTransport::<Tokio1Executor>::new(&file.dir)))
            }
        }
    }
}

fn smtp_transport(smtp: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let mut builder = match smtp.security {
        SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host),
        SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host),
        SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)),
    }
    .map_err(|e| AppError::Config(format!("invalid smtp host '{}': {}", smtp.host, e)))?;

    if let Some(port) = smtp.port {
        builder = builder.port(port);
    }
    if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    Ok(builder.build())
}

/// Compose a `multipart/mixed` message carrying the EPUB.
pub fn compose(from: &str, to: &str, subject: &str, attachment: &EpubFile) -> Result<Message> {
    let send_error = |reason: String| AppError::Send {
        to: to.to_string(),
        reason,
    };

    let from: Mailbox = from
        .parse()
        .map_err(|e| send_error(format!("invalid from address: {}", e)))?;
    let to_box: Mailbox = to
        .parse()
        .map_err(|e| send_error(format!("invalid recipient address: {}", e)))?;
    let content_type = ContentType::parse(EPUB_MIME).map_err(|e| send_error(e.to_string()))?;

    Message::builder()
        .from(from)
        .to(to_box)
        .subject(subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(format!("Attached: {}\n", attachment.filename)))
                .singlepart(
                    Attachment::new(attachment.filename.clone()).body(attachment.bytes.clone(), content_type),
                ),
        )
        .map_err(|e| send_error(e.to_string()))
}

#[async_trait]
impl MailSender for Mailer {
    async fn send(&self, from: &str, to: &str, subject: &str, attachment: &EpubFile) -> Result<()> {
        let message = compose(from, to, subject, attachment)?;
        let send_error = |reason: String| AppError::Send {
            to: to.to_string(),
            reason,
        };

        match self {
            Mailer::Smtp(transport) => {
                transport.send(message).await.map_err(|e| send_error(e.to_string()))?;
            }
            Mailer::Sendmail(transport) => {
                transport.send(message).await.map_err(|e| send_error(e.to_string()))?;
            }
            Mailer::File(transport) => {
                transport.send(message).await.map_err(|e| send_error(e.to_string()))?;
            }
        }

        tracing::debug!("Sent '{}' to {}", subject, to);
        Ok(())
    }
}
