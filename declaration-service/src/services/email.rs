use axum::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    Message,
    SmtpTransport,
    Transport,
};
use service_core::error::AppError;
use std::time::Duration;

/// Email dispatch seam.
///
/// The invite email is the only place the raw token ever exists outside
/// the issuing request; the store keeps just its digest.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_invite_email(
        &self,
        to_email: &str,
        invite_token: &str,
        declaration_name: &str,
        entity_name: &str,
        base_url: &str,
    ) -> Result<(), AppError>;

    async fn send_invite_accepted_email(
        &self,
        to_email: &str,
        member_label: &str,
        declaration_name: &str,
    ) -> Result<(), AppError>;
}

/// Claim link embedded in the invite email.
///
/// Carries the raw secret and, for pre-filling the claim form, the
/// recipient address. Never the digest.
pub(crate) fn claim_link(base_url: &str, invite_token: &str, to_email: &str) -> String {
    format!(
        "{}/accept-invite?token={}&email={}",
        base_url,
        invite_token,
        urlencoding::encode(to_email)
    )
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &crate::config::SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.relay_host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(relay = %config.relay_host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_address.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?)
            .to(to_email.parse().map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::InternalError(e.into()))?;

        // Send email in blocking thread pool to avoid blocking async runtime
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(
                    to = %to_email,
                    subject = %subject,
                    "Email sent successfully"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e.to_string(),
                    to = %to_email,
                    "Failed to send email"
                );
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_invite_email(
        &self,
        to_email: &str,
        invite_token: &str,
        declaration_name: &str,
        entity_name: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = claim_link(base_url, invite_token, to_email);

        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>You have been invited to co-manage an accessibility declaration</h2>
                    <p>{entity} invites you to collaborate on the declaration &laquo;&nbsp;{declaration}&nbsp;&raquo;.</p>
                    <p>
                        <a href="{link}" style="background-color: #000091; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            Accept the invitation
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        This link is single use and expires in 7 days. If you weren't expecting this, please ignore this email.
                    </p>
                </body>
            </html>
            "###,
            entity = entity_name,
            declaration = declaration_name,
            link = link
        );

        let plain_body = format!(
            "You have been invited to co-manage an accessibility declaration\n\n            {} invites you to collaborate on the declaration \"{}\". Please visit the following link to accept:\n\n            {}

            This link is single use and expires in 7 days. If you weren't expecting this, please ignore this email.",
            entity_name, declaration_name, link
        );

        self.send_email(
            to_email,
            &format!("Invitation to collaborate on \"{}\"", declaration_name),
            &plain_body,
            &html_body,
        )
        .await
    }

    async fn send_invite_accepted_email(
        &self,
        to_email: &str,
        member_label: &str,
        declaration_name: &str,
    ) -> Result<(), AppError> {
        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Your invitation was accepted</h2>
                    <p>{member} now has access to the declaration &laquo;&nbsp;{declaration}&nbsp;&raquo;.</p>
                </body>
            </html>
            "###,
            member = member_label,
            declaration = declaration_name
        );

        let plain_body = format!(
            "Your invitation was accepted\n\n            {} now has access to the declaration \"{}\".",
            member_label, declaration_name
        );

        self.send_email(
            to_email,
            &format!("{} accepted your invitation", member_label),
            &plain_body,
            &html_body,
        )
        .await
    }
}

/// A captured outbound email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Recording mock provider for tests; can be flipped into failure mode.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: std::sync::Mutex<Vec<SentEmail>>,
    pub fail_sends: std::sync::atomic::AtomicBool,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_sends
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("mock email mutex poisoned").clone()
    }

    fn record(&self, to: &str, subject: String, html_body: String) -> Result<(), AppError> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::EmailError("SMTP transport unavailable".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?
            .push(SentEmail {
                to: to.to_string(),
                subject,
                html_body,
            });
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_invite_email(
        &self,
        to_email: &str,
        invite_token: &str,
        declaration_name: &str,
        _entity_name: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = claim_link(base_url, invite_token, to_email);
        self.record(
            to_email,
            format!("Invitation to collaborate on \"{}\"", declaration_name),
            format!("<a href=\"{}\">Accept the invitation</a>", link),
        )
    }

    async fn send_invite_accepted_email(
        &self,
        to_email: &str,
        member_label: &str,
        declaration_name: &str,
    ) -> Result<(), AppError> {
        self.record(
            to_email,
            format!("{} accepted your invitation", member_label),
            format!("{} now has access to \"{}\"", member_label, declaration_name),
        )
    }
}
