use secrecy::SecretString;

/// Mail transport settings, all optional. When `host` is not set the server
/// falls back to a log-only mailer.
#[derive(Debug, Clone, Default)]
pub struct MailSettings {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

/// Read-only runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub secret: SecretString,
    pub mail: MailSettings,
    pub support_email: Option<String>,
    pub cors_origin: Option<String>,
    pub public_url: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(secret: SecretString, public_url: String) -> Self {
        Self {
            secret,
            mail: MailSettings::default(),
            support_email: None,
            cors_origin: None,
            public_url,
        }
    }
}
