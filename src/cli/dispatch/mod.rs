use crate::cli::{
    actions::Action,
    globals::{GlobalArgs, MailSettings},
};
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8000);

    let dsn = matches
        .get_one("dsn")
        .map(|s: &String| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?;

    let secret = matches
        .get_one("secret")
        .map(|s: &String| SecretString::from(s.to_string()))
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --secret"))?;

    let public_url = matches.get_one::<String>("public-url").map_or_else(
        || format!("http://localhost:{port}/api"),
        |url| url.trim_end_matches('/').to_string(),
    );

    let mut globals = GlobalArgs::new(secret, public_url);

    globals.mail = MailSettings {
        host: matches.get_one::<String>("mail-host").cloned(),
        port: matches.get_one::<u16>("mail-port").copied().unwrap_or(587),
        username: matches.get_one::<String>("mail-user").cloned(),
        password: matches
            .get_one::<String>("mail-password")
            .map(|s| SecretString::from(s.to_string())),
    };

    globals.support_email = matches.get_one::<String>("support-email").cloned();
    globals.cors_origin = matches.get_one::<String>("cors-origin").cloned();

    Ok(Action::Server { port, dsn, globals })
}
