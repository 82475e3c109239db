use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("doorman")
        .about("User registration, email verification and token-based authentication")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8000")
                .env("DOORMAN_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("DOORMAN_DSN")
                .required(true),
        )
        .arg(
            Arg::new("secret")
                .short('s')
                .long("secret")
                .help("Access token signing secret, never defaulted")
                .env("DOORMAN_ACCESS_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .help("Public base URL used in verification links, example: https://auth.tld/api")
                .env("DOORMAN_PUBLIC_URL"),
        )
        .arg(
            Arg::new("mail-host")
                .long("mail-host")
                .help("SMTP relay host, omit to log mail instead of sending it")
                .env("DOORMAN_MAIL_HOST"),
        )
        .arg(
            Arg::new("mail-port")
                .long("mail-port")
                .help("SMTP relay port")
                .default_value("587")
                .env("DOORMAN_MAIL_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("mail-user")
                .long("mail-user")
                .help("SMTP username, also used as the From address")
                .env("DOORMAN_MAIL_USER"),
        )
        .arg(
            Arg::new("mail-password")
                .long("mail-password")
                .help("SMTP password")
                .env("DOORMAN_MAIL_PASSWORD"),
        )
        .arg(
            Arg::new("support-email")
                .long("support-email")
                .help("Support contact shown in confirmation mail")
                .env("DOORMAN_SUPPORT_EMAIL"),
        )
        .arg(
            Arg::new("cors-origin")
                .long("cors-origin")
                .help("Allowed cross-origin source, omit to allow any origin")
                .env("DOORMAN_CORS_ORIGIN"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("DOORMAN_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
