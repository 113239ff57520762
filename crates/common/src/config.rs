use serde::Deserialize;

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (default, port 587)
    StartTls,
    /// Implicit TLS from the first byte (port 465)
    Tls,
    /// Unencrypted, for local relays and test servers
    None,
}

impl SmtpTls {
    /// Port used when `SMTP_PORT` is unset.
    pub fn default_port(self) -> u16 {
        match self {
            SmtpTls::StartTls => 587,
            SmtpTls::Tls => 465,
            SmtpTls::None => 25,
        }
    }
}

impl std::str::FromStr for SmtpTls {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "tls" => Ok(SmtpTls::Tls),
            "none" => Ok(SmtpTls::None),
            other => Err(anyhow::anyhow!(
                "SMTP_TLS must be one of starttls, tls, none (got '{}')",
                other
            )),
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string (message ledger)
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// HTTP listen port (default: 3000)
    pub port: u16,

    /// Identity provider base URL
    pub uaa_url: String,

    /// Client credentials used to obtain an access token
    pub uaa_client_id: String,
    pub uaa_client_secret: String,

    /// Platform API base URL used for space/organization membership
    pub cc_url: String,

    /// SMTP relay host
    pub smtp_host: String,

    /// SMTP relay port (default: 587 for starttls, 465 for tls, 25 for none)
    pub smtp_port: u16,

    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,

    /// Connection security (default: starttls)
    pub smtp_tls: SmtpTls,

    /// From address on every outgoing message
    pub sender: String,

    /// Number of concurrent delivery workers (default: 10)
    pub worker_count: usize,

    /// Maximum number of jobs buffered in the delivery queue (default: 1000)
    pub queue_capacity: usize,

    /// How long an enqueue may wait on a full queue before giving up (default: 5000)
    pub queue_enqueue_timeout_ms: u64,

    /// Default template used when a client has no override
    pub default_subject: String,
    pub default_text: String,
    pub default_html: String,
}

pub const DEFAULT_SUBJECT_TEMPLATE: &str = "CF Notification: {{.Subject}}";
pub const DEFAULT_TEXT_TEMPLATE: &str = "{{.Text}}\n\n{{.Endorsement}}";
pub const DEFAULT_HTML_TEMPLATE: &str = "<p>{{.Endorsement}}</p>{{.HTML}}";

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let smtp_tls: SmtpTls = std::env::var("SMTP_TLS")
            .unwrap_or_else(|_| "starttls".to_string())
            .parse()?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid u16"))?,
            uaa_url: required("UAA_URL")?,
            uaa_client_id: required("UAA_CLIENT_ID")?,
            uaa_client_secret: required("UAA_CLIENT_SECRET")?,
            cc_url: required("CC_URL")?,
            smtp_host: required("SMTP_HOST")?,
            smtp_port: match std::env::var("SMTP_PORT") {
                Ok(port) => port
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SMTP_PORT must be a valid u16"))?,
                Err(_) => smtp_tls.default_port(),
            },
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            smtp_tls,
            sender: required("SENDER")?,
            worker_count: std::env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_COUNT must be a valid usize"))?,
            queue_capacity: std::env::var("QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_CAPACITY must be a valid usize"))?,
            queue_enqueue_timeout_ms: std::env::var("QUEUE_ENQUEUE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("QUEUE_ENQUEUE_TIMEOUT_MS must be a valid u64"))?,
            default_subject: std::env::var("DEFAULT_SUBJECT")
                .unwrap_or_else(|_| DEFAULT_SUBJECT_TEMPLATE.to_string()),
            default_text: std::env::var("DEFAULT_TEXT")
                .unwrap_or_else(|_| DEFAULT_TEXT_TEMPLATE.to_string()),
            default_html: std::env::var("DEFAULT_HTML")
                .unwrap_or_else(|_| DEFAULT_HTML_TEMPLATE.to_string()),
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_tls_parse() {
        assert_eq!("starttls".parse::<SmtpTls>().unwrap(), SmtpTls::StartTls);
        assert_eq!("TLS".parse::<SmtpTls>().unwrap(), SmtpTls::Tls);
        assert_eq!("none".parse::<SmtpTls>().unwrap(), SmtpTls::None);
    }

    #[test]
    fn test_smtp_port_follows_tls_mode() {
        assert_eq!(SmtpTls::StartTls.default_port(), 587);
        assert_eq!(SmtpTls::Tls.default_port(), 465);
        assert_eq!(SmtpTls::None.default_port(), 25);
    }

    #[test]
    fn test_smtp_tls_rejects_unknown() {
        assert!("ssl3".parse::<SmtpTls>().is_err());
    }
}
