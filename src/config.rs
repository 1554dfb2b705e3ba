use std::env;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Medibook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,medibook=debug".to_string()
}

/// Runtime configuration, read once from the environment at startup.
///
/// Every knob has a default so the server boots with nothing set; external
/// collaborators (payment gateway, notification channels) stay disabled
/// until their endpoints are configured.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,

    /// Admin panel credentials.
    pub admin_email: String,
    pub admin_password: String,

    /// ISO currency code used for payment orders.
    pub currency: String,
    /// Phone OTP validity window in minutes.
    pub otp_expiry_minutes: i64,

    /// Razorpay-style order API. `None` disables online payment.
    pub payment_api_url: Option<String>,
    pub payment_key_id: String,
    pub payment_key_secret: String,

    /// Stripe-style hosted checkout API. `None` disables checkout sessions.
    pub checkout_api_url: Option<String>,
    pub checkout_secret: String,

    /// Transactional email API. `None` logs messages instead of sending.
    pub email_api_url: Option<String>,
    pub email_api_key: String,
    pub email_from: String,

    /// WhatsApp messaging API. `None` logs messages instead of sending.
    pub whatsapp_api_url: Option<String>,
    pub whatsapp_account: String,
    pub whatsapp_token: String,
    pub whatsapp_from: String,

    /// Sliding-window rate limits per caller.
    pub rate_per_minute: u32,
    pub rate_per_hour: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("MEDIBOOK_PORT", 4000),
            data_dir: env::var("MEDIBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
            admin_email: env_or("ADMIN_EMAIL", "admin@medibook.local"),
            admin_password: env_or("ADMIN_PASSWORD", ""),
            currency: env_or("CURRENCY", "INR"),
            otp_expiry_minutes: env_parse("OTP_EXPIRY_MINUTES", 5),
            payment_api_url: env::var("PAYMENT_API_URL").ok(),
            payment_key_id: env_or("PAYMENT_KEY_ID", ""),
            payment_key_secret: env_or("PAYMENT_KEY_SECRET", ""),
            checkout_api_url: env::var("CHECKOUT_API_URL").ok(),
            checkout_secret: env_or("CHECKOUT_SECRET", ""),
            email_api_url: env::var("EMAIL_API_URL").ok(),
            email_api_key: env_or("EMAIL_API_KEY", ""),
            email_from: env_or("EMAIL_FROM", "no-reply@medibook.local"),
            whatsapp_api_url: env::var("WHATSAPP_API_URL").ok(),
            whatsapp_account: env_or("WHATSAPP_ACCOUNT", ""),
            whatsapp_token: env_or("WHATSAPP_TOKEN", ""),
            whatsapp_from: env_or("WHATSAPP_FROM", ""),
            rate_per_minute: env_parse("RATE_PER_MINUTE", 100),
            rate_per_hour: env_parse("RATE_PER_HOUR", 1000),
        }
    }

    /// A config suitable for tests: temp-style paths, collaborators disabled.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            port: 0,
            data_dir,
            admin_email: "admin@test.local".into(),
            admin_password: "admin-secret-123".into(),
            currency: "INR".into(),
            otp_expiry_minutes: 5,
            payment_api_url: None,
            payment_key_id: String::new(),
            payment_key_secret: String::new(),
            checkout_api_url: None,
            checkout_secret: String::new(),
            email_api_url: None,
            email_api_key: String::new(),
            email_from: "no-reply@test.local".into(),
            whatsapp_api_url: None,
            whatsapp_account: String::new(),
            whatsapp_token: String::new(),
            whatsapp_from: String::new(),
            rate_per_minute: 10_000,
            rate_per_hour: 100_000,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("medibook.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Default data directory: ~/medibook/
fn default_data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join("medibook")
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_boot_without_env() {
        let config = Config::from_env();
        assert!(config.port > 0);
        assert!(!config.currency.is_empty());
    }

    #[test]
    fn db_path_under_data_dir() {
        let config = Config::for_tests(PathBuf::from("/tmp/mb-test"));
        assert!(config.db_path().starts_with(&config.data_dir));
        assert!(config.uploads_dir().starts_with(&config.data_dir));
    }

    #[test]
    fn test_config_disables_collaborators() {
        let config = Config::for_tests(PathBuf::from("/tmp/mb-test"));
        assert!(config.payment_api_url.is_none());
        assert!(config.email_api_url.is_none());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
