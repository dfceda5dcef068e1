//! Settings read from the environment (and `.env`, if present).

use std::{fmt, str::FromStr};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set in the {profile} profile")]
    Missing { name: &'static str, profile: Profile },
    #[error("{name}={value:?} is not valid: {reason}")]
    Invalid { name: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Testing,
    Production,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "default" => Ok(Profile::Development),
            "testing" => Ok(Profile::Testing),
            "production" => Ok(Profile::Production),
            other => Err(format!("unknown profile `{other}`")),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Profile::*;
        f.write_str(match self {
            Development => "development",
            Testing => "testing",
            Production => "production",
        })
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub subject_prefix: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct OAuthKeys {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub profile: Profile,
    pub database_url: String,
    pub bind_address: String,
    pub public_url: String,
    pub admin_email: Option<String>,
    pub mail: MailConfig,
    pub posts_per_page: u32,
    pub followers_per_page: u32,
    pub session_minutes: i64,
    pub google: Option<OAuthKeys>,
    pub github: Option<OAuthKeys>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let profile = parsed(&lookup, "SANSKRITY_CONFIG")?.unwrap_or(Profile::Development);

        let database_url = match (lookup("DATABASE_URL"), profile) {
            (Some(url), _) => url,
            (None, Profile::Development) => "sqlite://sanskrity.db".to_owned(),
            (None, Profile::Testing) => "sqlite::memory:".to_owned(),
            (None, Profile::Production) => {
                return Err(ConfigError::Missing { name: "DATABASE_URL", profile });
            }
        };

        let mail = MailConfig {
            server: lookup("MAIL_SERVER").unwrap_or_else(|| "smtp.googlemail.com".to_owned()),
            port: parsed(&lookup, "MAIL_PORT")?.unwrap_or(587),
            use_tls: flag(&lookup, "MAIL_USE_TLS")?.unwrap_or(true),
            username: lookup("MAIL_USERNAME"),
            password: lookup("MAIL_PASSWORD"),
            subject_prefix: "[SANSKRITY]".to_owned(),
            sender: "SANSKRITY Admin <noreply@sanskrity.local>".to_owned(),
        };

        Ok(Config {
            profile,
            database_url,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            public_url: lookup("PUBLIC_URL").unwrap_or_else(|| "http://localhost:8080".to_owned()),
            admin_email: lookup("SANSKRITY_ADMIN"),
            mail,
            posts_per_page: parsed(&lookup, "POSTS_PER_PAGE")?.unwrap_or(5),
            followers_per_page: parsed(&lookup, "FOLLOWERS_PER_PAGE")?.unwrap_or(50),
            session_minutes: parsed(&lookup, "SESSION_MINUTES")?.unwrap_or(60),
            google: keys(&lookup, "GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github: keys(&lookup, "GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(name)
        .map(|value| {
            value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                name,
                reason: err.to_string(),
                value,
            })
        })
        .transpose()
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<bool>, ConfigError> {
    lookup(name)
        .map(|value| match value.to_lowercase().as_str() {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value,
                reason: "expected true/on/1 or false/off/0".to_owned(),
            }),
        })
        .transpose()
}

fn keys(lookup: &impl Fn(&str) -> Option<String>, id: &str, secret: &str) -> Option<OAuthKeys> {
    Some(OAuthKeys {
        client_id: lookup(id)?,
        client_secret: lookup(secret)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn development_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.database_url, "sqlite://sanskrity.db");
        assert_eq!(config.posts_per_page, 5);
        assert_eq!(config.followers_per_page, 50);
        assert_eq!(config.mail.port, 587);
        assert!(config.mail.use_tls);
        assert!(config.google.is_none());
    }

    #[test]
    fn testing_uses_memory_database() {
        let config = from(&[("SANSKRITY_CONFIG", "testing")]).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn production_requires_database() {
        let err = from(&[("SANSKRITY_CONFIG", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "DATABASE_URL", .. }));

        let config = from(&[("SANSKRITY_CONFIG", "production"), ("DATABASE_URL", "sqlite://prod.db")]).unwrap();
        assert_eq!(config.database_url, "sqlite://prod.db");
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = from(&[("MAIL_PORT", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAIL_PORT", .. }));

        let err = from(&[("MAIL_USE_TLS", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAIL_USE_TLS", .. }));
        assert!(!from(&[("MAIL_USE_TLS", "OFF")]).unwrap().mail.use_tls);
    }

    #[test]
    fn provider_needs_both_keys() {
        assert!(from(&[("GITHUB_CLIENT_ID", "id")]).unwrap().github.is_none());
        let config = from(&[("GITHUB_CLIENT_ID", "id"), ("GITHUB_CLIENT_SECRET", "s")]).unwrap();
        assert_eq!(config.github.unwrap().client_id, "id");
    }
}
