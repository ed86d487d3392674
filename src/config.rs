//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Bot configuration.
///
/// The admin whitelist is explicit constructor state, never a process-wide
/// global, so tests can run with arbitrary whitelists.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot name for identification.
    pub name: String,
    /// Phone numbers allowed to issue admin commands (exact match).
    pub admin_numbers: Vec<String>,
    /// Members at or below this count get the founding-free tier override.
    pub founding_member_limit: u64,
    /// Upper bound on a single FAQ assist call.
    pub faq_timeout: Duration,
    /// Maximum in-flight sends during a broadcast fan-out.
    pub broadcast_concurrency: usize,
    /// How many rows admin list commands return.
    pub admin_list_limit: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "coopbot".to_string(),
            admin_numbers: Vec::new(),
            founding_member_limit: 20,
            faq_timeout: Duration::from_secs(5),
            broadcast_concurrency: 4,
            admin_list_limit: 10,
        }
    }
}

impl BotConfig {
    /// Build configuration from environment variables. Unset variables
    /// fall back to defaults (the admin whitelist to empty — no admins);
    /// set-but-unparseable values are an error, not a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let admin_numbers: Vec<String> = std::env::var("COOPBOT_ADMIN_NUMBERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let founding_member_limit = parse_env("COOPBOT_FOUNDING_LIMIT")?.unwrap_or(20);
        let faq_timeout_secs: u64 = parse_env("COOPBOT_FAQ_TIMEOUT_SECS")?.unwrap_or(5);
        let broadcast_concurrency = parse_env("COOPBOT_BROADCAST_CONCURRENCY")?.unwrap_or(4);

        Ok(Self {
            admin_numbers,
            founding_member_limit,
            faq_timeout: Duration::from_secs(faq_timeout_secs),
            broadcast_concurrency,
            ..Self::default()
        })
    }

    /// Exact-match admin check. Never a prefix match.
    pub fn is_admin(&self, phone: &str) -> bool {
        self.admin_numbers.iter().any(|n| n == phone)
    }
}

/// Read an environment variable that must exist.
pub fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an optional environment variable, erroring on garbage values.
fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("could not parse {raw:?}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_is_exact_match() {
        let config = BotConfig {
            admin_numbers: vec!["+2348000000001".into()],
            ..BotConfig::default()
        };
        assert!(config.is_admin("+2348000000001"));
        assert!(!config.is_admin("+2348000000001x"));
        assert!(!config.is_admin("+234800000000"));
        assert!(!config.is_admin(""));
    }

    #[test]
    fn defaults() {
        let config = BotConfig::default();
        assert_eq!(config.founding_member_limit, 20);
        assert_eq!(config.faq_timeout, Duration::from_secs(5));
        assert_eq!(config.broadcast_concurrency, 4);
        assert!(config.admin_numbers.is_empty());
    }

    #[test]
    fn parse_env_accepts_valid_and_rejects_garbage() {
        // Var name unique to this test so parallel tests can't race it
        unsafe { std::env::set_var("COOPBOT_PARSE_ENV_TEST", "12") };
        assert_eq!(parse_env::<u64>("COOPBOT_PARSE_ENV_TEST").unwrap(), Some(12));

        unsafe { std::env::set_var("COOPBOT_PARSE_ENV_TEST", "not-a-number") };
        assert!(matches!(
            parse_env::<u64>("COOPBOT_PARSE_ENV_TEST"),
            Err(ConfigError::InvalidValue { .. })
        ));

        unsafe { std::env::remove_var("COOPBOT_PARSE_ENV_TEST") };
        assert_eq!(parse_env::<u64>("COOPBOT_PARSE_ENV_TEST").unwrap(), None);
    }

    #[test]
    fn require_env_reports_the_missing_key() {
        let err = require_env("COOPBOT_REQUIRE_ENV_TEST_UNSET").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key)
            if key == "COOPBOT_REQUIRE_ENV_TEST_UNSET"));
    }
}
