use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::routes::Destinations;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
    pub session_file: PathBuf,
    // Post-login / teardown navigation targets
    pub admin_dashboard_path: String,
    pub home_path: String,
    pub account_locked_path: String,
    pub login_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            api_base_url: required("API_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            session_file: env::var("SESSION_FILE")
                .unwrap_or_else(|_| ".hotel-session.json".into())
                .into(),
            admin_dashboard_path: env::var("ADMIN_DASHBOARD_PATH")
                .unwrap_or_else(|_| "/admin/dashboard".into()),
            home_path: env::var("HOME_PATH").unwrap_or_else(|_| "/".into()),
            account_locked_path: env::var("ACCOUNT_LOCKED_PATH")
                .unwrap_or_else(|_| "/account-locked".into()),
            login_path: env::var("LOGIN_PATH").unwrap_or_else(|_| "/login".into()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn destinations(&self) -> Destinations {
        Destinations {
            admin_dashboard: self.admin_dashboard_path.clone(),
            home: self.home_path.clone(),
            account_locked: self.account_locked_path.clone(),
            login: self.login_path.clone(),
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
}
