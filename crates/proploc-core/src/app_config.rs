use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub geocoder_base_url: String,
    pub pool_detector_base_url: String,
    pub imagery_base_url: String,
    pub imagery_api_key: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub collaborator_timeout_secs: u64,
    pub collaborator_user_agent: String,
    pub collaborator_max_retries: u32,
    pub collaborator_retry_backoff_base_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("geocoder_base_url", &self.geocoder_base_url)
            .field("pool_detector_base_url", &self.pool_detector_base_url)
            .field("imagery_base_url", &self.imagery_base_url)
            .field(
                "imagery_api_key",
                &self.imagery_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("collaborator_timeout_secs", &self.collaborator_timeout_secs)
            .field("collaborator_user_agent", &self.collaborator_user_agent)
            .field("collaborator_max_retries", &self.collaborator_max_retries)
            .field(
                "collaborator_retry_backoff_base_secs",
                &self.collaborator_retry_backoff_base_secs,
            )
            .finish()
    }
}
