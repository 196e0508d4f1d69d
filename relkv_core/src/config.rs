use serde::{Deserialize, Serialize};

/// Connection parameters for the backing engine. Defaults match a local
/// stock Postgres; only the namespace has no default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub user: String,
    pub password: String,
}

impl StoreConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            namespace: namespace.into(),
            user: "postgres".to_string(),
            password: String::new(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }
}
