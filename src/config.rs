use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub records: RecordsConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Externally reachable base URL, used to build `/static` links for local storage.
    pub public_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Azure,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// Storage account name (required when backend is azure)
    pub azure_account: Option<String>,
    /// Overrides `https://{account}.blob.core.windows.net`
    pub azure_endpoint: Option<String>,
    pub azure_container: String,
    pub azure_sas_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordsBackend {
    Embedded,
    Remote,
}

#[derive(Debug, Clone)]
pub struct RecordsConfig {
    pub backend: RecordsBackend,
    /// Record API base URL (required when backend is remote)
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Every request is treated as the configured dev user.
    Dev,
    Http,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: SessionMode,
    /// Session endpoint queried with the caller's cookies
    pub url: String,
    pub dev_user_id: String,
    pub dev_user_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            azure_account: None,
            azure_endpoint: None,
            azure_container: "files".to_string(),
            azure_sas_token: None,
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: RecordsBackend::Embedded,
            api_url: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Http,
            url: "http://localhost:4280/.auth/me".to_string(),
            dev_user_id: "dev-user".to_string(),
            dev_user_name: "Developer".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "azure" => StorageBackend::Azure,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let records_backend = match std::env::var("RECORDS_BACKEND")
            .unwrap_or_else(|_| "embedded".to_string())
            .to_lowercase()
            .as_str()
        {
            "remote" => RecordsBackend::Remote,
            _ => RecordsBackend::Embedded,
        };

        let session_mode = match std::env::var("SESSION_MODE")
            .unwrap_or_else(|_| "http".to_string())
            .to_lowercase()
            .as_str()
        {
            "dev" => SessionMode::Dev,
            _ => SessionMode::Http,
        };
        let session_defaults = SessionConfig::default();

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
                public_base_url,
            },
            records: RecordsConfig {
                backend: records_backend,
                api_url: std::env::var("RECORDS_API_URL").ok(),
            },
            session: SessionConfig {
                mode: session_mode,
                url: std::env::var("SESSION_URL").unwrap_or(session_defaults.url),
                dev_user_id: std::env::var("DEV_USER_ID").unwrap_or(session_defaults.dev_user_id),
                dev_user_name: std::env::var("DEV_USER_NAME")
                    .unwrap_or(session_defaults.dev_user_name),
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                azure_account: std::env::var("AZURE_STORAGE_ACCOUNT").ok(),
                azure_endpoint: std::env::var("AZURE_STORAGE_ENDPOINT").ok(),
                azure_container: std::env::var("AZURE_STORAGE_CONTAINER")
                    .unwrap_or_else(|_| "files".to_string()),
                azure_sas_token: std::env::var("AZURE_STORAGE_SAS_TOKEN").ok(),
            },
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Azure {
            if self.storage.azure_account.is_none() && self.storage.azure_endpoint.is_none() {
                return Err(ConfigError::ValidationError(
                    "AZURE_STORAGE_ACCOUNT is required when STORAGE_BACKEND=azure".to_string(),
                ));
            }
            if self.storage.azure_container.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "AZURE_STORAGE_CONTAINER cannot be empty".to_string(),
                ));
            }
            if self.storage.azure_sas_token.is_none() {
                tracing::warn!("AZURE_STORAGE_SAS_TOKEN not set; requests will be unauthenticated");
            }
        }

        if self.records.backend == RecordsBackend::Remote && self.records.api_url.is_none() {
            return Err(ConfigError::ValidationError(
                "RECORDS_API_URL is required when RECORDS_BACKEND=remote".to_string(),
            ));
        }

        if self.session.mode == SessionMode::Dev {
            if self.session.dev_user_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "DEV_USER_ID cannot be empty".to_string(),
                ));
            }
            tracing::warn!(
                user_id = %self.session.dev_user_id,
                "Dev session mode: every request is authenticated as the dev user"
            );
        }

        Ok(())
    }

    /// Endpoint for the Azure backend, preferring an explicit override.
    pub fn azure_endpoint(&self) -> Option<String> {
        self.storage.azure_endpoint.clone().or_else(|| {
            self.storage
                .azure_account
                .as_deref()
                .map(crate::object_store::AzureBlobStore::account_endpoint)
        })
    }
}
