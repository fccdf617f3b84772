use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) cors: CorsSettings,
    pub(super) store: StoreSettings,
    pub(super) drive: DriveSettings,
    pub(super) s3: S3Settings,
    pub(super) auth: AuthSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(super) host: ServerHost,
    pub(super) port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoreSettings {
    pub(crate) backend: StoreBackendKind,
    pub(crate) app_root: String,
    pub(crate) request_timeout_seconds: u64,
    pub(crate) cache_short_ttl_seconds: u64,
    pub(crate) cache_long_ttl_seconds: u64,
    pub(crate) cache_max_mb: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct DriveSettings {
    pub(crate) base_url: String,
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) scope: String,
    pub(crate) token_refresh_margin_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct S3Settings {
    pub(crate) endpoint: String,
    pub(crate) access_key: String,
    pub(crate) secret_key: String,
    pub(crate) bucket: String,
    pub(crate) region: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AuthSettings {
    pub(crate) session_ttl_hours: u64,
    pub(crate) login_code_ttl_minutes: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(crate) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Environments where login codes may be echoed back to the caller.
    pub(crate) fn echoes_login_codes(self) -> bool {
        matches!(self, Self::Development | Self::Test)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StoreBackendKind {
    Drive,
    S3,
    Memory,
}

impl StoreBackendKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::S3 => "s3",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(pub(super) String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(pub(super) u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl ServerHost {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl ServerPort {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        match value.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(Self(port)),
            _ => Err(ConfigError::InvalidPort(value)),
        }
    }
}
