use std::time::Duration;

use super::parsing::{
    env_optional, env_or_default, normalize_app_root, parse_bool, parse_cors_origins,
    parse_environment, parse_store_backend, parse_u64,
};
use super::types::{
    ApiSettings, AuthSettings, ConfigError, CorsSettings, DriveSettings, RuntimeSettings,
    S3Settings, ServerHost, ServerPort, ServerSettings, Settings, StoreBackendKind,
    StoreSettings, TelemetrySettings,
};

/// One year.
const MAX_SESSION_TTL_HOURS: u64 = 24 * 366;
const MAX_LOGIN_CODE_TTL_MINUTES: u64 = 24 * 60;
const MAX_CACHE_MB: u64 = 64 * 1024;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("HOMEWORK_HOST", "0.0.0.0");
        let port = env_or_default("HOMEWORK_PORT", "8000");

        let environment = parse_environment(
            env_optional("HOMEWORK_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_optional("HOMEWORK_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Homework Store");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let backend = parse_store_backend(env_or_default("STORE_BACKEND", "drive"))?;
        let app_root = normalize_app_root(env_or_default("STORE_APP_ROOT", "homework-app"))?;
        let request_timeout_seconds = parse_u64(
            "STORE_REQUEST_TIMEOUT_SECONDS",
            env_or_default("STORE_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;
        let cache_short_ttl_seconds = parse_u64(
            "STORE_CACHE_SHORT_TTL_SECONDS",
            env_or_default("STORE_CACHE_SHORT_TTL_SECONDS", "15"),
        )?;
        let cache_long_ttl_seconds = parse_u64(
            "STORE_CACHE_LONG_TTL_SECONDS",
            env_or_default("STORE_CACHE_LONG_TTL_SECONDS", "300"),
        )?;

        let cache_max_mb =
            parse_u64("STORE_CACHE_MAX_MB", env_or_default("STORE_CACHE_MAX_MB", "64"))?;

        let drive_base_url = env_or_default("DRIVE_BASE_URL", "https://graph.microsoft.com/v1.0/me/drive");
        let drive_token_url = env_or_default("DRIVE_TOKEN_URL", "");
        let drive_client_id = env_or_default("DRIVE_CLIENT_ID", "");
        let drive_client_secret = env_or_default("DRIVE_CLIENT_SECRET", "");
        let drive_scope = env_or_default("DRIVE_SCOPE", "https://graph.microsoft.com/.default");
        let token_refresh_margin_seconds = parse_u64(
            "DRIVE_TOKEN_REFRESH_MARGIN_SECONDS",
            env_or_default("DRIVE_TOKEN_REFRESH_MARGIN_SECONDS", "300"),
        )?;

        let s3_endpoint = env_or_default("S3_ENDPOINT", "");
        let s3_access_key = env_or_default("S3_ACCESS_KEY", "");
        let s3_secret_key = env_or_default("S3_SECRET_KEY", "");
        let s3_bucket = env_or_default("S3_BUCKET", "homework-store");
        let s3_region = env_or_default("S3_REGION", "us-east-1");

        let session_ttl_hours =
            parse_u64("SESSION_TTL_HOURS", env_or_default("SESSION_TTL_HOURS", "168"))?;
        let login_code_ttl_minutes =
            parse_u64("LOGIN_CODE_TTL_MINUTES", env_or_default("LOGIN_CODE_TTL_MINUTES", "10"))?;

        let log_level = env_or_default("HOMEWORK_LOG_LEVEL", "info");
        let json = env_optional("HOMEWORK_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            store: StoreSettings {
                backend,
                app_root,
                request_timeout_seconds,
                cache_short_ttl_seconds,
                cache_long_ttl_seconds,
                cache_max_mb,
            },
            drive: DriveSettings {
                base_url: drive_base_url.trim_end_matches('/').to_string(),
                token_url: drive_token_url,
                client_id: drive_client_id,
                client_secret: drive_client_secret,
                scope: drive_scope,
                token_refresh_margin_seconds,
            },
            s3: S3Settings {
                endpoint: s3_endpoint,
                access_key: s3_access_key,
                secret_key: s3_secret_key,
                bucket: s3_bucket,
                region: s3_region,
            },
            auth: AuthSettings { session_ttl_hours, login_code_ttl_minutes },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn store(&self) -> &StoreSettings {
        &self.store
    }

    pub(crate) fn drive(&self) -> &DriveSettings {
        &self.drive
    }

    pub(crate) fn s3(&self) -> &S3Settings {
        &self.s3
    }

    pub(crate) fn auth(&self) -> &AuthSettings {
        &self.auth
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "STORE_REQUEST_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.store.cache_short_ttl_seconds > self.store.cache_long_ttl_seconds {
            return Err(ConfigError::InvalidValue {
                field: "STORE_CACHE_SHORT_TTL_SECONDS",
                value: self.store.cache_short_ttl_seconds.to_string(),
            });
        }

        if self.store.cache_max_mb > MAX_CACHE_MB {
            return Err(ConfigError::InvalidValue {
                field: "STORE_CACHE_MAX_MB",
                value: self.store.cache_max_mb.to_string(),
            });
        }

        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.auth.session_ttl_hours) {
            return Err(ConfigError::InvalidValue {
                field: "SESSION_TTL_HOURS",
                value: self.auth.session_ttl_hours.to_string(),
            });
        }

        if !(1..=MAX_LOGIN_CODE_TTL_MINUTES).contains(&self.auth.login_code_ttl_minutes) {
            return Err(ConfigError::InvalidValue {
                field: "LOGIN_CODE_TTL_MINUTES",
                value: self.auth.login_code_ttl_minutes.to_string(),
            });
        }

        if self.runtime.environment.is_production() && self.store.backend == StoreBackendKind::Memory
        {
            return Err(ConfigError::InvalidValue {
                field: "STORE_BACKEND",
                value: StoreBackendKind::Memory.as_str().to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        match self.store.backend {
            StoreBackendKind::Drive => {
                if self.drive.token_url.is_empty() {
                    return Err(ConfigError::MissingSecret("DRIVE_TOKEN_URL"));
                }
                if self.drive.client_id.is_empty() || self.drive.client_secret.is_empty() {
                    return Err(ConfigError::MissingSecret("DRIVE_CLIENT_ID/DRIVE_CLIENT_SECRET"));
                }
            }
            StoreBackendKind::S3 => {
                if self.s3.access_key.is_empty() || self.s3.secret_key.is_empty() {
                    return Err(ConfigError::MissingSecret("S3_ACCESS_KEY/S3_SECRET_KEY"));
                }
            }
            StoreBackendKind::Memory => {}
        }

        Ok(())
    }
}

impl StoreSettings {
    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub(crate) fn cache_max_bytes(&self) -> usize {
        usize::try_from(self.cache_max_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

impl AuthSettings {
    pub(crate) fn session_ttl(&self) -> time::Duration {
        time::Duration::hours(self.session_ttl_hours as i64)
    }

    pub(crate) fn login_code_ttl(&self) -> time::Duration {
        time::Duration::minutes(self.login_code_ttl_minutes as i64)
    }
}
