use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_mismatch_policy, parse_positive_i64, parse_u16, parse_u32, parse_u64,
};
use super::types::{
    AiSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExtractionSettings,
    LearningSummarySettings, RateLimitSettings, RedisSettings, ReportSettings, RuntimeSettings,
    SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("PLAYPACK_HOST", "0.0.0.0");
        let port = env_or_default("PLAYPACK_PORT", "8000");

        let environment =
            parse_environment(env_optional("PLAYPACK_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("PLAYPACK_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "PlayPack Reports API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let jwt_secret = env_or_default("SUPABASE_JWT_SECRET", "");
        let jwt_audience = env_or_default("JWT_AUDIENCE", "authenticated");
        let algorithm = env_or_default("JWT_ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "playpack");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "playpack_db");
        let database_url = env_optional("DATABASE_URL");
        let db_max_connections =
            parse_u32("DB_MAX_CONNECTIONS", env_or_default("DB_MAX_CONNECTIONS", "10"))?;
        let db_acquire_timeout_seconds =
            parse_u64("DB_ACQUIRE_TIMEOUT", env_or_default("DB_ACQUIRE_TIMEOUT", "30"))?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let openai_api_key = env_or_default("OPENAI_API_KEY", "");
        let openai_base_url = env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1");
        let vision_model = env_or_default("AI_VISION_MODEL", "gpt-5-nano");
        let text_model = env_or_default("AI_TEXT_MODEL", "gpt-5-nano");
        let extract_max_tokens =
            parse_u32("AI_EXTRACT_MAX_TOKENS", env_or_default("AI_EXTRACT_MAX_TOKENS", "10000"))?;
        let report_max_tokens =
            parse_u32("AI_REPORT_MAX_TOKENS", env_or_default("AI_REPORT_MAX_TOKENS", "4000"))?;
        let batch_tokens_per_student = parse_u32(
            "AI_BATCH_TOKENS_PER_STUDENT",
            env_or_default("AI_BATCH_TOKENS_PER_STUDENT", "2000"),
        )?;
        let summary_max_tokens =
            parse_u32("AI_SUMMARY_MAX_TOKENS", env_or_default("AI_SUMMARY_MAX_TOKENS", "2000"))?;
        let request_timeout_seconds =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "300"))?;
        let connect_timeout_seconds =
            parse_u64("AI_CONNECT_TIMEOUT", env_or_default("AI_CONNECT_TIMEOUT", "30"))?;

        let max_image_size_mb =
            parse_u64("MAX_IMAGE_SIZE_MB", env_or_default("MAX_IMAGE_SIZE_MB", "10"))?;

        let max_batch_students =
            parse_u64("MAX_BATCH_STUDENTS", env_or_default("MAX_BATCH_STUDENTS", "40"))? as usize;
        let mismatch_policy = parse_mismatch_policy(env_optional("BATCH_MISMATCH_POLICY"))?;

        let summary_batch_size = parse_positive_i64(
            "LEARNING_SUMMARY_BATCH_SIZE",
            env_or_default("LEARNING_SUMMARY_BATCH_SIZE", "10"),
        )?;
        let summary_interval_seconds = parse_u64(
            "LEARNING_SUMMARY_INTERVAL_SECONDS",
            env_or_default("LEARNING_SUMMARY_INTERVAL_SECONDS", "600"),
        )?;
        let summary_stale_minutes = parse_positive_i64(
            "LEARNING_SUMMARY_STALE_MINUTES",
            env_or_default("LEARNING_SUMMARY_STALE_MINUTES", "30"),
        )?;

        let ai_requests_per_minute = parse_u64(
            "AI_RATE_LIMIT_PER_MINUTE",
            env_or_default("AI_RATE_LIMIT_PER_MINUTE", "30"),
        )?;

        let log_level = env_or_default("PLAYPACK_LOG_LEVEL", "info");
        let json = env_optional("PLAYPACK_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { jwt_secret, jwt_audience, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections: db_max_connections.max(1),
                acquire_timeout_seconds: db_acquire_timeout_seconds,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                openai_api_key,
                openai_base_url,
                vision_model,
                text_model,
                extract_max_tokens,
                report_max_tokens,
                batch_tokens_per_student,
                summary_max_tokens,
                request_timeout_seconds,
                connect_timeout_seconds,
            },
            extraction: ExtractionSettings { max_image_size_mb },
            reports: ReportSettings { max_batch_students, mismatch_policy },
            learning_summary: LearningSummarySettings {
                batch_size: summary_batch_size,
                interval_seconds: summary_interval_seconds,
                stale_minutes: summary_stale_minutes,
            },
            rate_limit: RateLimitSettings { ai_requests_per_minute },
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

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn extraction(&self) -> &ExtractionSettings {
        &self.extraction
    }

    pub(crate) fn reports(&self) -> &ReportSettings {
        &self.reports
    }

    pub(crate) fn learning_summary(&self) -> &LearningSummarySettings {
        &self.learning_summary
    }

    pub(crate) fn rate_limit(&self) -> &RateLimitSettings {
        &self.rate_limit
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.max_image_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_IMAGE_SIZE_MB",
                value: "0".to_string(),
            });
        }

        if self.reports.max_batch_students == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_BATCH_STUDENTS",
                value: "0".to_string(),
            });
        }

        if self.ai.batch_tokens_per_student == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_BATCH_TOKENS_PER_STUDENT",
                value: "0".to_string(),
            });
        }

        if self.learning_summary.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "LEARNING_SUMMARY_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.security.algorithm != "HS256" {
            return Err(ConfigError::InvalidValue {
                field: "JWT_ALGORITHM",
                value: self.security.algorithm.clone(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.ai.openai_api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingSecret("SUPABASE_JWT_SECRET"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use crate::core::config::{BatchMismatchPolicy, ConfigError};
    use crate::test_support;

    #[tokio::test]
    async fn load_applies_defaults() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.extraction().max_image_bytes(), 10 * 1024 * 1024);
        assert_eq!(settings.learning_summary().batch_size, 10);
        assert_eq!(settings.reports().mismatch_policy, BatchMismatchPolicy::FallbackToSingle);
        assert_eq!(settings.api().api_v1_str, "/api/v1");
        assert_eq!(settings.database().max_connections, 10);
        assert_eq!(settings.ai().connect_timeout_seconds, 30);
    }

    #[tokio::test]
    async fn connect_timeout_is_configurable() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("AI_CONNECT_TIMEOUT", "5");

        let result = Settings::load();
        std::env::remove_var("AI_CONNECT_TIMEOUT");

        assert_eq!(result.expect("settings").ai().connect_timeout_seconds, 5);
    }

    #[tokio::test]
    async fn strict_config_requires_openai_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("PLAYPACK_STRICT_CONFIG", "1");
        std::env::remove_var("OPENAI_API_KEY");

        let result = Settings::load();
        std::env::set_var("PLAYPACK_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("OPENAI_API_KEY"))));
    }

    #[tokio::test]
    async fn invalid_batch_size_is_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("LEARNING_SUMMARY_BATCH_SIZE", "zero");

        let result = Settings::load();
        std::env::remove_var("LEARNING_SUMMARY_BATCH_SIZE");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "LEARNING_SUMMARY_BATCH_SIZE", .. })
        ));
    }
}
