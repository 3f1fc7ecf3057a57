use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment, RetentionPolicy};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation are decoupled from the process environment so tests
/// can drive them with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let text_classifier_url = require("CLOUTCHECK_TEXT_CLASSIFIER_URL")?;
    let image_classifier_url = require("CLOUTCHECK_IMAGE_CLASSIFIER_URL")?;
    let transcriber_url = require("CLOUTCHECK_TRANSCRIBER_URL")?;

    let env = parse_environment(&or_default("CLOUTCHECK_ENV", "development"))?;
    let log_level = or_default("CLOUTCHECK_LOG_LEVEL", "info");

    let media_dir = PathBuf::from(or_default("CLOUTCHECK_MEDIA_DIR", "./data/media"));
    let results_dir = PathBuf::from(or_default("CLOUTCHECK_RESULTS_DIR", "./results"));
    let brands_dir = PathBuf::from(or_default("CLOUTCHECK_BRANDS_DIR", "./brands"));
    let scoring_config_path = lookup("CLOUTCHECK_SCORING_PATH").ok().map(PathBuf::from);

    let raw_policy = or_default("CLOUTCHECK_RETENTION_POLICY", "immediate");
    let retention_policy = RetentionPolicy::parse(&raw_policy).ok_or_else(|| {
        invalid(
            "CLOUTCHECK_RETENTION_POLICY",
            format!("unknown policy '{raw_policy}'; expected immediate, end_of_batch or none"),
        )
    })?;

    let disk_ceiling_mb = parse_u64("CLOUTCHECK_DISK_CEILING_MB", "2048")?;
    if disk_ceiling_mb == 0 {
        return Err(invalid(
            "CLOUTCHECK_DISK_CEILING_MB",
            "must be greater than zero".to_string(),
        ));
    }
    let budget_wait_secs = parse_u64("CLOUTCHECK_BUDGET_WAIT_SECS", "30")?;
    let max_concurrent_posts = parse_usize("CLOUTCHECK_MAX_CONCURRENT_POSTS", "1")?;
    let modality_timeout_secs = parse_u64("CLOUTCHECK_MODALITY_TIMEOUT_SECS", "120")?;
    let video_max_frames = parse_usize("CLOUTCHECK_VIDEO_MAX_FRAMES", "16")?;
    let video_fps_sample = parse_u32("CLOUTCHECK_VIDEO_FPS_SAMPLE", "1")?;

    let raw_threshold = or_default("CLOUTCHECK_NSFW_THRESHOLD", "0.7");
    let nsfw_threshold = raw_threshold
        .parse::<f64>()
        .map_err(|e| invalid("CLOUTCHECK_NSFW_THRESHOLD", e.to_string()))?;
    if !(0.0..=1.0).contains(&nsfw_threshold) {
        return Err(invalid(
            "CLOUTCHECK_NSFW_THRESHOLD",
            format!("{nsfw_threshold} is outside [0, 1]"),
        ));
    }

    let classifier_api_key = lookup("CLOUTCHECK_CLASSIFIER_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());

    let fetch_timeout_secs = parse_u64("CLOUTCHECK_FETCH_TIMEOUT_SECS", "30")?;
    let fetch_user_agent = or_default("CLOUTCHECK_FETCH_USER_AGENT", "cloutcheck/0.1 (media-fetch)");
    let fetch_max_retries = parse_u32("CLOUTCHECK_FETCH_MAX_RETRIES", "3")?;
    let fetch_retry_backoff_base_ms = parse_u64("CLOUTCHECK_FETCH_RETRY_BACKOFF_BASE_MS", "500")?;
    let ffmpeg_path = or_default("CLOUTCHECK_FFMPEG_PATH", "ffmpeg");

    Ok(AppConfig {
        env,
        log_level,
        media_dir,
        results_dir,
        brands_dir,
        scoring_config_path,
        retention_policy,
        disk_ceiling_mb,
        budget_wait_secs,
        max_concurrent_posts,
        modality_timeout_secs,
        video_max_frames,
        video_fps_sample,
        nsfw_threshold,
        text_classifier_url,
        image_classifier_url,
        transcriber_url,
        classifier_api_key,
        fetch_timeout_secs,
        fetch_user_agent,
        fetch_max_retries,
        fetch_retry_backoff_base_ms,
        ffmpeg_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CLOUTCHECK_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
