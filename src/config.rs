use anyhow::{Context, Result, anyhow};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::api::{ApiKey, DEFAULT_API_BASE_URL};
use crate::preprocess::RowErrorPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "trending.env";
pub const DEFAULT_REGION: &str = "US";
pub const DEFAULT_MAX_RESULTS: usize = 200;
pub const DEFAULT_DATA_PATH: &str = "trending_videos.csv";
pub const DEFAULT_STATS_PATH: &str = "trending_stats.csv";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const API_KEY_ENV_VAR: &str = "YOUTUBE_API_KEY";

/// Values read from a `KEY=value` env file. Everything is optional.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub regions: Option<Vec<String>>,
    pub max_results: Option<usize>,
    pub category_region: Option<String>,
    pub regional_categories: Option<bool>,
    pub data_path: Option<PathBuf>,
    pub stats_path: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub api_base_url: Option<String>,
    pub on_parse_error: Option<RowErrorPolicy>,
}

/// Fully resolved settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<ApiKey>,
    pub regions: Vec<String>,
    pub max_results: usize,
    pub category_region: String,
    pub regional_categories: bool,
    pub data_path: PathBuf,
    pub stats_path: PathBuf,
    pub request_timeout: Duration,
    pub api_base_url: String,
    pub on_parse_error: RowErrorPolicy,
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value_raw)) = trimmed.split_once('=') else {
            continue;
        };
        let value = value_raw.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "YOUTUBE_API_KEY" => cfg.api_key = Some(value.to_string()),
            "REGIONS" => cfg.regions = Some(parse_regions(value)),
            "MAX_RESULTS" => {
                let max: usize = value
                    .parse()
                    .with_context(|| format!("Parsing MAX_RESULTS from {}", path.display()))?;
                cfg.max_results = Some(max);
            }
            "CATEGORY_REGION" => cfg.category_region = Some(value.to_ascii_uppercase()),
            "REGIONAL_CATEGORIES" => {
                let flag = parse_bool(value).ok_or_else(|| {
                    anyhow!(
                        "REGIONAL_CATEGORIES in {} must be true or false",
                        path.display()
                    )
                })?;
                cfg.regional_categories = Some(flag);
            }
            "DATA_PATH" => cfg.data_path = Some(PathBuf::from(value)),
            "STATS_PATH" => cfg.stats_path = Some(PathBuf::from(value)),
            "REQUEST_TIMEOUT_SECS" => {
                let secs: u64 = value.parse().with_context(|| {
                    format!("Parsing REQUEST_TIMEOUT_SECS from {}", path.display())
                })?;
                cfg.request_timeout_secs = Some(secs);
            }
            "API_BASE_URL" => cfg.api_base_url = Some(value.to_string()),
            "ON_PARSE_ERROR" => {
                let policy = value
                    .parse::<RowErrorPolicy>()
                    .map_err(|err| anyhow!("{err} in {}", path.display()))?;
                cfg.on_parse_error = Some(policy);
            }
            _ => {}
        }
    }
    Ok(Some(cfg))
}

/// Splits a comma separated region list, upper-casing codes and keeping only
/// the first occurrence of each.
pub fn parse_regions(value: &str) -> Vec<String> {
    dedupe_regions(value.split(','))
}

pub fn dedupe_regions<I, S>(regions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for region in regions {
        let region = region.as_ref().trim().to_ascii_uppercase();
        if !region.is_empty() && !seen.contains(&region) {
            seen.push(region);
        }
    }
    seen
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl Settings {
    /// Applies defaults to whatever the env file and the process environment
    /// provided. The process environment wins for the API key.
    pub fn resolve(cfg: Option<EnvConfig>, env_api_key: Option<String>) -> Self {
        let cfg = cfg.unwrap_or_default();
        let api_key = env_api_key
            .filter(|key| !key.trim().is_empty())
            .or(cfg.api_key)
            .map(ApiKey::new);
        let regions = cfg
            .regions
            .filter(|regions| !regions.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_REGION.to_string()]);
        Self {
            api_key,
            regions,
            max_results: cfg.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            category_region: cfg
                .category_region
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            regional_categories: cfg.regional_categories.unwrap_or(false),
            data_path: cfg
                .data_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            stats_path: cfg
                .stats_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATS_PATH)),
            request_timeout: Duration::from_secs(
                cfg.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            api_base_url: cfg
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            on_parse_error: cfg.on_parse_error.unwrap_or_default(),
        }
    }
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_PATH))
}

pub fn load_settings_from(path: impl AsRef<Path>) -> Result<Settings> {
    let cfg = read_env_config(path.as_ref())?;
    Ok(Settings::resolve(cfg, env::var(API_KEY_ENV_VAR).ok()))
}
