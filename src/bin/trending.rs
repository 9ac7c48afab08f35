#![forbid(unsafe_code)]

//! Command-line front end for the trending pipeline: fetch the chart, store
//! it, then load, clean, enrich and summarize it.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use trending_tools::analysis::{
    category_distribution, correlation_matrix, engagement_by_category, missing_values, preview,
    views_by_duration_range, views_by_publish_hour,
};
use trending_tools::api::{ApiKey, YouTubeClient};
use trending_tools::config::{DEFAULT_CONFIG_PATH, Settings, dedupe_regions, load_settings_from};
use trending_tools::stats::{Metric, Summary};
use trending_tools::storage::write_summary;
use trending_tools::{
    RowErrorPolicy, VideoRecord, VideoTable, descriptive_stats, enrich, fetch_trending,
    fetch_trending_regional, load, persist, preprocess, resolve_category_mapping,
};

const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch and analyze trending videos.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, global = true, help = "Path to the env-style config file")]
    config: PathBuf,
    #[arg(
        long = "api-key",
        value_name = "KEY",
        global = true,
        help = "API key (overrides YOUTUBE_API_KEY and the config file)"
    )]
    api_key: Option<String>,
    #[arg(
        long = "regions",
        value_name = "CODES",
        value_delimiter = ',',
        global = true,
        help = "Comma separated region codes, fetched in order"
    )]
    regions: Vec<String>,
    #[arg(
        long = "max-results",
        value_name = "N",
        global = true,
        help = "Cap on rows across all regions combined"
    )]
    max_results: Option<usize>,
    #[arg(
        long = "category-region",
        value_name = "CODE",
        global = true,
        help = "Region whose category catalog names every row"
    )]
    category_region: Option<String>,
    #[arg(
        long = "regional-categories",
        global = true,
        help = "Resolve a separate category catalog for each region"
    )]
    regional_categories: bool,
    #[arg(
        long = "data",
        value_name = "PATH",
        global = true,
        help = "Dataset file to write and read"
    )]
    data: Option<PathBuf>,
    #[arg(
        long = "stats",
        value_name = "PATH",
        global = true,
        help = "Where to write the descriptive statistics"
    )]
    stats: Option<PathBuf>,
    #[arg(
        long = "on-parse-error",
        value_name = "POLICY",
        global = true,
        help = "drop or abort when a row cannot be parsed"
    )]
    on_parse_error: Option<String>,
    #[arg(
        long = "timeout-secs",
        value_name = "SECS",
        global = true,
        help = "Per-request timeout"
    )]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the trending chart and overwrite the dataset file.
    Fetch,
    /// Load the dataset file, preprocess it and print summaries.
    Analyze {
        #[arg(long = "preview", value_name = "ROWS", default_value_t = DEFAULT_PREVIEW_ROWS)]
        preview: usize,
    },
    /// Fetch, then analyze.
    Run {
        #[arg(long = "preview", value_name = "ROWS", default_value_t = DEFAULT_PREVIEW_ROWS)]
        preview: usize,
    },
}

impl Cli {
    /// Layers command-line overrides on top of the config file.
    fn settings(&self) -> Result<Settings> {
        let mut settings = load_settings_from(&self.config)?;
        if let Some(key) = &self.api_key {
            settings.api_key = Some(ApiKey::new(key.clone()));
        }
        let regions = dedupe_regions(&self.regions);
        if !regions.is_empty() {
            settings.regions = regions;
        }
        if let Some(max) = self.max_results {
            settings.max_results = max;
        }
        if let Some(region) = &self.category_region {
            settings.category_region = region.to_ascii_uppercase();
        }
        if self.regional_categories {
            settings.regional_categories = true;
        }
        if let Some(path) = &self.data {
            settings.data_path = path.clone();
        }
        if let Some(path) = &self.stats {
            settings.stats_path = path.clone();
        }
        if let Some(policy) = &self.on_parse_error {
            settings.on_parse_error = policy.parse::<RowErrorPolicy>().map_err(|err| anyhow!(err))?;
        }
        if let Some(secs) = self.timeout_secs {
            settings.request_timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings()?;

    match cli.command {
        Command::Fetch => {
            fetch(&settings)?;
        }
        Command::Analyze { preview } => analyze(&settings, preview)?,
        Command::Run { preview } => {
            fetch(&settings)?;
            println!();
            analyze(&settings, preview)?;
        }
    }

    Ok(())
}

fn fetch(settings: &Settings) -> Result<Vec<VideoRecord>> {
    let key = settings.api_key.as_ref().ok_or_else(|| {
        anyhow!("No API key: pass --api-key, set YOUTUBE_API_KEY, or add it to the config file")
    })?;
    let client = YouTubeClient::new(settings.api_base_url.as_str(), settings.request_timeout);

    println!("Regions: {}", settings.regions.join(", "));
    println!("Max results: {}", settings.max_results);

    let records = if settings.regional_categories {
        fetch_trending_regional(&client, key, settings.regions.as_slice(), settings.max_results)
            .context("fetching trending videos")?
    } else {
        let categories = resolve_category_mapping(&client, key, &settings.category_region)
            .context("resolving video categories")?;
        println!(
            "Categories ({}): {} known",
            categories.region(),
            categories.len()
        );
        fetch_trending(
            &client,
            key,
            &categories,
            settings.regions.as_slice(),
            settings.max_results,
        )
        .context("fetching trending videos")?
    };

    persist(&records, &settings.data_path)
        .with_context(|| format!("writing {}", settings.data_path.display()))?;
    println!(
        "Trending videos saved to {} ({} rows)",
        settings.data_path.display(),
        records.len()
    );
    Ok(records)
}

fn analyze(settings: &Settings, preview_rows: usize) -> Result<()> {
    let raw = load(&settings.data_path)
        .with_context(|| format!("loading {}", settings.data_path.display()))?;

    println!("Missing values:");
    for (column, missing) in missing_values(&raw) {
        println!("  {column:<15} {missing}");
    }

    let table = VideoTable::from_raw(&raw).context("typing dataset columns")?;
    let loaded = table.len();
    let table = enrich(preprocess(table, settings.on_parse_error).context("preprocessing")?);
    if table.len() < loaded {
        println!("Dropped {} unparsable row(s).", loaded - table.len());
    }
    println!("Preprocessed {} row(s).", table.len());

    println!();
    println!("First rows:");
    for row in preview(&table, preview_rows) {
        println!(
            "  {} | {} | {} | {} views",
            row.video_id, row.category_name, row.title, row.view_count
        );
    }

    let summary = descriptive_stats(&table);
    println!();
    println!("Descriptive statistics:");
    for (metric, stats) in &summary.columns {
        print_summary(*metric, stats);
    }
    write_summary(&summary, &settings.stats_path)
        .with_context(|| format!("writing {}", settings.stats_path.display()))?;
    println!("Statistics saved to {}", settings.stats_path.display());

    println!();
    println!("Correlation (views, likes, comments):");
    let matrix = correlation_matrix(&table);
    for (i, metric) in matrix.metrics.iter().enumerate() {
        let cells: Vec<String> = matrix.values[i]
            .iter()
            .map(|value| value.map_or_else(|| "   n/a".to_string(), |v| format!("{v:6.3}")))
            .collect();
        println!("  {:<14} {}", metric.column(), cells.join(" "));
    }

    println!();
    println!("Videos per category:");
    for (category, count) in category_distribution(&table) {
        println!("  - {category}: {count}");
    }

    println!();
    println!("Average engagement by category:");
    for entry in engagement_by_category(&table) {
        println!(
            "  - {}: {:.0} views, {:.0} likes, {:.0} comments ({} videos)",
            entry.category, entry.mean_views, entry.mean_likes, entry.mean_comments, entry.videos
        );
    }

    println!();
    println!("Mean views by duration:");
    for bucket in views_by_duration_range(&table) {
        if let Some(mean) = bucket.mean_views {
            println!("  - {}: {mean:.0} ({} videos)", bucket.bucket, bucket.videos);
        }
    }

    println!();
    println!("Mean views by publish hour:");
    for bucket in views_by_publish_hour(&table) {
        if let Some(mean) = bucket.mean_views {
            println!("  - {:02}:00: {mean:.0} ({} videos)", bucket.bucket, bucket.videos);
        }
    }

    Ok(())
}

fn print_summary(metric: Metric, summary: &Summary) {
    let show = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
    println!(
        "  {:<14} count={} mean={} std={} min={} 25%={} 50%={} 75%={} max={}",
        metric.column(),
        summary.count,
        show(summary.mean),
        show(summary.std),
        show(summary.min),
        show(summary.q25),
        show(summary.median),
        show(summary.q75),
        show(summary.max),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn region_flags_are_deduplicated_in_order() {
        let cli = Cli::parse_from([
            "trending",
            "--config",
            "/nonexistent/trending.env",
            "--regions",
            "us,in,US,gb",
            "--max-results",
            "10",
            "fetch",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.regions, ["US", "IN", "GB"]);
        assert_eq!(settings.max_results, 10);
    }

    #[test]
    fn invalid_policy_flag_is_rejected() {
        let cli = Cli::parse_from([
            "trending",
            "--config",
            "/nonexistent/trending.env",
            "analyze",
            "--on-parse-error",
            "maybe",
        ]);
        assert!(cli.settings().is_err());
    }
}
