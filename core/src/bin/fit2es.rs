use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fitingest_core::cli::print_run_summary;
use fitingest_core::ingest::EsClient;
use fitingest_core::pipeline::{run_pipeline, EnrichmentSource, PipelineConfig};

/// Tynn inngang: konfig fra miljøvariabler (ingen flaggparsing),
/// resten bor i biblioteket.
///
///   ES_HOST=http://localhost:9200 FIT_FOLDER=garmin FTP=250 fit2es
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut cfg = PipelineConfig {
        source_dir: PathBuf::from(env_or("FIT_FOLDER", "garmin")),
        es_url: env_or("ES_HOST", "http://localhost:9200"),
        ..Default::default()
    };

    cfg.ingest.index = env_or("ES_INDEX", &cfg.ingest.index);
    cfg.ingest.batch_size = env_parse("BATCH_SIZE", cfg.ingest.batch_size)?;
    cfg.ingest.max_retries = env_parse("MAX_RETRIES", cfg.ingest.max_retries)?;
    cfg.ingest.initial_backoff =
        Duration::from_secs_f64(env_parse("INITIAL_BACKOFF_SEC", 2.0)?);
    cfg.ingest.max_backoff = Duration::from_secs_f64(env_parse("MAX_BACKOFF_SEC", 60.0)?);
    cfg.ingest.tune_index_for_bulk = env_parse("TUNE_INDEX", 1u8)? != 0;

    cfg.metrics.ftp = env_parse("FTP", 250.0)?;
    cfg.metrics.sample_rate_hz = env_parse("SAMPLE_RATE_HZ", 1.0)?;

    cfg.enrich_cfg.hrv_threshold = env_parse("HRV_THRESHOLD", cfg.enrich_cfg.hrv_threshold)?;
    cfg.enrich_cfg.resting_hr_threshold =
        env_parse("RESTING_HR_THRESHOLD", cfg.enrich_cfg.resting_hr_threshold)?;

    // Berikelse: CSV har forrang, deretter rå helse-eksport
    if let Ok(p) = env::var("ENRICH_CSV") {
        cfg.enrichment = Some(EnrichmentSource::Csv(PathBuf::from(p)));
    } else if let Ok(p) = env::var("HEALTH_EXPORT_XML") {
        cfg.enrichment = Some(EnrichmentSource::HealthExportXml(PathBuf::from(p)));
    }

    if let Ok(p) = env::var("DUMP_PATH") {
        cfg.dump_path = Some(PathBuf::from(p));
    }
    cfg.failure_log_path = Some(PathBuf::from(env_or("FAILURE_LOG", "es_bulk_failures.log")));

    // Forbindelsessjekk før vi begynner å lese økter
    if !EsClient::new(&cfg.es_url).ping() {
        bail!("får ikke kontakt med Elasticsearch på {}", cfg.es_url);
    }

    let summary = run_pipeline(&cfg).context("kjøringen feilet")?;
    print_run_summary(&summary, cfg.failure_log_path.as_deref());

    // Feilede dokumenter er rapportert og logget – ikke en prosessfeil;
    // feilloggen er kilden for opprydding.
    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v.parse::<T>().with_context(|| format!("ugyldig {key}: {v}")),
        Err(_) => Ok(default),
    }
}
