use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::assemble::{assemble_session, IndexedDocument, ZoneTables};
use crate::enrich::{enrich_session, BaselineTable, EnrichConfig};
use crate::error::Error;
use crate::health_export::parse_health_export;
use crate::ingest::{BulkLoader, BulkSink, EsClient, FailureLog, IngestConfig, IngestSummary, Sleeper, ThreadSleeper};
use crate::metrics::compute_session_metrics;
use crate::storage::dump_documents;
use crate::telemetry::{sessions_processed_total, Telemetry};
use crate::types::{MetricsConfig, Session};

/// Hvor dagsbaselinjene kommer fra når berikelse er på.
#[derive(Debug, Clone)]
pub enum EnrichmentSource {
    /// CSV fra baselinjeprodusenten (`date,resting_hr,min_hr,...`).
    Csv(PathBuf),
    /// Rå Apple Health `export.xml`.
    HealthExportXml(PathBuf),
}

/// Hele konfigurasjonsflaten for en kjøring – eksplisitt struct,
/// ingen globale konstanter.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Katalog med dekodede økter (én NDJSON-fil per økt).
    pub source_dir: PathBuf,
    pub es_url: String,
    pub metrics: MetricsConfig,
    pub zones: ZoneTables,
    /// `None` => berikelse av.
    pub enrichment: Option<EnrichmentSource>,
    pub enrich_cfg: EnrichConfig,
    pub ingest: IngestConfig,
    /// Debug-dump av berikede-men-ikke-innlastede dokumenter.
    pub dump_path: Option<PathBuf>,
    pub failure_log_path: Option<PathBuf>,
    /// Settes utenfra for å avbryte mellom batcher.
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("garmin"),
            es_url: "http://localhost:9200".to_string(),
            metrics: MetricsConfig::default(),
            zones: ZoneTables::default(),
            enrichment: None,
            enrich_cfg: EnrichConfig::default(),
            ingest: IngestConfig::default(),
            dump_path: None,
            failure_log_path: None,
            stop_flag: None,
        }
    }
}

/// Kjører hele løypa mot Elasticsearch:
/// dekodede samples -> metrikker (+ soner) -> berikelse -> flate
/// dokumenter -> bulk-innlasting.
pub fn run_pipeline(cfg: &PipelineConfig) -> Result<IngestSummary, Error> {
    let sink = EsClient::new(&cfg.es_url);
    run_pipeline_with_sink(cfg, &sink, &ThreadSleeper, Telemetry::global())
}

/// Som `run_pipeline`, men med injisert sink/søvn/telemetri (testseam).
pub fn run_pipeline_with_sink<S: BulkSink>(
    cfg: &PipelineConfig,
    sink: &S,
    sleeper: &dyn Sleeper,
    telemetry: &Telemetry,
) -> Result<IngestSummary, Error> {
    cfg.zones.heart_rate.validate()?;
    cfg.zones.power.validate()?;

    let baselines = match &cfg.enrichment {
        Some(EnrichmentSource::Csv(p)) => Some(BaselineTable::from_csv_path(p)?),
        Some(EnrichmentSource::HealthExportXml(p)) => Some(parse_health_export(p)?),
        None => None,
    };

    let docs = collect_documents(cfg, baselines.as_ref(), telemetry)?;

    if let Some(dump) = &cfg.dump_path {
        dump_documents(dump, &docs)?;
    }

    let mut failures = FailureLog::new(cfg.failure_log_path.as_deref())?;
    let mut loader = BulkLoader::new(sink, &cfg.ingest, sleeper, telemetry);
    if let Some(flag) = &cfg.stop_flag {
        loader = loader.with_stop_flag(flag.clone());
    }
    Ok(loader.run(&docs, &mut failures))
}

/// Leser og sammenstiller alle økter i kildekatalogen.
/// Per-fil-feil logges og hopper over filen – aldri hele kjøringen.
fn collect_documents(
    cfg: &PipelineConfig,
    baselines: Option<&BaselineTable>,
    telemetry: &Telemetry,
) -> Result<Vec<IndexedDocument>, Error> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&cfg.source_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        log::warn!("ingen dekodede økter i {}", cfg.source_dir.display());
    }

    let mut docs = Vec::new();
    for path in paths {
        let id = Session::id_from_path(&path);
        let session = match std::fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|text| Session::from_ndjson(&id, &text))
        {
            Ok(s) => s,
            Err(e) => {
                log::error!("hopper over {}: {e}", path.display());
                continue;
            }
        };

        let metrics = compute_session_metrics(&session.samples, &cfg.metrics);
        let enrichment = match (baselines, session.date()) {
            (Some(table), Some(date)) => {
                Some(enrich_session(date, &metrics, table, &cfg.enrich_cfg))
            }
            _ => None,
        };

        log::info!(
            "økt {}: {} samples, NP {:.0} W, IF {:.2}, TSS {:.0}",
            session.id,
            session.samples.len(),
            metrics.normalized_power,
            metrics.intensity_factor,
            metrics.training_stress_score
        );

        docs.extend(assemble_session(&session, &metrics, &cfg.zones, enrichment.as_ref()));
        sessions_processed_total(telemetry).inc();
    }
    Ok(docs)
}
