pub mod assemble;
pub mod cli;
pub mod enrich;
pub mod error;
pub mod health_export;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod zones;

pub use assemble::{assemble_session, doc_id, FlatDocument, IndexedDocument, ZoneTables};
pub use enrich::{enrich_session, BaselineTable, DailyBaseline, EnrichConfig, Enrichment};
pub use error::Error;
pub use health_export::parse_health_export;
pub use ingest::{
    Backoff, BulkLoader, BulkResponse, BulkSink, EsClient, FailureLog, IngestConfig,
    IngestSummary, SinkError, Sleeper, ThreadSleeper,
};
pub use metrics::compute_session_metrics;
pub use pipeline::{run_pipeline, run_pipeline_with_sink, EnrichmentSource, PipelineConfig};
pub use storage::{dump_documents, load_documents};
pub use telemetry::Telemetry;
pub use types::{MetricsConfig, Sample, Session, SessionMetrics};
pub use zones::{classify, ZoneRange, ZoneTable};
