use once_cell::sync::Lazy;
use prometheus::{IntCounter, Registry};

/// Prosessvide tellere for innlastingen. Append-only, én skriver
/// (hovedtråden); `Registry` kan eksponeres/skrapes av omgivelsene.
pub struct Telemetry {
    pub registry: Registry,
    docs_indexed: IntCounter,
    docs_failed: IntCounter,
    bulk_retries: IntCounter,
    sessions_processed: IntCounter,
}

impl Telemetry {
    pub fn new() -> Self {
        let registry = Registry::new();
        let docs_indexed =
            IntCounter::new("docs_indexed_total", "Dokumenter indeksert ok").expect("metrikknavn");
        let docs_failed = IntCounter::new("docs_failed_total", "Dokumenter permanent feilet")
            .expect("metrikknavn");
        let bulk_retries =
            IntCounter::new("bulk_retries_total", "Bulk-batcher forsøkt på nytt")
                .expect("metrikknavn");
        let sessions_processed =
            IntCounter::new("sessions_processed_total", "Økter prosessert").expect("metrikknavn");

        for c in [&docs_indexed, &docs_failed, &bulk_retries, &sessions_processed] {
            registry.register(Box::new(c.clone())).expect("registrering");
        }

        Self { registry, docs_indexed, docs_failed, bulk_retries, sessions_processed }
    }

    pub fn global() -> &'static Telemetry {
        &GLOBAL
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: Lazy<Telemetry> = Lazy::new(Telemetry::new);

pub fn docs_indexed_total(t: &Telemetry) -> &IntCounter {
    &t.docs_indexed
}

pub fn docs_failed_total(t: &Telemetry) -> &IntCounter {
    &t.docs_failed
}

pub fn bulk_retries_total(t: &Telemetry) -> &IntCounter {
    &t.bulk_retries
}

pub fn sessions_processed_total(t: &Telemetry) -> &IntCounter {
    &t.sessions_processed
}
