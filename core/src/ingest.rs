use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ureq::Agent;

use crate::assemble::IndexedDocument;
use crate::error::Error;
use crate::telemetry::{bulk_retries_total, docs_failed_total, docs_indexed_total, Telemetry};

/// Konfig for bulk-innlastingen. Batchstørrelse er en avveining:
/// større batcher gir høyere gjennomstrømning opp til et punkt, men
/// større blast-radius og minnebruk ved feil.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub index: String,
    pub batch_size: usize,
    /// Maks antall nye forsøk per batch etter det første.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Slå av refresh/replikaer under innlasting og gjenopprett etterpå.
    pub tune_index_for_bulk: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            index: "fit-data".to_string(),
            batch_size: 500,
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            tune_index_for_bulk: true,
        }
    }
}

/// Eksplisitt, begrenset backoff-maskin: antall forsøk igjen, neste
/// ventetid, tak. Testbar uten ekte tid eller nett.
#[derive(Debug)]
pub struct Backoff {
    attempts_left: u32,
    next: Duration,
    ceiling: Duration,
}

impl Backoff {
    pub fn new(max_retries: u32, initial: Duration, ceiling: Duration) -> Self {
        Self { attempts_left: max_retries, next: initial, ceiling }
    }

    /// Neste ventetid, eller `None` når forsøkene er brukt opp.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts_left == 0 {
            return None;
        }
        self.attempts_left -= 1;
        let delay = self.next;
        self.next = (self.next * 2).min(self.ceiling);
        Some(delay)
    }
}

/// Søvn-abstraksjon så retry-løkka kan testes uten ekte forsinkelse.
pub trait Sleeper {
    fn sleep(&self, d: Duration);
}

/// Prod-implementasjon: blokkerer kalletråden (eneste suspensjonspunkt).
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Leveringsfeil fra destinasjonen, klassifisert for retry-policyen.
#[derive(Debug, Clone)]
pub enum SinkError {
    /// Timeout, 5xx, kø-avvisning – verdt å prøve igjen.
    Transient(String),
    /// 4xx o.l. – nytt forsøk hjelper ikke.
    Fatal(String),
}

impl SinkError {
    pub fn detail(&self) -> &str {
        match self {
            SinkError::Transient(s) | SinkError::Fatal(s) => s,
        }
    }
}

/// Svar fra bulk-APIet, per-item status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Hjelper for tester/fakes: alle dokumenter ok.
    pub fn all_ok<I: IntoIterator<Item = String>>(ids: I) -> Self {
        let items = ids
            .into_iter()
            .map(|id| BulkItem {
                index: BulkItemStatus { id, status: 201, error: None },
            })
            .collect();
        Self { errors: false, items }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem {
    #[serde(alias = "create")]
    pub index: BulkItemStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemStatus {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Sømmen mot destinasjonslageret. Prod: `EsClient` (Elasticsearch);
/// tester bruker en skriptet fake.
pub trait BulkSink {
    /// Valgfri optimalisering før bulk: replikaer 0, refresh av.
    fn prepare_index(&self, index: &str) -> Result<(), SinkError>;
    /// Én bulk-forespørsel (NDJSON-kropp), svar med per-item status.
    fn bulk(&self, body: &str) -> Result<BulkResponse, SinkError>;
    /// Gjenoppretter innstillingene fra `prepare_index`.
    fn restore_index(&self, index: &str) -> Result<(), SinkError>;
}

/// Blocking Elasticsearch-klient (ureq).
pub struct EsClient {
    agent: Agent,
    base_url: String,
}

impl EsClient {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self { agent, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn ping(&self) -> bool {
        self.agent.get(&self.base_url).call().is_ok()
    }
}

fn classify_http(err: ureq::Error) -> SinkError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body: String = resp
                .into_string()
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            let msg = format!("http {code}: {body}");
            if code == 429 || code >= 500 {
                SinkError::Transient(msg)
            } else {
                SinkError::Fatal(msg)
            }
        }
        ureq::Error::Transport(t) => SinkError::Transient(t.to_string()),
    }
}

impl BulkSink for EsClient {
    fn prepare_index(&self, index: &str) -> Result<(), SinkError> {
        let url = format!("{}/{}", self.base_url, index);
        let body = json!({
            "settings": { "number_of_replicas": 0, "refresh_interval": "-1" }
        });
        match self.agent.put(&url).send_json(body) {
            Ok(_) => {
                log::info!("opprettet {index} med bulk-innstillinger");
                Ok(())
            }
            // 400 = finnes allerede
            Err(ureq::Error::Status(400, _)) => Ok(()),
            Err(e) => Err(classify_http(e)),
        }
    }

    fn bulk(&self, body: &str) -> Result<BulkResponse, SinkError> {
        let url = format!("{}/_bulk", self.base_url);
        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/x-ndjson")
            .send_string(body)
            .map_err(classify_http)?;
        resp.into_json::<BulkResponse>()
            .map_err(|e| SinkError::Fatal(format!("ugyldig bulk-svar: {e}")))
    }

    fn restore_index(&self, index: &str) -> Result<(), SinkError> {
        let url = format!("{}/{}/_settings", self.base_url, index);
        let body = json!({
            "index": { "refresh_interval": "1s", "number_of_replicas": 1 }
        });
        self.agent.put(&url).send_json(body).map_err(classify_http)?;
        let refresh = format!("{}/{}/_refresh", self.base_url, index);
        self.agent.post(&refresh).call().map_err(classify_http)?;
        Ok(())
    }
}

/// Append-only logg over permanent feilede dokumenter:
/// én linje per dokument med id + feildetalj, lesbar etter kjøringen.
pub struct FailureLog {
    out: Option<BufWriter<File>>,
    pub entries: Vec<FailureEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureEntry {
    pub doc_id: String,
    pub detail: String,
}

impl FailureLog {
    /// `None` => kun i minnet.
    pub fn new(path: Option<&Path>) -> Result<Self, Error> {
        let out = match path {
            Some(p) => {
                let f = OpenOptions::new().create(true).append(true).open(p)?;
                Some(BufWriter::new(f))
            }
            None => None,
        };
        Ok(Self { out, entries: Vec::new() })
    }

    pub fn record(&mut self, doc_id: &str, detail: &str) {
        log::warn!("dokument {doc_id} feilet: {detail}");
        if let Some(w) = &mut self.out {
            let ts = chrono::Utc::now().to_rfc3339();
            if writeln!(w, "{ts}\t{doc_id}\t{detail}").and_then(|_| w.flush()).is_err() {
                log::error!("fikk ikke skrevet til feilloggen");
            }
        }
        self.entries.push(FailureEntry { doc_id: doc_id.to_string(), detail: detail.to_string() });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sluttrapport – produseres alltid, også med feil underveis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

/// Sekvensiell bulk-innlaster: batcher, retry med eksponentiell backoff,
/// per-dokument feilisolering. Best-effort over hele dokumentsettet –
/// en uttømt batch stopper aldri kjøringen.
pub struct BulkLoader<'a, S: BulkSink> {
    sink: &'a S,
    cfg: &'a IngestConfig,
    sleeper: &'a dyn Sleeper,
    telemetry: &'a Telemetry,
    stop: Option<Arc<AtomicBool>>,
}

impl<'a, S: BulkSink> BulkLoader<'a, S> {
    pub fn new(
        sink: &'a S,
        cfg: &'a IngestConfig,
        sleeper: &'a dyn Sleeper,
        telemetry: &'a Telemetry,
    ) -> Self {
        Self { sink, cfg, sleeper, telemetry, stop: None }
    }

    /// Kooperativ avbrytelse mellom batcher. Allerede aksepterte batcher
    /// rulles ikke tilbake.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn run(&self, docs: &[IndexedDocument], failures: &mut FailureLog) -> IngestSummary {
        let start = Instant::now();
        let mut summary = IngestSummary {
            attempted: docs.len() as u64,
            ..Default::default()
        };

        log::info!(
            "bulk-innlasting: {} dokumenter mot {} (batch={})",
            docs.len(),
            self.cfg.index,
            self.cfg.batch_size
        );

        if self.cfg.tune_index_for_bulk {
            if let Err(e) = self.sink.prepare_index(&self.cfg.index) {
                log::warn!("klargjøring av {} feilet: {}", self.cfg.index, e.detail());
            }
        }

        for batch in docs.chunks(self.cfg.batch_size.max(1)) {
            if self.stopped() {
                log::warn!("avbrutt mellom batcher, {} dokumenter ikke sendt", remaining(&summary));
                break;
            }
            let (ok, fail) = self.send_batch(batch, failures);
            summary.succeeded += ok;
            summary.failed += fail;
        }

        if self.cfg.tune_index_for_bulk {
            if let Err(e) = self.sink.restore_index(&self.cfg.index) {
                log::warn!("gjenoppretting av {} feilet: {}", self.cfg.index, e.detail());
            }
        }

        summary.elapsed = start.elapsed();
        log::info!(
            "bulk-innlasting ferdig: {}/{} ok, {} feilet, {:.1}s",
            summary.succeeded,
            summary.attempted,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );
        summary
    }

    fn stopped(&self) -> bool {
        self.stop.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Én batch til den er levert, uttømt eller fatalt avvist.
    /// Per-item 429 går med i neste forsøk; andre item-feil er permanente
    /// og isoleres uten å rive med seg søsknene.
    fn send_batch(
        &self,
        batch: &[IndexedDocument],
        failures: &mut FailureLog,
    ) -> (u64, u64) {
        let mut succeeded = 0u64;
        let mut failed = 0u64;

        // Dokumenter som ikke lar seg serialisere sendes aldri.
        let mut pending: Vec<&IndexedDocument> = Vec::with_capacity(batch.len());
        for d in batch {
            match serde_json::to_string(&d.doc) {
                Ok(_) => pending.push(d),
                Err(e) => {
                    failures.record(&d.id, &format!("serialisering: {e}"));
                    docs_failed_total(self.telemetry).inc();
                    failed += 1;
                }
            }
        }

        let mut backoff = Backoff::new(
            self.cfg.max_retries,
            self.cfg.initial_backoff,
            self.cfg.max_backoff,
        );

        while !pending.is_empty() {
            let body = match ndjson_body(&self.cfg.index, &pending) {
                Ok(b) => b,
                // kan ikke skje etter serialiserings-sjekken over, men vakt
                Err(e) => {
                    for d in &pending {
                        failures.record(&d.id, &format!("serialisering: {e}"));
                        docs_failed_total(self.telemetry).inc();
                        failed += 1;
                    }
                    break;
                }
            };

            match self.sink.bulk(&body) {
                Ok(resp) => {
                    // stol på errors-flagget bare når alle dokumenter fikk status
                    if !resp.errors && resp.items.len() == pending.len() {
                        docs_indexed_total(self.telemetry).inc_by(pending.len() as u64);
                        succeeded += pending.len() as u64;
                        break;
                    }
                    let mut retry_ids: HashSet<String> = HashSet::new();
                    let mut answered: HashSet<&str> = HashSet::new();
                    for item in &resp.items {
                        let st = &item.index;
                        answered.insert(st.id.as_str());
                        if (200..300).contains(&st.status) {
                            docs_indexed_total(self.telemetry).inc();
                            succeeded += 1;
                        } else if st.status == 429 {
                            retry_ids.insert(st.id.clone());
                        } else {
                            let detail = st
                                .error
                                .as_ref()
                                .map(|e| e.to_string())
                                .unwrap_or_else(|| format!("status {}", st.status));
                            failures.record(&st.id, &detail);
                            docs_failed_total(self.telemetry).inc();
                            failed += 1;
                        }
                    }
                    // dokumenter destinasjonen ikke ga status for
                    // regnes som permanent feilet
                    for d in &pending {
                        if !answered.contains(d.id.as_str()) {
                            failures.record(&d.id, "ingen status i bulk-svaret");
                            docs_failed_total(self.telemetry).inc();
                            failed += 1;
                        }
                    }
                    if retry_ids.is_empty() {
                        break;
                    }
                    pending.retain(|d| retry_ids.contains(&d.id));
                    match backoff.next_delay() {
                        Some(delay) => {
                            log::warn!(
                                "{} dokumenter kø-avvist (429), prøver igjen om {:.1}s",
                                pending.len(),
                                delay.as_secs_f64()
                            );
                            bulk_retries_total(self.telemetry).inc();
                            self.sleeper.sleep(delay);
                        }
                        None => {
                            for d in &pending {
                                failures.record(&d.id, "429 etter maks antall forsøk");
                                docs_failed_total(self.telemetry).inc();
                                failed += 1;
                            }
                            break;
                        }
                    }
                }
                Err(SinkError::Transient(msg)) => match backoff.next_delay() {
                    Some(delay) => {
                        log::warn!(
                            "transient leveringsfeil ({msg}), prøver igjen om {:.1}s",
                            delay.as_secs_f64()
                        );
                        bulk_retries_total(self.telemetry).inc();
                        self.sleeper.sleep(delay);
                    }
                    None => {
                        for d in &pending {
                            failures.record(&d.id, &format!("uttømt retry: {msg}"));
                            docs_failed_total(self.telemetry).inc();
                            failed += 1;
                        }
                        break;
                    }
                },
                Err(SinkError::Fatal(msg)) => {
                    for d in &pending {
                        failures.record(&d.id, &msg);
                        docs_failed_total(self.telemetry).inc();
                        failed += 1;
                    }
                    break;
                }
            }
        }

        (succeeded, failed)
    }
}

fn remaining(summary: &IngestSummary) -> u64 {
    summary.attempted - summary.succeeded - summary.failed
}

/// NDJSON-kropp for `_bulk`: action-linje + kilde-linje per dokument.
fn ndjson_body(index: &str, docs: &[&IndexedDocument]) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for d in docs {
        let action = json!({ "index": { "_index": index, "_id": d.id } });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&serde_json::to_string(&d.doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_dobler_mot_tak() {
        let mut b = Backoff::new(4, Duration::from_secs(2), Duration::from_secs(10));
        assert_eq!(b.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(b.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(b.next_delay(), Some(Duration::from_secs(8)));
        assert_eq!(b.next_delay(), Some(Duration::from_secs(10)));
        assert_eq!(b.next_delay(), None);
    }

    #[test]
    fn backoff_null_forsok() {
        let mut b = Backoff::new(0, Duration::from_secs(1), Duration::from_secs(1));
        assert_eq!(b.next_delay(), None);
    }
}
