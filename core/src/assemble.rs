use serde::{Deserialize, Serialize};

use crate::enrich::Enrichment;
use crate::types::{Sample, Session, SessionMetrics};
use crate::zones::{classify, ZoneTable};

/// Sonetabellene som brukes per sample under sammenstilling.
#[derive(Debug, Clone)]
pub struct ZoneTables {
    pub heart_rate: ZoneTable,
    pub power: ZoneTable,
}

impl Default for ZoneTables {
    fn default() -> Self {
        Self {
            heart_rate: ZoneTable::heart_rate_default(),
            power: ZoneTable::power_default(),
        }
    }
}

/// Ett flatt dokument = ett sample + øktkontekst + dagkontekst.
/// Konstrueres én gang under sammenstilling og muteres aldri etterpå.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatDocument {
    pub session_id: String,
    #[serde(flatten)]
    pub sample: Sample,
    pub heart_rate_zone: Option<String>,
    pub power_zone: Option<String>,
    #[serde(flatten)]
    pub metrics: SessionMetrics,
    #[serde(flatten)]
    pub enrichment: Option<Enrichment>,
}

/// Dokument med deterministisk id: samme input gir samme id,
/// så en ny kjøring overskriver i stedet for å duplisere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub doc: FlatDocument,
}

pub fn doc_id(session_id: &str, sample_index: usize) -> String {
    format!("{session_id}-{sample_index}")
}

/// Ren transform: kopierer økt-id, metrikksettet, per-sample soner og
/// eventuell berikelse på hvert sample. Ingen I/O, bevarer rekkefølgen.
pub fn assemble_session(
    session: &Session,
    metrics: &SessionMetrics,
    zones: &ZoneTables,
    enrichment: Option<&Enrichment>,
) -> Vec<IndexedDocument> {
    session
        .samples
        .iter()
        .enumerate()
        .map(|(i, sample)| IndexedDocument {
            id: doc_id(&session.id, i),
            doc: FlatDocument {
                session_id: session.id.clone(),
                sample: sample.clone(),
                heart_rate_zone: classify(sample.heart_rate, &zones.heart_rate)
                    .map(str::to_string),
                power_zone: classify(sample.power, &zones.power).map(str::to_string),
                metrics: metrics.clone(),
                enrichment: enrichment.cloned(),
            },
        })
        .collect()
}
