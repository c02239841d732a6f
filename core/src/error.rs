use thiserror::Error;

/// Feiltaksonomi for biblioteket.
/// Datafravær er ALDRI en feil – det propagerer som `None` gjennom
/// beregningene. Transient leveringssvikt håndteres med retry inne i
/// `ingest`; permanente per-dokument-avvisninger telles og logges der.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("ugyldig json ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ugyldig sonetabell: {0}")]
    InvalidZoneTable(String),

    #[error("ugyldig økt {session}: {reason}")]
    MalformedSession { session: String, reason: String },
}
