use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::assemble::IndexedDocument;
use crate::error::Error;

/// Skriver sammenstilte (men ennå ikke innlastede) dokumenter til disk
/// som NDJSON – debug-dump for inspeksjon før/uten innlasting.
pub fn dump_documents(path: &Path, docs: &[IndexedDocument]) -> Result<(), Error> {
    let mut out = BufWriter::new(File::create(path)?);
    for d in docs {
        let line = serde_json::to_string(d).map_err(|e| Error::Json {
            context: format!("dump av {}", d.id),
            source: e,
        })?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    log::info!("dumpet {} dokumenter til {}", docs.len(), path.display());
    Ok(())
}

/// Leser en dump tilbake, f.eks. for re-innlasting uten ny parsing.
pub fn load_documents(path: &Path) -> Result<Vec<IndexedDocument>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut docs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut de = serde_json::Deserializer::from_str(&line);
        let doc: IndexedDocument =
            serde_path_to_error::deserialize(&mut de).map_err(|e| Error::Json {
                context: format!("{} linje {} ved `{}`", path.display(), lineno + 1, e.path()),
                source: e.into_inner(),
            })?;
        docs.push(doc);
    }
    Ok(docs)
}
