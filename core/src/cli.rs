use std::path::Path;

use crate::ingest::IngestSummary;

/// Menneskelesbar sluttrapport, til stdout etter en kjøring.
pub fn print_run_summary(summary: &IngestSummary, failure_log: Option<&Path>) {
    println!("{}", "=".repeat(60));
    println!("BULK-INNLASTING – OPPSUMMERING");
    println!("Forsøkt:   {}", summary.attempted);
    println!("Indeksert: {}", summary.succeeded);
    println!("Feilet:    {}", summary.failed);
    println!("Tid:       {:.1}s", summary.elapsed.as_secs_f64());
    if summary.failed > 0 {
        match failure_log {
            Some(p) => println!("⚠️ Se {} for detaljer per dokument", p.display()),
            None => println!("⚠️ Feildetaljer kun i minnet (ingen fillogg satt)"),
        }
    } else {
        println!("✅ Alle dokumenter levert");
    }
    println!("{}", "=".repeat(60));
}
