use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use fitingest_core::ingest::{BulkResponse, BulkSink, SinkError, Sleeper};
use fitingest_core::pipeline::{run_pipeline_with_sink, EnrichmentSource, PipelineConfig};
use fitingest_core::telemetry::Telemetry;

/// Minimal destinasjon som godtar alt og beholder kildene nøklet på id.
#[derive(Default)]
struct CollectSink {
    store: RefCell<HashMap<String, serde_json::Value>>,
}

impl BulkSink for CollectSink {
    fn prepare_index(&self, _index: &str) -> Result<(), SinkError> {
        Ok(())
    }

    fn bulk(&self, body: &str) -> Result<BulkResponse, SinkError> {
        let mut ids = Vec::new();
        let mut lines = body.lines();
        while let (Some(action), Some(source)) = (lines.next(), lines.next()) {
            let action: serde_json::Value = serde_json::from_str(action).unwrap();
            let id = action["index"]["_id"].as_str().unwrap().to_string();
            let source: serde_json::Value = serde_json::from_str(source).unwrap();
            self.store.borrow_mut().insert(id.clone(), source);
            ids.push(id);
        }
        Ok(BulkResponse::all_ok(ids))
    }

    fn restore_index(&self, _index: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

struct NoSleep;

impl Sleeper for NoSleep {
    fn sleep(&self, _d: Duration) {}
}

fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

const RIDE1: &str = r#"{"timestamp":"2025-03-15T09:00:00","power":180,"heart_rate":135,"altitude":274.2,"distance":0}
{"timestamp":"2025-03-15T09:00:01","power":200,"heart_rate":140,"altitude":276.0,"distance":8.4}
{"timestamp":"2025-03-15T09:00:02","power":190,"heart_rate":142,"altitude":277.1,"distance":16.9}"#;

const RIDE2: &str = r#"{"timestamp":"2025-03-16T10:00:00","power":150,"heart_rate":120}
{"timestamp":"2025-03-16T10:00:01","power":155,"heart_rate":121}"#;

const BASELINE_CSV: &str = "date,resting_hr,min_hr,max_hr,hrv,step_count,active_energy_kcal\n2025-03-15,52,42,185,45.2,8234,450\n";

fn base_config(source_dir: std::path::PathBuf) -> PipelineConfig {
    let mut cfg = PipelineConfig {
        source_dir,
        ..Default::default()
    };
    cfg.metrics.ftp = 250.0;
    cfg.ingest.tune_index_for_bulk = false;
    cfg
}

#[test]
fn ende_til_ende_med_berikelse() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ride1.json", RIDE1);
    write_file(dir.path(), "ride2.json", RIDE2);
    let csv = write_file(dir.path(), "daily.csv", BASELINE_CSV);
    // skal ignoreres: ikke .json
    write_file(dir.path(), "notater.txt", "ikke en økt");

    let mut cfg = base_config(dir.path().to_path_buf());
    cfg.enrichment = Some(EnrichmentSource::Csv(csv));
    cfg.dump_path = Some(dir.path().join("dump.ndjson"));

    let sink = CollectSink::default();
    let telemetry = Telemetry::new();
    let summary = run_pipeline_with_sink(&cfg, &sink, &NoSleep, &telemetry).unwrap();

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 0);

    let store = sink.store.borrow();
    assert_eq!(store.len(), 5);

    // ride1 har baselinje for datoen sin
    let d = &store["ride1-0"];
    assert_eq!(d["session_id"], "ride1");
    assert_eq!(d["resting_hr"], 52.0);
    assert_eq!(d["power_zone"], "Zone 4");
    assert!(d["fatigue_index"].as_f64().is_some());

    // ride2 mangler baselinje: berikelsesfelt er null/false, men dokumentet kom med
    let d = &store["ride2-1"];
    assert!(d["resting_hr"].is_null());
    assert_eq!(d["recovery_ready"], false);
    assert!(d["fatigue_index"].is_null());

    // debug-dumpen fikk én linje per dokument
    let dump = std::fs::read_to_string(dir.path().join("dump.ndjson")).unwrap();
    assert_eq!(dump.lines().count(), 5);
}

#[test]
fn oedelagt_fil_hopper_ikke_over_resten() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ride1.json", RIDE1);
    write_file(dir.path(), "oedelagt.json", "{dette er ikke json");

    let cfg = base_config(dir.path().to_path_buf());
    let sink = CollectSink::default();
    let telemetry = Telemetry::new();
    let summary = run_pipeline_with_sink(&cfg, &sink, &NoSleep, &telemetry).unwrap();

    // den gyldige økta lastes fortsatt
    assert_eq!(summary.succeeded, 3);
    assert!(sink.store.borrow().contains_key("ride1-2"));
}

#[test]
fn uten_berikelse_ingen_baselinjefelt() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ride1.json", RIDE1);

    let cfg = base_config(dir.path().to_path_buf());
    let sink = CollectSink::default();
    let telemetry = Telemetry::new();
    run_pipeline_with_sink(&cfg, &sink, &NoSleep, &telemetry).unwrap();

    let store = sink.store.borrow();
    assert!(store["ride1-0"].get("resting_hr").is_none());
    assert!(store["ride1-0"].get("recovery_ready").is_none());
}

#[test]
fn helse_eksport_som_berikelseskilde() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ride1.json", RIDE1);
    let xml = write_file(
        dir.path(),
        "export.xml",
        r#"<HealthData>
            <Record type="HKQuantityTypeIdentifierRestingHeartRate" startDate="2025-03-15 07:00:00 +0100" value="52"/>
            <Record type="HKQuantityTypeIdentifierHeartRateVariabilitySDNN" startDate="2025-03-15 07:00:00 +0100" value="45.2"/>
        </HealthData>"#,
    );

    let mut cfg = base_config(dir.path().to_path_buf());
    cfg.enrichment = Some(EnrichmentSource::HealthExportXml(xml));

    let sink = CollectSink::default();
    let telemetry = Telemetry::new();
    run_pipeline_with_sink(&cfg, &sink, &NoSleep, &telemetry).unwrap();

    let store = sink.store.borrow();
    assert_eq!(store["ride1-0"]["resting_hr"], 52.0);
    assert_eq!(store["ride1-0"]["hrv"], 45.2);
    // recovery_ready: hrv 45.2 > 40 og hvilepuls 52 < 55
    assert_eq!(store["ride1-0"]["recovery_ready"], true);
}

#[test]
fn ugyldig_sonetabell_stopper_foer_innlasting() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "ride1.json", RIDE1);

    let mut cfg = base_config(dir.path().to_path_buf());
    cfg.zones.power.ranges[0].high = Some(500.0); // overlapper alt

    let sink = CollectSink::default();
    let telemetry = Telemetry::new();
    assert!(run_pipeline_with_sink(&cfg, &sink, &NoSleep, &telemetry).is_err());
    assert!(sink.store.borrow().is_empty());
}
