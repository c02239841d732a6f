use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::types::SessionMetrics;

/// Fysiologisk dagsbaselinje fra sekundærkilden (helse-eksporten).
/// Alle felt kan mangle for en dato – det er data, ikke feil.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBaseline {
    pub resting_hr: Option<f64>,
    pub min_hr: Option<f64>,
    pub max_hr: Option<f64>,
    /// HRV (SDNN, ms).
    pub hrv: Option<f64>,
    pub step_count: Option<u64>,
    pub active_energy_kcal: Option<f64>,
}

/// Dato-nøklet oppslagstabell. Bygges én gang, deretter read-only
/// gjennom hele innlastingen.
#[derive(Debug, Clone, Default)]
pub struct BaselineTable {
    days: HashMap<NaiveDate, DailyBaseline>,
}

impl BaselineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, baseline: DailyBaseline) {
        self.days.insert(date, baseline);
    }

    /// Kun eksakt datotreff – ingen interpolering over manglende dager.
    pub fn get(&self, date: NaiveDate) -> Option<&DailyBaseline> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Leser CSV-eksporten fra baselinjeprodusenten:
    /// `date,resting_hr,min_hr,max_hr,hrv,step_count,active_energy_kcal`.
    /// Tomme celler blir `None`; kolonner kan mangle helt.
    pub fn from_csv_path(path: &Path) -> Result<Self, Error> {
        #[derive(Deserialize)]
        struct Row {
            date: NaiveDate,
            #[serde(default)]
            resting_hr: Option<f64>,
            #[serde(default)]
            min_hr: Option<f64>,
            #[serde(default)]
            max_hr: Option<f64>,
            #[serde(default)]
            hrv: Option<f64>,
            #[serde(default)]
            step_count: Option<u64>,
            #[serde(default)]
            active_energy_kcal: Option<f64>,
        }

        let mut table = Self::new();
        let mut rdr = csv::Reader::from_path(path)?;
        for row in rdr.deserialize::<Row>() {
            let row = row?;
            table.insert(
                row.date,
                DailyBaseline {
                    resting_hr: row.resting_hr,
                    min_hr: row.min_hr,
                    max_hr: row.max_hr,
                    hrv: row.hrv,
                    step_count: row.step_count,
                    active_energy_kcal: row.active_energy_kcal,
                },
            );
        }
        log::info!("baselinjetabell: {} dager fra {}", table.len(), path.display());
        Ok(table)
    }
}

/// Terskler for `recovery_ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// HRV må være over denne (ms).
    pub hrv_threshold: f64,
    /// Hvilepuls må være under denne (bpm).
    pub resting_hr_threshold: f64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self { hrv_threshold: 40.0, resting_hr_threshold: 55.0 }
    }
}

/// Berikelsesblokken som flates inn på hvert dokument når
/// berikelse er på. Manglende baselinje => alle felt `None`
/// og `recovery_ready = false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(flatten)]
    pub baseline: DailyBaseline,
    /// avg_hr/resting_hr - 1.
    pub fatigue_index: Option<f64>,
    #[serde(default)]
    pub recovery_ready: bool,
    /// IF * (avg_hr / daily_max_hr).
    pub session_intensity_index: Option<f64>,
}

/// Slår opp dagsbaselinjen for øktas dato og avleder komposittindeksene.
/// Degraderer alltid mykt: mangler datoen, blir alt `None` og
/// innlastingen fortsetter.
pub fn enrich_session(
    date: NaiveDate,
    metrics: &SessionMetrics,
    table: &BaselineTable,
    cfg: &EnrichConfig,
) -> Enrichment {
    let baseline = match table.get(date) {
        Some(b) => b.clone(),
        None => {
            log::debug!("ingen baselinje for {date}");
            return Enrichment::default();
        }
    };

    let fatigue_index = match (metrics.avg_hr, baseline.resting_hr) {
        (Some(hr), Some(rhr)) if rhr > 0.0 => Some(hr / rhr - 1.0),
        _ => None,
    };

    let recovery_ready = matches!(
        (baseline.hrv, baseline.resting_hr),
        (Some(hrv), Some(rhr)) if hrv > cfg.hrv_threshold && rhr < cfg.resting_hr_threshold
    );

    let session_intensity_index = match (metrics.avg_hr, baseline.max_hr) {
        (Some(hr), Some(max)) if max > 0.0 => Some(metrics.intensity_factor * (hr / max)),
        _ => None,
    };

    Enrichment { baseline, fatigue_index, recovery_ready, session_intensity_index }
}
