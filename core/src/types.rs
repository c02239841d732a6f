use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// Ett tidsstemplet avlesningspunkt fra dekoderen.
/// Felt som enheten ikke registrerte er `None` – aldri 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    #[serde(with = "ts")]
    pub timestamp: DateTime<Utc>,
    pub power: Option<f64>,
    pub heart_rate: Option<f64>,
    pub cadence: Option<f64>,
    #[serde(alias = "enhanced_altitude")]
    pub altitude: Option<f64>,
    /// Kumulativ distanse (meter) slik enheten rapporterer den.
    pub distance: Option<f64>,
    #[serde(alias = "enhanced_speed")]
    pub speed: Option<f64>,
}

/// Én økt: ordnet sample-sekvens med stabil id (filstammen).
/// Immutabel etter parsing – metrikker avledes, aldri muteres inn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub samples: Vec<Sample>,
}

impl Session {
    pub fn new(id: impl Into<String>, samples: Vec<Sample>) -> Self {
        Self { id: id.into(), samples }
    }

    /// Parser dekoder-output: én JSON-mapping per linje (NDJSON).
    /// Ukjente felt ignoreres; manglende felt blir `None`.
    pub fn from_ndjson(id: &str, text: &str) -> Result<Self, Error> {
        let mut samples = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut de = serde_json::Deserializer::from_str(line);
            let sample: Sample =
                serde_path_to_error::deserialize(&mut de).map_err(|e| Error::Json {
                    context: format!("{id} linje {} ved `{}`", lineno + 1, e.path()),
                    source: e.into_inner(),
                })?;
            samples.push(sample);
        }
        if samples.is_empty() {
            return Err(Error::MalformedSession {
                session: id.to_string(),
                reason: "ingen samples".to_string(),
            });
        }
        Ok(Self::new(id, samples))
    }

    /// Øktas kalenderdato (UTC) = datoen til første sample.
    pub fn date(&self) -> Option<NaiveDate> {
        self.samples.first().map(|s| s.timestamp.date_naive())
    }

    /// Stabil økt-id fra kildefilnavnet.
    pub fn id_from_path(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }
}

/// Avledede skalarer per økt. Beregnes én gang og kringkastes
/// flatt på hvert dokument (serde-flatten i `FlatDocument`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionMetrics {
    pub avg_power: Option<f64>,
    pub avg_hr: Option<f64>,
    pub moving_time_sec: f64,
    pub pause_time_sec: f64,
    pub normalized_power: f64,
    pub intensity_factor: f64,
    pub training_stress_score: f64,
    pub max_5min_power: Option<f64>,
    pub vo2max_estimate: Option<f64>,
    pub distance_m: Option<f64>,
    pub elevation_gain_m: Option<f64>,
    pub hr_drift_pct: Option<f64>,
}

/// Konfig for metrikkmotoren. Ingen prosess-global state –
/// sendes eksplisitt inn per kall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Functional Threshold Power (watt). <= 0 slår av alle
    /// FTP-relative metrikker (IF/TSS blir 0), ingen feil.
    pub ftp: f64,
    /// Antatt samplerate. TSS/moving-time bruker sample-antall som
    /// tidsproxy; 1.0 Hz er den dokumenterte antagelsen.
    pub sample_rate_hz: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { ftp: 0.0, sample_rate_hz: 1.0 }
    }
}

// --- RoundTo trait (offentlig, brukt av health_export) ---
pub trait RoundTo {
    fn round_to(self, dp: u32) -> f64;
}

impl RoundTo for f64 {
    #[inline]
    fn round_to(self, dp: u32) -> f64 {
        if dp == 0 {
            return self.round();
        }
        let factor = 10_f64.powi(dp as i32);
        (self * factor).round() / factor
    }
}

/// Timestamp-serde som godtar både RFC3339 og naive ISO-strenger
/// (fitparse skriver "2024-01-27T19:09:18" uten sone – tolkes som UTC).
pub(crate) mod ts {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("ugyldig timestamp: {raw}")))
    }
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_naive_og_rfc3339() {
        let a = parse_timestamp("2024-01-27T19:09:18").unwrap();
        let b = parse_timestamp("2024-01-27T19:09:18+00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("ikke en dato").is_none());
    }

    #[test]
    fn ndjson_ignorerer_ukjente_felt() {
        let text = r#"{"timestamp":"2024-01-27T19:09:18","power":180,"heart_rate":135,"left_pedal_smoothness":23}
{"timestamp":"2024-01-27T19:09:19","cadence":80}"#;
        let s = Session::from_ndjson("tur1", text).unwrap();
        assert_eq!(s.samples.len(), 2);
        assert_eq!(s.samples[0].power, Some(180.0));
        assert_eq!(s.samples[1].power, None);
        assert_eq!(s.date().unwrap().to_string(), "2024-01-27");
    }
}
