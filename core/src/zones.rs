use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Inklusivt intervall [low, high]; `high = None` betyr ubegrenset oppover
/// (kun gyldig for øverste sone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRange {
    pub name: String,
    pub low: f64,
    pub high: Option<f64>,
}

impl ZoneRange {
    fn contains(&self, v: f64) -> bool {
        v >= self.low && self.high.map_or(true, |h| v <= h)
    }
}

/// Sonetabell: navngitte, disjunkte intervaller.
/// Disjunkthet er et konfigurasjonsansvar – valider med `validate()`
/// ved oppsett, ikke i `classify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneTable {
    pub ranges: Vec<ZoneRange>,
}

impl ZoneTable {
    pub fn new(ranges: Vec<ZoneRange>) -> Self {
        Self { ranges }
    }

    /// Standard pulssoner (bpm), samme grenser som dashbordene forventer.
    /// Grensene er heltall og intervallene inklusive, så desimalverdier
    /// mellom to soner (f.eks. 119.5) klassifiseres ikke. Kilder som
    /// leverer desimalavlesninger bør få en tabell med tilstøtende grenser.
    pub fn heart_rate_default() -> Self {
        Self::new(vec![
            zone("Zone 1", 0.0, Some(119.0)),
            zone("Zone 2", 120.0, Some(139.0)),
            zone("Zone 3", 140.0, Some(159.0)),
            zone("Zone 4", 160.0, Some(179.0)),
            zone("Zone 5", 180.0, None),
        ])
    }

    /// Standard wattsoner. Samme heltallsgrense-forbehold som pulssonene.
    pub fn power_default() -> Self {
        Self::new(vec![
            zone("Zone 1", 0.0, Some(119.0)),
            zone("Zone 2", 120.0, Some(133.0)),
            zone("Zone 3", 134.0, Some(167.0)),
            zone("Zone 4", 168.0, Some(192.0)),
            zone("Zone 5", 193.0, Some(209.0)),
            zone("Zone 6", 210.0, Some(237.0)),
            zone("Zone 7", 238.0, None),
        ])
    }

    /// Sjekker at ingen intervaller overlapper og at en eventuell
    /// ubegrenset sone ligger øverst.
    pub fn validate(&self) -> Result<(), Error> {
        let mut sorted: Vec<&ZoneRange> = self.ranges.iter().collect();
        for r in &sorted {
            if !r.low.is_finite() {
                return Err(Error::InvalidZoneTable(format!(
                    "{}: nedre grense er ikke et tall",
                    r.name
                )));
            }
            if let Some(h) = r.high {
                if !h.is_finite() || h < r.low {
                    return Err(Error::InvalidZoneTable(format!(
                        "{}: tomt eller ugyldig intervall",
                        r.name
                    )));
                }
            }
        }
        sorted.sort_by_key(|r| OrderedFloat(r.low));
        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            match a.high {
                None => {
                    return Err(Error::InvalidZoneTable(format!(
                        "{} er ubegrenset men ikke øverste sone",
                        a.name
                    )))
                }
                Some(h) if h >= b.low => {
                    return Err(Error::InvalidZoneTable(format!(
                        "{} og {} overlapper",
                        a.name, b.name
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn zone(name: &str, low: f64, high: Option<f64>) -> ZoneRange {
    ZoneRange { name: name.to_string(), low, high }
}

/// Ren klassifisering: verdien mot tabellen.
/// `None` inn (eller NaN) => `None` ut; verdi utenfor alle soner => `None`.
/// Kaster aldri, ekstrapolerer aldri.
pub fn classify<'a>(value: Option<f64>, table: &'a ZoneTable) -> Option<&'a str> {
    let v = value?;
    if !v.is_finite() {
        return None;
    }
    table
        .ranges
        .iter()
        .find(|r| r.contains(v))
        .map(|r| r.name.as_str())
}
