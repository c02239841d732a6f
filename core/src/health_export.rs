use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::enrich::{BaselineTable, DailyBaseline};
use crate::error::Error;
use crate::types::RoundTo;

/// Akkumulator per dag før aggregering.
#[derive(Debug, Default)]
struct DayAcc {
    resting_sum: f64,
    resting_n: usize,
    hr_min: f64,
    hr_max: f64,
    hr_n: usize,
    hrv_sum: f64,
    hrv_n: usize,
    steps: f64,
    steps_seen: bool,
    energy: f64,
    energy_seen: bool,
}

impl DayAcc {
    fn into_baseline(self) -> DailyBaseline {
        DailyBaseline {
            resting_hr: (self.resting_n > 0)
                .then(|| (self.resting_sum / self.resting_n as f64).round_to(1)),
            min_hr: (self.hr_n > 0).then(|| self.hr_min.round_to(1)),
            max_hr: (self.hr_n > 0).then(|| self.hr_max.round_to(1)),
            hrv: (self.hrv_n > 0).then(|| (self.hrv_sum / self.hrv_n as f64).round_to(1)),
            step_count: self.steps_seen.then(|| self.steps.round() as u64),
            active_energy_kcal: self.energy_seen.then(|| self.energy.round_to(1)),
        }
    }
}

/// Parser Apple Health `export.xml` til en dato-nøklet baselinjetabell.
/// Strømmer `<Record>`-elementene; uparsbare records hoppes over.
pub fn parse_health_export(path: &Path) -> Result<BaselineTable, Error> {
    let mut reader = Reader::from_reader(BufReader::new(File::open(path)?));
    parse_records(&mut reader)
}

fn parse_records<R: BufRead>(reader: &mut Reader<R>) -> Result<BaselineTable, Error> {
    reader.trim_text(true);

    let mut days: HashMap<NaiveDate, DayAcc> = HashMap::new();
    let mut buf = Vec::new();
    let mut skipped = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Record" => {
                let mut kind = None;
                let mut start_date = None;
                let mut value = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"type" => kind = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"startDate" => {
                            start_date = Some(String::from_utf8_lossy(&attr.value).to_string())
                        }
                        b"value" => value = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                let (Some(kind), Some(start), Some(value)) = (kind, start_date, value) else {
                    skipped += 1;
                    continue;
                };
                // startDate: "2025-03-15 07:12:01 +0100" – dato er de ti første tegnene
                let date = start
                    .get(..10)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
                let val = value.parse::<f64>().ok();
                let (Some(date), Some(val)) = (date, val) else {
                    skipped += 1;
                    continue;
                };

                let acc = days.entry(date).or_default();
                match kind.as_str() {
                    "HKQuantityTypeIdentifierRestingHeartRate" => {
                        acc.resting_sum += val;
                        acc.resting_n += 1;
                    }
                    "HKQuantityTypeIdentifierHeartRate" => {
                        if acc.hr_n == 0 {
                            acc.hr_min = val;
                            acc.hr_max = val;
                        } else {
                            acc.hr_min = acc.hr_min.min(val);
                            acc.hr_max = acc.hr_max.max(val);
                        }
                        acc.hr_n += 1;
                    }
                    "HKQuantityTypeIdentifierHeartRateVariabilitySDNN" => {
                        acc.hrv_sum += val;
                        acc.hrv_n += 1;
                    }
                    "HKQuantityTypeIdentifierStepCount" => {
                        acc.steps += val;
                        acc.steps_seen = true;
                    }
                    "HKQuantityTypeIdentifierActiveEnergyBurned" => {
                        acc.energy += val;
                        acc.energy_seen = true;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if skipped > 0 {
        log::warn!("health-eksport: hoppet over {skipped} uparsbare records");
    }

    let mut table = BaselineTable::new();
    for (date, acc) in days {
        table.insert(date, acc.into_baseline());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregerer_per_dag() {
        let xml = r#"<HealthData>
            <Record type="HKQuantityTypeIdentifierRestingHeartRate" startDate="2025-03-15 07:00:00 +0100" value="50"/>
            <Record type="HKQuantityTypeIdentifierRestingHeartRate" startDate="2025-03-15 22:00:00 +0100" value="54"/>
            <Record type="HKQuantityTypeIdentifierHeartRate" startDate="2025-03-15 08:00:00 +0100" value="42"/>
            <Record type="HKQuantityTypeIdentifierHeartRate" startDate="2025-03-15 18:00:00 +0100" value="115"/>
            <Record type="HKQuantityTypeIdentifierHeartRateVariabilitySDNN" startDate="2025-03-15 07:00:00 +0100" value="45.2"/>
            <Record type="HKQuantityTypeIdentifierStepCount" startDate="2025-03-15 09:00:00 +0100" value="4000"/>
            <Record type="HKQuantityTypeIdentifierStepCount" startDate="2025-03-15 15:00:00 +0100" value="4234"/>
            <Record type="HKQuantityTypeIdentifierActiveEnergyBurned" startDate="2025-03-15 10:00:00 +0100" value="450.04"/>
            <Record type="HKQuantityTypeIdentifierStepCount" startDate="ugyldig" value="1"/>
        </HealthData>"#;
        let mut reader = Reader::from_reader(xml.as_bytes());
        let table = parse_records(&mut reader).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let b = table.get(date).unwrap();
        assert_eq!(b.resting_hr, Some(52.0));
        assert_eq!(b.min_hr, Some(42.0));
        assert_eq!(b.max_hr, Some(115.0));
        assert_eq!(b.hrv, Some(45.2));
        assert_eq!(b.step_count, Some(8234));
        assert_eq!(b.active_energy_kcal, Some(450.0));
    }
}
