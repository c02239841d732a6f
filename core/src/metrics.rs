use crate::types::{MetricsConfig, Sample, SessionMetrics};

/// Rullerende vindu for peak-effekt: 300 samples ≈ 5 min ved 1 Hz.
const PEAK_WINDOW: usize = 300;

pub fn avg_power(samples: &[Sample]) -> Option<f64> {
    let mut sum = 0.0f64;
    let mut cnt = 0usize;
    for s in samples {
        if let Some(w) = s.power {
            sum += w;
            cnt += 1;
        }
    }
    if cnt == 0 { None } else { Some(sum / cnt as f64) }
}

pub fn avg_hr(samples: &[Sample]) -> Option<f64> {
    let mut sum = 0.0f64;
    let mut cnt = 0usize;
    for s in samples {
        if let Some(h) = s.heart_rate {
            sum += h;
            cnt += 1;
        }
    }
    if cnt == 0 { None } else { Some(sum / cnt as f64) }
}

/// Antall samples med wattavlesning, skalert med samplerate.
/// Proxy for "opptak aktivt" – ikke veggklokketid.
pub fn moving_time_sec(samples: &[Sample], sample_rate_hz: f64) -> f64 {
    let cnt = samples.iter().filter(|s| s.power.is_some()).count() as f64;
    if sample_rate_hz > 0.0 { cnt / sample_rate_hz } else { cnt }
}

/// Sum av `max(gap_sek - 1, 0)` over påfølgende timestamp-par:
/// bare hull som overstiger ett nominelt sampleintervall teller som pause.
pub fn pause_time_sec(samples: &[Sample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mut pause = 0.0f64;
    for pair in samples.windows(2) {
        let gap = (pair[1].timestamp - pair[0].timestamp).num_seconds() as f64;
        pause += (gap - 1.0).max(0.0);
    }
    pause
}

/// Normalized Power: fjerdepotens-vektet snitt av wattavlesningene,
/// `(mean(power^4))^(1/4)`. 0.0 uten wattdata.
pub fn normalized_power(samples: &[Sample]) -> f64 {
    let mut sum4 = 0.0f64;
    let mut cnt = 0usize;
    for s in samples {
        if let Some(w) = s.power {
            sum4 += w.powi(4);
            cnt += 1;
        }
    }
    if cnt == 0 {
        return 0.0;
    }
    (sum4 / cnt as f64).powf(0.25)
}

/// IF = NP/FTP. 0 når FTP ikke er satt (<= 0).
pub fn intensity_factor(np: f64, ftp: f64) -> f64 {
    if ftp > 0.0 { np / ftp } else { 0.0 }
}

/// TSS = moving * NP * IF / (FTP * 3600) * 100.
/// Sample-antall som tidsproxy – presisjonen avhenger av 1 Hz-antagelsen.
pub fn training_stress_score(moving_time_sec: f64, np: f64, r_if: f64, ftp: f64) -> f64 {
    if ftp > 0.0 {
        (moving_time_sec * np * r_if) / (ftp * 3600.0) * 100.0
    } else {
        0.0
    }
}

/// Maks rullerende snitt over `PEAK_WINDOW` wattavlesninger.
/// `None` under 300 watt-bærende samples (for-lite-data, ikke feil).
pub fn max_5min_power(samples: &[Sample]) -> Option<f64> {
    let w: Vec<f64> = samples.iter().filter_map(|s| s.power).collect();
    if w.len() < PEAK_WINDOW {
        return None;
    }
    let mut best = f64::NEG_INFINITY;
    let mut sum = 0.0f64;
    for i in 0..w.len() {
        sum += w[i];
        if i >= PEAK_WINDOW {
            sum -= w[i - PEAK_WINDOW];
        }
        if i + 1 >= PEAK_WINDOW {
            best = best.max(sum / PEAK_WINDOW as f64);
        }
    }
    Some(best)
}

/// Grovt VO2max-estimat fra 5-min peak (lineær formel, x12/73).
pub fn vo2max_estimate(max_5min: Option<f64>) -> Option<f64> {
    max_5min.map(|p| p * 12.0 / 73.0)
}

/// Enheten rapporterer kumulativ distanse – maks observert verdi.
pub fn distance_m(samples: &[Sample]) -> Option<f64> {
    samples
        .iter()
        .filter_map(|s| s.distance)
        .fold(None, |acc, d| Some(acc.map_or(d, |a: f64| a.max(d))))
}

/// max(altitude) - min(altitude). Bevisst forenkling av reell
/// kumulativ stigning (summerer ikke delstigninger) – dashbordene
/// antar denne definisjonen.
pub fn elevation_gain_m(samples: &[Sample]) -> Option<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut seen = false;
    for s in samples {
        if let Some(a) = s.altitude {
            lo = lo.min(a);
            hi = hi.max(a);
            seen = true;
        }
    }
    if seen { Some(hi - lo) } else { None }
}

/// HR-drift: del økta på midtpunkt-indeks, sammenlign puls/watt-forholdet
/// i andre halvdel mot første. Positiv drift = aerob tretthet.
/// `None` hvis en halvdel mangler puls- eller wattdata, eller snittwatt
/// i en halvdel er 0 (vern mot deling på null).
pub fn hr_drift_pct(samples: &[Sample]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let mid = samples.len() / 2;
    let (first, second) = samples.split_at(mid);

    let (pw1, hr1) = (avg_power(first)?, avg_hr(first)?);
    let (pw2, hr2) = (avg_power(second)?, avg_hr(second)?);

    if pw1 <= 0.0 || pw2 <= 0.0 || hr1 <= 0.0 {
        return None;
    }

    let r1 = hr1 / pw1;
    let r2 = hr2 / pw2;
    Some((r2 - r1) / r1 * 100.0)
}

/// Hele metrikksettet for én økt. Kaster aldri for manglende data:
/// økter uten et felt får 0/None for den metrikken.
pub fn compute_session_metrics(samples: &[Sample], cfg: &MetricsConfig) -> SessionMetrics {
    let np = normalized_power(samples);
    let moving = moving_time_sec(samples, cfg.sample_rate_hz);
    let r_if = intensity_factor(np, cfg.ftp);
    let max5 = max_5min_power(samples);

    SessionMetrics {
        avg_power: avg_power(samples),
        avg_hr: avg_hr(samples),
        moving_time_sec: moving,
        pause_time_sec: pause_time_sec(samples),
        normalized_power: np,
        intensity_factor: r_if,
        training_stress_score: training_stress_score(moving, np, r_if, cfg.ftp),
        max_5min_power: max5,
        vo2max_estimate: vo2max_estimate(max5),
        distance_m: distance_m(samples),
        elevation_gain_m: elevation_gain_m(samples),
        hr_drift_pct: hr_drift_pct(samples),
    }
}
