use rand::Rng;
use serde::Serialize;

/// Raw ADC count of a sensor in dry soil.
pub const DRY_RAW: i64 = 1024;
/// Raw ADC count of a sensor submerged in water.
pub const WET_RAW: i64 = 420;

/// One soil-moisture reading as a spoke reports it through the hub.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub device_id: String,
    pub raw: i64,
    pub pct: i64,
    pub bat: f64,
}

impl Reading {
    pub fn random(rng: &mut impl Rng, device_id: String) -> Self {
        let raw = if rng.gen_bool(0.05) {
            rng.gen_range(300..1100) // 5% out of calibration range
        } else {
            rng.gen_range(WET_RAW..=DRY_RAW)
        };

        let bat = if rng.gen_bool(0.02) {
            rng.gen_range(3.0..3.3) // 2% low battery
        } else {
            rng.gen_range(3.3..4.2)
        };

        Self {
            device_id,
            raw,
            pct: moisture_pct(raw),
            bat: (bat * 100.0_f64).round() / 100.0,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("device_id", self.device_id.clone()),
            ("raw", self.raw.to_string()),
            ("pct", self.pct.to_string()),
            ("bat", self.bat.to_string()),
        ]
    }
}

/// Maps a raw reading linearly from dry (0%) to wet (100%), clamped.
pub fn moisture_pct(raw: i64) -> i64 {
    let pct = (raw - DRY_RAW) * 100 / (WET_RAW - DRY_RAW);
    pct.clamp(0, 100)
}
