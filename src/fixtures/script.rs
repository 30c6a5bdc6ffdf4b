//! Deterministic vibration scripts.
//!
//! A script is a list of segments (rest or vibration at a given RMS
//! amplitude) plus timed user actions. Readings are synthesised from a
//! seeded RNG so every run of the same script yields the same samples.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::signal::AccelReading;

fn default_interval() -> u64 {
    20
}

fn default_period() -> u64 {
    60
}

fn default_noise() -> f64 {
    0.002
}

/// One stretch of constant vibration character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub duration_ms: u64,
    /// RMS amplitude of the periodic component (in g); 0 for rest
    #[serde(default)]
    pub amplitude: f64,
    #[serde(default = "default_period")]
    pub period_ms: u64,
    /// RMS of the uniform sensor noise added to every axis
    #[serde(default = "default_noise")]
    pub noise: f64,
    #[serde(default)]
    pub label: Option<String>,
}

/// User action injected at a point in the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptAction {
    StartTimer,
    StopTimer,
    ResetTimer,
    Calibrate,
    CancelCalibration,
    Background,
    Foreground,
    SetSensitivity { level: i32 },
    SetHysteresis { percent: u32 },
    SetPreInfusionDelay { delay_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedAction {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationScript {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub actions: Vec<TimedAction>,
}

/// Reading stamped with its offset from the start of the script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedReading {
    pub at_ms: u64,
    pub reading: AccelReading,
}

impl VibrationScript {
    pub fn duration_ms(&self) -> u64 {
        self.segments.iter().map(|s| s.duration_ms).sum()
    }

    /// Segment covering offset `t`, if any.
    pub fn segment_at(&self, t: u64) -> Option<&Segment> {
        let mut end = 0;
        for segment in &self.segments {
            end += segment.duration_ms;
            if t < end {
                return Some(segment);
            }
        }
        None
    }

    /// Actions ordered by time; ties keep their file order.
    pub fn sorted_actions(&self) -> Vec<TimedAction> {
        let mut actions = self.actions.clone();
        actions.sort_by_key(|a| a.at_ms);
        actions
    }

    /// Synthesise the full reading stream.
    pub fn readings(&self) -> Vec<TimedReading> {
        let interval = self.interval_ms.max(1);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut out = Vec::with_capacity((self.duration_ms() / interval) as usize + 1);

        let mut t = 0;
        while let Some(segment) = self.segment_at(t) {
            out.push(TimedReading {
                at_ms: t,
                reading: synthesize(segment, t, &mut rng),
            });
            t += interval;
        }
        out
    }
}

fn uniform_noise(rng: &mut StdRng, rms: f64) -> f64 {
    // Uniform on [-a, a] has RMS a / sqrt(3).
    rng.gen_range(-1.0..=1.0) * rms * 3f64.sqrt()
}

fn synthesize(segment: &Segment, t: u64, rng: &mut StdRng) -> AccelReading {
    let x = uniform_noise(rng, segment.noise);
    let y = uniform_noise(rng, segment.noise);
    let z_noise = uniform_noise(rng, segment.noise);

    let period = segment.period_ms.max(1);
    let phase = 2.0 * PI * (t % period) as f64 / period as f64;
    let wave = segment.amplitude * 2f64.sqrt() * phase.sin();

    AccelReading::new(x, y, 1.0 + wave + z_noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalBuffer;

    fn script(amplitude: f64) -> VibrationScript {
        VibrationScript {
            name: "test".to_string(),
            description: None,
            seed: 3,
            interval_ms: 20,
            segments: vec![Segment {
                duration_ms: 2_000,
                amplitude,
                period_ms: 60,
                noise: 0.0,
                label: None,
            }],
            actions: Vec::new(),
        }
    }

    #[test]
    fn test_reading_count_and_spacing() {
        let readings = script(0.1).readings();
        assert_eq!(readings.len(), 100);
        assert_eq!(readings[1].at_ms - readings[0].at_ms, 20);
        assert_eq!(readings.last().unwrap().at_ms, 1_980);
    }

    #[test]
    fn test_amplitude_is_rms_of_magnitude() {
        let mut buffer = SignalBuffer::new(50);
        for r in script(0.1).readings() {
            buffer.push(r.reading.magnitude());
        }
        assert!((buffer.std_dev() - 0.1).abs() < 0.005, "{}", buffer.std_dev());
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut s = script(0.05);
        s.segments[0].noise = 0.01;
        assert_eq!(s.readings(), s.readings());

        let mut other = s.clone();
        other.seed = 4;
        assert_ne!(s.readings(), other.readings());
    }

    #[test]
    fn test_action_json_shape() {
        let json = r#"{"at_ms": 500, "kind": "set_pre_infusion_delay", "delay_ms": 8000}"#;
        let action: TimedAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.at_ms, 500);
        assert_eq!(
            action.action,
            ScriptAction::SetPreInfusionDelay { delay_ms: 8_000 }
        );
    }

    #[test]
    fn test_segment_defaults() {
        let segment: Segment = serde_json::from_str(r#"{"duration_ms": 100}"#).unwrap();
        assert_eq!(segment.amplitude, 0.0);
        assert_eq!(segment.period_ms, 60);
        assert_eq!(segment.noise, 0.002);
    }
}
