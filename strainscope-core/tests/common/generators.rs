//! Strain data generators
//!
//! Models the load cases seen on agricultural machinery: a base strain with a
//! sinusoidal load cycle and proportional noise, sampled at a fixed period by a
//! node whose battery drains and whose enclosure warms up over time.

use std::f64::consts::PI;

use strainscope_core::{Reading, SensorConfiguration, Timestamp};

/// Deterministic random number generator for tests
pub struct TestRng {
    state: u32,
}

impl TestRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u32(&mut self) -> u32 {
        // Xorshift
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32() >> 8) / 16_777_216.0
    }

    pub fn gen_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Approximate standard normal (sum of uniforms)
    pub fn gaussian(&mut self) -> f64 {
        (0..12).map(|_| self.next_f64()).sum::<f64>() - 6.0
    }
}

/// Machine load cases, microstrain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadScenario {
    pub base_strain: f64,
    pub amplitude: f64,
    /// Load cycle, Hz
    pub frequency: f64,
    /// Noise standard deviation as a fraction of the signal
    pub noise_level: f64,
}

impl LoadScenario {
    pub fn idle() -> Self {
        Self {
            base_strain: 0.0,
            amplitude: 5.0,
            frequency: 0.1,
            noise_level: 0.05,
        }
    }

    pub fn transport() -> Self {
        Self {
            base_strain: 10.0,
            amplitude: 30.0,
            frequency: 2.0,
            noise_level: 0.1,
        }
    }

    pub fn field_work_heavy() -> Self {
        Self {
            base_strain: 200.0,
            amplitude: 300.0,
            frequency: 3.0,
            noise_level: 0.2,
        }
    }

    pub fn harvest() -> Self {
        Self {
            base_strain: 150.0,
            amplitude: 250.0,
            frequency: 4.0,
            noise_level: 0.18,
        }
    }

    pub fn all() -> Vec<(&'static str, Self)> {
        vec![
            ("idle", Self::idle()),
            ("transport", Self::transport()),
            ("field_work_heavy", Self::field_work_heavy()),
            ("harvest", Self::harvest()),
        ]
    }
}

/// Produces a stream of valid readings for one node
pub struct StrainGenerator {
    node: SensorConfiguration,
    scenario: LoadScenario,
    rng: TestRng,
    time: Timestamp,
    sample: u64,
}

impl StrainGenerator {
    pub fn new(node: SensorConfiguration, scenario: LoadScenario, start: Timestamp, seed: u32) -> Self {
        Self {
            node,
            scenario,
            rng: TestRng::new(seed),
            time: start,
            sample: 0,
        }
    }

    pub fn sensor_id(&self) -> &str {
        &self.node.sensor_id
    }

    /// Next sample, one sampling period after the previous
    pub fn next_reading(&mut self) -> Reading {
        self.time += u64::from(self.node.sampling_rate_ms);
        self.sample += 1;

        let seconds = self.sample as f64 * f64::from(self.node.sampling_rate_ms) / 1000.0;
        let s = &self.scenario;
        let clean = s.base_strain + s.amplitude * (2.0 * PI * s.frequency * seconds).sin();
        let strain = clean + self.rng.gaussian() * s.noise_level * clean.abs();

        // invert the calibration to get the ADC code the node would have sent
        let raw = ((strain - self.node.offset) / self.node.calibration_factor).round() as i32;
        let battery = (100 - (self.sample / 500) as i32).max(5);
        let temperature = (18.0 + seconds / 60.0).min(70.0);

        self.node.reading(self.time, raw, battery, temperature)
    }

    pub fn take(&mut self, n: usize) -> Vec<Reading> {
        (0..n).map(|_| self.next_reading()).collect()
    }
}
