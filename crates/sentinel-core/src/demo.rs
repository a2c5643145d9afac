// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Sentinel.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Offline simulator: a fixed set of demo entities with randomized readings,
//! plus a declarative table describing how actuator commands move related
//! sensors.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sentinel_api::{Actuator, ActuatorValue, DataType, Sample, Sensor};
use serde::{Deserialize, Serialize};

use crate::store::Snapshot;

/// Which sensors a coupling rule touches. A sensor matches when its unit is
/// listed or its name contains one of the keywords (case-insensitive).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorMatch {
    #[serde(default)]
    pub units: Vec<String>,
    #[serde(default)]
    pub name_keywords: Vec<String>,
}

impl SensorMatch {
    pub fn matches(&self, sensor: &Sensor) -> bool {
        let name = sensor.name.to_lowercase();
        self.units.iter().any(|u| *u == sensor.unit)
            || self.name_keywords.iter().any(|k| name.contains(k.as_str()))
    }
}

/// How a matching sensor reacts to an actuator command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Add `on`/`off` for switches, `value * numeric_factor` for set-points,
    /// plus uniform jitter in `±jitter`, clamped at `floor` when set.
    Shift {
        on: f64,
        off: f64,
        #[serde(default)]
        numeric_factor: f64,
        #[serde(default)]
        jitter: f64,
        #[serde(default)]
        floor: Option<f64>,
    },
    /// Replace the reading with `high` with `probability`, `low` otherwise
    Randomize {
        probability: f64,
        #[serde(default = "default_high")]
        high: f64,
        #[serde(default)]
        low: f64,
    },
}

fn default_high() -> f64 {
    1.0
}

impl Effect {
    fn apply(&self, current: f64, command: ActuatorValue, rng: &mut impl Rng) -> f64 {
        match *self {
            Self::Shift {
                on,
                off,
                numeric_factor,
                jitter,
                floor,
            } => {
                let delta = match command {
                    ActuatorValue::Bool(true) => on,
                    ActuatorValue::Bool(false) => off,
                    ActuatorValue::Number(n) => n * numeric_factor,
                };
                let jitter = jitter.abs();
                let value = current + delta + rng.gen_range(-jitter..=jitter);
                floor.map_or(value, |f| value.max(f))
            }
            Self::Randomize {
                probability,
                high,
                low,
            } => {
                if rng.gen_bool(probability.clamp(0.0, 1.0)) {
                    high
                } else {
                    low
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingRule {
    pub name: String,
    pub sensors: SensorMatch,
    /// Actuator name keywords; empty means any actuator
    #[serde(default)]
    pub actuator_keywords: Vec<String>,
    pub effect: Effect,
}

impl CouplingRule {
    fn applies_to(&self, actuator: &Actuator) -> bool {
        let name = actuator.name.to_lowercase();
        self.actuator_keywords.is_empty()
            || self
                .actuator_keywords
                .iter()
                .any(|k| name.contains(k.as_str()))
    }
}

/// Ordered coupling rules. When several rules match a sensor the last one wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingTable {
    pub rules: Vec<CouplingRule>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

impl Default for CouplingTable {
    fn default() -> Self {
        Self {
            rules: vec![
                CouplingRule {
                    name: "power".to_owned(),
                    sensors: SensorMatch {
                        units: strings(&["W", "A"]),
                        name_keywords: strings(&["power", "current"]),
                    },
                    actuator_keywords: vec![],
                    effect: Effect::Shift {
                        on: 100.0,
                        off: -100.0,
                        numeric_factor: 10.0,
                        jitter: 10.0,
                        floor: Some(0.0),
                    },
                },
                CouplingRule {
                    name: "temperature".to_owned(),
                    sensors: SensorMatch {
                        units: strings(&["°F", "°C"]),
                        name_keywords: strings(&["temp"]),
                    },
                    actuator_keywords: strings(&["hvac", "thermostat", "heat", "cool"]),
                    effect: Effect::Shift {
                        on: -2.0,
                        off: 2.0,
                        numeric_factor: 0.0,
                        jitter: 0.25,
                        floor: None,
                    },
                },
                CouplingRule {
                    name: "light".to_owned(),
                    sensors: SensorMatch {
                        units: strings(&["lux"]),
                        name_keywords: strings(&["light"]),
                    },
                    actuator_keywords: strings(&["light"]),
                    effect: Effect::Shift {
                        on: 300.0,
                        off: -300.0,
                        numeric_factor: 0.0,
                        jitter: 25.0,
                        floor: Some(0.0),
                    },
                },
                CouplingRule {
                    name: "presence".to_owned(),
                    sensors: SensorMatch {
                        units: vec![],
                        name_keywords: strings(&["motion", "pressure"]),
                    },
                    actuator_keywords: vec![],
                    effect: Effect::Randomize {
                        probability: 0.3,
                        high: 1.0,
                        low: 0.0,
                    },
                },
            ],
        }
    }
}

impl CouplingTable {
    /// Move sensors in response to `actuator` now being in its current state.
    /// Every sensor with a reading gets a fresh timestamp.
    pub fn apply(&self, sensors: &mut [Sensor], actuator: &Actuator, now: f64, rng: &mut impl Rng) {
        let rules: Vec<&CouplingRule> = self
            .rules
            .iter()
            .filter(|r| r.applies_to(actuator))
            .collect();

        for sensor in sensors.iter_mut() {
            let Some(sample) = sensor.last_sample else {
                continue;
            };

            let value = rules
                .iter()
                .filter(|r| r.sensors.matches(sensor))
                .last()
                .map_or(sample.value, |rule| {
                    rule.effect.apply(sample.value, actuator.state, rng)
                });

            sensor.last_sample = Some(Sample {
                timestamp: now,
                value,
            });
        }
    }
}

/// Demo entity with the range its readings are drawn from
struct DemoSensor {
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    base: f64,
    spread: f64,
}

const DEMO_SENSORS: &[DemoSensor] = &[
    DemoSensor { id: "demo-temp-1", name: "Room Temperature", unit: "°F", base: 68.0, spread: 6.0 },
    DemoSensor { id: "demo-temp-2", name: "Outdoor Temperature", unit: "°F", base: 55.0, spread: 15.0 },
    DemoSensor { id: "demo-humidity", name: "Humidity", unit: "%", base: 45.0, spread: 30.0 },
    DemoSensor { id: "demo-power-1", name: "Power Consumption", unit: "W", base: 350.0, spread: 200.0 },
    DemoSensor { id: "demo-power-2", name: "HVAC Power", unit: "W", base: 800.0, spread: 400.0 },
    DemoSensor { id: "demo-co2", name: "CO2 Level", unit: "ppm", base: 400.0, spread: 200.0 },
    DemoSensor { id: "demo-light", name: "Light Level", unit: "lux", base: 200.0, spread: 500.0 },
    DemoSensor { id: "demo-voltage", name: "Grid Voltage", unit: "V", base: 118.0, spread: 4.0 },
];

/// (id, name, probability of starting ON)
const DEMO_ACTUATORS: &[(&str, &str, f64)] = &[
    ("demo-hvac", "HVAC System", 0.5),
    ("demo-lights", "Office Lights", 0.7),
    ("demo-fan", "Ventilation Fan", 0.4),
];

pub const DEMO_ID_PREFIX: &str = "demo-";

pub struct DemoSimulator {
    coupling: CouplingTable,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for DemoSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoSimulator")
            .field("rules", &self.coupling.rules.len())
            .finish_non_exhaustive()
    }
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

impl DemoSimulator {
    pub fn new(coupling: CouplingTable) -> Self {
        Self {
            coupling,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic simulator for tests
    pub fn seeded(coupling: CouplingTable, seed: u64) -> Self {
        Self {
            coupling,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn coupling(&self) -> &CouplingTable {
        &self.coupling
    }

    /// Whether `snapshot` already holds the simulated entities
    pub fn is_demo_snapshot(snapshot: &Snapshot) -> bool {
        !snapshot.sensors.is_empty()
            && snapshot
                .sensors
                .iter()
                .all(|s| s.id.starts_with(DEMO_ID_PREFIX))
    }

    fn draw(rng: &mut StdRng, template: &DemoSensor) -> f64 {
        template.base + rng.gen_range(0.0..=template.spread)
    }

    /// Fresh demo snapshot with randomized readings and actuator states
    pub fn seed_snapshot(&self) -> Snapshot {
        let mut rng = self.rng.lock();
        let now = now_secs();

        let sensors = DEMO_SENSORS
            .iter()
            .map(|template| Sensor {
                id: template.id.to_owned(),
                name: template.name.to_owned(),
                unit: template.unit.to_owned(),
                data_type: DataType::Number,
                last_sample: Some(Sample {
                    timestamp: now,
                    value: Self::draw(&mut rng, template),
                }),
            })
            .collect();

        let actuators = DEMO_ACTUATORS
            .iter()
            .map(|(id, name, p_on)| Actuator {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
                unit: "on/off".to_owned(),
                data_type: DataType::Boolean,
                state: ActuatorValue::Bool(rng.gen_bool(*p_on)),
            })
            .collect();

        Snapshot { sensors, actuators }
    }

    /// Redraw demo sensor readings, leaving actuators alone
    pub fn refresh_readings(&self, snapshot: &mut Snapshot) {
        let mut rng = self.rng.lock();
        let now = now_secs();

        for sensor in &mut snapshot.sensors {
            if let Some(template) = DEMO_SENSORS.iter().find(|template| template.id == sensor.id) {
                sensor.last_sample = Some(Sample {
                    timestamp: now,
                    value: Self::draw(&mut rng, template),
                });
            }
        }
    }

    /// Propagate a manual actuator change to related sensors
    pub fn apply_command(&self, snapshot: &mut Snapshot, actuator: &Actuator) {
        let mut rng = self.rng.lock();
        self.coupling
            .apply(&mut snapshot.sensors, actuator, now_secs(), &mut *rng);
    }

    /// Run `f` with the simulator's random source
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        f(&mut self.rng.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(name: &str, unit: &str, value: f64) -> Sensor {
        Sensor {
            id: name.to_lowercase(),
            name: name.to_owned(),
            unit: unit.to_owned(),
            data_type: DataType::Number,
            last_sample: Some(Sample {
                timestamp: 0.0,
                value,
            }),
        }
    }

    fn actuator(name: &str, state: ActuatorValue) -> Actuator {
        Actuator {
            id: name.to_lowercase(),
            name: name.to_owned(),
            unit: "on/off".to_owned(),
            data_type: DataType::Boolean,
            state,
        }
    }

    #[test]
    fn test_seed_snapshot_shape() {
        let sim = DemoSimulator::seeded(CouplingTable::default(), 7);
        let snapshot = sim.seed_snapshot();

        assert_eq!(snapshot.sensors.len(), 8);
        assert_eq!(snapshot.actuators.len(), 3);
        assert!(DemoSimulator::is_demo_snapshot(&snapshot));

        let temp = snapshot.sensor("demo-temp-1").unwrap();
        let value = temp.last_sample.unwrap().value;
        assert!((68.0..=74.0).contains(&value));
    }

    #[test]
    fn test_refresh_keeps_actuators() {
        let sim = DemoSimulator::seeded(CouplingTable::default(), 1);
        let mut snapshot = sim.seed_snapshot();
        let actuators = snapshot.actuators.clone();

        sim.refresh_readings(&mut snapshot);
        assert_eq!(snapshot.actuators, actuators);
    }

    #[test]
    fn test_hvac_on_cools_and_draws_power() {
        let table = CouplingTable::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut sensors = vec![
            sensor("Room Temperature", "°F", 70.0),
            sensor("HVAC Power", "W", 500.0),
            sensor("Humidity", "%", 40.0),
        ];

        table.apply(
            &mut sensors,
            &actuator("HVAC System", ActuatorValue::Bool(true)),
            100.0,
            &mut rng,
        );

        let temp = sensors[0].last_sample.unwrap();
        assert!((temp.value - 68.0).abs() <= 0.25);
        assert!((temp.timestamp - 100.0).abs() < f64::EPSILON);
        assert!((sensors[1].last_sample.unwrap().value - 600.0).abs() <= 10.0);
        assert!((sensors[2].last_sample.unwrap().value - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fan_does_not_touch_temperature() {
        let table = CouplingTable::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut sensors = vec![sensor("Room Temperature", "°F", 70.0)];

        table.apply(
            &mut sensors,
            &actuator("Ventilation Fan", ActuatorValue::Bool(true)),
            1.0,
            &mut rng,
        );
        assert!((sensors[0].last_sample.unwrap().value - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_power_floor_and_numeric_factor() {
        let table = CouplingTable::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut sensors = vec![sensor("Main Power", "W", 20.0)];

        table.apply(
            &mut sensors,
            &actuator("Lights", ActuatorValue::Bool(false)),
            1.0,
            &mut rng,
        );
        assert!(sensors[0].last_sample.unwrap().value.abs() < f64::EPSILON);

        let mut sensors = vec![sensor("Main Power", "W", 100.0)];
        table.apply(
            &mut sensors,
            &actuator("Dimmer", ActuatorValue::Number(5.0)),
            1.0,
            &mut rng,
        );
        assert!((sensors[0].last_sample.unwrap().value - 150.0).abs() <= 10.0);
    }

    #[test]
    fn test_presence_is_binary() {
        let table = CouplingTable::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let mut sensors = vec![sensor("Motion Detector", "", 0.5)];
            table.apply(
                &mut sensors,
                &actuator("Fan", ActuatorValue::Bool(true)),
                1.0,
                &mut rng,
            );
            let value = sensors[0].last_sample.unwrap().value;
            assert!(value == 0.0 || value == 1.0);
        }
    }

    #[test]
    fn test_table_from_json() {
        let table: CouplingTable = serde_json::from_value(serde_json::json!({
            "rules": [{
                "name": "pump",
                "sensors": {"name_keywords": ["flow"]},
                "actuator_keywords": ["pump"],
                "effect": {"type": "shift", "on": 5.0, "off": -5.0}
            }]
        }))
        .unwrap();

        assert_eq!(table.rules.len(), 1);
        assert!(matches!(
            table.rules[0].effect,
            Effect::Shift { jitter, floor: None, .. } if jitter == 0.0
        ));
    }
}
