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

//! Unit inference for entities that arrive without one, and conversion of
//! upstream readings into the display scale.

use sentinel_api::{DataType, Sample, Sensor};

use crate::config::TemperatureScale;

/// Name keyword → unit, checked in order
const NAME_UNITS: &[(&[&str], &str)] = &[
    (&["power", "watt"], "W"),
    (&["voltage", "volt"], "V"),
    (&["current", "amp"], "A"),
    (&["energy", "kwh"], "kWh"),
    (&["humidity"], "%"),
    (&["light", "lux"], "lux"),
    (&["co2", "carbon"], "ppm"),
];

/// Guess a unit from the sensor name, falling back to the data type
pub fn infer_unit(name: &str, data_type: DataType, scale: TemperatureScale) -> String {
    let name = name.to_lowercase();

    if name.contains("temp") {
        return scale.symbol().to_owned();
    }

    for (keywords, unit) in NAME_UNITS {
        if keywords.iter().any(|k| name.contains(k)) {
            return (*unit).to_owned();
        }
    }

    match data_type {
        DataType::Float | DataType::Int | DataType::Number => "units".to_owned(),
        DataType::Boolean | DataType::Other => data_type.as_str().to_owned(),
    }
}

pub fn is_temperature(name: &str, unit: &str) -> bool {
    matches!(unit.trim(), "°F" | "°C" | "F" | "C") || name.to_lowercase().contains("temp")
}

/// Convert an upstream reading for display
pub fn to_display(value: f64, name: &str, unit: &str, scale: TemperatureScale) -> f64 {
    if is_temperature(name, unit) {
        scale.convert_celsius(value)
    } else {
        value
    }
}

pub fn sample_to_display(sample: Sample, sensor: &Sensor, scale: TemperatureScale) -> Sample {
    Sample {
        value: to_display(sample.value, &sensor.name, &sensor.unit, scale),
        ..sample
    }
}

/// Bring a freshly listed sensor into display form: unit filled in,
/// temperature unit set to the display scale, embedded sample converted.
pub fn normalize_sensor(mut sensor: Sensor, scale: TemperatureScale) -> Sensor {
    if let Some(sample) = sensor.last_sample {
        sensor.last_sample = Some(sample_to_display(sample, &sensor, scale));
    }

    if is_temperature(&sensor.name, &sensor.unit) {
        scale.symbol().clone_into(&mut sensor.unit);
    } else if sensor.unit.trim().is_empty() {
        sensor.unit = infer_unit(&sensor.name, sensor.data_type, scale);
    }

    sensor
}

pub fn actuator_unit(data_type: DataType) -> &'static str {
    if data_type.is_boolean() { "on/off" } else { "value" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_unit_from_name() {
        let f = TemperatureScale::Fahrenheit;
        assert_eq!(infer_unit("Room Temperature", DataType::Float, f), "°F");
        assert_eq!(
            infer_unit("Room Temperature", DataType::Float, TemperatureScale::Celsius),
            "°C"
        );
        assert_eq!(infer_unit("Main Power", DataType::Float, f), "W");
        assert_eq!(infer_unit("Grid Voltage", DataType::Float, f), "V");
        assert_eq!(infer_unit("Pump Current", DataType::Float, f), "A");
        assert_eq!(infer_unit("Daily Energy", DataType::Float, f), "kWh");
        assert_eq!(infer_unit("Humidity", DataType::Int, f), "%");
        assert_eq!(infer_unit("Light Level", DataType::Int, f), "lux");
        assert_eq!(infer_unit("CO2", DataType::Int, f), "ppm");
        assert_eq!(infer_unit("Counter", DataType::Int, f), "units");
        assert_eq!(infer_unit("Door", DataType::Boolean, f), "BOOLEAN");
    }

    #[test]
    fn test_normalize_converts_temperature() {
        let sensor = Sensor {
            id: "1".to_owned(),
            name: "Room Temperature".to_owned(),
            unit: String::new(),
            data_type: DataType::Float,
            last_sample: Some(Sample {
                timestamp: 10.0,
                value: 20.0,
            }),
        };

        let sensor = normalize_sensor(sensor, TemperatureScale::Fahrenheit);
        assert_eq!(sensor.unit, "°F");
        assert!((sensor.last_sample.unwrap().value - 68.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_keeps_upstream_unit() {
        let sensor = Sensor {
            id: "2".to_owned(),
            name: "Main Power".to_owned(),
            unit: "kW".to_owned(),
            data_type: DataType::Float,
            last_sample: None,
        };

        assert_eq!(normalize_sensor(sensor, TemperatureScale::Fahrenheit).unit, "kW");
    }
}
