use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Placeholder shown wherever a value is missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// Stage name used when a forecast row has none.
pub const UNKNOWN_STAGE: &str = "Unknown Stage";

/// One of the numeric sensor channels reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Humidity,
    AirTemperature,
    WaterTemperature,
    Tds,
    Ec,
    Lux,
    Ppfd,
    Reflect445,
    Reflect480,
    Ph,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Channel::Humidity,
        Channel::AirTemperature,
        Channel::WaterTemperature,
        Channel::Tds,
        Channel::Ec,
        Channel::Lux,
        Channel::Ppfd,
        Channel::Reflect445,
        Channel::Reflect480,
        Channel::Ph,
    ];

    /// JSON field name on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Channel::Humidity => "humidity",
            Channel::AirTemperature => "temp_envi",
            Channel::WaterTemperature => "temp_water",
            Channel::Tds => "tds",
            Channel::Ec => "ec",
            Channel::Lux => "lux",
            Channel::Ppfd => "ppfd",
            Channel::Reflect445 => "reflect_445",
            Channel::Reflect480 => "reflect_480",
            Channel::Ph => "ph",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Channel::Humidity => "Humidity",
            Channel::AirTemperature => "Air Temperature",
            Channel::WaterTemperature => "Water Temperature",
            Channel::Tds => "TDS",
            Channel::Ec => "Conductivity",
            Channel::Lux => "Lux",
            Channel::Ppfd => "PPFD",
            Channel::Reflect445 => "Reflectance 445nm",
            Channel::Reflect480 => "Reflectance 480nm",
            Channel::Ph => "pH",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Channel::Humidity => "%",
            Channel::AirTemperature | Channel::WaterTemperature => "°C",
            Channel::Tds => "ppm",
            Channel::Ec => "µS/cm",
            Channel::Lux => "lx",
            Channel::Ppfd => "µmol/m²/s",
            Channel::Reflect445 | Channel::Reflect480 => "%",
            Channel::Ph => "",
        }
    }

    pub fn from_key(key: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.key() == key)
    }
}

/// A normalized sensor reading. Identity is the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub humidity: Option<f64>,
    pub temp_envi: Option<f64>,
    pub temp_water: Option<f64>,
    pub tds: Option<f64>,
    pub ec: Option<f64>,
    pub lux: Option<f64>,
    pub ppfd: Option<f64>,
    pub reflect_445: Option<f64>,
    pub reflect_480: Option<f64>,
    pub ph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_status: Option<bool>,
}

impl SensorReading {
    /// A reading with every channel absent.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            humidity: None,
            temp_envi: None,
            temp_water: None,
            tds: None,
            ec: None,
            lux: None,
            ppfd: None,
            reflect_445: None,
            reflect_480: None,
            ph: None,
            pump_status: None,
        }
    }

    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Humidity => self.humidity,
            Channel::AirTemperature => self.temp_envi,
            Channel::WaterTemperature => self.temp_water,
            Channel::Tds => self.tds,
            Channel::Ec => self.ec,
            Channel::Lux => self.lux,
            Channel::Ppfd => self.ppfd,
            Channel::Reflect445 => self.reflect_445,
            Channel::Reflect480 => self.reflect_480,
            Channel::Ph => self.ph,
        }
    }

    pub fn set_value(&mut self, channel: Channel, value: Option<f64>) {
        let slot = match channel {
            Channel::Humidity => &mut self.humidity,
            Channel::AirTemperature => &mut self.temp_envi,
            Channel::WaterTemperature => &mut self.temp_water,
            Channel::Tds => &mut self.tds,
            Channel::Ec => &mut self.ec,
            Channel::Lux => &mut self.lux,
            Channel::Ppfd => &mut self.ppfd,
            Channel::Reflect445 => &mut self.reflect_445,
            Channel::Reflect480 => &mut self.reflect_480,
            Channel::Ph => &mut self.ph,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStatus {
    #[default]
    Normal,
    Warning,
    Critical,
    Optimal,
}

impl GrowthStatus {
    /// Case-insensitive; anything unrecognized is `Normal`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warning" => GrowthStatus::Warning,
            "critical" => GrowthStatus::Critical,
            "optimal" => GrowthStatus::Optimal,
            _ => GrowthStatus::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GrowthStatus::Normal => "normal",
            GrowthStatus::Warning => "warning",
            GrowthStatus::Critical => "critical",
            GrowthStatus::Optimal => "optimal",
        }
    }
}

/// A growth-stage forecast for one day of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub stage_date: NaiveDate,
    pub stage_name: String,
    pub yield_predicted: Option<f64>,
    pub yield_date: Option<NaiveDate>,
    pub status: GrowthStatus,
    pub notes: Option<String>,
    pub batch_start: Option<NaiveDate>,
}

impl PredictionRecord {
    pub fn new(stage_date: NaiveDate, stage_name: impl Into<String>) -> Self {
        Self {
            stage_date,
            stage_name: stage_name.into(),
            yield_predicted: None,
            yield_date: None,
            status: GrowthStatus::Normal,
            notes: None,
            batch_start: None,
        }
    }

    /// Predicted yield in whole heads.
    pub fn rounded_yield(&self) -> Option<i64> {
        self.yield_predicted.map(|y| y.round() as i64)
    }
}

/// Render a channel value with two decimals and its unit, or "N/A".
pub fn format_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if v.is_finite() => {
            if unit.is_empty() {
                format!("{:.2}", v)
            } else {
                format!("{:.2} {}", v, unit)
            }
        }
        _ => NOT_AVAILABLE.to_string(),
    }
}
