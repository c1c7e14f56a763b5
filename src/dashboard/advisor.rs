use crate::dashboard::models::{format_value, Channel, SensorReading};
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::Serialize;

pub const NO_ACTION_MESSAGE: &str = "All monitored readings are within range. No action needed.";

/// Pump runs during these local hours unless the controller reports otherwise.
pub const PUMP_ON_HOURS: std::ops::Range<u32> = 6..18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

/// Acceptable range for one channel and what to tell the grower.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub channel: Channel,
    pub min: f64,
    pub max: f64,
    pub low_message: String,
    pub high_message: String,
    pub normal_message: String,
    /// Severity of an out-of-range value on this channel.
    pub severity: Severity,
}

impl ThresholdRule {
    pub fn new(channel: Channel, min: f64, max: f64, severity: Severity) -> Self {
        Self {
            channel,
            min,
            max,
            low_message: format!("{} too low", channel.label()),
            high_message: format!("{} too high", channel.label()),
            normal_message: format!("{} normal", channel.label()),
            severity,
        }
    }

    pub fn messages(mut self, low: &str, high: &str, normal: &str) -> Self {
        self.low_message = low.to_string();
        self.high_message = high.to_string();
        self.normal_message = normal.to_string();
        self
    }
}

/// Water-tank thresholds for hydroponic lettuce.
pub fn default_rules() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule::new(Channel::Tds, 600.0, 800.0, Severity::Critical).messages(
            "Replace nutrient solution",
            "Replace nutrient solution",
            "TDS level normal",
        ),
        ThresholdRule::new(Channel::Ph, 5.8, 6.5, Severity::Critical).messages(
            "Add base solution",
            "Add acid solution",
            "pH level normal",
        ),
        ThresholdRule::new(Channel::WaterTemperature, 18.0, 33.0, Severity::Warning).messages(
            "Adjust water temperature",
            "Adjust water temperature",
            "Temperature normal",
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    NoData,
    Low,
    High,
    Normal,
}

/// Status card for one monitored channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAssessment {
    pub channel: Channel,
    pub value: Option<f64>,
    pub display: String,
    pub status: ChannelStatus,
    pub message: String,
}

pub fn assess(rule: &ThresholdRule, reading: Option<&SensorReading>) -> ChannelAssessment {
    let value = reading.and_then(|r| r.value(rule.channel));
    let (status, message) = match value {
        None => (ChannelStatus::NoData, "No data".to_string()),
        Some(v) if v < rule.min => (ChannelStatus::Low, rule.low_message.clone()),
        Some(v) if v > rule.max => (ChannelStatus::High, rule.high_message.clone()),
        Some(_) => (ChannelStatus::Normal, rule.normal_message.clone()),
    };

    ChannelAssessment {
        channel: rule.channel,
        value,
        display: format_value(value, rule.channel.unit()),
        status,
        message,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub channel: Option<Channel>,
    pub severity: Severity,
    pub message: String,
}

/// One advisory per out-of-range channel, or a single "normal" advisory when
/// nothing needs attention. Never empty.
pub fn recommendations(reading: Option<&SensorReading>, rules: &[ThresholdRule]) -> Vec<Advisory> {
    let mut advisories: Vec<Advisory> = rules
        .iter()
        .map(|rule| (rule, assess(rule, reading)))
        .filter_map(|(rule, assessment)| {
            let direction = match assessment.status {
                ChannelStatus::Low => "too low",
                ChannelStatus::High => "too high",
                ChannelStatus::Normal | ChannelStatus::NoData => return None,
            };
            Some(Advisory {
                channel: Some(rule.channel),
                severity: rule.severity,
                message: format!(
                    "{} {} ({}): {}",
                    rule.channel.label(),
                    direction,
                    assessment.display,
                    assessment.message
                ),
            })
        })
        .collect();

    if advisories.is_empty() {
        advisories.push(Advisory {
            channel: None,
            severity: Severity::Normal,
            message: NO_ACTION_MESSAGE.to_string(),
        });
    }

    advisories.sort_by(|a, b| b.severity.cmp(&a.severity));
    advisories
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PumpState {
    On,
    Off,
}

/// Reported pump state if present, else the fixed daytime schedule.
pub fn pump_status(
    reading: Option<&SensorReading>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> PumpState {
    if let Some(reported) = reading.and_then(|r| r.pump_status) {
        return if reported { PumpState::On } else { PumpState::Off };
    }

    if PUMP_ON_HOURS.contains(&now.with_timezone(&offset).hour()) {
        PumpState::On
    } else {
        PumpState::Off
    }
}
