//! # Metrics Engine
//!
//! Derives flight summary metrics from filtered telemetry signals.
//!
//! ## Rules
//!
//! Rules run in a fixed order. Every label is consumed by at most one rule;
//! whatever is left unconsumed is returned as the residual map.
//!
//! | # | Consumes | Records |
//! |---|----------|---------|
//! | 1 | first of `gps_altitude`, `altitude`, `absolute_altitude_mm`, `relative_altitude_m` (+ `gps_time`) | peak altitude under the same name |
//! | 2 | first of `battery_temp`, `battery_temperature` | `max_battery_temp`, `min_battery_temp` |
//! | 3 | `flight_time` | `flight_time` |
//! | 4 | `start_time_unix` | `flight_duration_us` |
//! | 5 | `gps_loss_reason`, `gps_status`, `gps_fix_type` | `gps_loss_reasons`, `gps_status_list`, `gps_fix_type` |
//! | 6 | `rc_downlink_signal`, `rc_uplink_signal`, `rc_signal_strength` | same names |
//! | 7 | `msg_messages`, `msg_time`, `status_texts` | `critical_errors`, `error_times`, `status_texts` |
//!
//! Consumption is tracked in a [`ConsumedSet`] bitmap; the input map is never
//! mutated.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::filter::FilteredMap;
use super::labels::CanonicalLabel;

/// Altitude candidates in precedence order
pub const ALTITUDE_PRECEDENCE: [CanonicalLabel; 4] = [
    CanonicalLabel::GpsAltitude,
    CanonicalLabel::Altitude,
    CanonicalLabel::AbsoluteAltitudeMm,
    CanonicalLabel::RelativeAltitudeM,
];

/// Battery temperature candidates in precedence order
pub const BATTERY_TEMP_PRECEDENCE: [CanonicalLabel; 2] = [
    CanonicalLabel::BatteryTemp,
    CanonicalLabel::BatteryTemperature,
];

/// Millimeters per meter (MAVLink `GLOBAL_POSITION_INT.alt` is in mm)
pub const MM_PER_M: f64 = 1000.0;

/// Name of a derived metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    GpsAltitude,
    Altitude,
    AbsoluteAltitudeMm,
    RelativeAltitudeM,
    MaxBatteryTemp,
    MinBatteryTemp,
    /// Duration as reported by the log, unit depends on dialect
    FlightTime,
    /// Last minus first `SYSTEM_TIME` sample, in microseconds
    FlightDurationUs,
    GpsLossReasons,
    GpsStatusList,
    GpsFixType,
    RcDownlinkSignal,
    RcUplinkSignal,
    RcSignalStrength,
    CriticalErrors,
    ErrorTimes,
    StatusTexts,
}

impl MetricName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GpsAltitude => "gps_altitude",
            Self::Altitude => "altitude",
            Self::AbsoluteAltitudeMm => "absolute_altitude_mm",
            Self::RelativeAltitudeM => "relative_altitude_m",
            Self::MaxBatteryTemp => "max_battery_temp",
            Self::MinBatteryTemp => "min_battery_temp",
            Self::FlightTime => "flight_time",
            Self::FlightDurationUs => "flight_duration_us",
            Self::GpsLossReasons => "gps_loss_reasons",
            Self::GpsStatusList => "gps_status_list",
            Self::GpsFixType => "gps_fix_type",
            Self::RcDownlinkSignal => "rc_downlink_signal",
            Self::RcUplinkSignal => "rc_uplink_signal",
            Self::RcSignalStrength => "rc_signal_strength",
            Self::CriticalErrors => "critical_errors",
            Self::ErrorTimes => "error_times",
            Self::StatusTexts => "status_texts",
        }
    }

    /// Peak-altitude metric recorded for an altitude candidate
    fn for_altitude(label: CanonicalLabel) -> Option<Self> {
        match label {
            CanonicalLabel::GpsAltitude => Some(Self::GpsAltitude),
            CanonicalLabel::Altitude => Some(Self::Altitude),
            CanonicalLabel::AbsoluteAltitudeMm => Some(Self::AbsoluteAltitudeMm),
            CanonicalLabel::RelativeAltitudeM => Some(Self::RelativeAltitudeM),
            _ => None,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived metrics keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsMap {
    entries: BTreeMap<MetricName, Value>,
}

impl MetricsMap {
    pub fn get(&self, name: MetricName) -> Option<&Value> {
        self.entries.get(&name)
    }

    pub fn contains(&self, name: MetricName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, name: MetricName, value: Value) {
        self.entries.insert(name, value);
    }
}

/// Bitmap of consumed labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumedSet(u32);

impl ConsumedSet {
    /// Mark a label consumed, returns false if it already was
    pub fn insert(&mut self, label: CanonicalLabel) -> bool {
        let bit = 1u32 << label.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn contains(&self, label: CanonicalLabel) -> bool {
        self.0 & (1u32 << label.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Consumed labels in table order
    pub fn labels(&self) -> impl Iterator<Item = CanonicalLabel> + '_ {
        CanonicalLabel::ALL
            .into_iter()
            .filter(move |label| self.contains(*label))
    }
}

/// Result of metric derivation
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    /// Derived metrics
    pub metrics: MetricsMap,
    /// Filtered signals no rule consumed
    pub residual: FilteredMap,
    /// Labels consumed by firing rules
    pub consumed: ConsumedSet,
}

impl Derived {
    /// Split into `(metrics, residual)`
    pub fn into_parts(self) -> (MetricsMap, FilteredMap) {
        (self.metrics, self.residual)
    }
}

/// Working state for a single derivation pass
struct Derivation<'a> {
    filtered: &'a FilteredMap,
    consumed: ConsumedSet,
    metrics: MetricsMap,
}

impl<'a> Derivation<'a> {
    fn new(filtered: &'a FilteredMap) -> Self {
        Self {
            filtered,
            consumed: ConsumedSet::default(),
            metrics: MetricsMap::default(),
        }
    }

    /// Consume a label if present and not yet consumed
    fn take(&mut self, label: CanonicalLabel) -> Option<&'a Value> {
        if self.consumed.contains(label) {
            return None;
        }
        let value = self.filtered.get(label)?;
        self.consumed.insert(label);
        Some(value)
    }

    /// Consume the first present candidate
    fn take_first(&mut self, candidates: &[CanonicalLabel]) -> Option<(CanonicalLabel, &'a Value)> {
        candidates
            .iter()
            .find(|label| self.filtered.contains(**label) && !self.consumed.contains(**label))
            .and_then(|&label| self.take(label).map(|value| (label, value)))
    }

    fn passthrough(&mut self, label: CanonicalLabel, name: MetricName) {
        if let Some(value) = self.take(label) {
            self.metrics.record(name, value.clone());
        }
    }

    fn altitude(&mut self) {
        let Some((label, value)) = self.take_first(&ALTITUDE_PRECEDENCE) else {
            return;
        };

        // Peak timestamp is not reported; the paired series is dropped.
        let _ = self.take(CanonicalLabel::GpsTime);

        let Some(name) = MetricName::for_altitude(label) else {
            return;
        };
        if let Some(peak) = extremum(label, value, Extremum::Max) {
            let peak = if label == CanonicalLabel::AbsoluteAltitudeMm {
                peak.as_f64().map_or(Value::Null, |mm| Value::from(mm / MM_PER_M))
            } else {
                peak.clone()
            };
            self.metrics.record(name, peak);
        }
    }

    fn battery_temperature(&mut self) {
        let Some((label, value)) = self.take_first(&BATTERY_TEMP_PRECEDENCE) else {
            return;
        };
        let max = extremum(label, value, Extremum::Max);
        let min = extremum(label, value, Extremum::Min);
        if let (Some(max), Some(min)) = (max, min) {
            self.metrics.record(MetricName::MaxBatteryTemp, max.clone());
            self.metrics.record(MetricName::MinBatteryTemp, min.clone());
        }
    }

    fn epoch_duration(&mut self) {
        let Some(value) = self.take(CanonicalLabel::StartTimeUnix) else {
            return;
        };
        let series = samples(value);
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return;
        };
        match (timestamp_of(first), timestamp_of(last)) {
            (Some(start), Some(end)) => {
                if let Some(delta) = subtract(end, start) {
                    self.metrics.record(MetricName::FlightDurationUs, delta);
                }
            }
            _ => warn!("start_time_unix samples carry no numeric timestamp, skipping"),
        }
    }

    fn finish(self) -> Derived {
        let residual = self
            .filtered
            .iter()
            .filter(|(label, _)| !self.consumed.contains(*label))
            .map(|(label, value)| (label, value.clone()))
            .collect();

        Derived {
            metrics: self.metrics,
            residual,
            consumed: self.consumed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Max,
    Min,
}

/// Treat a signal as a sample sequence; `null` is empty, a bare value is one sample
fn samples(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    }
}

/// Integer view of a sample, exact across the whole i64/u64 range
fn as_integer(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

/// Order two numeric samples, exactly when both are integers
fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

/// Largest or smallest numeric sample; the first one wins on ties
fn extremum<'v>(label: CanonicalLabel, value: &'v Value, which: Extremum) -> Option<&'v Value> {
    let wanted = match which {
        Extremum::Max => Ordering::Greater,
        Extremum::Min => Ordering::Less,
    };
    let mut best: Option<&Value> = None;
    let mut skipped = 0usize;

    for sample in samples(value) {
        if !sample.is_number() {
            skipped += 1;
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => compare_numbers(sample, current) == Some(wanted),
        };
        if better {
            best = Some(sample);
        }
    }

    if skipped > 0 && which == Extremum::Max {
        warn!("{}: ignored {} non-numeric samples", label, skipped);
    }
    best
}

/// Timestamp of a time-series sample: first element of a tuple, or the sample itself
fn timestamp_of(sample: &Value) -> Option<&Value> {
    let ts = match sample {
        Value::Array(fields) => fields.first()?,
        other => other,
    };
    ts.is_number().then_some(ts)
}

/// `end - start`, staying integral when both sides are
fn subtract(end: &Value, start: &Value) -> Option<Value> {
    if let (Some(e), Some(s)) = (as_integer(end), as_integer(start)) {
        let delta = e - s;
        if let Ok(delta) = i64::try_from(delta) {
            return Some(Value::from(delta));
        }
        if let Ok(delta) = u64::try_from(delta) {
            return Some(Value::from(delta));
        }
    }
    let delta = end.as_f64()? - start.as_f64()?;
    Some(Value::from(delta))
}

/// Derive summary metrics from filtered signals
///
/// # Arguments
///
/// * `filtered` - Output of [`filter`](super::filter::filter); left untouched
///
/// # Returns
///
/// * `Derived` - Metrics, the residual map of unconsumed signals, and the
///   consumed label set
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uav_log_analyst::telemetry::filter::FilteredMap;
/// use uav_log_analyst::telemetry::labels::CanonicalLabel;
/// use uav_log_analyst::telemetry::metrics::{derive, MetricName};
///
/// let mut filtered = FilteredMap::new();
/// filtered.insert(CanonicalLabel::AbsoluteAltitudeMm, json!([5000, 12000]));
///
/// let derived = derive(&filtered);
/// assert_eq!(derived.metrics.get(MetricName::AbsoluteAltitudeMm), Some(&json!(12.0)));
/// assert!(derived.residual.is_empty());
/// ```
pub fn derive(filtered: &FilteredMap) -> Derived {
    let mut pass = Derivation::new(filtered);

    pass.altitude();
    pass.battery_temperature();
    pass.passthrough(CanonicalLabel::FlightTime, MetricName::FlightTime);
    pass.epoch_duration();

    pass.passthrough(CanonicalLabel::GpsLossReason, MetricName::GpsLossReasons);
    pass.passthrough(CanonicalLabel::GpsStatus, MetricName::GpsStatusList);
    pass.passthrough(CanonicalLabel::GpsFixType, MetricName::GpsFixType);

    pass.passthrough(CanonicalLabel::RcDownlinkSignal, MetricName::RcDownlinkSignal);
    pass.passthrough(CanonicalLabel::RcUplinkSignal, MetricName::RcUplinkSignal);
    pass.passthrough(CanonicalLabel::RcSignalStrength, MetricName::RcSignalStrength);

    pass.passthrough(CanonicalLabel::MsgMessages, MetricName::CriticalErrors);
    pass.passthrough(CanonicalLabel::MsgTime, MetricName::ErrorTimes);
    pass.passthrough(CanonicalLabel::StatusTexts, MetricName::StatusTexts);

    let derived = pass.finish();
    debug!(
        "Derived {} metrics, consumed {} labels, {} residual",
        derived.metrics.len(),
        derived.consumed.len(),
        derived.residual.len()
    );
    derived
}
