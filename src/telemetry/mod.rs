//! # Telemetry Module
//!
//! Extraction and metrics pipeline for decoded flight logs.
//!
//! This module handles:
//! - Flattening nested telemetry into `"<category>.<field>"` keys
//! - Filtering to a fixed whitelist of canonical signals
//! - Deriving summary metrics (altitude, battery temperature, flight time,
//!   GPS/RC signal indicators, error timelines)
//!
//! Every stage is pure and synchronous; concurrent calls share no state.

pub mod filter;
pub mod flatten;
pub mod labels;
pub mod metrics;

use serde::Serialize;
use serde_json::{Map, Value};

use filter::FilteredMap;
use metrics::MetricsMap;

/// Decoded flight log: category name to payload
pub type RawTelemetry = Map<String, Value>;

/// Flat key space produced by [`flatten::flatten`]
pub type FlatMap = Map<String, Value>;

/// Output of a full pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightAnalysis {
    /// Every extracted signal, before metric derivation
    #[serde(skip)]
    pub filtered: FilteredMap,
    /// Derived metrics
    pub metrics: MetricsMap,
    /// Extracted signals no metric rule consumed
    pub residual: FilteredMap,
}

/// Run flatten, filter and derive over one flight log
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use uav_log_analyst::telemetry::analyze;
/// use uav_log_analyst::telemetry::metrics::MetricName;
///
/// let raw = json!({
///     "GPS[0]": { "Alt": [10, 20], "TimeUS": [1, 2] },
///     "STAT": { "BTemp": [30, 35, 40] }
/// });
/// let analysis = analyze(raw.as_object().unwrap());
///
/// assert_eq!(analysis.metrics.get(MetricName::GpsAltitude), Some(&json!(20)));
/// assert_eq!(analysis.metrics.get(MetricName::MaxBatteryTemp), Some(&json!(40)));
/// assert!(analysis.residual.is_empty());
/// ```
pub fn analyze(raw: &RawTelemetry) -> FlightAnalysis {
    let flat = flatten::flatten(raw);
    let filtered = filter::filter(&flat);
    let (metrics, residual) = metrics::derive(&filtered).into_parts();

    FlightAnalysis {
        filtered,
        metrics,
        residual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::labels::CanonicalLabel;
    use crate::telemetry::metrics::MetricName;
    use serde_json::json;

    #[test]
    fn test_dataflash_log() {
        let raw = json!({
            "GPS[0]": { "Alt": [102.5, 130.0, 98.1], "TimeUS": [1, 2, 3], "Status": [3, 3, 6] },
            "STAT": { "BTemp": [31, 44, 38] },
            "MSG": { "Message": ["ArduCopter V4.3", "EKF3 IMU0 is using GPS"], "TimeUS": [10, 20] },
            "PARM": { "Name": ["FS_THR_ENABLE"], "Value": [1] }
        });
        let analysis = analyze(raw.as_object().unwrap());

        assert_eq!(analysis.filtered.len(), 6);
        assert_eq!(analysis.metrics.get(MetricName::GpsAltitude), Some(&json!(130.0)));
        assert_eq!(analysis.metrics.get(MetricName::MaxBatteryTemp), Some(&json!(44)));
        assert_eq!(analysis.metrics.get(MetricName::MinBatteryTemp), Some(&json!(31)));
        assert_eq!(analysis.metrics.get(MetricName::GpsStatusList), Some(&json!([3, 3, 6])));
        assert_eq!(analysis.metrics.get(MetricName::ErrorTimes), Some(&json!([10, 20])));
        assert!(analysis.residual.is_empty());
    }

    #[test]
    fn test_dji_log() {
        let raw = json!({
            "OSD": { "altitude": [0.0, 48.2, 120.4], "flyTime": 612, "nonGpsCause": ["NONE"] },
            "BATTERY": { "temperature": [25.0, 33.5] },
            "RC": { "downlinkSignal": [100, 72], "uplinkSignal": [100, 88] }
        });
        let analysis = analyze(raw.as_object().unwrap());

        assert_eq!(analysis.metrics.get(MetricName::Altitude), Some(&json!(120.4)));
        assert_eq!(analysis.metrics.get(MetricName::FlightTime), Some(&json!(612)));
        assert_eq!(analysis.metrics.get(MetricName::MaxBatteryTemp), Some(&json!(33.5)));
        assert_eq!(analysis.metrics.get(MetricName::GpsLossReasons), Some(&json!(["NONE"])));
        assert_eq!(analysis.metrics.get(MetricName::RcDownlinkSignal), Some(&json!([100, 72])));
        assert!(analysis.residual.is_empty());
    }

    #[test]
    fn test_mavlink_log_keeps_secondary_altitude_in_residual() {
        let raw = json!({
            "GLOBAL_POSITION_INT": { "alt": [584000, 612500], "relative_alt": [0, 28500] },
            "GPS_RAW_INT": { "fix_type": [3, 3] },
            "SYSTEM_TIME": { "time_unix_usec": [[1_000_000, 0], [61_000_000, 1]] },
            "STATUSTEXT": { "text": ["Arming motors"] }
        });
        let analysis = analyze(raw.as_object().unwrap());

        assert_eq!(analysis.metrics.get(MetricName::AbsoluteAltitudeMm), Some(&json!(612.5)));
        assert_eq!(analysis.metrics.get(MetricName::FlightDurationUs), Some(&json!(60_000_000)));
        assert_eq!(
            analysis.residual.get(CanonicalLabel::RelativeAltitudeM),
            Some(&json!([0, 28500]))
        );
        assert_eq!(analysis.residual.len(), 1);
    }

    #[test]
    fn test_unrelated_log_yields_nothing() {
        let raw = json!({ "IMU": { "GyrX": [0.1] }, "VER": "1.0" });
        let analysis = analyze(raw.as_object().unwrap());
        assert!(analysis.filtered.is_empty());
        assert!(analysis.metrics.is_empty());
        assert!(analysis.residual.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let raw = json!({ "OSD": { "flyTime": 5, "altitude": [] } });
        let analysis = analyze(raw.as_object().unwrap());
        assert_eq!(
            serde_json::to_value(&analysis).unwrap(),
            json!({ "metrics": { "flight_time": 5 }, "residual": {} })
        );
    }
}
