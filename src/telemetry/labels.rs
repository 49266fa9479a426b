//! # Canonical Labels
//!
//! The fixed taxonomy of flight-health signals and the static table binding
//! each one to its source key in a specific telemetry dialect.
//!
//! ## Dialects
//!
//! | Dialect | Origin | Example key |
//! |---------|--------|-------------|
//! | DataFlash | ArduPilot binary flight log | `GPS[0].Alt` |
//! | DJI OSD | Consumer-drone flight record | `OSD.altitude` |
//! | MAVLink | Standard autopilot protocol | `GLOBAL_POSITION_INT.alt` |
//!
//! A label is bound to exactly one source key. Labels from different dialects
//! are never merged.

use serde::Serialize;
use std::fmt;

/// Number of canonical labels
pub const LABEL_COUNT: usize = 18;

/// Upstream telemetry dialect a source key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// ArduPilot DataFlash binary log
    DataFlash,
    /// DJI on-screen-display flight record
    DjiOsd,
    /// MAVLink message stream
    Mavlink,
}

/// Normalized semantic name for a telemetry signal
///
/// Declaration order follows the lookup table, so ordered collections keyed
/// by label iterate in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalLabel {
    // DataFlash
    GpsAltitude,
    GpsTime,
    GpsStatus,
    BatteryTemp,
    MsgMessages,
    MsgTime,
    // DJI OSD
    Altitude,
    FlightTime,
    BatteryTemperature,
    GpsLossReason,
    RcDownlinkSignal,
    RcUplinkSignal,
    // MAVLink
    AbsoluteAltitudeMm,
    RelativeAltitudeM,
    GpsFixType,
    StartTimeUnix,
    RcSignalStrength,
    StatusTexts,
}

/// Source key to label table, grouped by dialect
pub const LABEL_TABLE: [(&str, CanonicalLabel); LABEL_COUNT] = [
    // DataFlash
    ("GPS[0].Alt", CanonicalLabel::GpsAltitude),
    ("GPS[0].TimeUS", CanonicalLabel::GpsTime),
    ("GPS[0].Status", CanonicalLabel::GpsStatus),
    ("STAT.BTemp", CanonicalLabel::BatteryTemp),
    ("MSG.Message", CanonicalLabel::MsgMessages),
    ("MSG.TimeUS", CanonicalLabel::MsgTime),
    // DJI OSD
    ("OSD.altitude", CanonicalLabel::Altitude),
    ("OSD.flyTime", CanonicalLabel::FlightTime),
    ("BATTERY.temperature", CanonicalLabel::BatteryTemperature),
    ("OSD.nonGpsCause", CanonicalLabel::GpsLossReason),
    ("RC.downlinkSignal", CanonicalLabel::RcDownlinkSignal),
    ("RC.uplinkSignal", CanonicalLabel::RcUplinkSignal),
    // MAVLink
    ("GLOBAL_POSITION_INT.alt", CanonicalLabel::AbsoluteAltitudeMm),
    ("GLOBAL_POSITION_INT.relative_alt", CanonicalLabel::RelativeAltitudeM),
    ("GPS_RAW_INT.fix_type", CanonicalLabel::GpsFixType),
    ("SYSTEM_TIME.time_unix_usec", CanonicalLabel::StartTimeUnix),
    ("RC_CHANNELS_RAW.rssi", CanonicalLabel::RcSignalStrength),
    ("STATUSTEXT.text", CanonicalLabel::StatusTexts),
];

impl CanonicalLabel {
    /// All labels in table order
    pub const ALL: [CanonicalLabel; LABEL_COUNT] = [
        Self::GpsAltitude,
        Self::GpsTime,
        Self::GpsStatus,
        Self::BatteryTemp,
        Self::MsgMessages,
        Self::MsgTime,
        Self::Altitude,
        Self::FlightTime,
        Self::BatteryTemperature,
        Self::GpsLossReason,
        Self::RcDownlinkSignal,
        Self::RcUplinkSignal,
        Self::AbsoluteAltitudeMm,
        Self::RelativeAltitudeM,
        Self::GpsFixType,
        Self::StartTimeUnix,
        Self::RcSignalStrength,
        Self::StatusTexts,
    ];

    /// Snake-case name used in serialized output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GpsAltitude => "gps_altitude",
            Self::GpsTime => "gps_time",
            Self::GpsStatus => "gps_status",
            Self::BatteryTemp => "battery_temp",
            Self::MsgMessages => "msg_messages",
            Self::MsgTime => "msg_time",
            Self::Altitude => "altitude",
            Self::FlightTime => "flight_time",
            Self::BatteryTemperature => "battery_temperature",
            Self::GpsLossReason => "gps_loss_reason",
            Self::RcDownlinkSignal => "rc_downlink_signal",
            Self::RcUplinkSignal => "rc_uplink_signal",
            Self::AbsoluteAltitudeMm => "absolute_altitude_mm",
            Self::RelativeAltitudeM => "relative_altitude_m",
            Self::GpsFixType => "gps_fix_type",
            Self::StartTimeUnix => "start_time_unix",
            Self::RcSignalStrength => "rc_signal_strength",
            Self::StatusTexts => "status_texts",
        }
    }

    /// Dialect that supplies this label
    pub fn dialect(self) -> Dialect {
        match self {
            Self::GpsAltitude
            | Self::GpsTime
            | Self::GpsStatus
            | Self::BatteryTemp
            | Self::MsgMessages
            | Self::MsgTime => Dialect::DataFlash,
            Self::Altitude
            | Self::FlightTime
            | Self::BatteryTemperature
            | Self::GpsLossReason
            | Self::RcDownlinkSignal
            | Self::RcUplinkSignal => Dialect::DjiOsd,
            Self::AbsoluteAltitudeMm
            | Self::RelativeAltitudeM
            | Self::GpsFixType
            | Self::StartTimeUnix
            | Self::RcSignalStrength
            | Self::StatusTexts => Dialect::Mavlink,
        }
    }

    /// Flat source key bound to this label
    pub fn source_key(self) -> &'static str {
        LABEL_TABLE[self.index()].0
    }

    /// Position in table order, used for consumption bitmaps
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CanonicalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
