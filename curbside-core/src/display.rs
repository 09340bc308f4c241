//! Pure projection of schedule snapshots onto the two pickup sensors.

use chrono::NaiveDate;
use serde::Serialize;

use crate::coordinator::Snapshot;
use crate::flow::ConfigEntry;
use crate::model::{InstanceId, ScheduleResult, WasteStream};

/// Icon shown on the day of the pickup.
pub const COMPLETED_ICON: &str = "mdi:check-circle";

/// Manufacturer reported in device metadata.
pub const DEVICE_MANUFACTURER: &str = "City of Milwaukee Data";

/// Model reported in device metadata.
pub const DEVICE_MODEL: &str = "Collection Schedule";

/// Device grouping the two sensors of one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Instance the device represents.
    pub identifier: InstanceId,
    /// Display name, the formatted address.
    pub name: String,
    /// Data source.
    pub manufacturer: &'static str,
    /// Device model.
    pub model: &'static str,
}

impl DeviceInfo {
    /// Device metadata for a config entry.
    #[must_use]
    pub fn for_entry(entry: &ConfigEntry) -> Self {
        Self {
            identifier: entry.entry_id.clone(),
            name: entry.title.clone(),
            manufacturer: DEVICE_MANUFACTURER,
            model: DEVICE_MODEL,
        }
    }
}

/// Derived values of one pickup date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupProjection {
    /// Stream the date belongs to.
    pub stream: WasteStream,
    /// Next pickup date, if known.
    pub date: Option<NaiveDate>,
    /// Days from today; negative when the date is stale.
    pub days_until: Option<i64>,
    /// "Today", "Tomorrow", "In 3 days", ...
    pub human_status: Option<String>,
    /// Icon selector.
    pub icon: &'static str,
}

impl PickupProjection {
    /// Project one stream of a result relative to `today`.
    #[must_use]
    pub fn new(stream: WasteStream, date: Option<NaiveDate>, today: NaiveDate) -> Self {
        let days_until = date.map(|date| days_until(date, today));
        Self {
            stream,
            date,
            days_until,
            human_status: days_until.map(human_status),
            icon: icon_for(stream, date, today),
        }
    }
}

/// State handed to the display host for one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorState {
    /// Stable id, `{entry_id}_{stream}_pickup`.
    pub unique_id: String,
    /// Sensor name shown under the device.
    pub name: &'static str,
    /// Derived values.
    #[serde(flatten)]
    pub pickup: PickupProjection,
    /// Whether the last poll succeeded.
    pub available: bool,
}

/// Sensor name of a stream.
#[must_use]
pub fn sensor_name(stream: WasteStream) -> &'static str {
    match stream {
        WasteStream::Garbage => "Garbage Pickup",
        WasteStream::Recycling => "Recycling Pickup",
    }
}

/// Icon of a stream on days other than pickup day.
#[must_use]
pub fn base_icon(stream: WasteStream) -> &'static str {
    match stream {
        WasteStream::Garbage => "mdi:trash-can",
        WasteStream::Recycling => "mdi:recycle",
    }
}

/// Whole days from `today` to `date`.
#[must_use]
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Human-readable distance to a pickup.
#[must_use]
pub fn human_status(days: i64) -> String {
    match days {
        0 => "Today".to_owned(),
        1 => "Tomorrow".to_owned(),
        -1 => "Yesterday".to_owned(),
        days if days > 1 => format!("In {days} days"),
        days => format!("{} days ago", days.abs()),
    }
}

/// Icon selector; switches to [`COMPLETED_ICON`] exactly on pickup day.
#[must_use]
pub fn icon_for(stream: WasteStream, date: Option<NaiveDate>, today: NaiveDate) -> &'static str {
    if date == Some(today) {
        COMPLETED_ICON
    } else {
        base_icon(stream)
    }
}

/// Project a result onto both streams.
#[must_use]
pub fn project(result: &ScheduleResult, today: NaiveDate) -> [PickupProjection; 2] {
    WasteStream::ALL.map(|stream| PickupProjection::new(stream, result.date_for(stream), today))
}

/// Sensor states of one instance.
#[must_use]
pub fn sensor_states(
    entry: &ConfigEntry,
    snapshot: &Snapshot,
    today: NaiveDate,
) -> [SensorState; 2] {
    let result = snapshot.result.unwrap_or_default();
    project(&result, today).map(|pickup| SensorState {
        unique_id: format!("{}_{}_pickup", entry.entry_id, pickup.stream),
        name: sensor_name(pickup.stream),
        pickup,
        available: snapshot.last_update_success,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AddressQuery, StreetDirection, StreetSuffix, ValidatedAddress};

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
    }

    #[test]
    fn pickup_today_uses_completed_icon() {
        let today = day(4, 9);
        let projection = PickupProjection::new(WasteStream::Garbage, Some(today), today);

        assert_eq!(projection.days_until, Some(0));
        assert_eq!(projection.human_status.as_deref(), Some("Today"));
        assert_eq!(projection.icon, COMPLETED_ICON);
    }

    #[test]
    fn other_days_keep_stream_icon() {
        let today = day(4, 9);
        let tomorrow = PickupProjection::new(WasteStream::Recycling, Some(day(4, 10)), today);
        assert_eq!(tomorrow.human_status.as_deref(), Some("Tomorrow"));
        assert_eq!(tomorrow.icon, "mdi:recycle");

        let stale = PickupProjection::new(WasteStream::Garbage, Some(day(4, 2)), today);
        assert_eq!(stale.days_until, Some(-7));
        assert_eq!(stale.icon, "mdi:trash-can");
    }

    #[test]
    fn human_status_wording() {
        assert_eq!(human_status(5), "In 5 days");
        assert_eq!(human_status(-1), "Yesterday");
        assert_eq!(human_status(-3), "3 days ago");
    }

    #[test]
    fn missing_date_projects_to_nothing() {
        let projection = PickupProjection::new(WasteStream::Recycling, None, day(4, 9));
        assert_eq!(projection.days_until, None);
        assert_eq!(projection.human_status, None);
        assert_eq!(projection.icon, "mdi:recycle");
    }

    #[test]
    fn sensor_states_follow_snapshot() {
        let entry = ConfigEntry::from(ValidatedAddress::from(AddressQuery::new(
            "2100",
            Some(StreetDirection::North),
            "MAIN",
            StreetSuffix::Street,
        )));
        let snapshot = Snapshot {
            result: Some(ScheduleResult {
                garbage_date: Some(day(4, 9)),
                recycling_date: Some(day(4, 14)),
            }),
            last_update_success: false,
            last_error: Some("timeout".to_owned()),
            last_success_at: None,
        };

        let [garbage, recycling] = sensor_states(&entry, &snapshot, day(4, 8));
        assert_eq!(garbage.unique_id, "2100_N_MAIN_ST_garbage_pickup");
        assert_eq!(garbage.name, "Garbage Pickup");
        assert_eq!(garbage.pickup.human_status.as_deref(), Some("Tomorrow"));
        assert_eq!(recycling.pickup.days_until, Some(6));
        assert!(!garbage.available && !recycling.available, "availability mirrors last poll");

        let device = DeviceInfo::for_entry(&entry);
        assert_eq!(device.name, "2100 N MAIN ST");
        assert_eq!(device.manufacturer, DEVICE_MANUFACTURER);
    }
}
