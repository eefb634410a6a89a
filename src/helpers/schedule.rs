use chrono::NaiveTime;
use tracing::info;

use crate::error::SyncError;
use crate::helpers::enrich::CustomerRecord;

/// Placeholder written for any value the reservation record did not carry.
pub const SENTINEL: &str = "N/A";

pub const HEADER: [&str; 6] = ["Name", "Email", "Phone", "Trip Type", "Trip Time", "Guide"];

/// One spreadsheet row, in header order. `guide` is always empty here and
/// filled in by hand on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub trip_type: String,
    pub trip_time: String,
    pub guide: String,
}

impl Row {
    pub fn cells(&self) -> [&str; 6] {
        [
            &self.name,
            &self.email,
            &self.phone,
            &self.trip_type,
            &self.trip_time,
            &self.guide,
        ]
    }
}

impl From<CustomerRecord> for Row {
    fn from(record: CustomerRecord) -> Self {
        let or_sentinel = |value: Option<String>| value.unwrap_or_else(|| SENTINEL.to_string());

        Row {
            name: format!(
                "{} {}",
                record.name.first.as_deref().unwrap_or(SENTINEL),
                record.name.last.as_deref().unwrap_or(SENTINEL)
            ),
            email: or_sentinel(record.email),
            phone: or_sentinel(record.phone),
            trip_type: or_sentinel(record.trip_type),
            trip_time: or_sentinel(record.trip_time),
            guide: String::new(),
        }
    }
}

/// Parses an `H:MM AM/PM` or `H:MMAM/PM` trip time into a sort key. The
/// sentinel gives `None`, which orders before every time of day, midnight
/// included.
pub fn convert_time(trip_time: &str) -> Result<Option<NaiveTime>, SyncError> {
    if trip_time == SENTINEL {
        return Ok(None);
    }

    let parse_error = |reason: &str| SyncError::TimeParse {
        value: trip_time.to_string(),
        reason: reason.to_string(),
    };

    // The meridiem is always the last two characters.
    let split = trip_time
        .len()
        .checked_sub(2)
        .filter(|at| trip_time.is_char_boundary(*at))
        .ok_or_else(|| parse_error("too short for a 12-hour time"))?;
    let (clock, meridiem) = trip_time.split_at(split);

    let normalized = format!("{} {}", clock.trim_end(), meridiem);
    NaiveTime::parse_from_str(&normalized, "%I:%M %p")
        .map(Some)
        .map_err(|e| parse_error(&e.to_string()))
}

/// Orders records by trip time, earliest first, records without a time
/// before all others. Records with equal times keep their fetch order.
pub fn sort_by_trip_time(records: Vec<CustomerRecord>) -> Result<Vec<Row>, SyncError> {
    let mut keyed = records
        .into_iter()
        .map(Row::from)
        .map(|row| convert_time(&row.trip_time).map(|key| (key, row)))
        .collect::<Result<Vec<_>, _>>()?;

    keyed.sort_by_key(|(key, _)| *key);

    info!("Sorted {} rows by trip time", keyed.len());
    Ok(keyed.into_iter().map(|(_, row)| row).collect())
}
