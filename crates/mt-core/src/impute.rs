//! Rule-based gap imputation.
//!
//! Sensor logs have holes: nobody pings a room sensor while out of the
//! house, asleep, or sitting still. Three passes insert synthetic events,
//! in this order:
//!
//! 1. **outside**: a long gap between two door events means the patient was
//!    out; fill it with `outside` every `outside_step_minutes`.
//! 2. **night**: a gap that starts at night is filled with `Bedroom` every
//!    `night_step_minutes` until the cursor leaves the night window.
//! 3. **short gaps**: every remaining gap longer than
//!    `short_gap_step_minutes` is forward-filled with the current location,
//!    except after a door/fridge event followed by a room, which is
//!    backward-filled with the room.
//!
//! Inserted events are strictly between the two events bounding the gap.
//! Imputation returns a new log; the input is never modified.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{EventLog, LocationEvent};

/// Longest accepted imputation step: one day.
pub const MAX_STEP_MINUTES: i64 = 24 * 60;

/// Step as a duration, clamped to `1..=MAX_STEP_MINUTES` so an unvalidated
/// config can neither overflow nor stall the fill loops.
fn step_duration(minutes: i64) -> Duration {
    Duration::minutes(minutes.clamp(1, MAX_STEP_MINUTES))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputeConfig {
    pub outside_step_minutes: i64,
    pub night_step_minutes: i64,
    pub short_gap_step_minutes: i64,
    /// Locations that bound an absence from home.
    pub door_locations: Vec<String>,
    /// Locations whose following gap is filled with the *next* location.
    pub backward_fill_locations: Vec<String>,
    pub outside_label: String,
    pub night_label: String,
    /// Night window; wraps midnight when `night_start > night_end`.
    pub night_start: NaiveTime,
    pub night_end: NaiveTime,
}

impl Default for ImputeConfig {
    fn default() -> Self {
        ImputeConfig {
            outside_step_minutes: 2,
            night_step_minutes: 5,
            short_gap_step_minutes: 3,
            door_locations: vec!["Front Door".to_string(), "Back Door".to_string()],
            backward_fill_locations: vec![
                "Front Door".to_string(),
                "Back Door".to_string(),
                "Fridge Door".to_string(),
            ],
            outside_label: "outside".to_string(),
            night_label: "Bedroom".to_string(),
            night_start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            night_end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ImputeConfig {
    /// Inclusive on both ends.
    pub fn is_night(&self, time: NaiveTime) -> bool {
        if self.night_start <= self.night_end {
            time >= self.night_start && time <= self.night_end
        } else {
            time >= self.night_start || time <= self.night_end
        }
    }

    fn is_door(&self, location: &str) -> bool {
        self.door_locations.iter().any(|d| d == location)
    }

    fn is_backward_fill(&self, location: &str) -> bool {
        self.backward_fill_locations.iter().any(|d| d == location)
    }
}

/// Label long door-to-door gaps as time spent outside.
pub fn label_outside(events: &[LocationEvent], config: &ImputeConfig) -> Vec<LocationEvent> {
    let step = step_duration(config.outside_step_minutes);
    with_inserted(events, |cur, next, out| {
        if next.timestamp - cur.timestamp <= step
            || !config.is_door(&cur.location)
            || !config.is_door(&next.location)
        {
            return;
        }
        let mut t = cur.timestamp;
        while next.timestamp - t > step {
            t += step;
            if t >= next.timestamp {
                break;
            }
            out.push(synthetic(cur, t, &config.outside_label));
        }
    })
}

/// Fill night-time gaps with the bedroom.
pub fn fill_night_gaps(events: &[LocationEvent], config: &ImputeConfig) -> Vec<LocationEvent> {
    let step = step_duration(config.night_step_minutes);
    with_inserted(events, |cur, next, out| {
        let mut t = cur.timestamp;
        while next.timestamp - t > step && config.is_night(t.time()) {
            t += step;
            if t >= next.timestamp {
                break;
            }
            out.push(synthetic(cur, t, &config.night_label));
        }
    })
}

/// Forward/backward fill every remaining gap longer than the step.
pub fn fill_short_gaps(events: &[LocationEvent], config: &ImputeConfig) -> Vec<LocationEvent> {
    let step = step_duration(config.short_gap_step_minutes);
    with_inserted(events, |cur, next, out| {
        if next.timestamp - cur.timestamp <= step {
            return;
        }
        if config.is_backward_fill(&cur.location) && !config.is_backward_fill(&next.location) {
            let mut t = next.timestamp;
            while t - cur.timestamp > step {
                t -= step;
                if t <= cur.timestamp {
                    break;
                }
                out.push(synthetic(next, t, &next.location));
            }
        } else {
            let mut t = cur.timestamp;
            while next.timestamp - t > step {
                t += step;
                if t >= next.timestamp {
                    break;
                }
                out.push(synthetic(cur, t, &cur.location));
            }
        }
    })
}

/// Run all three passes over one patient's events.
pub fn impute_patient(events: &[LocationEvent], config: &ImputeConfig) -> Vec<LocationEvent> {
    let outside = label_outside(events, config);
    let night = fill_night_gaps(&outside, config);
    fill_short_gaps(&night, config)
}

/// Impute every patient in the log independently.
pub fn impute_log(log: &EventLog, config: &ImputeConfig) -> EventLog {
    let mut imputed = Vec::with_capacity(log.len());
    for (patient_id, events) in log.partition_by_patient() {
        let owned: Vec<LocationEvent> = events.into_iter().cloned().collect();
        let filled = impute_patient(&owned, config);
        debug!(
            patient_id = %patient_id,
            original = owned.len(),
            inserted = filled.len() - owned.len(),
            "gaps imputed"
        );
        imputed.extend(filled);
    }
    EventLog::new(imputed)
}

fn synthetic(template: &LocationEvent, timestamp: NaiveDateTime, location: &str) -> LocationEvent {
    LocationEvent {
        patient_id: template.patient_id.clone(),
        timestamp,
        location: location.to_string(),
    }
}

/// Sort, visit each consecutive pair, merge inserted rows back in.
fn with_inserted<F>(events: &[LocationEvent], mut visit: F) -> Vec<LocationEvent>
where
    F: FnMut(&LocationEvent, &LocationEvent, &mut Vec<LocationEvent>),
{
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|e| e.timestamp);

    let mut inserted = Vec::new();
    for pair in sorted.windows(2) {
        visit(&pair[0], &pair[1], &mut inserted);
    }

    sorted.extend(inserted);
    sorted.sort_by_key(|e| e.timestamp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(ts: &str, loc: &str) -> LocationEvent {
        LocationEvent::new(
            "p1",
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            loc,
        )
    }

    fn locations(events: &[LocationEvent]) -> Vec<&str> {
        events.iter().map(|e| e.location.as_str()).collect()
    }

    #[test]
    fn test_label_outside_between_doors() {
        let events = vec![
            ev("2019-07-01 10:00:00", "Front Door"),
            ev("2019-07-01 10:07:00", "Back Door"),
        ];
        let out = label_outside(&events, &ImputeConfig::default());
        // 10:02, 10:04, 10:06
        assert_eq!(
            locations(&out),
            vec!["Front Door", "outside", "outside", "outside", "Back Door"]
        );
    }

    #[test]
    fn test_label_outside_ignores_rooms() {
        let events = vec![
            ev("2019-07-01 10:00:00", "Front Door"),
            ev("2019-07-01 10:30:00", "Kitchen"),
        ];
        assert_eq!(label_outside(&events, &ImputeConfig::default()).len(), 2);
    }

    #[test]
    fn test_label_outside_exact_multiple_stops_before_next() {
        let events = vec![
            ev("2019-07-01 10:00:00", "Front Door"),
            ev("2019-07-01 10:06:00", "Front Door"),
        ];
        let out = label_outside(&events, &ImputeConfig::default());
        // 10:02, 10:04; 10:06 would collide with the next event.
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_fill_night_gaps_stops_after_night() {
        let events = vec![
            ev("2019-07-01 07:50:00", "Hallway"),
            ev("2019-07-01 09:00:00", "Kitchen"),
        ];
        let out = fill_night_gaps(&events, &ImputeConfig::default());
        // cursor 07:50 night -> 07:55, 07:55 night -> 08:00, 08:00 night
        // (inclusive) -> 08:05, 08:05 is day -> stop.
        let inserted: Vec<_> = out.iter().filter(|e| e.location == "Bedroom").collect();
        assert_eq!(inserted.len(), 3);
        assert_eq!(inserted[2].timestamp.time(), NaiveTime::from_hms_opt(8, 5, 0).unwrap());
    }

    #[test]
    fn test_fill_night_gaps_daytime_untouched() {
        let events = vec![
            ev("2019-07-01 12:00:00", "Hallway"),
            ev("2019-07-01 14:00:00", "Kitchen"),
        ];
        assert_eq!(fill_night_gaps(&events, &ImputeConfig::default()).len(), 2);
    }

    #[test]
    fn test_fill_short_gaps_forward() {
        let events = vec![
            ev("2019-07-01 12:00:00", "Lounge"),
            ev("2019-07-01 12:10:00", "Kitchen"),
        ];
        let out = fill_short_gaps(&events, &ImputeConfig::default());
        assert_eq!(
            locations(&out),
            vec!["Lounge", "Lounge", "Lounge", "Lounge", "Kitchen"]
        );
    }

    #[test]
    fn test_fill_short_gaps_backward_after_door() {
        let events = vec![
            ev("2019-07-01 12:00:00", "Fridge Door"),
            ev("2019-07-01 12:10:00", "Kitchen"),
        ];
        let out = fill_short_gaps(&events, &ImputeConfig::default());
        // 12:07, 12:04, 12:01 backward from the kitchen event.
        assert_eq!(
            locations(&out),
            vec!["Fridge Door", "Kitchen", "Kitchen", "Kitchen", "Kitchen"]
        );
        assert_eq!(out[1].timestamp.time(), NaiveTime::from_hms_opt(12, 1, 0).unwrap());
    }

    #[test]
    fn test_impute_log_keeps_patients_apart() {
        let mut a = ev("2019-07-01 12:00:00", "Lounge");
        a.patient_id = "a".into();
        let mut b = ev("2019-07-01 12:30:00", "Kitchen");
        b.patient_id = "b".into();
        let log = EventLog::new(vec![a, b]);
        let out = impute_log(&log, &ImputeConfig::default());
        // single event per patient: no gaps to fill
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_oversized_step_is_clamped() {
        let config = ImputeConfig {
            night_step_minutes: i64::MAX,
            ..Default::default()
        };
        let events = vec![
            ev("2019-07-01 23:00:00", "Hallway"),
            ev("2019-07-02 07:00:00", "Kitchen"),
        ];
        // a one-day step overshoots the 8h gap
        assert_eq!(fill_night_gaps(&events, &config).len(), 2);
        // only the 3-minute short-gap pass fills: 23:03 ..= 06:57
        assert_eq!(impute_patient(&events, &config).len(), 2 + 159);
    }

    #[test]
    fn test_is_night_wraps_midnight() {
        let config = ImputeConfig::default();
        assert!(config.is_night(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
        assert!(config.is_night(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
        assert!(!config.is_night(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }
}
