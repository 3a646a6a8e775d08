//! Mapping of one fitlog activity onto a TCX activity subtree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assign::assign_points;
use crate::fitlog::{SourceActivity, SourceTrackPoint};
use crate::sport::{resolve, SportMapping};
use crate::tcx::{ActivityItem, TcxActivity, TcxLap, TcxPosition, TcxTrackpoint};

/// Where trackpoint heart-rate samples are written.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HeartRatePlacement {
    /// Directly under `Activity`, after the lap holding the sample. This is
    /// the layout earlier releases produced and downstream tools expect.
    #[default]
    Activity,
    /// Inside each `Trackpoint`, as the TCX schema describes.
    Trackpoint,
}

#[derive(Clone, Debug)]
pub struct Transcoded {
    pub activity: TcxActivity,
    pub start_time: DateTime<Utc>,
    /// Source points that fell inside no lap interval.
    pub dropped_points: usize,
}

pub fn transcode(
    source: &SourceActivity,
    mapping: &SportMapping,
    heart_rate: HeartRatePlacement,
) -> Transcoded {
    let sport = resolve(&source.sport_category, mapping);
    let assignment = assign_points(source.start_time, &source.points, &source.laps);

    let mut items = Vec::with_capacity(source.laps.len());
    for (index, lap) in source.laps.iter().enumerate() {
        let track: Vec<TcxTrackpoint> = assignment
            .points_for(index)
            .iter()
            .map(|point| trackpoint(point, source.start_time, heart_rate))
            .collect();
        let samples: Vec<String> = match heart_rate {
            HeartRatePlacement::Activity => assignment
                .points_for(index)
                .iter()
                .filter_map(|point| point.heart_rate_bpm.clone())
                .collect(),
            HeartRatePlacement::Trackpoint => Vec::new(),
        };

        items.push(ActivityItem::Lap(TcxLap {
            start_time: lap.start_time,
            total_time_seconds: lap.duration_seconds.clone(),
            calories: lap.calories.clone(),
            track,
        }));
        items.extend(samples.into_iter().map(ActivityItem::HeartRate));
    }

    Transcoded {
        activity: TcxActivity {
            sport: sport.to_string(),
            id: source.id.clone(),
            creator: source.creator_source.clone(),
            total_time_seconds: source.duration_seconds.clone(),
            distance_meters: source.total_distance_meters.clone(),
            calories: source.total_calories.clone(),
            items,
        },
        start_time: source.start_time,
        dropped_points: assignment.unassigned,
    }
}

fn trackpoint(
    point: &SourceTrackPoint,
    activity_start: DateTime<Utc>,
    heart_rate: HeartRatePlacement,
) -> TcxTrackpoint {
    let position = match (&point.latitude, &point.longitude) {
        (Some(lat), Some(lon)) => Some(TcxPosition {
            latitude_degrees: lat.clone(),
            longitude_degrees: lon.clone(),
        }),
        _ => None,
    };
    TcxTrackpoint {
        time: point.absolute_time(activity_start),
        position,
        altitude_meters: point.elevation_m.clone(),
        heart_rate_bpm: match heart_rate {
            HeartRatePlacement::Trackpoint => point.heart_rate_bpm.clone(),
            HeartRatePlacement::Activity => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitlog::SourceLap;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
    }

    fn point(offset: i64, hr: Option<&str>) -> SourceTrackPoint {
        SourceTrackPoint {
            heart_rate_bpm: hr.map(str::to_string),
            ..SourceTrackPoint::new(offset)
        }
    }

    fn source() -> SourceActivity {
        let mut located = point(0, Some("120"));
        located.latitude = Some("45.1".to_string());
        located.longitude = Some("-122.5".to_string());
        located.elevation_m = Some("10.5".to_string());

        let mut half_located = point(30, None);
        half_located.latitude = Some("45.2".to_string());

        SourceActivity {
            id: "act-1".to_string(),
            start_time: start(),
            sport_category: "My Activities".to_string(),
            duration_seconds: Some("120.5".to_string()),
            total_distance_meters: None,
            total_calories: Some("88".to_string()),
            creator_source: Some("Forerunner".to_string()),
            location: None,
            laps: vec![
                SourceLap {
                    start_time: start(),
                    duration_seconds: "60.000".to_string(),
                    calories: Some("40".to_string()),
                },
                SourceLap {
                    start_time: start() + chrono::Duration::seconds(60),
                    duration_seconds: "60.5".to_string(),
                    calories: None,
                },
            ],
            points: vec![
                point(-5, Some("99")),
                located,
                half_located,
                point(60, Some("150")),
                point(90, Some("155")),
            ],
        }
    }

    #[test]
    fn test_totals_and_identity() {
        let out = transcode(&source(), &SportMapping::new(), HeartRatePlacement::Activity);
        assert_eq!(out.activity.id, "act-1");
        assert_eq!(out.activity.sport, "Running");
        assert_eq!(out.activity.creator.as_deref(), Some("Forerunner"));
        assert_eq!(out.activity.total_time_seconds.as_deref(), Some("120.5"));
        assert_eq!(out.activity.distance_meters, None);
        assert_eq!(out.activity.calories.as_deref(), Some("88"));
        assert_eq!(out.start_time, start());
    }

    #[test]
    fn test_laps_and_points() {
        let out = transcode(&source(), &SportMapping::new(), HeartRatePlacement::Activity);
        let laps: Vec<_> = out.activity.laps().collect();
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[0].total_time_seconds, "60.000");
        assert_eq!(laps[0].calories.as_deref(), Some("40"));
        assert_eq!(laps[1].calories, None);

        assert_eq!(laps[0].track.len(), 2);
        let first = &laps[0].track[0];
        assert_eq!(first.time, start());
        assert_eq!(
            first.position.as_ref().map(|p| p.latitude_degrees.as_str()),
            Some("45.1")
        );
        assert_eq!(first.altitude_meters.as_deref(), Some("10.5"));
        assert!(laps[0].track[1].position.is_none());

        assert_eq!(laps[1].track.len(), 2);
        assert_eq!(laps[1].track[0].time, start() + chrono::Duration::seconds(60));
        assert_eq!(out.dropped_points, 1);
    }

    #[test]
    fn test_heart_rate_follows_lap_at_activity_level() {
        let out = transcode(&source(), &SportMapping::new(), HeartRatePlacement::Activity);
        let kinds: Vec<String> = out
            .activity
            .items
            .iter()
            .map(|item| match item {
                ActivityItem::Lap(lap) => format!("lap:{}", lap.total_time_seconds),
                ActivityItem::HeartRate(bpm) => format!("hr:{bpm}"),
            })
            .collect();
        assert_eq!(kinds, vec!["lap:60.000", "hr:120", "lap:60.5", "hr:150", "hr:155"]);
        assert!(out
            .activity
            .laps()
            .flat_map(|lap| lap.track.iter())
            .all(|p| p.heart_rate_bpm.is_none()));
    }

    #[test]
    fn test_heart_rate_per_trackpoint() {
        let out = transcode(
            &source(),
            &SportMapping::new(),
            HeartRatePlacement::Trackpoint,
        );
        assert_eq!(out.activity.heart_rates().count(), 0);
        let rates: Vec<Option<&str>> = out
            .activity
            .laps()
            .flat_map(|lap| lap.track.iter())
            .map(|p| p.heart_rate_bpm.as_deref())
            .collect();
        assert_eq!(rates, vec![Some("120"), None, Some("150"), Some("155")]);
    }

    #[test]
    fn test_no_laps_means_no_track() {
        let mut activity = source();
        activity.laps.clear();
        let out = transcode(&activity, &SportMapping::new(), HeartRatePlacement::Activity);
        assert!(out.activity.items.is_empty());
        assert_eq!(out.activity.trackpoint_count(), 0);
        assert_eq!(out.activity.total_time_seconds.as_deref(), Some("120.5"));
        assert_eq!(out.dropped_points, 5);
    }

    #[test]
    fn test_mapping_applies() {
        let mut activity = source();
        activity.sport_category = "Trail Running".to_string();
        let mapping: SportMapping = [("Trail Running", "Other")].into_iter().collect();
        let out = transcode(&activity, &mapping, HeartRatePlacement::Activity);
        assert_eq!(out.activity.sport, "Other");
    }
}
