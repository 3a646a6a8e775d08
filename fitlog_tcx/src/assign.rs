//! Bucketing of an activity's trackpoints into its laps.
//!
//! Lap `i` owns the half-open interval `[laps[i].start, laps[i + 1].start)`;
//! the last lap is unbounded above. A point exactly on a boundary belongs to
//! the later lap, and a point before the first lap start belongs to none.

use chrono::{DateTime, Utc};

use crate::fitlog::{SourceLap, SourceTrackPoint};

/// Points grouped per lap index, in source order.
#[derive(Clone, Debug)]
pub struct Assignment<'a> {
    pub laps: Vec<Vec<&'a SourceTrackPoint>>,
    /// Points that fell inside no lap interval.
    pub unassigned: usize,
}

impl<'a> Assignment<'a> {
    pub fn points_for(&self, lap_index: usize) -> &[&'a SourceTrackPoint] {
        self.laps
            .get(lap_index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

pub fn assign_points<'a>(
    activity_start: DateTime<Utc>,
    points: &'a [SourceTrackPoint],
    laps: &[SourceLap],
) -> Assignment<'a> {
    let starts: Vec<DateTime<Utc>> = laps.iter().map(|lap| lap.start_time).collect();
    if starts.windows(2).all(|pair| pair[0] <= pair[1]) {
        assign_sorted(activity_start, points, &starts)
    } else {
        assign_scan(activity_start, points, &starts)
    }
}

/// Binary search over non-decreasing lap starts. Equivalent to the scan.
fn assign_sorted<'a>(
    activity_start: DateTime<Utc>,
    points: &'a [SourceTrackPoint],
    starts: &[DateTime<Utc>],
) -> Assignment<'a> {
    let mut laps = vec![Vec::new(); starts.len()];
    let mut unassigned = 0;
    for point in points {
        let time = point.absolute_time(activity_start);
        match starts.partition_point(|start| *start <= time) {
            0 => unassigned += 1,
            n => laps[n - 1].push(point),
        }
    }
    Assignment { laps, unassigned }
}

/// Evaluates every (point, lap) pair; used when laps are out of order.
fn assign_scan<'a>(
    activity_start: DateTime<Utc>,
    points: &'a [SourceTrackPoint],
    starts: &[DateTime<Utc>],
) -> Assignment<'a> {
    let mut laps = vec![Vec::new(); starts.len()];
    let mut unassigned = 0;
    for point in points {
        let time = point.absolute_time(activity_start);
        let mut placed = false;
        for (index, start) in starts.iter().enumerate() {
            let below_next = starts.get(index + 1).map_or(true, |next| time < *next);
            if time >= *start && below_next {
                laps[index].push(point);
                placed = true;
            }
        }
        if !placed {
            unassigned += 1;
        }
    }
    Assignment { laps, unassigned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
    }

    fn lap(offset_s: i64) -> SourceLap {
        SourceLap {
            start_time: start() + chrono::Duration::seconds(offset_s),
            duration_seconds: "60".to_string(),
            calories: None,
        }
    }

    fn offsets(bucket: &[&SourceTrackPoint]) -> Vec<i64> {
        bucket.iter().map(|p| p.time_offset_s).collect()
    }

    #[test]
    fn test_half_open_intervals() {
        let points: Vec<_> = [0, 30, 59, 60, 61, 200]
            .into_iter()
            .map(SourceTrackPoint::new)
            .collect();
        let laps = vec![lap(0), lap(60), lap(120)];
        let assignment = assign_points(start(), &points, &laps);
        assert_eq!(offsets(assignment.points_for(0)), vec![0, 30, 59]);
        assert_eq!(offsets(assignment.points_for(1)), vec![60, 61]);
        assert_eq!(offsets(assignment.points_for(2)), vec![200]);
        assert_eq!(assignment.unassigned, 0);
    }

    #[test]
    fn test_boundary_point_goes_to_later_lap() {
        let points = vec![SourceTrackPoint::new(60)];
        let laps = vec![lap(0), lap(60)];
        let assignment = assign_points(start(), &points, &laps);
        assert!(assignment.points_for(0).is_empty());
        assert_eq!(offsets(assignment.points_for(1)), vec![60]);
    }

    #[test]
    fn test_points_before_first_lap_are_dropped() {
        let points: Vec<_> = [0, 5, 10, 15].into_iter().map(SourceTrackPoint::new).collect();
        let laps = vec![lap(10)];
        let assignment = assign_points(start(), &points, &laps);
        assert_eq!(offsets(assignment.points_for(0)), vec![10, 15]);
        assert_eq!(assignment.unassigned, 2);
    }

    #[test]
    fn test_no_laps() {
        let points: Vec<_> = [0, 5].into_iter().map(SourceTrackPoint::new).collect();
        let assignment = assign_points(start(), &points, &[]);
        assert!(assignment.laps.is_empty());
        assert!(assignment.points_for(0).is_empty());
        assert_eq!(assignment.unassigned, 2);
    }

    #[test]
    fn test_sorted_and_scan_agree() {
        let points: Vec<_> = (-10..250).step_by(7).map(SourceTrackPoint::new).collect();
        let starts: Vec<_> = [0, 60, 60, 180]
            .into_iter()
            .map(|s| lap(s).start_time)
            .collect();
        let fast = assign_sorted(start(), &points, &starts);
        let slow = assign_scan(start(), &points, &starts);
        assert_eq!(fast.unassigned, slow.unassigned);
        for index in 0..starts.len() {
            assert_eq!(
                offsets(fast.points_for(index)),
                offsets(slow.points_for(index))
            );
        }
    }

    #[test]
    fn test_out_of_order_laps_use_pairwise_rule() {
        let points: Vec<_> = [0, 20, 40].into_iter().map(SourceTrackPoint::new).collect();
        let laps = vec![lap(30), lap(10)];
        let assignment = assign_points(start(), &points, &laps);
        assert!(assignment.points_for(0).is_empty());
        assert_eq!(offsets(assignment.points_for(1)), vec![20, 40]);
        assert_eq!(assignment.unassigned, 1);
    }
}
