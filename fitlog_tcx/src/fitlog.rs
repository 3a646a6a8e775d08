//! Reader for SportTracks fitlog documents.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use serde::Serialize;

use crate::{parse_stamp, ConvertError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceActivity {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub sport_category: String,
    pub duration_seconds: Option<String>,
    pub total_distance_meters: Option<String>,
    pub total_calories: Option<String>,
    pub creator_source: Option<String>,
    pub location: Option<String>,
    pub laps: Vec<SourceLap>,
    pub points: Vec<SourceTrackPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceLap {
    pub start_time: DateTime<Utc>,
    /// Copied verbatim into the TCX lap, never reformatted.
    pub duration_seconds: String,
    pub calories: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceTrackPoint {
    pub time_offset_s: i64,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub elevation_m: Option<String>,
    pub heart_rate_bpm: Option<String>,
}

impl SourceTrackPoint {
    pub fn new(time_offset_s: i64) -> Self {
        Self {
            time_offset_s,
            latitude: None,
            longitude: None,
            elevation_m: None,
            heart_rate_bpm: None,
        }
    }

    /// Absolute time of the sample given its activity's start.
    ///
    /// Points from [`parse_fitlog`] always land at a representable instant.
    pub fn absolute_time(&self, activity_start: DateTime<Utc>) -> DateTime<Utc> {
        activity_start + chrono::Duration::seconds(self.time_offset_s)
    }
}

/// Read and parse a fitlog file from disk.
///
/// The file must be UTF-8 (a leading BOM is accepted); documents in other
/// encodings such as ISO-8859-1 are rejected with an I/O error.
pub fn read_fitlog(path: &Path) -> Result<Vec<SourceActivity>, ConvertError> {
    let text = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
    parse_fitlog(&text)
}

/// Parse every `Activity` element of a fitlog document, in document order.
pub fn parse_fitlog(xml: &str) -> Result<Vec<SourceActivity>, ConvertError> {
    let doc = Document::parse(xml.trim_start_matches('\u{feff}'))?;
    doc.root_element()
        .descendants()
        .filter(|node| is_element(node, "Activity"))
        .map(parse_activity)
        .collect()
}

fn parse_activity(node: Node<'_, '_>) -> Result<SourceActivity, ConvertError> {
    let id = required_attribute(node, "Activity", "Id")?;
    let start_time = parse_stamp(required_attribute(node, "Activity", "StartTime")?)?;
    let category = child(node, "Category").ok_or(ConvertError::MissingElement {
        parent: "Activity",
        element: "Category",
    })?;
    let sport_category = required_attribute(category, "Category", "Name")?;

    let laps = match child(node, "Laps") {
        Some(laps) => laps
            .children()
            .filter(|n| is_element(n, "Lap"))
            .map(parse_lap)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let points = node
        .descendants()
        .filter(|n| is_element(n, "pt"))
        .map(|n| parse_point(n, start_time))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SourceActivity {
        id: id.to_string(),
        start_time,
        sport_category: sport_category.to_string(),
        duration_seconds: child_attribute(node, "Duration", "TotalSeconds"),
        total_distance_meters: child_attribute(node, "Distance", "TotalMeters"),
        total_calories: child_attribute(node, "Calories", "TotalCal"),
        creator_source: child_attribute(node, "Metadata", "Source"),
        location: child_attribute(node, "Location", "Name"),
        laps,
        points,
    })
}

fn parse_lap(node: Node<'_, '_>) -> Result<SourceLap, ConvertError> {
    let start_time = parse_stamp(required_attribute(node, "Lap", "StartTime")?)?;
    let duration_seconds = required_attribute(node, "Lap", "DurationSeconds")?;
    Ok(SourceLap {
        start_time,
        duration_seconds: duration_seconds.to_string(),
        calories: child_attribute(node, "Calories", "TotalCal"),
    })
}

/// Offsets must place the point at a representable instant.
fn parse_point(
    node: Node<'_, '_>,
    activity_start: DateTime<Utc>,
) -> Result<SourceTrackPoint, ConvertError> {
    let tm = required_attribute(node, "pt", "tm")?;
    let invalid = || ConvertError::InvalidOffset(tm.to_string());
    let offset = tm.trim().parse::<i64>().map_err(|_| invalid())?;
    chrono::Duration::try_seconds(offset)
        .and_then(|delta| activity_start.checked_add_signed(delta))
        .ok_or_else(invalid)?;
    let attr = |name: &str| node.attribute(name).map(str::to_string);
    Ok(SourceTrackPoint {
        time_offset_s: offset,
        latitude: attr("lat"),
        longitude: attr("lon"),
        elevation_m: attr("ele"),
        heart_rate_bpm: attr("hr"),
    })
}

fn is_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element(n, name))
}

fn child_attribute(node: Node<'_, '_>, element: &str, attribute: &str) -> Option<String> {
    child(node, element)
        .and_then(|n| n.attribute(attribute))
        .map(str::to_string)
}

fn required_attribute<'a>(
    node: Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ConvertError> {
    node.attribute(attribute)
        .ok_or(ConvertError::MissingAttribute { element, attribute })
}
