//! Garmin TrainingCenterDatabase v2 document model and its XML writer.

use std::io::{self, Write};

use chrono::{DateTime, Utc};

use crate::format_stamp;

pub const TCX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SCHEMA_LOCATION: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 \
     http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd";

/// Extension namespaces declared on every root, whether used or not.
pub const EXTENSION_NAMESPACES: [(&str, &str); 4] = [
    ("ns2", "http://www.garmin.com/xmlschemas/UserProfile/v2"),
    ("ns3", "http://www.garmin.com/xmlschemas/ActivityExtension/v2"),
    ("ns4", "http://www.garmin.com/xmlschemas/ProfileExtension/v1"),
    ("ns5", "http://www.garmin.com/xmlschemas/ActivityGoals/v1"),
];

pub const APPLICATION_NAME: &str = "fitlog2tcx";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TcxDocument {
    pub activities: Vec<TcxActivity>,
    pub author: Option<TcxAuthor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcxAuthor {
    pub name: String,
    pub version_major: u16,
    pub version_minor: u16,
    pub build_major: u16,
    pub build_minor: u16,
}

impl TcxAuthor {
    /// The fixed descriptor of this converter, version 1.0.1.0.
    pub fn application() -> Self {
        Self {
            name: APPLICATION_NAME.to_string(),
            version_major: 1,
            version_minor: 0,
            build_major: 1,
            build_minor: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TcxActivity {
    pub sport: String,
    pub id: String,
    pub creator: Option<String>,
    pub total_time_seconds: Option<String>,
    pub distance_meters: Option<String>,
    pub calories: Option<String>,
    pub items: Vec<ActivityItem>,
}

/// Children following the activity totals, in output order.
#[derive(Clone, Debug, PartialEq)]
pub enum ActivityItem {
    Lap(TcxLap),
    /// Heart-rate sample attached to the activity rather than a trackpoint.
    HeartRate(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TcxLap {
    pub start_time: DateTime<Utc>,
    pub total_time_seconds: String,
    pub calories: Option<String>,
    pub track: Vec<TcxTrackpoint>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TcxTrackpoint {
    pub time: DateTime<Utc>,
    pub position: Option<TcxPosition>,
    pub altitude_meters: Option<String>,
    pub heart_rate_bpm: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TcxPosition {
    pub latitude_degrees: String,
    pub longitude_degrees: String,
}

impl TcxActivity {
    pub fn laps(&self) -> impl Iterator<Item = &TcxLap> {
        self.items.iter().filter_map(|item| match item {
            ActivityItem::Lap(lap) => Some(lap),
            ActivityItem::HeartRate(_) => None,
        })
    }

    pub fn heart_rates(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            ActivityItem::HeartRate(bpm) => Some(bpm.as_str()),
            ActivityItem::Lap(_) => None,
        })
    }

    pub fn trackpoint_count(&self) -> usize {
        self.laps().map(|lap| lap.track.len()).sum()
    }
}

impl TcxDocument {
    pub fn new(author: Option<TcxAuthor>) -> Self {
        Self {
            activities: Vec::new(),
            author,
        }
    }

    /// Serialize with an XML declaration and two-space indentation.
    pub fn write_to<W: Write>(&self, out: W) -> io::Result<()> {
        let mut xml = XmlWriter::new(out);
        xml.declaration()?;

        let mut root_attrs = vec![("xmlns", TCX_NAMESPACE)];
        let prefixed: Vec<(String, &str)> = EXTENSION_NAMESPACES
            .iter()
            .map(|(prefix, uri)| (format!("xmlns:{prefix}"), *uri))
            .collect();
        root_attrs.extend(prefixed.iter().map(|(name, uri)| (name.as_str(), *uri)));
        root_attrs.push(("xmlns:xsi", XSI_NAMESPACE));
        root_attrs.push(("xsi:schemaLocation", SCHEMA_LOCATION));

        xml.open("TrainingCenterDatabase", &root_attrs)?;
        if self.activities.is_empty() {
            xml.empty("Activities", &[])?;
        } else {
            xml.open("Activities", &[])?;
            for activity in &self.activities {
                write_activity(&mut xml, activity)?;
            }
            xml.close("Activities")?;
        }
        if let Some(author) = &self.author {
            write_author(&mut xml, author)?;
        }
        xml.close("TrainingCenterDatabase")?;
        xml.finish()
    }

    /// [`TcxDocument::write_to`] into memory.
    pub fn to_xml_string(&self) -> io::Result<String> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

fn write_activity<W: Write>(xml: &mut XmlWriter<W>, activity: &TcxActivity) -> io::Result<()> {
    xml.open("Activity", &[("Sport", activity.sport.as_str())])?;
    xml.leaf("Id", &activity.id)?;
    if let Some(name) = &activity.creator {
        xml.open("Creator", &[("xsi:type", "Device_t")])?;
        xml.leaf("Name", name)?;
        xml.close("Creator")?;
    }
    xml.leaf_opt("TotalTimeSeconds", activity.total_time_seconds.as_deref())?;
    xml.leaf_opt("DistanceMeters", activity.distance_meters.as_deref())?;
    xml.leaf_opt("Calories", activity.calories.as_deref())?;
    for item in &activity.items {
        match item {
            ActivityItem::Lap(lap) => write_lap(xml, lap)?,
            ActivityItem::HeartRate(bpm) => {
                xml.open(
                    "HeartRateBpm",
                    &[("xsi:type", "HeartRateInBeatsPerMinute_t")],
                )?;
                xml.leaf("Value", bpm)?;
                xml.close("HeartRateBpm")?;
            }
        }
    }
    xml.close("Activity")
}

fn write_lap<W: Write>(xml: &mut XmlWriter<W>, lap: &TcxLap) -> io::Result<()> {
    let start = format_stamp(&lap.start_time);
    xml.open("Lap", &[("StartTime", start.as_str())])?;
    xml.leaf("TotalTimeSeconds", &lap.total_time_seconds)?;
    xml.leaf_opt("Calories", lap.calories.as_deref())?;
    if lap.track.is_empty() {
        xml.empty("Track", &[])?;
    } else {
        xml.open("Track", &[])?;
        for point in &lap.track {
            write_trackpoint(xml, point)?;
        }
        xml.close("Track")?;
    }
    xml.close("Lap")
}

fn write_trackpoint<W: Write>(xml: &mut XmlWriter<W>, point: &TcxTrackpoint) -> io::Result<()> {
    xml.open("Trackpoint", &[])?;
    xml.leaf("Time", &format_stamp(&point.time))?;
    if let Some(position) = &point.position {
        xml.open("Position", &[])?;
        xml.leaf("LatitudeDegrees", &position.latitude_degrees)?;
        xml.leaf("LongitudeDegrees", &position.longitude_degrees)?;
        xml.close("Position")?;
    }
    xml.leaf_opt("AltitudeMeters", point.altitude_meters.as_deref())?;
    if let Some(bpm) = &point.heart_rate_bpm {
        xml.open("HeartRateBpm", &[])?;
        xml.leaf("Value", bpm)?;
        xml.close("HeartRateBpm")?;
    }
    xml.close("Trackpoint")
}

fn write_author<W: Write>(xml: &mut XmlWriter<W>, author: &TcxAuthor) -> io::Result<()> {
    xml.open("Author", &[("xsi:type", "Application_t")])?;
    xml.leaf("Name", &author.name)?;
    xml.open("Build", &[])?;
    xml.open("Version", &[])?;
    xml.leaf("VersionMajor", &author.version_major.to_string())?;
    xml.leaf("VersionMinor", &author.version_minor.to_string())?;
    xml.leaf("BuildMajor", &author.build_major.to_string())?;
    xml.leaf("BuildMinor", &author.build_minor.to_string())?;
    xml.close("Version")?;
    xml.close("Build")?;
    xml.close("Author")
}

/// Minimal indenting element writer.
struct XmlWriter<W: Write> {
    out: W,
    depth: usize,
}

impl<W: Write> XmlWriter<W> {
    fn new(out: W) -> Self {
        Self { out, depth: 0 }
    }

    fn declaration(&mut self) -> io::Result<()> {
        writeln!(self.out, "<?xml version='1.0' encoding='UTF-8'?>")
    }

    fn indent(&mut self) -> io::Result<()> {
        write!(self.out, "{:width$}", "", width = self.depth * 2)
    }

    fn start_tag(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.indent()?;
        write!(self.out, "<{name}")?;
        for (key, value) in attrs {
            write!(self.out, " {key}=\"{}\"", escape_xml(value))?;
        }
        Ok(())
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.start_tag(name, attrs)?;
        writeln!(self.out, ">")?;
        self.depth += 1;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> io::Result<()> {
        self.start_tag(name, attrs)?;
        writeln!(self.out, "/>")
    }

    fn close(&mut self, name: &str) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.indent()?;
        writeln!(self.out, "</{name}>")
    }

    fn leaf(&mut self, name: &str, text: &str) -> io::Result<()> {
        self.indent()?;
        writeln!(self.out, "<{name}>{}</{name}>", escape_xml(text))
    }

    fn leaf_opt(&mut self, name: &str, text: Option<&str>) -> io::Result<()> {
        match text {
            Some(text) => self.leaf(name, text),
            None => Ok(()),
        }
    }

    fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
