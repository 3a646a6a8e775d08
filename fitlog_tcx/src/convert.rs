//! Assembly of TCX documents from a fitlog file and the output file layout.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fitlog::{read_fitlog, SourceActivity};
use crate::sport::{find_unsupported_activities, SportMapping};
use crate::tcx::{TcxActivity, TcxAuthor, TcxDocument};
use crate::transcode::{transcode, HeartRatePlacement};
use crate::{file_stamp, ConvertError};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Write one file per activity instead of a single merged file.
    pub split: bool,
    pub include_author: bool,
    pub heart_rate: HeartRatePlacement,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            split: false,
            include_author: true,
            heart_rate: HeartRatePlacement::Activity,
        }
    }
}

/// Progress hooks invoked while converting. All hooks default to no-ops.
pub trait ConvertObserver {
    fn activity_started(&mut self, _activity: &SourceActivity) {}

    fn activity_converted(&mut self, _activity: &TcxActivity, _start_time: DateTime<Utc>) {}

    /// `count` trackpoints of `activity` fell inside no lap and were not written.
    fn points_dropped(&mut self, _activity: &SourceActivity, _count: usize) {}

    fn file_written(&mut self, _path: &Path, _activities: usize) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ConvertObserver for NoopObserver {}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionReport {
    pub files: Vec<PathBuf>,
    pub activities: usize,
    pub trackpoints: usize,
    pub dropped_points: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Conversion {
    Completed(ConversionReport),
    /// Category names with no valid sport and no mapping; nothing was written.
    Unsupported(Vec<String>),
}

/// Convert the fitlog at `source` into TCX files under `output_dir`.
pub fn convert(
    source: &Path,
    output_dir: &Path,
    mapping: &SportMapping,
    options: &ConvertOptions,
    observer: &mut dyn ConvertObserver,
) -> Result<Conversion, ConvertError> {
    convert_at(source, output_dir, mapping, options, Utc::now(), observer)
}

/// As [`convert`], with `now` stamping the merged output file name.
pub fn convert_at(
    source: &Path,
    output_dir: &Path,
    mapping: &SportMapping,
    options: &ConvertOptions,
    now: DateTime<Utc>,
    observer: &mut dyn ConvertObserver,
) -> Result<Conversion, ConvertError> {
    let activities = read_fitlog(source)?;
    let unsupported = find_unsupported_activities(&activities, mapping);
    if !unsupported.is_empty() {
        return Ok(Conversion::Unsupported(unsupported));
    }

    fs::create_dir_all(output_dir).map_err(|e| ConvertError::io(output_dir, e))?;
    let merged_name = format!("{}-converted-{}.tcx", input_stem(source), file_stamp(&now));
    let report = if options.split {
        write_split(&activities, output_dir, mapping, options, observer)?
    } else {
        write_merged(
            &activities,
            &output_dir.join(merged_name),
            mapping,
            options,
            observer,
        )?
    };
    Ok(Conversion::Completed(report))
}

/// Input file name up to its first `.`.
fn input_stem(source: &Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .unwrap_or_default()
}

fn new_document(options: &ConvertOptions) -> TcxDocument {
    TcxDocument::new(options.include_author.then(TcxAuthor::application))
}

/// Build one document per activity, named after the activity start time.
/// Activities sharing a start time overwrite each other's file.
pub fn write_split(
    activities: &[SourceActivity],
    output_dir: &Path,
    mapping: &SportMapping,
    options: &ConvertOptions,
    observer: &mut dyn ConvertObserver,
) -> Result<ConversionReport, ConvertError> {
    let mut report = ConversionReport::default();
    for source in activities {
        let (activity, start_time) =
            convert_activity(source, mapping, options, &mut report, observer);
        let mut doc = new_document(options);
        doc.activities.push(activity);

        let path = output_dir.join(format!("{}.tcx", file_stamp(&start_time)));
        write_document(&doc, &path)?;
        observer.file_written(&path, 1);
        report.files.push(path);
    }
    Ok(report)
}

/// Build a single document holding every activity in source order.
pub fn write_merged(
    activities: &[SourceActivity],
    path: &Path,
    mapping: &SportMapping,
    options: &ConvertOptions,
    observer: &mut dyn ConvertObserver,
) -> Result<ConversionReport, ConvertError> {
    let mut report = ConversionReport::default();
    let mut doc = new_document(options);
    for source in activities {
        let (activity, _) = convert_activity(source, mapping, options, &mut report, observer);
        doc.activities.push(activity);
    }
    write_document(&doc, path)?;
    observer.file_written(path, doc.activities.len());
    report.files.push(path.to_path_buf());
    Ok(report)
}

fn convert_activity(
    source: &SourceActivity,
    mapping: &SportMapping,
    options: &ConvertOptions,
    report: &mut ConversionReport,
    observer: &mut dyn ConvertObserver,
) -> (TcxActivity, DateTime<Utc>) {
    observer.activity_started(source);
    let out = transcode(source, mapping, options.heart_rate);
    if out.dropped_points > 0 {
        observer.points_dropped(source, out.dropped_points);
    }
    observer.activity_converted(&out.activity, out.start_time);

    report.activities += 1;
    report.trackpoints += out.activity.trackpoint_count();
    report.dropped_points += out.dropped_points;
    (out.activity, out.start_time)
}

pub fn write_document(doc: &TcxDocument, path: &Path) -> Result<(), ConvertError> {
    let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
    doc.write_to(BufWriter::new(file))
        .map_err(|e| ConvertError::io(path, e))
}
