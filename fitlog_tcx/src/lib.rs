//! Conversion of SportTracks fitlog activity logs into Garmin TCX documents.

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

pub mod assign;
pub mod convert;
pub mod fitlog;
pub mod sport;
pub mod tcx;
pub mod transcode;

pub use assign::{assign_points, Assignment};
pub use convert::{
    convert, convert_at, Conversion, ConversionReport, ConvertObserver,
    ConvertOptions, NoopObserver,
};
pub use fitlog::{parse_fitlog, read_fitlog, SourceActivity, SourceLap, SourceTrackPoint};
pub use sport::{find_unsupported_activities, load_sport_mapping, resolve, SportMapping};
pub use tcx::{ActivityItem, TcxActivity, TcxAuthor, TcxDocument, TcxLap, TcxTrackpoint};
pub use transcode::{transcode, HeartRatePlacement, Transcoded};

/// Timestamp layout used by fitlog attributes and TCX time elements.
pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Compact timestamp layout used in output file names.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse fitlog XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{parent}> is missing its <{element}> element")]
    MissingElement {
        parent: &'static str,
        element: &'static str,
    },
    #[error("<{element}> is missing its {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("invalid timestamp '{0}': expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),
    #[error("invalid trackpoint time offset '{0}': expected whole seconds")]
    InvalidOffset(String),
    #[error("failed to read sport mapping: {0}")]
    Mapping(#[from] csv::Error),
    #[error("sport mapping row {0} needs a sport name and a replacement")]
    MappingRow(usize),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` stamp as a UTC instant.
pub fn parse_stamp(value: &str) -> Result<DateTime<Utc>, ConvertError> {
    NaiveDateTime::parse_from_str(value, STAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ConvertError::InvalidTimestamp(value.to_string()))
}

pub fn format_stamp(time: &DateTime<Utc>) -> String {
    time.format(STAMP_FORMAT).to_string()
}

/// Stamp used to name output files, e.g. `20240301T071500Z`.
pub fn file_stamp(time: &DateTime<Utc>) -> String {
    time.format(FILE_STAMP_FORMAT).to_string()
}
