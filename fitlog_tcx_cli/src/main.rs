use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, ValueHint};
use fitlog_tcx::sport::VALID_SPORTS;
use fitlog_tcx::{
    convert, format_stamp, load_sport_mapping, ConvertObserver, ConvertOptions, Conversion,
    ConversionReport, HeartRatePlacement, SourceActivity, SportMapping, TcxActivity,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status used when the fitlog holds sports that need a mapping.
const EXIT_UNSUPPORTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "fitlog2tcx",
    author,
    version,
    about = "Converts a SportTracks fitlog file into Garmin TCX files",
    long_about = None
)]
struct Cli {
    /// Input fitlog file
    #[arg(long, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output directory (created when missing)
    #[arg(long, value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Sport name mapping CSV (`source name, replacement`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    mapping: Option<PathBuf>,

    /// Split the input into one TCX file per activity
    #[arg(long, action = ArgAction::SetTrue)]
    split: bool,

    /// Omit the Author block from the output
    #[arg(long, action = ArgAction::SetTrue)]
    no_author: bool,

    /// Write heart rate inside each Trackpoint instead of under Activity
    #[arg(long, action = ArgAction::SetTrue)]
    hr_per_trackpoint: bool,

    /// Optional JSON path for the conversion summary
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            split: self.split,
            include_author: !self.no_author,
            heart_rate: if self.hr_per_trackpoint {
                HeartRatePlacement::Trackpoint
            } else {
                HeartRatePlacement::Activity
            },
        }
    }
}

/// Logs conversion progress.
struct LogObserver<'a> {
    mapping: &'a SportMapping,
}

impl ConvertObserver for LogObserver<'_> {
    fn activity_started(&mut self, activity: &SourceActivity) {
        match activity.location.as_deref() {
            Some(location) => info!(
                "Converting activity starting at {} ({})...",
                format_stamp(&activity.start_time),
                location
            ),
            None => info!(
                "Converting activity starting at {}...",
                format_stamp(&activity.start_time)
            ),
        }
        if let Some(mapped) = self.mapping.get(&activity.sport_category) {
            debug!("Sport {} mapped to {}", activity.sport_category, mapped);
        }
    }

    fn activity_converted(&mut self, activity: &TcxActivity, _start_time: DateTime<Utc>) {
        debug!(
            "Activity {} converted: sport {}, {} laps, {} trackpoints",
            activity.id,
            activity.sport,
            activity.laps().count(),
            activity.trackpoint_count()
        );
    }

    fn points_dropped(&mut self, activity: &SourceActivity, count: usize) {
        warn!(
            "Activity {}: {} trackpoints fall outside every lap and were skipped",
            activity.id, count
        );
    }

    fn file_written(&mut self, path: &Path, activities: usize) {
        info!(
            "Wrote {} ({} activit{})",
            path.display(),
            activities,
            if activities == 1 { "y" } else { "ies" }
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mapping = match cli.mapping.as_ref() {
        Some(path) => {
            info!("Parsing {}", path.display());
            let mapping = load_sport_mapping(path)
                .with_context(|| format!("failed to load sport mapping {}", path.display()))?;
            info!("Loaded {} sport mappings", mapping.len());
            mapping
        }
        None => SportMapping::new(),
    };

    info!(
        "Converting {} into {}",
        cli.input.display(),
        cli.output.display()
    );
    let mut observer = LogObserver { mapping: &mapping };
    let conversion = convert(
        &cli.input,
        &cli.output,
        &mapping,
        &cli.options(),
        &mut observer,
    )
    .with_context(|| format!("failed to convert {}", cli.input.display()))?;

    match conversion {
        Conversion::Completed(report) => {
            info!(
                "Converted {} activities ({} trackpoints, {} skipped) into {} file(s)",
                report.activities,
                report.trackpoints,
                report.dropped_points,
                report.files.len()
            );
            if let Some(path) = cli.report.as_ref() {
                write_report(&report, path)?;
                info!("Wrote conversion report: {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Conversion::Unsupported(names) => {
            warn!(
                "Unsupported sports found in {}: {}",
                cli.input.display(),
                names.join(", ")
            );
            warn!("Supported sports are: {}", VALID_SPORTS.join(", "));
            warn!("Pass --mapping with a CSV of `source name, replacement` rows to rename them");
            Ok(ExitCode::from(EXIT_UNSUPPORTED))
        }
    }
}

fn write_report(report: &ConversionReport, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let cli = Cli::try_parse_from(["fitlog2tcx", "--input", "log.fitlog", "--output", "out"])
            .unwrap();
        assert_eq!(cli.options(), ConvertOptions::default());
        assert!(cli.mapping.is_none());
    }

    #[test]
    fn test_flags_map_onto_options() {
        let cli = Cli::try_parse_from([
            "fitlog2tcx",
            "--input",
            "log.fitlog",
            "--output",
            "out",
            "--mapping",
            "sports.csv",
            "--split",
            "--no-author",
            "--hr-per-trackpoint",
        ])
        .unwrap();
        let options = cli.options();
        assert!(options.split);
        assert!(!options.include_author);
        assert_eq!(options.heart_rate, HeartRatePlacement::Trackpoint);
        assert_eq!(cli.mapping, Some(PathBuf::from("sports.csv")));
    }

    #[test]
    fn test_input_and_output_required() {
        assert!(Cli::try_parse_from(["fitlog2tcx", "--input", "log.fitlog"]).is_err());
        assert!(Cli::try_parse_from(["fitlog2tcx", "--output", "out"]).is_err());
    }
}
