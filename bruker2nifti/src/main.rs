//! A CLI tool for converting Bruker ParaVision scans and studies
//! into NIfTI images.
use bruker2nifti_convert::{
    convert_scan, convert_study, describe_study, list_scans, subject_name,
    AxisDirection, ConvertOptions, Error, ScanPlan,
};
use bruker2nifti_nifti::NiftiVersion;
use clap::{Args, Parser, Subcommand};
use snafu::{Report, ResultExt, Whatever};
use std::path::{Path, PathBuf};
use tracing::{error, warn, Level};

/// Exit code for when a scan could not be converted.
const ERROR_SCAN: i32 = -2;
/// Exit code for when a study could not be converted.
const ERROR_STUDY: i32 = -3;
/// Exit code for when some scans of a study could not be converted.
const ERROR_PARTIAL: i32 = -4;
/// Exit code for when a study could not be inspected.
const ERROR_INFO: i32 = -5;

/// Convert Bruker ParaVision scans into NIfTI images
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level
    /// (0: warnings only, 1: progress, 2: debugging detail)
    #[arg(
        short = 'v',
        long = "verbose",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=2),
        global = true
    )]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert a single scan folder
    Scan {
        /// The scan folder (holding `acqp`, `method` and `pdata/`)
        input: PathBuf,

        /// The folder to write into (created if missing)
        output: PathBuf,

        /// The name of the output files
        /// (default is the name of the scan folder)
        #[arg(short = 'n', long = "name")]
        name: Option<String>,

        #[command(flatten)]
        conversion: ConversionArgs,
    },
    /// Convert all or some scans of a study folder
    Study {
        /// The study folder (holding `subject` and the scan folders)
        study: PathBuf,

        /// The folder to write into (must exist)
        output: PathBuf,

        /// The name of the study output folder
        /// (default is the subject name)
        #[arg(long = "study-name")]
        study_name: Option<String>,

        /// Comma separated scans to convert (default is all scans)
        #[arg(long = "scans", value_delimiter = ',')]
        scans: Vec<String>,

        /// Comma separated output names, one per scan
        /// (default is the scan names)
        #[arg(long = "names", value_delimiter = ',')]
        names: Vec<String>,

        /// Stop at the first scan which cannot be converted
        #[arg(long = "fail-fast")]
        fail_fast: bool,

        #[command(flatten)]
        conversion: ConversionArgs,
    },
    /// Print an overview of a study folder
    Info {
        /// The study folder
        study: PathBuf,
    },
}

#[derive(Debug, Args)]
struct ConversionArgs {
    /// NIfTI header version (1 or 2)
    #[arg(long = "nifti-version", default_value = "1", value_parser = parse_nifti_version)]
    nifti_version: NiftiVersion,

    /// qform code (0 to 4)
    #[arg(long = "qform", default_value_t = 2)]
    qform: u8,

    /// sform code (0 to 4)
    #[arg(long = "sform", default_value_t = 1)]
    sform: u8,

    /// Sign of each spatial axis of the transform
    #[arg(long = "axis-direction", default_value = "-1,-1,1", allow_hyphen_values = true)]
    axis_direction: AxisDirection,

    /// Reconstruction to convert, under `pdata/`
    #[arg(long = "reco", default_value_t = 1)]
    reco_number: u32,

    /// Apply the data slope and offset to the samples
    #[arg(long = "correct-slope")]
    correct_slope: bool,

    /// Keep diffusion gradient vectors as acquired
    #[arg(long = "no-normalise-bvecs")]
    no_normalise_bvecs: bool,

    /// Do not write the parameter sets as text files
    #[arg(long = "no-human-readable")]
    no_human_readable: bool,

    /// Write `.nii` instead of `.nii.gz`
    #[arg(long = "no-compress")]
    no_compress: bool,
}

fn parse_nifti_version(s: &str) -> Result<NiftiVersion, String> {
    s.parse::<u8>()
        .ok()
        .and_then(NiftiVersion::from_number)
        .ok_or_else(|| format!("unsupported NIfTI version `{}`, expected 1 or 2", s))
}

impl ConversionArgs {
    fn options(&self, verbose: u8) -> ConvertOptions {
        let mut options = ConvertOptions::new();
        options
            .nifti_version(self.nifti_version)
            .qform(self.qform)
            .sform(self.sform)
            .axis_direction(self.axis_direction)
            .reco_number(self.reco_number)
            .correct_slope(self.correct_slope)
            .normalise_b_vectors_if_dwi(!self.no_normalise_bvecs)
            .save_human_readable(!self.no_human_readable)
            .compress(!self.no_compress)
            .verbose(verbose);
        options
    }
}

fn main() {
    let App { command, verbose } = App::parse();

    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    let code = match command {
        Command::Scan {
            input,
            output,
            name,
            conversion,
        } => {
            let options = conversion.options(verbose);
            match convert_scan(&input, &output, name.as_deref(), &options) {
                Ok(files) => {
                    for file in files {
                        println!("{}", file.display());
                    }
                    0
                }
                Err(e) => {
                    error!("{}", Report::from_error(e));
                    ERROR_SCAN
                }
            }
        }
        Command::Study {
            study,
            output,
            study_name,
            scans,
            names,
            fail_fast,
            conversion,
        } => {
            let mut options = conversion.options(verbose);
            options.fail_fast(fail_fast);
            run_study(&study, &output, study_name.as_deref(), scans, names, &options)
                .unwrap_or_else(|e| {
                    error!("{}", Report::from_error(e));
                    ERROR_STUDY
                })
        }
        Command::Info { study } => run_info(&study).map(|()| 0).unwrap_or_else(|e| {
            error!("{}", Report::from_error(e));
            ERROR_INFO
        }),
    };

    std::process::exit(code);
}

/// Convert a study, returning the exit code.
fn run_study(
    study: &Path,
    output: &Path,
    study_name: Option<&str>,
    scans: Vec<String>,
    names: Vec<String>,
    options: &ConvertOptions,
) -> Result<i32, Error> {
    let plan = match (scans.is_empty(), names.is_empty()) {
        (true, true) => None,
        (false, true) => Some(ScanPlan::from_scans(scans)),
        (true, false) => Some(ScanPlan::with_names(list_scans(study)?, names)?),
        (false, false) => Some(ScanPlan::with_names(scans, names)?),
    };

    let report = convert_study(study, output, study_name, plan, options)?;
    for converted in &report.converted {
        println!("{}: {}", converted.scan, converted.output.display());
    }
    for (scan, e) in &report.failed {
        warn!("Scan {} failed: {}", scan, Report::from_error(e));
    }
    println!(
        "Converted {} scans into {} ({} failed)",
        report.converted.len(),
        report.output.display(),
        report.failed.len()
    );

    Ok(if report.is_success() { 0 } else { ERROR_PARTIAL })
}

fn run_info(study: &Path) -> Result<(), Error> {
    let description = describe_study(study)?;
    let subject = subject_name(study).unwrap_or_else(|_| "(unknown)".to_string());

    println!("Study:      {}", study.display());
    println!("Subject:    {}", subject);
    println!(
        "ParaVision: {}",
        description.version.as_deref().unwrap_or("(unknown)")
    );
    println!("Scans:      {}", description.scans.join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }

    #[test]
    fn parses_conversion_options() {
        let app = App::try_parse_from([
            "bruker2nifti",
            "-v",
            "2",
            "study",
            "in",
            "out",
            "--scans",
            "3,4",
            "--names",
            "t1,t2",
            "--axis-direction",
            "1,-1,1",
            "--nifti-version",
            "2",
            "--no-compress",
        ])
        .unwrap();
        assert_eq!(app.verbose, 2);
        match app.command {
            crate::Command::Study {
                scans,
                names,
                conversion,
                ..
            } => {
                assert_eq!(scans, vec!["3", "4"]);
                assert_eq!(names, vec!["t1", "t2"]);
                let options = conversion.options(app.verbose);
                assert_eq!(options.axis_direction.signs(), [1, -1, 1]);
                assert_eq!(options.nifti_version, bruker2nifti_nifti::NiftiVersion::Nifti2);
                assert!(!options.compress);
                assert!(options.normalise_b_vectors_if_dwi);
                assert_eq!(options.verbose, 2);
            }
            c => panic!("unexpected command {:?}", c),
        }
    }

    #[test]
    fn rejects_bad_axis_direction() {
        assert!(App::try_parse_from([
            "bruker2nifti",
            "scan",
            "in",
            "out",
            "--axis-direction",
            "1,0,1",
        ])
        .is_err());
    }
}
