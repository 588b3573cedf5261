//! Conversion of whole studies.
//!
//! A study folder holds the `subject` parameter file
//! and one numbered folder per scan.
use crate::error::{
    ConvertScanSnafu, CreateOutputFolderSnafu, Error, InvalidOptionsSnafu, ListScansSnafu,
    MismatchedScanNamesSnafu, MissingInputFolderSnafu, MissingOutputFolderSnafu,
    MissingSubjectFieldSnafu, NoScansSnafu, ReadParametersSnafu, ReadSubjectSnafu, Result,
};
use crate::options::ConvertOptions;
use crate::scan::convert_scan;
use bruker2nifti_parser::{read_parameter_file, ParameterSet};
use snafu::{ensure, OptionExt, ResultExt};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// List the scans of a study:
/// the sub-folders holding an `acqp` file,
/// in numeric order where their names are numbers.
pub fn list_scans(study: impl AsRef<Path>) -> Result<Vec<String>> {
    let study = study.as_ref();
    ensure!(study.is_dir(), MissingInputFolderSnafu { path: study });

    let mut scans = Vec::new();
    for entry in std::fs::read_dir(study).context(ListScansSnafu { path: study })? {
        let entry = entry.context(ListScansSnafu { path: study })?;
        if entry.path().join("acqp").is_file() {
            scans.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    scans.sort_by(|a, b| compare_scan_names(a, b));
    Ok(scans)
}

fn compare_scan_names(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Read the `subject` parameter set of a study.
pub fn subject_info(study: impl AsRef<Path>) -> Result<ParameterSet> {
    let study = study.as_ref();
    ensure!(study.is_dir(), MissingInputFolderSnafu { path: study });
    read_parameter_file("subject", study).context(ReadSubjectSnafu { path: study })
}

fn subject_text(study: &Path, field: &'static str) -> Result<String> {
    let subject = subject_info(study)?;
    subject
        .get(field)
        .and_then(|v| v.as_text())
        .map(str::to_string)
        .context(MissingSubjectFieldSnafu { path: study, field })
}

/// The name of the study's subject (`SUBJECT_name_string`),
/// falling back to the subject identifier.
pub fn subject_name(study: impl AsRef<Path>) -> Result<String> {
    let study = study.as_ref();
    match subject_text(study, "SUBJECT_name_string") {
        Err(Error::MissingSubjectField { .. }) => subject_id(study),
        other => other,
    }
}

/// The identifier of the study's subject (`SUBJECT_id`).
pub fn subject_id(study: impl AsRef<Path>) -> Result<String> {
    subject_text(study.as_ref(), "SUBJECT_id")
}

/// An overview of a study folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyDescription {
    pub scans: Vec<String>,
    /// The ParaVision version which acquired the first scan.
    pub version: Option<String>,
}

/// Describe the structure of a study:
/// its scans and the software version of the first one.
pub fn describe_study(study: impl AsRef<Path>) -> Result<StudyDescription> {
    let study = study.as_ref();
    let scans = list_scans(study)?;
    let first = scans.first().context(NoScansSnafu { path: study })?;
    let scan = study.join(first);
    let acqp = read_parameter_file("acqp", &scan).context(ReadParametersSnafu { path: &scan })?;
    let version = acqp
        .get("ACQ_sw_version")
        .and_then(|v| v.as_text())
        .map(str::to_string);

    Ok(StudyDescription { scans, version })
}

/// The scans of a study to convert,
/// each paired with the name of its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    entries: Vec<(String, String)>,
}

impl ScanPlan {
    /// Plan the conversion of the given scans,
    /// each output named after its scan.
    pub fn from_scans(scans: Vec<String>) -> Self {
        ScanPlan {
            entries: scans.into_iter().map(|s| (s.clone(), s)).collect(),
        }
    }

    /// Plan the conversion of the given scans under the given output names.
    ///
    /// Both lists must have the same length.
    pub fn with_names(scans: Vec<String>, names: Vec<String>) -> Result<Self> {
        ensure!(
            scans.len() == names.len(),
            MismatchedScanNamesSnafu {
                scans: scans.len(),
                names: names.len(),
            }
        );
        Ok(ScanPlan {
            entries: scans.into_iter().zip(names).collect(),
        })
    }

    /// Iterate over the (scan, output name) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, n)| (s.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A scan converted as part of a study.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedScan {
    pub scan: String,
    pub output: PathBuf,
    pub files: Vec<PathBuf>,
}

/// The outcome of a study conversion.
#[derive(Debug)]
pub struct StudyReport {
    /// The folder holding all converted scans.
    pub output: PathBuf,
    pub converted: Vec<ConvertedScan>,
    /// Scans which could not be converted, with the reason.
    pub failed: Vec<(String, Error)>,
}

impl StudyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Convert the scans of the study in `study`
/// into `<output>/<study name>/<output name>/`.
///
/// Both folders must exist.
/// The study name defaults to the subject name,
/// and the plan defaults to all scans of the study.
/// Unless `options.fail_fast` is set,
/// a failing scan is recorded in the report
/// and the remaining scans are still converted.
pub fn convert_study(
    study: impl AsRef<Path>,
    output: impl AsRef<Path>,
    study_name: Option<&str>,
    plan: Option<ScanPlan>,
    options: &ConvertOptions,
) -> Result<StudyReport> {
    let study = study.as_ref();
    let output = output.as_ref();

    options.validate().context(InvalidOptionsSnafu)?;
    ensure!(study.is_dir(), MissingInputFolderSnafu { path: study });
    ensure!(output.is_dir(), MissingOutputFolderSnafu { path: output });

    let plan = match plan {
        Some(plan) => plan,
        None => ScanPlan::from_scans(list_scans(study)?),
    };
    let study_name = match study_name {
        Some(name) => name.to_string(),
        None => subject_name(study)?,
    };

    let study_output = output.join(&study_name);
    std::fs::create_dir_all(&study_output).context(CreateOutputFolderSnafu {
        path: &study_output,
    })?;
    if options.verbose >= 1 {
        info!(
            "Converting {} scans of study {} into {}",
            plan.len(),
            study.display(),
            study_output.display()
        );
    }

    let outcomes = run_plan(study, &study_output, &plan, options)?;

    let mut report = StudyReport {
        output: study_output,
        converted: Vec::new(),
        failed: Vec::new(),
    };
    for (scan, output, outcome) in outcomes {
        match outcome {
            Ok(files) => report.converted.push(ConvertedScan {
                scan,
                output,
                files,
            }),
            Err(e) => {
                warn!("Could not convert scan {}: {}", scan, snafu::Report::from_error(&e));
                report.failed.push((scan, e));
            }
        }
    }
    Ok(report)
}

type ScanOutcome = (String, PathBuf, Result<Vec<PathBuf>>);

fn convert_planned(
    study: &Path,
    study_output: &Path,
    scan: &str,
    name: &str,
    options: &ConvertOptions,
) -> ScanOutcome {
    let output = study_output.join(name);
    let outcome = convert_scan(study.join(scan), &output, Some(name), options);
    (scan.to_string(), output, outcome)
}

/// Fail with the error of a failed scan if failing fast.
fn check_outcome(outcome: ScanOutcome, fail_fast: bool) -> Result<ScanOutcome> {
    match outcome {
        (scan, _, Err(e)) if fail_fast => Err(e).context(ConvertScanSnafu { scan }),
        outcome => Ok(outcome),
    }
}

#[cfg(not(feature = "rayon"))]
fn run_plan(
    study: &Path,
    study_output: &Path,
    plan: &ScanPlan,
    options: &ConvertOptions,
) -> Result<Vec<ScanOutcome>> {
    plan.iter()
        .map(|(scan, name)| {
            let outcome = convert_planned(study, study_output, scan, name, options);
            check_outcome(outcome, options.fail_fast)
        })
        .collect()
}

#[cfg(feature = "rayon")]
fn run_plan(
    study: &Path,
    study_output: &Path,
    plan: &ScanPlan,
    options: &ConvertOptions,
) -> Result<Vec<ScanOutcome>> {
    use rayon::prelude::*;

    plan.entries
        .par_iter()
        .map(|(scan, name)| {
            let outcome = convert_planned(study, study_output, scan, name, options);
            check_outcome(outcome, options.fail_fast)
        })
        .collect()
}
