//! Conversion of synthetic studies.
mod common;

use bruker2nifti_convert::{
    convert_study, describe_study, list_scans, subject_id, subject_name, ConvertOptions, Error,
    ScanPlan,
};
use common::{write_subject, NiftiImage, ScanFixture};
use std::fs;
use std::path::Path;

fn small_scan() -> ScanFixture {
    ScanFixture {
        size: [8, 8],
        extent: [4., 4.],
        slices: 2,
        ..Default::default()
    }
}

/// A study with scans 1, 2 and 10, and a folder which is not a scan.
fn write_study(study: &Path) {
    write_subject(study, "M01", Some("Mouse1"));
    for scan in ["1", "2", "10"] {
        small_scan().write(&study.join(scan));
    }
    fs::create_dir_all(study.join("AdjResult")).unwrap();
}

#[test]
fn lists_scans_in_numeric_order() {
    let dir = tempfile::tempdir().unwrap();
    write_study(dir.path());
    assert_eq!(list_scans(dir.path()).unwrap(), vec!["1", "2", "10"]);
}

#[test]
fn describes_study() {
    let dir = tempfile::tempdir().unwrap();
    write_study(dir.path());
    let description = describe_study(dir.path()).unwrap();
    assert_eq!(description.scans, vec!["1", "2", "10"]);
    assert_eq!(description.version.as_deref(), Some("PV 6.0.1"));
}

#[test]
fn study_without_scans() {
    let dir = tempfile::tempdir().unwrap();
    write_subject(dir.path(), "M01", None);
    let err = describe_study(dir.path()).unwrap_err();
    assert!(matches!(err, Error::NoScans { .. }));
}

#[test]
fn subject_name_falls_back_to_id() {
    let dir = tempfile::tempdir().unwrap();
    write_subject(dir.path(), "M02", None);
    assert_eq!(subject_name(dir.path()).unwrap(), "M02");
    assert_eq!(subject_id(dir.path()).unwrap(), "M02");

    write_subject(dir.path(), "M02", Some("Rat 7"));
    assert_eq!(subject_name(dir.path()).unwrap(), "Rat 7");
}

#[test]
fn missing_subject_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = subject_name(dir.path()).unwrap_err();
    assert!(matches!(err, Error::ReadSubject { .. }));
}

#[test]
fn converts_all_scans_under_subject_name() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("20240101_M01");
    write_study(&study);
    let output = dir.path().join("out");
    fs::create_dir(&output).unwrap();

    let mut options = ConvertOptions::default();
    options.save_human_readable(false);
    let report = convert_study(&study, &output, None, None, &options).unwrap();

    assert!(report.is_success());
    assert_eq!(report.output, output.join("Mouse1"));
    let mut scans: Vec<_> = report.converted.iter().map(|c| c.scan.as_str()).collect();
    scans.sort_unstable();
    assert_eq!(scans, vec!["1", "10", "2"]);
    for scan in ["1", "2", "10"] {
        let image = output
            .join("Mouse1")
            .join(scan)
            .join(format!("{}.nii.gz", scan));
        assert_eq!(NiftiImage::read(&image).shape(), vec![8, 8, 2]);
    }
}

#[test]
fn converts_planned_scans_under_given_names() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study");
    write_study(&study);

    let plan = ScanPlan::with_names(
        vec!["2".to_string(), "10".to_string()],
        vec!["t1".to_string(), "t2".to_string()],
    )
    .unwrap();
    let mut options = ConvertOptions::default();
    options.save_human_readable(false).compress(false);
    let report = convert_study(&study, dir.path(), Some("session"), Some(plan), &options).unwrap();

    assert_eq!(report.converted.len(), 2);
    let session = dir.path().join("session");
    assert!(session.join("t1").join("t1.nii").is_file());
    assert!(session.join("t2").join("t2.nii").is_file());
    assert!(!session.join("1").exists());
}

#[test]
fn failing_scan_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study");
    write_study(&study);
    ScanFixture {
        missing_samples: 1,
        ..small_scan()
    }
    .write(&study.join("2"));

    let mut options = ConvertOptions::default();
    options.save_human_readable(false);
    let report = convert_study(&study, dir.path(), Some("s"), None, &options).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.failed.len(), 1);
    let (scan, err) = &report.failed[0];
    assert_eq!(scan, "2");
    assert!(matches!(err, Error::AssembleVolume { .. }));
}

#[test]
fn fail_fast_stops_on_failing_scan() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study");
    write_study(&study);
    ScanFixture {
        missing_samples: 1,
        ..small_scan()
    }
    .write(&study.join("2"));

    let mut options = ConvertOptions::default();
    options.save_human_readable(false).fail_fast(true);
    let err = convert_study(&study, dir.path(), Some("s"), None, &options).unwrap_err();
    match err {
        Error::ConvertScan { scan, source } => {
            assert_eq!(scan, "2");
            assert!(matches!(*source, Error::AssembleVolume { .. }));
        }
        e => panic!("unexpected error {:?}", e),
    }
}

#[test]
fn output_folder_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let study = dir.path().join("study");
    write_study(&study);
    let err = convert_study(
        &study,
        dir.path().join("missing"),
        None,
        None,
        &ConvertOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MissingOutputFolder { .. }));
}

#[test]
fn mismatched_scan_names() {
    let err = ScanPlan::with_names(vec!["1".to_string()], vec![]).unwrap_err();
    assert!(matches!(
        err,
        Error::MismatchedScanNames {
            scans: 1,
            names: 0,
            ..
        }
    ));
}
