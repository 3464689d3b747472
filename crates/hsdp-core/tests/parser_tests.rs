//! Problem-file parsing against the shipped problems and on-disk files

use std::io::Write;

use hsdp_core::{parse_file, parse_problem, DiagramSpec, HsdpError, ProblemSpec, VariableKind};

const ROVER: &str = include_str!("../../../problems/rover.hsdp");
const KEEP_BIT: &str = include_str!("../../../problems/keep_bit.hsdp");

#[test]
fn test_rover_declarations() {
    let p = parse_problem(ROVER).unwrap();

    let names: Vec<&str> = p.continuous.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["pos", "energy"]);
    assert!(p.continuous.iter().all(|v| v.min == Some(0.0) && v.max == Some(10.0)));
    assert_eq!(p.kind_of("done"), Some(VariableKind::Boolean));
    assert_eq!(p.kind_of("reading"), Some(VariableKind::Observation));
    assert_eq!(p.kind_of("pos'"), None);

    assert_eq!(p.actions.len(), 2);
    for action in &p.actions {
        let primed: Vec<&str> = action.transitions.keys().map(String::as_str).collect();
        assert_eq!(primed, ["done'", "energy'", "pos'"]);
        assert!(action.observations.contains_key("reading"));
    }
    assert_eq!(p.constraints.len(), 1);
    assert_eq!(p.iterations, 4);
}

#[test]
fn test_keep_bit_has_no_continuous_state() {
    let p = parse_problem(KEEP_BIT).unwrap();
    assert!(p.continuous.is_empty());
    assert!(p.constraints.is_empty());
    assert!(matches!(p.actions[0].reward, DiagramSpec::Branch { .. }));
}

#[test]
fn test_parse_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(ROVER.as_bytes()).unwrap();

    let from_disk = parse_file(file.path()).unwrap();
    assert_eq!(from_disk, parse_problem(ROVER).unwrap());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_file(dir.path().join("absent.hsdp")).unwrap_err();
    assert!(matches!(err, HsdpError::Io(_)));
}

#[test]
fn test_bad_iteration_count_reports_its_line() {
    let src = KEEP_BIT.replace("iterations 3", "iterations three");
    let expected_line = src.lines().position(|l| l.contains("three")).unwrap() + 1;

    match parse_problem(&src).unwrap_err() {
        HsdpError::InvalidNumber { line, literal, .. } => {
            assert_eq!(line, expected_line);
            assert_eq!(literal, "three");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_trailing_garbage_rejected() {
    let src = format!("{KEEP_BIT}\nextra");
    assert!(matches!(
        parse_problem(&src),
        Err(HsdpError::MalformedInput { expected, .. }) if expected == "end of file"
    ));
}

#[test]
fn test_spec_survives_json() {
    let p = parse_problem(ROVER).unwrap();
    let json = serde_json::to_string(&p).unwrap();
    let back: ProblemSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
}

#[test]
fn test_display_lists_actions() {
    let shown = parse_problem(ROVER).unwrap().to_string();
    assert!(shown.starts_with("Problem Definition:"));
    assert!(shown.contains("==> drive"));
    assert!(shown.contains("==> survey"));
}
