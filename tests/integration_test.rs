use std::fs;
use std::path::PathBuf;

use colmaker::config::ConfigError;
use colmaker::{run, Error, RunConfig};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new(contents: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.tsv");
        let output = dir.path().join("output.tsv");
        fs::write(&input, contents).unwrap();
        Fixture { dir, input, output }
    }

    fn config(
        &self,
        expression: &str,
        round: bool,
        columns: &str,
        types: &str,
        positional: bool,
    ) -> RunConfig {
        RunConfig::new(
            &self.input,
            &self.output,
            expression,
            round,
            columns,
            types,
            positional,
        )
        .unwrap()
    }

    fn output(&self) -> String {
        fs::read_to_string(&self.output).unwrap()
    }
}

#[test]
fn test_sum_of_int_columns() {
    let fixture = Fixture::new("3\t4\n");
    let report = run(&fixture.config("c1+c2", false, "2", "int,int", false)).unwrap();

    assert_eq!(fixture.output(), "3\t4\t7\n");
    assert_eq!(report.counters.total_lines, 1);
    assert_eq!(report.counters.lines_kept, 1);
    assert_eq!(
        report.to_string(),
        "Creating column 3 with expression c1+c2\nkept 100.00% of 1 lines."
    );
}

#[test]
fn test_blank_line_is_skipped() {
    let fixture = Fixture::new("1\t2\n3\t4\n\n5\t6\n7\t8\n");
    let report = run(&fixture.config("c1*c2", true, "2", "int,int", false)).unwrap();

    assert_eq!(fixture.output(), "1\t2\t2\n3\t4\t12\n5\t6\t30\n7\t8\t56\n");
    assert_eq!(report.counters.skipped_lines, 1);
    assert_eq!(report.counters.lines_kept, 4);
    assert_eq!(report.counters.total_lines, 5);
    assert!(report
        .to_string()
        .ends_with("Skipped 1 invalid lines starting at line #3: \"\""));
}

#[test]
fn test_disallowed_expression_is_rejected() {
    let fixture = Fixture::new("1\t2\n");
    let err = run(&fixture.config("import os", false, "2", "int,int", false)).unwrap_err();

    assert!(matches!(err, Error::InvalidExpression { .. }));
    assert!(!fixture.output.exists());
}

#[test]
fn test_single_column_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.tsv");
    let output = dir.path().join("output.tsv");

    let err = RunConfig::new(&missing, &output, "c1", false, "1", "int", false).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidColumnCount { .. }));
    assert!(!output.exists());
}

#[test]
fn test_schema_mismatch_before_files_open() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.tsv");
    let output = dir.path().join("output.tsv");

    let config = RunConfig::new(&missing, &output, "c1", false, "3", "int,int", false).unwrap();
    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::SchemaMismatch {
            column_count: 3,
            type_count: 2
        })
    ));
    assert!(!output.exists());
}

#[test]
fn test_positional_notation() {
    let fixture = Fixture::new("1\t3\n1\t100000\n");
    let report = run(&fixture.config("c1/c2", false, "2", "int,int", true)).unwrap();

    assert_eq!(
        fixture.output(),
        "1\t3\t0.3333333333333333\n1\t100000\t0.00001\n"
    );
    assert!(report
        .to_string()
        .starts_with("Creating column 3 with expression format_float_positional(c1/c2)"));
}

#[test]
fn test_scientific_notation_by_default() {
    let fixture = Fixture::new("1\t100000\n");
    run(&fixture.config("c1/c2", false, "2", "int,int", false)).unwrap();
    assert_eq!(fixture.output(), "1\t100000\t1e-05\n");
}

#[test]
fn test_kept_plus_skipped_is_total() {
    let fixture = Fixture::new(
        "# comment\nchr1\t100\t200\nchr2\tx\t5\nchr3\t7\nchr4\t10\t0\n\nchr5\t3\t4\n",
    );
    let report = run(&fixture.config("c2 / c3", false, "3", "str,int,int", false)).unwrap();
    let counters = &report.counters;

    assert_eq!(counters.total_lines, 7);
    assert_eq!(counters.lines_kept, 2);
    assert_eq!(counters.skipped_lines, 5);
    assert_eq!(counters.lines_kept + counters.skipped_lines, counters.total_lines);
    assert_eq!(fixture.output(), "chr1\t100\t200\t0.5\nchr5\t3\t4\t0.75\n");

    let first = counters.first_invalid.as_ref().unwrap();
    assert_eq!(first.line_number, 1);
    assert_eq!(first.content, "# comment");
}

#[test]
fn test_round_produces_integers() {
    let fixture = Fixture::new("7\t2\n5\t2\n1\t3\n");
    run(&fixture.config("c1 / c2", true, "2", "int,int", false)).unwrap();

    for line in fixture.output().lines() {
        let value = line.rsplit('\t').next().unwrap();
        assert!(value.parse::<i64>().is_ok(), "{:?} is not an integer", value);
    }
    assert_eq!(fixture.output(), "7\t2\t4\n5\t2\t2\n1\t3\t0\n");
}

#[test]
fn test_placeholders_and_strings() {
    let fixture = Fixture::new("chr1\t5\nchrX\t9\n");
    run(&fixture.config(
        "c1 __eq__ __sq__chrX__sq__ or c2 __lt__ 6",
        false,
        "2",
        "str,int",
        false,
    ))
    .unwrap();
    assert_eq!(fixture.output(), "chr1\t5\tTrue\nchrX\t9\tTrue\n");
}

#[test]
fn test_unbound_column_skips_every_row() {
    let fixture = Fixture::new("1\t2\n3\t4\n");
    let report = run(&fixture.config("c1 + c5", false, "2", "int,int", false)).unwrap();

    assert_eq!(fixture.output(), "");
    assert_eq!(report.counters.skipped_lines, 2);
    assert_eq!(
        report.to_string(),
        "Creating column 3 with expression c1 + c5\n\
         Possible invalid expression \"c1 + c5\" or non-existent column referenced. See tool tips, syntax and examples.\n\
         Skipped 2 invalid lines starting at line #1: \"1\t2\""
    );
}

#[test]
fn test_syntax_error_is_fatal() {
    let fixture = Fixture::new("1\t2\n");
    let err = run(&fixture.config("c1 +* c2", false, "2", "int,int", false)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Expression \"c1 +* c2\" likely invalid. See tool tips, syntax and examples."
    );
}

#[test]
fn test_missing_input_file() {
    let fixture = Fixture::new("");
    let config = RunConfig::new(
        fixture.dir.path().join("missing.tsv"),
        &fixture.output,
        "c1",
        false,
        "2",
        "int,int",
        false,
    )
    .unwrap();
    let err = run(&config).unwrap_err();
    assert!(matches!(err, Error::OpenInput { .. }));
    assert!(!fixture.output.exists());
}

#[test]
fn test_output_is_truncated() {
    let fixture = Fixture::new("2\t3\n");
    fs::write(&fixture.output, "stale contents\n").unwrap();
    run(&fixture.config("c1 ** c2", true, "2", "int,int", false)).unwrap();
    assert_eq!(fixture.output(), "2\t3\t8\n");
}

#[test]
fn test_unreadable_input_names_the_file() {
    let fixture = Fixture::new("");
    let config = RunConfig::new(
        fixture.dir.path(),
        &fixture.output,
        "c1",
        false,
        "2",
        "int,int",
        false,
    )
    .unwrap();

    let err = run(&config).unwrap_err();
    match &err {
        Error::ReadInput { path, .. } => assert_eq!(path, fixture.dir.path()),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        format!("Cannot read input file {}", fixture.dir.path().display())
    );
}
