//! Run driver: stream the input, evaluate each line, write kept rows and
//! build the report.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use log::{debug, info};
use thiserror::Error;

use crate::binding::Binding;
use crate::config::RunConfig;
use crate::error::{Error, RunResult};
use crate::row::{strip_line_ending, RowError, RowEvaluator, SkipReason};
use crate::sanitize::sanitize;

/// First line that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLine {
    /// 1-based line number
    pub line_number: usize,
    /// Line text without its line ending
    pub content: String,
}

/// Counters accumulated over one pass of the input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub total_lines: usize,
    pub skipped_lines: usize,
    pub lines_kept: usize,
    pub first_invalid: Option<InvalidLine>,
    pub blank_or_comment: usize,
    pub coercion_errors: usize,
    pub evaluation_errors: usize,
}

impl RunCounters {
    /// Lines that were not skipped
    pub fn valid_lines(&self) -> usize {
        self.total_lines - self.skipped_lines
    }

    fn record_kept(&mut self) {
        self.total_lines += 1;
        self.lines_kept += 1;
    }

    fn record_skipped(&mut self, line_number: usize, content: &[u8], reason: SkipReason) {
        self.total_lines += 1;
        self.skipped_lines += 1;
        match reason {
            SkipReason::BlankOrComment => self.blank_or_comment += 1,
            SkipReason::Coercion => self.coercion_errors += 1,
            SkipReason::Evaluation => self.evaluation_errors += 1,
        }
        if self.first_invalid.is_none() {
            let content = String::from_utf8_lossy(content);
            self.first_invalid = Some(InvalidLine {
                line_number,
                content: strip_line_ending(&content).to_string(),
            });
        }
    }
}

/// Summary printed after a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// 1-based position of the new column
    pub column_index: usize,
    /// Expression as displayed, positional wrapper included
    pub expression: String,
    pub counters: RunCounters,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Creating column {} with expression {}",
            self.column_index, self.expression
        )?;

        let counters = &self.counters;
        let valid_lines = counters.valid_lines();
        if valid_lines > 0 {
            write!(
                f,
                "kept {:4.2}% of {} lines.",
                100.0 * counters.lines_kept as f64 / valid_lines as f64,
                counters.total_lines
            )?;
        } else {
            write!(
                f,
                "Possible invalid expression \"{}\" or non-existent column referenced. See tool tips, syntax and examples.",
                self.expression
            )?;
        }

        if let Some(first) = counters
            .first_invalid
            .as_ref()
            .filter(|_| counters.skipped_lines > 0)
        {
            write!(
                f,
                "\nSkipped {} invalid lines starting at line #{}: \"{}\"",
                counters.skipped_lines, first.line_number, first.content
            )?;
        }
        Ok(())
    }
}

/// Which side of the stream failed
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("read failed")]
    Read(#[source] std::io::Error),

    #[error("write failed")]
    Write(#[source] std::io::Error),
}

/// Evaluate every line of `reader`, writing kept rows to `writer`
pub fn process_lines<R: BufRead, W: Write>(
    mut reader: R,
    writer: &mut W,
    evaluator: &RowEvaluator<'_>,
) -> Result<RunCounters, StreamError> {
    let mut counters = RunCounters::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(StreamError::Read)?;
        if read == 0 {
            break;
        }
        let line_number = counters.total_lines + 1;

        let outcome = match std::str::from_utf8(&buf) {
            Ok(line) => evaluator.try_evaluate(line),
            Err(_) => Err(RowError::InvalidUtf8),
        };

        match outcome {
            Ok(output) => {
                writer
                    .write_all(output.as_bytes())
                    .map_err(StreamError::Write)?;
                counters.record_kept();
            }
            Err(err) => {
                debug!("Skipping line {}: {}", line_number, err);
                counters.record_skipped(line_number, &buf, err.reason());
            }
        }
    }

    Ok(counters)
}

/// Execute a run: validate, compile, then stream the input into the output
pub fn run(config: &RunConfig) -> RunResult<Report> {
    let binding = Binding::build(
        config.column_count,
        config.column_types.as_slice(),
        config.round_result,
    )?;
    debug!(
        "Column bindings: {}",
        binding.cast_expressions().join(", ")
    );

    let safe = sanitize(&config.expression, config.avoid_scientific_notation)?;
    let compiled = safe.compile(&binding)?;
    let evaluator = RowEvaluator::new(&binding, &compiled, config.round_result);

    let input = File::open(&config.input).map_err(|source| Error::OpenInput {
        path: config.input.clone(),
        source,
    })?;
    let output = File::create(&config.output).map_err(|source| Error::CreateOutput {
        path: config.output.clone(),
        source,
    })?;

    info!(
        "Computing {} over {} into {}",
        compiled,
        config.input.display(),
        config.output.display()
    );

    let read_error = |source| Error::ReadInput {
        path: config.input.clone(),
        source,
    };
    let write_error = |source| Error::WriteOutput {
        path: config.output.clone(),
        source,
    };

    let mut writer = BufWriter::new(output);
    let counters = process_lines(BufReader::new(input), &mut writer, &evaluator).map_err(
        |err| match err {
            StreamError::Read(source) => read_error(source),
            StreamError::Write(source) => write_error(source),
        },
    )?;
    writer.flush().map_err(write_error)?;

    info!(
        "Processed {} lines: {} kept, {} skipped",
        counters.total_lines, counters.lines_kept, counters.skipped_lines
    );
    debug!(
        "Skipped {} blank or comment lines, {} unreadable rows, {} failed evaluations",
        counters.blank_or_comment, counters.coercion_errors, counters.evaluation_errors
    );

    Ok(Report {
        column_index: config.column_count + 1,
        expression: compiled.to_string(),
        counters,
    })
}
