use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::engine::{Outcome, ReportSink};
use crate::enrich::Enricher;
use crate::error::{AuditError, Result};
use super::buffer::PhaseBuffer;
use super::line::Line;
use super::record::AuditReport;
use super::Entry;

/// Single writer for a run.
///
/// Every line goes to the append-only log (flushed per line) and, when a
/// console is attached, to the console. The run header is written with the
/// first line, so a console attached after `open` still sees it.
/// `finalize` consumes the reporter, so it can only happen once.
pub struct Reporter {
    log: LineWriter<File>,
    log_path: PathBuf,
    report_path: PathBuf,
    console: Option<Box<dyn Write + Send>>,
    report: AuditReport,
    run_id: Uuid,
    started: bool,
}

impl Reporter {
    pub fn open(log_path: impl Into<PathBuf>, report_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();
        ensure_parent(&log_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| AuditError::artifact(&log_path, e))?;

        Ok(Self {
            log: LineWriter::new(file),
            log_path,
            report_path: report_path.into(),
            console: None,
            report: AuditReport::new(),
            run_id: Uuid::new_v4(),
            started: false,
        })
    }

    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn with_stdout(self) -> Self {
        self.with_console(Box::new(io::stdout()))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn report(&self) -> &AuditReport {
        &self.report
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Write and count one entry.
    pub fn write_entry(&mut self, entry: Entry) -> Result<()> {
        let line = entry.settle(&mut self.report);
        self.emit(&line)
    }

    /// Flush a phase that ran elsewhere, keeping its lines together.
    pub fn absorb(&mut self, buffer: PhaseBuffer) -> Result<()> {
        for entry in buffer.into_entries() {
            self.write_entry(entry)?;
        }
        Ok(())
    }

    pub fn finalize(mut self) -> Result<AuditReport> {
        let total = self.report.total_checks();
        let successes = self.report.successes();
        let failures = self.report.failures();

        self.emit(&Line::Banner("Summary".into()))?;
        self.emit(&Line::Text(format!("total_checks: {total}")))?;
        self.emit(&Line::Text(format!("successes: {successes}")))?;
        self.emit(&Line::Text(format!("failures: {failures}")))?;

        if self.report.has_failures() {
            let mut details = vec![Line::Banner("Failure Details".into())];
            for record in self.report.failure_records() {
                details.push(Line::Text(format!("- {}", record.context())));
                details.push(Line::Text(format!("  error: {}", record.error())));
                if let Some(fingerprint) = record.fingerprint() {
                    details.push(Line::Text(format!("  key: {fingerprint}")));
                }
            }
            for line in &details {
                self.emit(line)?;
            }

            self.write_report()?;
            let path = self.report_path.display().to_string();
            self.emit(&Line::Text(format!("Failure report written to {path}")))?;
        } else if self.remove_stale_report()? {
            let path = self.report_path.display().to_string();
            self.emit(&Line::Text(format!("No failures; removed stale report {path}")))?;
        }

        let footer = format!("Secrets audit finished at {} (run {})", Utc::now().to_rfc3339(), self.run_id);
        self.emit(&Line::Banner(footer))?;
        self.log.flush().map_err(|e| AuditError::artifact(&self.log_path, e))?;

        info!(total, successes, failures, "audit finalized");
        Ok(self.report)
    }

    fn emit(&mut self, line: &Line) -> Result<()> {
        if !self.started {
            self.started = true;
            let header = format!("Secrets audit started at {} (run {})", Utc::now().to_rfc3339(), self.run_id);
            self.emit(&Line::Banner(header))?;
        }
        self.write_log(line)?;
        self.write_console(line);
        Ok(())
    }

    fn write_log(&mut self, line: &Line) -> Result<()> {
        writeln!(self.log, "{}", line.plain()).map_err(|e| AuditError::artifact(&self.log_path, e))
    }

    // The console is only a mirror; losing it must not stop the audit.
    fn write_console(&mut self, line: &Line) {
        if let Some(console) = self.console.as_mut() {
            let written = writeln!(console, "{}", line.colored()).and_then(|_| console.flush());
            if let Err(e) = written {
                warn!(error = %e, "console mirror failed, continuing with log only");
                self.console = None;
            }
        }
    }

    fn write_report(&self) -> Result<()> {
        ensure_parent(&self.report_path)?;
        let json = self.report.to_json()?;

        let staging = self.report_path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| AuditError::artifact(&staging, e))?;
        fs::rename(&staging, &self.report_path).map_err(|e| AuditError::artifact(&self.report_path, e))?;

        debug!(path = %self.report_path.display(), "failure report written");
        Ok(())
    }

    fn remove_stale_report(&self) -> Result<bool> {
        match fs::remove_file(&self.report_path) {
            Ok(()) => {
                debug!(path = %self.report_path.display(), "stale failure report removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuditError::artifact(&self.report_path, e)),
        }
    }
}

impl ReportSink for Reporter {
    fn announce(&mut self, label: &str) -> Result<()> {
        self.write_entry(Entry::banner(label))
    }

    fn record(&mut self, outcome: Outcome, enricher: Option<&dyn Enricher>) -> Result<()> {
        self.write_entry(Entry::checked(outcome, enricher))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| AuditError::artifact(parent, e))
        }
        _ => Ok(()),
    }
}
