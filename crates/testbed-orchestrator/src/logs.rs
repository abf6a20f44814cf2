//! Handing the collected logs to a log analyzer.

use crate::ParseError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Turns the log directory of a finished run into a report.
pub trait LogAnalyzer: Send + Sync {
    /// `faults` primaries (and their workers) were never launched, so their
    /// logs are absent and must be excluded.
    fn process(&self, logs_dir: &Path, faults: usize) -> Result<RunReport, ParseError>;
}

/// One log file of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileSummary {
    /// Session name, e.g. `worker-0-1`.
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub lines: usize,
}

/// Collected logs of a run, grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub faults: usize,
    pub clients: Vec<LogFileSummary>,
    pub primaries: Vec<LogFileSummary>,
    pub workers: Vec<LogFileSummary>,
}

impl RunReport {
    pub fn total_bytes(&self) -> u64 {
        self.clients
            .iter()
            .chain(&self.primaries)
            .chain(&self.workers)
            .map(|l| l.bytes)
            .sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-----------------------------------------")?;
        writeln!(f, " SUMMARY:")?;
        writeln!(f, "-----------------------------------------")?;
        writeln!(f, " Faults: {} node(s)", self.faults)?;
        writeln!(f, " Primary logs: {}", self.primaries.len())?;
        writeln!(f, " Worker logs: {}", self.workers.len())?;
        writeln!(f, " Client logs: {}", self.clients.len())?;
        writeln!(f, " Total log size: {} B", self.total_bytes())?;
        writeln!(f, "-----------------------------------------")?;
        for log in self.primaries.iter().chain(&self.workers).chain(&self.clients) {
            writeln!(f, " {}: {} lines, {} B", log.name, log.lines, log.bytes)?;
        }
        Ok(())
    }
}

/// Analyzer that only gathers and sanity-checks the logs.
///
/// Fails when no primary or worker log exists, or when any process panicked
/// or logged an `ERROR` line. Throughput and latency analysis is left to an
/// external engine reading the same directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCollector;

enum Role {
    Client,
    Primary,
    Worker,
}

fn role_of(name: &str) -> Option<Role> {
    if name.starts_with("client-") {
        Some(Role::Client)
    } else if name.starts_with("primary-") {
        Some(Role::Primary)
    } else if name.starts_with("worker-") {
        Some(Role::Worker)
    } else {
        None
    }
}

/// Whether `line` carries an `ERROR` level marker, also when it is wrapped in
/// ANSI colour codes or starts the line.
fn is_error_line(line: &str) -> bool {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == "ERROR")
}

fn summarize(path: &Path, name: String) -> Result<LogFileSummary, ParseError> {
    let raw = std::fs::read(path).map_err(|source| ParseError::ReadLog {
        path: path.to_path_buf(),
        source,
    })?;
    // Nodes may write stray non-UTF-8 bytes; they are not a read failure.
    let text = String::from_utf8_lossy(&raw);

    if text.contains("panicked") {
        return Err(ParseError::Panicked { name });
    }
    if let Some(line) = text.lines().find(|l| is_error_line(l)) {
        return Err(ParseError::Errored {
            line: line.trim().to_string(),
            name,
        });
    }

    Ok(LogFileSummary {
        name,
        path: path.to_path_buf(),
        bytes: raw.len() as u64,
        lines: text.lines().count(),
    })
}

impl LogAnalyzer for LogCollector {
    fn process(&self, logs_dir: &Path, faults: usize) -> Result<RunReport, ParseError> {
        let read_dir_error = |source: std::io::Error| ParseError::ReadDir {
            path: logs_dir.to_path_buf(),
            source,
        };

        let mut report = RunReport {
            faults,
            ..Default::default()
        };

        for entry in std::fs::read_dir(logs_dir).map_err(read_dir_error)? {
            let path = entry.map_err(read_dir_error)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let Some(role) = role_of(&name) else {
                continue;
            };
            let summary = summarize(&path, name)?;
            match role {
                Role::Client => report.clients.push(summary),
                Role::Primary => report.primaries.push(summary),
                Role::Worker => report.workers.push(summary),
            }
        }

        for (role, logs) in [("primary", &report.primaries), ("worker", &report.workers)] {
            if logs.is_empty() {
                return Err(ParseError::MissingLogs {
                    role,
                    path: logs_dir.to_path_buf(),
                });
            }
        }

        for logs in [&mut report.clients, &mut report.primaries, &mut report.workers] {
            logs.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(report)
    }
}
