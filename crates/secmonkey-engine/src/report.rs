//! Cycle reports and the reporter collaborator.

use secmonkey_core::classify::ChangeItem;
use secmonkey_core::diff::render_change_summary as render_items;
use secmonkey_core::errors::Result;
use secmonkey_core::exceptions::ExceptionMap;
use secmonkey_core::store::RepairReport;
use secmonkey_core_types::RunId;
use serde::Serialize;

/// Everything one watcher cycle observed and did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub run_id: RunId,
    pub technology: String,
    pub created: Vec<ChangeItem>,
    /// Durable changes only
    pub changed: Vec<ChangeItem>,
    /// Persisted to history, not alert-worthy
    pub ephemeral: Vec<ChangeItem>,
    pub deleted: Vec<ChangeItem>,
    pub exceptions: ExceptionMap,
    pub revisions_written: usize,
    pub repair: RepairReport,
}

impl CycleReport {
    pub fn new(run_id: RunId, technology: impl Into<String>) -> Self {
        Self {
            run_id,
            technology: technology.into(),
            created: Vec::new(),
            changed: Vec::new(),
            ephemeral: Vec::new(),
            deleted: Vec::new(),
            exceptions: ExceptionMap::new(),
            revisions_written: 0,
            repair: RepairReport::default(),
        }
    }

    /// Whether anything alert-worthy happened: a creation, durable change or
    /// deletion. Ephemeral-only cycles are not changes.
    pub fn is_changed(&self) -> bool {
        !(self.created.is_empty() && self.changed.is_empty() && self.deleted.is_empty())
    }

    /// Plain-text summary: a header line, then every change with its
    /// flattened field paths.
    pub fn render_change_summary(&self) -> String {
        let mut out = format!(
            "{} run {}: {} created, {} changed, {} ephemeral, {} deleted, {} exceptions\n",
            self.technology,
            self.run_id,
            self.created.len(),
            self.changed.len(),
            self.ephemeral.len(),
            self.deleted.len(),
            self.exceptions.len()
        );
        let all: Vec<ChangeItem> = self
            .created
            .iter()
            .chain(&self.changed)
            .chain(&self.ephemeral)
            .chain(&self.deleted)
            .cloned()
            .collect();
        out.push_str(&render_items(&all));
        for record in self.exceptions.iter() {
            out.push_str(&format!(
                "[exception] {} {}: {}\n",
                record.scope, record.code, record.message
            ));
        }
        out
    }
}

/// Receives each finished cycle (auditors, alerters).
pub trait ChangeReporter {
    /// # Errors
    ///
    /// Any failure; the watcher logs it and still completes the cycle.
    fn report(&mut self, report: &CycleReport) -> Result<()>;
}

/// Discards reports.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ChangeReporter for NoopReporter {
    fn report(&mut self, _report: &CycleReport) -> Result<()> {
        Ok(())
    }
}
