//! Per-run history: the command/error table and the pose trace.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use csv::WriterBuilder;
use omni_control::PoseError;
use serde::Serialize;
use tracing::info;

use crate::simulation::TickSample;

/// Header row of the exported table.
pub const CSV_HEADER: [&str; 7] = ["Time", "Vx", "Vy", "W", "X Error", "Y Error", "Theta Error"];

/// One row of the exported table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogRow {
    pub t: f64,
    pub vx: f64,
    pub vy: f64,
    pub w: f64,
    pub x_error: f64,
    pub y_error: f64,
    pub theta_error: f64,
}

impl From<&TickSample> for LogRow {
    fn from(sample: &TickSample) -> Self {
        LogRow {
            t: sample.t,
            vx: sample.velocity.vx,
            vy: sample.velocity.vy,
            w: sample.velocity.w,
            x_error: sample.error.x,
            y_error: sample.error.y,
            theta_error: sample.error.theta,
        }
    }
}

/// Drops rows once every error seen over the trailing `window` seconds is
/// within `tolerance` of zero, so a settled run does not pad the table.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleFilter {
    window: f64,
    tolerance: f64,
    recent: VecDeque<(f64, PoseError)>,
}

impl SettleFilter {
    pub const DEFAULT_WINDOW: f64 = 0.5;
    pub const DEFAULT_TOLERANCE: f64 = 1e-2;

    pub fn new(window: f64, tolerance: f64) -> Self {
        SettleFilter {
            window,
            tolerance,
            recent: VecDeque::new(),
        }
    }

    /// Record `error` at time `t` and report whether the run is settled.
    fn observe(&mut self, t: f64, error: PoseError) -> bool {
        self.recent.push_back((t, error));
        while let Some((oldest, _)) = self.recent.front() {
            if t - oldest > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        self.recent.iter().all(|(_, e)| {
            e.x.abs() <= self.tolerance && e.y.abs() <= self.tolerance && e.theta.abs() <= self.tolerance
        })
    }

    fn clear(&mut self) {
        self.recent.clear();
    }
}

impl Default for SettleFilter {
    fn default() -> Self {
        SettleFilter::new(Self::DEFAULT_WINDOW, Self::DEFAULT_TOLERANCE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLog {
    rows: Vec<LogRow>,
    trace: Vec<(f64, f64)>,
    settle: Option<SettleFilter>,
}

impl RunLog {
    /// A log that keeps every tick.
    pub fn new() -> Self {
        RunLog::default()
    }

    /// A log that stops adding rows while the run is settled.
    pub fn with_settle_filter(filter: SettleFilter) -> Self {
        RunLog {
            settle: Some(filter),
            ..RunLog::default()
        }
    }

    pub fn record(&mut self, sample: &TickSample) {
        self.trace.push((sample.pose.x, sample.pose.y));
        let settled = match self.settle.as_mut() {
            Some(filter) => filter.observe(sample.t, sample.error),
            None => false,
        };
        if !settled {
            self.rows.push(LogRow::from(sample));
        }
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Every `(x, y)` the robot passed through, one per tick.
    pub fn trace(&self) -> &[(f64, f64)] {
        &self.trace
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.trace.is_empty()
    }

    /// Forget all recorded ticks. The settle filter setting is kept.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.trace.clear();
        if let Some(filter) = self.settle.as_mut() {
            filter.clear();
        }
    }

    /// Write the table as CSV, header first.
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut w = WriterBuilder::new().has_headers(false).from_writer(writer);
        w.write_record(CSV_HEADER)?;
        for row in &self.rows {
            w.serialize(row)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn export(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        self.write_csv(file)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), rows = self.rows.len(), "Exported run log");
        Ok(())
    }
}
