//! Progress reporting through the `log` facade.
//!
//! A [`ProgressLogger`] is an explicit handle carried by the analysis
//! options. [`ProgressLogger::scope`] emits a start record and returns a
//! guard that emits the matching end record when dropped, so nested
//! scopes (function, cycle, callee) are always balanced.

use std::fmt;
use std::time::Instant;

use log::Level;

/// What a progress scope covers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// Fixpoint of an entry point.
    Function,
    /// Fixpoint of a callee, inlined at a call site.
    Callee,
    /// Iterations on one loop head.
    Cycle,
    /// Collection of the converged invariants.
    Collection,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScopeKind::Function => "function",
            ScopeKind::Callee => "callee",
            ScopeKind::Cycle => "cycle",
            ScopeKind::Collection => "collect",
        };
        write!(f, "{}", s)
    }
}

/// Phase of the iterations on a cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Increasing,
    Decreasing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Increasing => write!(f, "increasing"),
            Phase::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// Logger handle for analysis progress.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    level: Level,
    enabled: bool,
}

impl Default for ProgressLogger {
    fn default() -> Self {
        Self {
            level: Level::Debug,
            enabled: true,
        }
    }
}

impl ProgressLogger {
    pub fn new(level: Level) -> Self {
        Self { level, enabled: true }
    }

    /// A logger that emits nothing.
    pub fn disabled() -> Self {
        Self {
            level: Level::Trace,
            enabled: false,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && log::log_enabled!(self.level)
    }

    /// Start a scope; the end record is emitted when the guard drops.
    pub fn scope(&self, kind: ScopeKind, label: impl fmt::Display) -> ProgressScope<'_> {
        let label = if self.is_enabled() {
            let label = label.to_string();
            log::log!(self.level, "start {} {}", kind, label);
            Some(label)
        } else {
            None
        };
        ProgressScope {
            logger: self,
            kind,
            label,
            start: Instant::now(),
        }
    }

    /// Report one iteration on a loop head (at `trace` level).
    pub fn iteration(&self, head: impl fmt::Display, phase: Phase, iteration: usize) {
        if self.enabled {
            log::trace!("{} iteration #{} on {}", phase, iteration, head);
        }
    }
}

/// Guard returned by [`ProgressLogger::scope`].
#[must_use = "the scope ends when the guard is dropped"]
pub struct ProgressScope<'a> {
    logger: &'a ProgressLogger,
    kind: ScopeKind,
    label: Option<String>,
    start: Instant,
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        if let Some(label) = &self.label {
            log::log!(
                self.logger.level,
                "end {} {} ({:.3}s)",
                self.kind,
                label,
                self.start.elapsed().as_secs_f64()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_scopes_nest() {
        let logger = ProgressLogger::new(Level::Debug);
        let outer = logger.scope(ScopeKind::Function, "main");
        {
            let _inner = logger.scope(ScopeKind::Cycle, "B1");
            logger.iteration("B1", Phase::Increasing, 1);
        }
        drop(outer);
    }

    #[test]
    fn test_disabled_logger_records_nothing() {
        let logger = ProgressLogger::disabled();
        assert!(!logger.is_enabled());
        let scope = logger.scope(ScopeKind::Collection, "main");
        assert!(scope.label.is_none());
    }
}
