use crate::design::TrialTable;
use crate::log::ResponseLog;
use crate::render::PlaybackTicket;
use chrono::{DateTime, Local};
use crm_core::{SessionPhase, TrialSpec};

#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No trial prepared yet.
    Idle,
    /// Render requested, playback not finished.
    Prepared,
    /// Playback finished, no answer yet.
    AwaitingResponse,
    /// An answer is being written to the log.
    Committing,
    /// Answer committed. It may still be revised until the next advance.
    Responded,
    /// The main table is exhausted.
    Complete,
    /// The session was ended early.
    Exited,
}

/// Everything the session knows. Read through accessors; only the
/// controller mutates it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) status: SessionStatus,
    pub(crate) current: Option<usize>,
    pub(crate) table: TrialTable,
    pub(crate) log: ResponseLog,
    /// Log length when the current phase began.
    pub(crate) phase_base: usize,
    pub(crate) ticket: Option<PlaybackTicket>,
    pub(crate) played_at: Option<DateTime<Local>>,
}

impl SessionState {
    pub(crate) fn new(phase: SessionPhase) -> Self {
        Self {
            phase,
            status: SessionStatus::Idle,
            current: None,
            table: TrialTable::new(),
            log: ResponseLog::new(),
            phase_base: 0,
            ticket: None,
            played_at: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Index of the trial in play; `None` before the first trial of a phase.
    pub fn current_trial_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_trial(&self) -> Option<&TrialSpec> {
        self.current.and_then(|i| self.table.get(i))
    }

    /// Whether a response would be accepted now.
    pub fn awaiting_response(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::AwaitingResponse | SessionStatus::Responded
        )
    }

    pub fn table(&self) -> &TrialTable {
        &self.table
    }

    pub fn log(&self) -> &ResponseLog {
        &self.log
    }

    /// Log row the current trial's answer goes to.
    pub fn current_row(&self) -> Option<usize> {
        self.current.map(|i| self.phase_base + i)
    }

    /// (trials presented so far, trials in this phase)
    pub fn progress(&self) -> (usize, usize) {
        (self.current.map_or(0, |i| i + 1), self.table.len())
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, SessionStatus::Complete | SessionStatus::Exited)
    }
}
