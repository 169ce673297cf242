use crate::design::{DesignError, DesignSource};
use crate::log::{LogError, ResponseLog, ResponseRecord, Slot};
use crate::render::{PlaybackTicket, RenderError, RenderPayload, RenderRequest, Renderer};
use crate::session::{SessionState, SessionStatus};
use crate::sink::{LogSink, PersistError};
use crm_core::{Colour, CrmNumber, Feedback, ResponseButton, SessionPhase};
use crm_timing::{Clock, format_stamp};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TrialPrepared {
        phase: SessionPhase,
        index: usize,
        total: usize,
    },
    PracticeComplete {
        main_trials: usize,
    },
    ExperimentComplete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// No playback has finished for the current trial; nothing recorded.
    Ignored,
    Committed {
        row: usize,
        slot: Slot,
        feedback: Option<Feedback>,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not build trial table")]
    Design(#[from] DesignError),
    #[error("could not render trial")]
    Render(#[from] RenderError),
    #[error("response kept in memory but not saved")]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Drives a session one trial at a time: prepare and render, wait for the
/// playback to finish, take an answer, log it, move on. At the end of the
/// practice deck the main table is generated and the session continues.
pub struct SessionController<G, R, K, C> {
    design: G,
    renderer: R,
    sink: K,
    clock: C,
    clear_log_after_practice: bool,
    state: SessionState,
    tickets: u64,
}

impl<G, R, K, C> SessionController<G, R, K, C>
where
    G: DesignSource,
    R: Renderer,
    K: LogSink,
    C: Clock,
{
    pub fn new(design: G, renderer: R, sink: K, clock: C, start: SessionPhase) -> Self {
        Self {
            design,
            renderer,
            sink,
            clock,
            clear_log_after_practice: false,
            state: SessionState::new(start),
            tickets: 0,
        }
    }

    pub fn clear_log_after_practice(mut self, clear: bool) -> Self {
        self.clear_log_after_practice = clear;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Build the first table and prepare its first trial.
    pub fn start(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        if self.state.status != SessionStatus::Idle || !self.state.table.is_empty() {
            return Ok(Vec::new());
        }
        self.state.table = match self.state.phase {
            SessionPhase::Practice => self.design.practice_table()?,
            SessionPhase::Main => self.design.main_table()?,
        };
        info!(
            phase = %self.state.phase,
            trials = self.state.table.len(),
            "session started"
        );
        if self.state.table.is_empty() {
            return self.finish_phase();
        }
        self.advance()
    }

    /// Move to the next trial, or to the next phase when the table is used up.
    /// Does nothing while the current trial is still unanswered.
    pub fn advance(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        match self.state.status {
            SessionStatus::Idle if self.state.table.is_empty() => return self.start(),
            SessionStatus::Idle | SessionStatus::Responded => {}
            SessionStatus::Complete | SessionStatus::Exited => return Ok(Vec::new()),
            status => {
                debug!(?status, "advance ignored, current trial unanswered");
                return Ok(Vec::new());
            }
        }

        let next = self.state.current.map_or(0, |i| i + 1);
        if next < self.state.table.len() {
            self.prepare(next)?;
            return Ok(vec![SessionEvent::TrialPrepared {
                phase: self.state.phase,
                index: next,
                total: self.state.table.len(),
            }]);
        }
        self.finish_phase()
    }

    fn finish_phase(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        let Some(next_phase) = self.state.phase.next() else {
            self.state.status = SessionStatus::Complete;
            self.state.ticket = None;
            info!(responses = self.state.log.len(), "experiment complete");
            return Ok(vec![SessionEvent::ExperimentComplete]);
        };

        let table = self.design.main_table()?;
        if self.clear_log_after_practice {
            self.state.log = ResponseLog::new();
        }
        let main_trials = table.len();
        self.state.phase = next_phase;
        self.state.table = table;
        self.state.current = None;
        self.state.phase_base = self.state.log.len();
        self.state.status = SessionStatus::Idle;
        info!(main_trials, kept_rows = self.state.phase_base, "practice complete");

        let mut events = vec![SessionEvent::PracticeComplete { main_trials }];
        events.extend(self.advance()?);
        Ok(events)
    }

    fn prepare(&mut self, index: usize) -> Result<(), SessionError> {
        self.tickets += 1;
        let ticket = PlaybackTicket(self.tickets);
        self.state.current = Some(index);
        self.state.status = SessionStatus::Prepared;
        self.state.ticket = Some(ticket);
        self.state.played_at = None;

        let trial = &self.state.table[index];
        let payload = RenderPayload::from_trial(trial);
        info!(
            phase = %self.state.phase,
            trial = index,
            total = self.state.table.len(),
            target = %trial.target_button(),
            talker = %trial.target_talker,
            maskers = trial.masker_count(),
            "trial prepared"
        );
        debug!(%ticket, ?payload, "render requested");
        self.renderer.render(RenderRequest { ticket, payload })?;
        Ok(())
    }

    /// Ask the renderer again for the current trial, e.g. after a render
    /// error. Only valid before playback has completed.
    pub fn retry_render(&mut self) -> Result<bool, SessionError> {
        match (self.state.status, self.state.current) {
            (SessionStatus::Prepared, Some(index)) => {
                self.prepare(index)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Playback for `ticket` has ended. Stale or unexpected tickets are ignored.
    pub fn playback_complete(&mut self, ticket: PlaybackTicket) -> bool {
        if self.state.status != SessionStatus::Prepared || self.state.ticket != Some(ticket) {
            debug!(%ticket, status = ?self.state.status, "playback completion ignored");
            return false;
        }
        self.state.status = SessionStatus::AwaitingResponse;
        self.state.played_at = Some(self.clock.now());
        true
    }

    /// Record the listener's answer for the current trial. A second answer
    /// for the same trial replaces the first.
    pub fn submit_response(
        &mut self,
        colour: Colour,
        number: CrmNumber,
    ) -> Result<SubmitOutcome, SessionError> {
        if !self.state.awaiting_response() {
            debug!(
                %colour,
                %number,
                status = ?self.state.status,
                "response before playback ignored"
            );
            return Ok(SubmitOutcome::Ignored);
        }
        let (Some(index), Some(row)) = (self.state.current, self.state.current_row()) else {
            return Ok(SubmitOutcome::Ignored);
        };

        let previous = self.state.status;
        self.state.status = SessionStatus::Committing;

        let now = self.clock.now();
        let trial = self.state.table[index].clone();
        let record = ResponseRecord {
            phase: self.state.phase,
            trial_index: index,
            trial,
            response_colour: colour,
            response_number: number,
            response_timestamp: format_stamp(&now),
            reaction_time_ms: self
                .state
                .played_at
                .map(|played| (now - played).num_milliseconds()),
        };
        let feedback = self.state.phase.gives_feedback().then(|| record.feedback());

        let slot = match self.state.log.append_or_replace(row, record) {
            Ok(slot) => slot,
            Err(e) => {
                self.state.status = previous;
                return Err(e.into());
            }
        };
        self.state.status = SessionStatus::Responded;
        info!(
            phase = %self.state.phase,
            trial = index,
            row,
            response = %ResponseButton::new(colour, number),
            revised = slot == Slot::Replaced,
            "response committed"
        );

        if let Err(e) = self.sink.persist(&self.state.log) {
            warn!(error = %e, rows = self.state.log.len(), "response log not saved");
            return Err(e.into());
        }
        Ok(SubmitOutcome::Committed {
            row,
            slot,
            feedback,
        })
    }

    /// Practice feedback for the committed answer to the current trial.
    pub fn practice_feedback(&self) -> Option<Feedback> {
        if !self.state.phase.gives_feedback() {
            return None;
        }
        let row = self.state.current_row()?;
        let record = self.state.log.get(row)?;
        (record.phase == self.state.phase).then(|| record.feedback())
    }

    /// End the session now. Committed answers are written once more; an
    /// unanswered trial in progress is dropped.
    pub fn exit(&mut self) -> Result<(), SessionError> {
        if self.state.status == SessionStatus::Exited {
            return Ok(());
        }
        self.state.status = SessionStatus::Exited;
        self.state.ticket = None;
        info!(responses = self.state.log.len(), "session exited");
        if !self.state.log.is_empty() {
            self.sink.persist(&self.state.log)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::TrialTable;
    use crate::log::tests::trial;
    use crate::resolver::ResolveError;
    use crm_core::Talker;
    use crm_timing::ManualClock;
    use std::time::Duration;

    struct FixedTables {
        practice: TrialTable,
        main: TrialTable,
        main_builds: usize,
        main_failures: usize,
    }

    impl DesignSource for FixedTables {
        fn practice_table(&mut self) -> Result<TrialTable, DesignError> {
            Ok(self.practice.clone())
        }

        fn main_table(&mut self) -> Result<TrialTable, DesignError> {
            self.main_builds += 1;
            if self.main_failures > 0 {
                self.main_failures -= 1;
                return Err(DesignError::MissingStimulus(ResolveError {
                    talker: Talker(4),
                    callsign: "ringo".into(),
                    colour: Colour::Blue,
                    number: CrmNumber::new(2).unwrap(),
                    source: None,
                }));
            }
            Ok(self.main.clone())
        }
    }

    #[derive(Default)]
    struct Recorder {
        requests: Vec<RenderRequest>,
        failures: usize,
    }

    impl Renderer for Recorder {
        fn render(&mut self, request: RenderRequest) -> Result<(), RenderError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(RenderError::Unavailable("device busy".into()));
            }
            self.requests.push(request);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        writes: usize,
        last_rows: usize,
    }

    impl LogSink for CountingSink {
        fn persist(&mut self, log: &ResponseLog) -> Result<(), PersistError> {
            self.writes += 1;
            self.last_rows = log.len();
            Ok(())
        }
    }

    type Controller = SessionController<FixedTables, Recorder, CountingSink, ManualClock>;

    fn table(len: usize) -> TrialTable {
        (0..len).map(|i| trial(i, 1)).collect()
    }

    fn controller(start: SessionPhase, practice: usize, main: usize) -> Controller {
        SessionController::new(
            FixedTables {
                practice: table(practice),
                main: table(main),
                main_builds: 0,
                main_failures: 0,
            },
            Recorder::default(),
            CountingSink::default(),
            ManualClock::default(),
            start,
        )
    }

    fn red(n: u8) -> (Colour, CrmNumber) {
        (Colour::Red, CrmNumber::new(n).unwrap())
    }

    fn play(c: &mut Controller) {
        let ticket = c.renderer().requests.last().unwrap().ticket;
        assert!(c.playback_complete(ticket));
    }

    fn answer(c: &mut Controller, n: u8) -> SubmitOutcome {
        let (colour, number) = red(n);
        c.submit_response(colour, number).unwrap()
    }

    #[test]
    fn start_prepares_first_trial_and_renders_it() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        let events = c.start().unwrap();
        assert_eq!(
            events,
            vec![SessionEvent::TrialPrepared {
                phase: SessionPhase::Main,
                index: 0,
                total: 4
            }]
        );
        assert_eq!(c.state().status(), SessionStatus::Prepared);
        assert_eq!(c.state().current_trial_index(), Some(0));
        assert_eq!(c.renderer().requests.len(), 1);
        assert_eq!(c.renderer().requests[0].payload.maskers.len(), 1);
    }

    #[test]
    fn response_before_playback_is_ignored() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        c.start().unwrap();
        assert_eq!(answer(&mut c, 3), SubmitOutcome::Ignored);
        assert!(c.state().log().is_empty());
        assert_eq!(c.sink().writes, 0);
    }

    #[test]
    fn response_with_nothing_prepared_is_ignored() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        assert_eq!(answer(&mut c, 3), SubmitOutcome::Ignored);
    }

    #[test]
    fn stale_ticket_does_not_open_response_window() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        c.start().unwrap();
        assert!(!c.playback_complete(PlaybackTicket(999)));
        assert_eq!(c.state().status(), SessionStatus::Prepared);
    }

    #[test]
    fn answer_appends_then_revision_replaces() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        c.start().unwrap();
        play(&mut c);

        let first = answer(&mut c, 3);
        assert!(matches!(
            first,
            SubmitOutcome::Committed {
                row: 0,
                slot: Slot::Appended,
                feedback: None
            }
        ));
        assert_eq!(c.state().log().len(), 1);

        let second = answer(&mut c, 5);
        assert!(matches!(
            second,
            SubmitOutcome::Committed {
                row: 0,
                slot: Slot::Replaced,
                ..
            }
        ));
        assert_eq!(c.state().log().len(), 1);
        assert_eq!(c.state().log().get(0).unwrap().response_number.get(), 5);
        assert_eq!(c.sink().writes, 2);
    }

    #[test]
    fn advance_waits_for_an_answer() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        c.start().unwrap();
        assert!(c.advance().unwrap().is_empty());
        play(&mut c);
        assert!(c.advance().unwrap().is_empty());
        assert_eq!(c.state().current_trial_index(), Some(0));
        assert_eq!(c.renderer().requests.len(), 1);
    }

    #[test]
    fn main_table_runs_to_completion() {
        let mut c = controller(SessionPhase::Main, 0, 4);
        c.start().unwrap();
        for i in 0..4 {
            assert_eq!(c.state().current_trial_index(), Some(i));
            play(&mut c);
            answer(&mut c, 1);
            let events = c.advance().unwrap();
            if i < 3 {
                assert!(matches!(
                    events[0],
                    SessionEvent::TrialPrepared { index, .. } if index == i + 1
                ));
            } else {
                assert_eq!(events, vec![SessionEvent::ExperimentComplete]);
            }
        }
        assert_eq!(c.state().status(), SessionStatus::Complete);
        assert_eq!(c.state().log().len(), 4);
        assert!(c.advance().unwrap().is_empty());
        assert_eq!(answer(&mut c, 2), SubmitOutcome::Ignored);
    }

    #[test]
    fn practice_hands_over_to_main_keeping_the_log() {
        let mut c = controller(SessionPhase::Practice, 2, 3);
        c.start().unwrap();
        for _ in 0..2 {
            play(&mut c);
            answer(&mut c, 3);
            c.advance().unwrap();
        }
        assert_eq!(c.state().phase(), SessionPhase::Main);
        assert_eq!(c.design.main_builds, 1);
        assert_eq!(c.state().current_trial_index(), Some(0));
        assert_eq!(c.state().table().len(), 3);
        assert_eq!(c.state().log().len(), 2);

        play(&mut c);
        let outcome = answer(&mut c, 4);
        assert!(matches!(
            outcome,
            SubmitOutcome::Committed { row: 2, slot: Slot::Appended, feedback: None }
        ));
        assert_eq!(c.state().log().get(2).unwrap().phase, SessionPhase::Main);
    }

    #[test]
    fn practice_end_emits_handover_then_first_main_trial() {
        let mut c = controller(SessionPhase::Practice, 1, 3);
        c.start().unwrap();
        play(&mut c);
        answer(&mut c, 3);
        let events = c.advance().unwrap();
        assert_eq!(
            events,
            vec![
                SessionEvent::PracticeComplete { main_trials: 3 },
                SessionEvent::TrialPrepared {
                    phase: SessionPhase::Main,
                    index: 0,
                    total: 3
                },
            ]
        );
    }

    #[test]
    fn log_can_be_cleared_at_main_phase() {
        let mut c = controller(SessionPhase::Practice, 1, 2).clear_log_after_practice(true);
        c.start().unwrap();
        play(&mut c);
        answer(&mut c, 3);
        c.advance().unwrap();
        assert!(c.state().log().is_empty());

        play(&mut c);
        assert!(matches!(answer(&mut c, 3), SubmitOutcome::Committed { row: 0, .. }));
    }

    #[test]
    fn practice_feedback_reflects_latest_answer() {
        let mut c = controller(SessionPhase::Practice, 2, 2);
        c.start().unwrap();
        play(&mut c);
        // Fixture targets are always "red 3".
        match answer(&mut c, 3) {
            SubmitOutcome::Committed { feedback: Some(f), .. } => assert!(f.is_correct()),
            other => panic!("unexpected {other:?}"),
        }
        answer(&mut c, 6);
        let feedback = c.practice_feedback().unwrap();
        assert!(!feedback.is_correct());
        assert_eq!(feedback.target.to_string(), "red 3");
    }

    #[test]
    fn reaction_time_runs_from_playback_end() {
        let mut c = controller(SessionPhase::Main, 0, 1);
        c.start().unwrap();
        play(&mut c);
        c.clock.advance(Duration::from_millis(1200));
        answer(&mut c, 3);
        assert_eq!(c.state().log().get(0).unwrap().reaction_time_ms, Some(1200));
    }

    #[test]
    fn render_failure_leaves_trial_prepared_until_retried() {
        let mut c = controller(SessionPhase::Main, 0, 2);
        c.renderer.failures = 1;
        assert!(matches!(c.start(), Err(SessionError::Render(_))));
        assert_eq!(c.state().status(), SessionStatus::Prepared);
        assert_eq!(c.state().current_trial_index(), Some(0));
        assert!(c.renderer().requests.is_empty());
        let failed = c.state.ticket.unwrap();

        assert!(c.retry_render().unwrap());
        let retried = c.renderer().requests[0].ticket;
        assert_ne!(retried, failed);
        assert!(!c.playback_complete(failed));
        assert!(c.playback_complete(retried));
        assert!(matches!(answer(&mut c, 3), SubmitOutcome::Committed { row: 0, .. }));
        assert!(!c.retry_render().unwrap());
    }

    #[test]
    fn failed_handover_keeps_last_practice_trial_and_can_be_retried() {
        let mut c = controller(SessionPhase::Practice, 1, 2);
        c.design.main_failures = 1;
        c.start().unwrap();
        play(&mut c);
        answer(&mut c, 3);

        let err = c.advance().unwrap_err();
        assert!(matches!(err, SessionError::Design(DesignError::MissingStimulus(_))));
        assert_eq!(c.state().phase(), SessionPhase::Practice);
        assert_eq!(c.state().status(), SessionStatus::Responded);
        assert_eq!(c.state().current_trial_index(), Some(0));
        assert_eq!(c.state().log().len(), 1);

        let events = c.advance().unwrap();
        assert_eq!(events[0], SessionEvent::PracticeComplete { main_trials: 2 });
        assert_eq!(c.design.main_builds, 2);
        assert_eq!(c.state().phase(), SessionPhase::Main);
        assert_eq!(c.state().current_trial_index(), Some(0));
    }

    #[test]
    fn exit_flushes_committed_rows_only() {
        let mut c = controller(SessionPhase::Main, 0, 3);
        c.start().unwrap();
        play(&mut c);
        answer(&mut c, 3);
        c.advance().unwrap();
        play(&mut c);
        c.exit().unwrap();
        assert_eq!(c.state().status(), SessionStatus::Exited);
        assert_eq!(c.sink().last_rows, 1);
        assert_eq!(answer(&mut c, 3), SubmitOutcome::Ignored);
        assert!(c.advance().unwrap().is_empty());
    }
}
