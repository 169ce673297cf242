use crate::cli::Args;
use crate::renderer::{AppEvent, SimulatedRenderer};
use anyhow::{Context, Result};
use crm_core::{Feedback, ResponseButton, SessionPhase, Verdict};
use crm_experiment::{
    CsvFileSink, DesignSource, Designer, DirectoryResolver, ExperimentConfig, LogSink,
    RandomPermutations, Renderer, SessionController, SessionError, SessionEvent, SessionStatus,
    Slot, SubmitOutcome,
};
use crm_timing::{Clock, SystemClock, format_stamp};
use rand::Rng;
use rand::rngs::StdRng;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tracing::{info, warn};

type Session = SessionController<
    Designer<RandomPermutations<StdRng>, DirectoryResolver>,
    SimulatedRenderer<SystemClock>,
    CsvFileSink,
    SystemClock,
>;

pub struct App {
    session: Session,
    events: Receiver<AppEvent>,
    target_callsign: String,
    buttons: Vec<ResponseButton>,
    should_exit: bool,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let mut config = ExperimentConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?;
        args.apply(&mut config);
        config.validate().context("invalid configuration")?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let clock = SystemClock;
        let started = format_stamp(&clock.now());
        let log_path = config.log_path(&started);
        info!(
            seed,
            subject = %config.subject,
            log = %log_path.display(),
            "session configured"
        );

        let start = if config.practice {
            SessionPhase::Practice
        } else {
            SessionPhase::Main
        };
        let buttons = ResponseButton::grid(&config.colours, &config.numbers);
        let target_callsign = config.target_callsign.clone();
        let duration = Duration::from_secs_f64(config.sound_duration_estimate_s);
        let clear_log = config.clear_log_after_practice;

        let resolver = DirectoryResolver::new(&config.stimulus_dir);
        let designer = Designer::new(
            config,
            started,
            RandomPermutations::seeded(seed),
            resolver,
        )?;

        let (tx, rx) = mpsc::channel();
        spawn_input_reader(tx.clone())?;
        let renderer = SimulatedRenderer::new(tx, clock, duration);

        let session = SessionController::new(
            designer,
            renderer,
            CsvFileSink::new(log_path),
            clock,
            start,
        )
        .clear_log_after_practice(clear_log);

        Ok(Self {
            session,
            events: rx,
            target_callsign,
            buttons,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        println!("=== CRM SPATIAL ATTENTION EXPERIMENT ===");
        println!(
            "Listen for the talker who says \"Ready {} go to [colour] [number] now\".",
            self.target_callsign
        );
        println!(
            "Type the colour and number you heard (e.g. \"red 3\"), \
             ENTER for the next trial, \"exit\" to stop.\n"
        );
        self.print_grid();

        let outcome = self.event_loop();
        flush_on_error(&mut self.session, outcome)?;
        self.cleanup_and_exit()
    }

    fn event_loop(&mut self) -> Result<()> {
        if let Some(events) = tolerate_render_failure(self.session.start())
            .context("could not start the session")?
        {
            self.report(&events);
        }

        while !self.should_exit {
            let Ok(event) = self.events.recv() else {
                break;
            };
            match event {
                AppEvent::PlaybackFinished(ticket) => {
                    if self.session.playback_complete(ticket) {
                        println!("Which colour and number did {} say?", self.target_callsign);
                    }
                }
                AppEvent::Input(line) => self.handle_input(line.trim())?,
                AppEvent::InputClosed => self.should_exit = true,
            }
            if self.session.state().status() == SessionStatus::Complete {
                self.should_exit = true;
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) -> Result<()> {
        match line.to_ascii_lowercase().as_str() {
            "exit" | "quit" | "q" => self.should_exit = true,
            "" | "next" | "n" => {
                if let Some(events) = tolerate_render_failure(self.session.advance())? {
                    if events.is_empty() && !self.session.state().is_finished() {
                        println!("Answer the current trial first.");
                    }
                    self.report(&events);
                }
            }
            "retry" => {
                if tolerate_render_failure(self.session.retry_render())? == Some(false) {
                    println!("Nothing to replay right now.");
                }
            }
            "grid" => self.print_grid(),
            answer => match answer.parse::<ResponseButton>() {
                Ok(button) => self.submit(button)?,
                Err(e) => println!("{e}"),
            },
        }
        Ok(())
    }

    fn submit(&mut self, button: ResponseButton) -> Result<()> {
        match self.session.submit_response(button.colour, button.number) {
            Ok(SubmitOutcome::Ignored) => println!("Wait for the sound to finish first."),
            Ok(SubmitOutcome::Committed { slot, feedback, .. }) => {
                match slot {
                    Slot::Appended => println!("Answer {button} recorded."),
                    Slot::Replaced => println!("Answer changed to {button}."),
                }
                if let Some(feedback) = feedback {
                    println!("{}", feedback_message(&feedback));
                }
                println!("Press ENTER for the next trial, or type another answer to change it.");
            }
            Err(SessionError::Persist(e)) => {
                warn!(error = ?e, "response log not saved");
                eprintln!(
                    "Could not save responses ({e}); they are kept and saved with the next answer."
                );
                if let Some(feedback) = self.session.practice_feedback() {
                    println!("{}", feedback_message(&feedback));
                }
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn report(&self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::TrialPrepared {
                    phase,
                    index,
                    total,
                } => println!("[{phase}] Trial {}/{total} playing...", index + 1),
                SessionEvent::PracticeComplete { main_trials } => println!(
                    "\nPractice over! The main experiment ({main_trials} trials) starts now.\n"
                ),
                SessionEvent::ExperimentComplete => {
                    println!("\nExperiment over! Please let the experimenter know.")
                }
            }
        }
    }

    fn print_grid(&self) {
        let mut row = Vec::new();
        let mut colour = None;
        for button in &self.buttons {
            if colour.is_some_and(|c| c != button.colour) {
                println!("  {}", row.join("  "));
                row.clear();
            }
            colour = Some(button.colour);
            row.push(format!("{:<8}", button.to_string()));
        }
        if !row.is_empty() {
            println!("  {}", row.join("  "));
        }
        println!();
    }

    fn cleanup_and_exit(mut self) -> Result<()> {
        self.session.exit().context("saving responses on exit")?;
        let (presented, total) = self.session.state().progress();
        println!("\nSession ended after trial {presented} of {total}.");
        println!(
            "{} responses saved to {}. Thank you!",
            self.session.state().log().len(),
            self.session.sink().path().display()
        );
        Ok(())
    }
}

fn spawn_input_reader(events: Sender<AppEvent>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if events.send(AppEvent::Input(line)).is_err() {
                    return;
                }
            }
            let _ = events.send(AppEvent::InputClosed);
        })
        .context("could not start input reader")?;
    Ok(())
}

/// A render failure leaves the trial prepared; the listener can type `retry`.
fn tolerate_render_failure<T>(result: Result<T, SessionError>) -> Result<Option<T>, SessionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SessionError::Render(e)) => {
            warn!(error = %e, "trial could not be played");
            println!("The sound could not be played ({e}). Type \"retry\" to try again.");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Save what was answered before a fatal error ends the session.
fn flush_on_error<G, R, K, C>(
    session: &mut SessionController<G, R, K, C>,
    outcome: Result<()>,
) -> Result<()>
where
    G: DesignSource,
    R: Renderer,
    K: LogSink,
    C: Clock,
{
    if outcome.is_err() {
        if let Err(e) = session.exit() {
            warn!(error = %e, "responses not saved after session error");
        }
    }
    outcome
}

fn feedback_message(feedback: &Feedback) -> String {
    let target = feedback.target;
    match feedback.verdict {
        Verdict::Correct => "Correct!".to_string(),
        Verdict::WrongColour => format!("Wrong colour, it was {target}."),
        Verdict::WrongNumber => format!("Wrong number, it was {target}."),
        Verdict::WrongBoth => format!("Wrong colour and number, it was {target}."),
    }
}
