//! The debate loop: turn scheduling, pacing, and lifecycle.
//!
//! The scheduler is a single task owning all session state. Director
//! intents arrive on a channel through [`ArenaHandle`]; every suspension
//! point (think delay, the remote call, pacing timers) is raced against
//! that channel, so intents are applied between suspension points and an
//! in-flight turn observes the current status at its checkpoints. At most
//! one advance timer is armed at any time, and it is invalidated whenever
//! status or the active speaker changes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::director::Intervention;
use crate::gateway::{Gateway, GenerationRequest, HistoryLine};
use crate::persona::{Side, Speaker};
use crate::prompt::{TacticProvider, build_prompt};
use crate::session::{DebateSession, DebateStatus, SessionConfig};
use crate::transcript::{EntryId, Transcript, TranscriptEntry};
use crate::tts::SpeechSink;

/// Delay before the very first cycle.
const FIRST_CYCLE_DELAY: Duration = Duration::from_millis(1000);
/// Simulated deliberation before each generation call.
const THINK_DELAY: Duration = Duration::from_millis(1500);
/// Settle delay between arming a cycle and actually entering it.
const SETTLE_DELAY: Duration = Duration::from_millis(1000);
/// Floor on the pause between turns.
const MIN_TURN_GAP: Duration = Duration::from_millis(2000);
/// Assumed reading pace used to derive the post-turn delay.
const WORDS_PER_SECOND: f64 = 2.5;
/// History entries sent with each generation request.
const HISTORY_WINDOW: usize = 4;
/// Own recent lines fed to the anti-repetition block.
const SELF_HISTORY: usize = 3;

/// Events emitted as the debate progresses.
#[derive(Debug, Clone)]
pub enum ArenaEvent {
    /// A placeholder entry was appended; generation is in flight.
    EntryPending { entry: TranscriptEntry },
    /// An entry reached its final text (system and user lines included).
    EntryFinalized { entry: TranscriptEntry },
    /// A pending entry was discarded by cancellation.
    EntryRemoved { id: EntryId },
    StatusChanged { status: DebateStatus },
    SpeakerChanged { side: Side },
}

/// Callback for arena events.
pub type ArenaCallback = Box<dyn Fn(ArenaEvent) + Send + Sync>;

#[derive(Debug)]
enum Command {
    Pause,
    Resume,
    Interrupt,
    Intervene(Intervention),
    End,
    UserMessage(String),
}

/// Cloneable intent dispatcher held by the presentation layer.
#[derive(Clone)]
pub struct ArenaHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl ArenaHandle {
    pub fn pause(&self) {
        let _ = self.tx.send(Command::Pause);
    }

    pub fn resume(&self) {
        let _ = self.tx.send(Command::Resume);
    }

    pub fn interrupt(&self) {
        let _ = self.tx.send(Command::Interrupt);
    }

    pub fn intervene(&self, intervention: Intervention) {
        let _ = self.tx.send(Command::Intervene(intervention));
    }

    pub fn end(&self) {
        let _ = self.tx.send(Command::End);
    }

    pub fn say(&self, text: impl Into<String>) {
        let _ = self.tx.send(Command::UserMessage(text.into()));
    }
}

/// What the armed timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    /// Enter a new turn cycle for the active speaker.
    Kickoff,
    /// Flip the active speaker, then arm a kickoff.
    Advance,
}

/// Outcome of applying a command while a turn is in flight.
#[derive(Debug, PartialEq, Eq)]
enum Applied {
    Continue,
    AbortTurn,
}

enum Waited<T> {
    Done(T),
    Aborted,
}

/// Owns the debate loop. Construct, optionally attach a callback, then
/// `run()` to completion; `run` returns the final transcript once every
/// handle has been dropped.
pub struct DebateScheduler {
    session: DebateSession,
    gateway: Arc<Gateway>,
    tactics: Arc<dyn TacticProvider>,
    speech: Arc<dyn SpeechSink>,
    callback: Option<ArenaCallback>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// The single armed timer. Never more than one.
    armed: Option<(Instant, NextStep)>,
    in_flight: bool,
    shutdown: bool,
}

impl DebateScheduler {
    pub fn new(
        config: SessionConfig,
        gateway: Arc<Gateway>,
        tactics: Arc<dyn TacticProvider>,
        speech: Arc<dyn SpeechSink>,
    ) -> (Self, ArenaHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            session: DebateSession::new(config),
            gateway,
            tactics,
            speech,
            callback: None,
            commands: rx,
            armed: None,
            in_flight: false,
            shutdown: false,
        };
        (scheduler, ArenaHandle { tx })
    }

    /// Set a callback for arena events.
    pub fn with_callback(mut self, callback: ArenaCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Run the debate until every handle is dropped.
    pub async fn run(mut self) -> Transcript {
        let config = &self.session.config;
        let announcement = format!(
            "🎙️ LIVE DEBATE: \"{}\"\nLanguage: {}",
            config.topic, config.language
        );
        let id = self.session.transcript.push_system("Host", announcement);
        self.emit_finalized(id);
        self.armed = Some((Instant::now() + FIRST_CYCLE_DELAY, NextStep::Kickoff));

        while !self.shutdown {
            match self.armed {
                Some((deadline, step)) => {
                    tokio::select! {
                        biased;
                        cmd = self.commands.recv() => {
                            self.apply_or_shutdown(cmd);
                        }
                        _ = tokio::time::sleep_until(deadline) => {
                            self.armed = None;
                            self.fire(step).await;
                        }
                    }
                }
                None => {
                    let cmd = self.commands.recv().await;
                    self.apply_or_shutdown(cmd);
                }
            }
        }

        self.session.transcript
    }

    async fn fire(&mut self, step: NextStep) {
        if !self.session.is_running() {
            return;
        }
        match step {
            NextStep::Advance => {
                let next = self.session.active_speaker.other();
                self.session.active_speaker = next;
                self.emit(ArenaEvent::SpeakerChanged { side: next });
                self.armed = Some((Instant::now() + SETTLE_DELAY, NextStep::Kickoff));
            }
            NextStep::Kickoff => {
                if self.speech.is_speaking() {
                    // Prefer not to talk over in-flight audio; check again shortly.
                    self.armed = Some((Instant::now() + SETTLE_DELAY, NextStep::Kickoff));
                    return;
                }
                self.run_cycle().await;
            }
        }
    }

    /// One full turn cycle for the active speaker.
    async fn run_cycle(&mut self) {
        let side = self.session.active_speaker;
        let name = self.session.persona(side).name.clone();

        // Guard against double-scheduling: never two turns in flight.
        let Some(entry_id) = self.session.transcript.begin_pending(side, name.clone()) else {
            return;
        };
        self.in_flight = true;
        self.emit_entry(entry_id, |entry| ArenaEvent::EntryPending { entry });

        // One-shot consumption of any director command.
        let intervention = self
            .session
            .pending_intervention
            .take()
            .map(Intervention::directive);

        debug!(?side, intervention = intervention.is_some(), "turn starting");

        match self.guarded(tokio::time::sleep(THINK_DELAY)).await {
            Waited::Aborted => return self.abort_turn(),
            Waited::Done(()) => {}
        }
        if !self.session.is_running() {
            return self.cancel_turn();
        }

        let request = self.build_request(side, intervention);
        let gateway = Arc::clone(&self.gateway);
        let text = match self
            .guarded(async move { gateway.generate(&request).await })
            .await
        {
            Waited::Aborted => return self.abort_turn(),
            Waited::Done(text) => text,
        };
        if !self.session.is_running() {
            return self.cancel_turn();
        }

        // Sole allowed post-creation mutation of the entry.
        if !self.session.transcript.finalize(entry_id, text.clone()) {
            self.in_flight = false;
            return;
        }
        self.emit_entry(entry_id, |entry| ArenaEvent::EntryFinalized { entry });
        self.speech.speak(&text, side);

        // Pace the next turn to roughly match spoken-reading duration.
        let words = text.split_whitespace().count() as f64;
        let reading = Duration::from_millis(((words / WORDS_PER_SECOND) * 1000.0) as u64);
        let gap = reading.max(MIN_TURN_GAP);
        self.armed = Some((Instant::now() + gap, NextStep::Advance));
        self.in_flight = false;
        debug!(?side, ?gap, "turn finalized");
    }

    fn build_request(&self, side: Side, intervention: Option<&'static str>) -> GenerationRequest {
        let session = &self.session;
        let transcript = &session.transcript;
        let speaker = session.persona(side);
        let opponent_name = session.persona(side.other()).name.clone();

        let last_opponent = transcript
            .last_opponent_utterance(side)
            .map(str::to_string);
        let recent_self = transcript.recent_self_utterances(side, SELF_HISTORY);

        let system_prompt = build_prompt(
            speaker,
            &opponent_name,
            &session.config.topic,
            &session.config.language,
            last_opponent.as_deref(),
            &recent_self,
            intervention,
            self.tactics.as_ref(),
        );

        let history = transcript
            .history_window(HISTORY_WINDOW)
            .into_iter()
            .map(|entry| HistoryLine {
                own: entry.speaker == Speaker::Side(side),
                author: entry.display_name.clone(),
                text: entry.text.clone(),
            })
            .collect();

        GenerationRequest {
            system_prompt,
            history,
            speaker_name: speaker.name.clone(),
        }
    }

    /// Race a suspension against the intent channel so already-scheduled
    /// work observes current state, not schedule-time state.
    async fn guarded<T>(&mut self, fut: impl Future<Output = T>) -> Waited<T> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => {
                    match cmd {
                        None => {
                            self.shutdown = true;
                            return Waited::Aborted;
                        }
                        Some(command) => {
                            if self.apply(command) == Applied::AbortTurn {
                                return Waited::Aborted;
                            }
                        }
                    }
                }
                out = &mut fut => return Waited::Done(out),
            }
        }
    }

    /// Turn was aborted by a command; the command already cleaned up the
    /// pending entry (interrupt/end) unless this was a handle shutdown.
    fn abort_turn(&mut self) {
        self.discard_pending();
        self.in_flight = false;
    }

    /// Turn observed a non-Running status at a checkpoint: discard the
    /// placeholder and schedule nothing.
    fn cancel_turn(&mut self) {
        self.discard_pending();
        self.in_flight = false;
    }

    fn discard_pending(&mut self) {
        if let Some(id) = self.session.transcript.remove_pending() {
            self.emit(ArenaEvent::EntryRemoved { id });
        }
    }

    fn apply_or_shutdown(&mut self, cmd: Option<Command>) {
        match cmd {
            None => self.shutdown = true,
            Some(command) => {
                self.apply(command);
            }
        }
    }

    fn apply(&mut self, command: Command) -> Applied {
        match command {
            Command::Pause => {
                if self.session.is_running() {
                    self.set_status(DebateStatus::Paused);
                    self.speech.cancel();
                    self.armed = None;
                }
                // The in-flight turn aborts at its next checkpoint.
                Applied::Continue
            }
            Command::Resume => {
                if self.session.status == DebateStatus::Paused {
                    self.set_status(DebateStatus::Running);
                    if !self.in_flight {
                        self.armed = Some((Instant::now() + SETTLE_DELAY, NextStep::Kickoff));
                    }
                }
                Applied::Continue
            }
            Command::Interrupt => {
                if !self.session.is_running() {
                    return Applied::Continue;
                }
                self.speech.cancel();
                self.armed = None;
                self.discard_pending();

                let next = self.session.active_speaker.other();
                self.session.active_speaker = next;
                self.emit(ArenaEvent::SpeakerChanged { side: next });

                let floor = format!(
                    "🛑 Interrupted! {} takes the floor!",
                    self.session.persona(next).name
                );
                let id = self.session.transcript.push_system("Director", floor);
                self.emit_finalized(id);

                // Eligible immediately: no post-turn pacing delay.
                self.armed = Some((Instant::now(), NextStep::Kickoff));
                Applied::AbortTurn
            }
            Command::Intervene(intervention) => {
                self.session.pending_intervention.set(intervention);
                let notice = format!("⚠️ COMMAND ISSUED: {}", intervention.label());
                let id = self.session.transcript.push_system("Director", notice);
                self.emit_finalized(id);
                Applied::Continue
            }
            Command::End => {
                self.set_status(DebateStatus::Stopped);
                self.speech.cancel();
                self.armed = None;
                self.discard_pending();
                Applied::AbortTurn
            }
            Command::UserMessage(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    let id = self.session.transcript.push_user("You", trimmed);
                    self.emit_finalized(id);
                }
                Applied::Continue
            }
        }
    }

    fn set_status(&mut self, status: DebateStatus) {
        if self.session.status != status {
            self.session.status = status;
            debug!(?status, "status changed");
            self.emit(ArenaEvent::StatusChanged { status });
        }
    }

    fn emit(&self, event: ArenaEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }

    fn emit_finalized(&self, id: EntryId) {
        self.emit_entry(id, |entry| ArenaEvent::EntryFinalized { entry });
    }

    fn emit_entry(&self, id: EntryId, make: impl FnOnce(TranscriptEntry) -> ArenaEvent) {
        if let Some(entry) = self
            .session
            .transcript
            .entries()
            .iter()
            .find(|e| e.id == id)
        {
            self.emit(make(entry.clone()));
        }
    }
}
