//! Run lifecycle
//!
//! `Idle -> Connecting -> AwaitingReady -> PresentingIntro -> Running ->
//! Terminating -> Closed`
//!
//! Startup failures (connect, readiness) abort to teardown and surface as
//! `Err`. Every other ending produces a [`RunReport`]. Teardown closes every
//! opened session and the presentation surface on all exit paths.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use voice_duet_config::{SessionSettings, Settings};
use voice_duet_core::{AgentId, AgentIdentity, ConversationLog};
use voice_duet_transport::{Connector, SessionParams};

use crate::coordinator::{TurnCoordinator, TurnDirective, TurnKind, TurnOutcome};
use crate::events::{SessionEvent, SessionEventKind};
use crate::presentation::{report, PresentationSurface};
use crate::recorder::TranscriptRecorder;
use crate::relay::{AudioRelay, TurnAudio};
use crate::session::Session;
use crate::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Idle,
    Connecting,
    AwaitingReady,
    PresentingIntro,
    Running,
    Terminating,
    Closed,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Idle => "idle",
            LifecyclePhase::Connecting => "connecting",
            LifecyclePhase::AwaitingReady => "awaiting_ready",
            LifecyclePhase::PresentingIntro => "presenting_intro",
            LifecyclePhase::Running => "running",
            LifecyclePhase::Terminating => "terminating",
            LifecyclePhase::Closed => "closed",
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The configured number of turns was taken
    TurnLimit,
    /// The wall-clock ceiling was hit
    Timeout,
    /// A session connection dropped mid-run
    SessionDropped(AgentId),
    /// A turn request broke the alternation guard
    TurnDiscipline(String),
    /// Shutdown was requested
    Cancelled,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::TurnLimit => "turn_limit",
            EndReason::Timeout => "timeout",
            EndReason::SessionDropped(_) => "session_dropped",
            EndReason::TurnDiscipline(_) => "turn_discipline",
            EndReason::Cancelled => "cancelled",
        }
    }
}

/// Outcome of a run that got past startup
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub end_reason: EndReason,
    /// Completed turns, errored ones included
    pub turns_taken: u32,
    pub log: ConversationLog,
    /// Relayed audio per turn
    pub audio: Vec<TurnAudio>,
    pub elapsed: Duration,
    /// Turn that was in flight at the end and was dropped unsealed
    pub discarded_turn: Option<u32>,
}

impl RunReport {
    fn empty(end_reason: EndReason, elapsed: Duration) -> Self {
        Self {
            end_reason,
            turns_taken: 0,
            log: ConversationLog::new(),
            audio: Vec::new(),
            elapsed,
            discarded_turn: None,
        }
    }
}

/// Inputs of one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Identities indexed by [`AgentId::index`]
    pub agents: [AgentIdentity; 2],
    pub session: SessionSettings,
    pub opener: AgentId,
    pub max_turns: u32,
    pub inter_turn_delay: Duration,
    /// Bound on waiting for both sessions to become ready
    pub ready_timeout: Duration,
    /// Wall-clock ceiling for the whole run
    pub run_timeout: Duration,
    pub intro_duration: Duration,
}

impl RunConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let conversation = &settings.conversation;
        Self {
            agents: settings.agents.identities(),
            session: settings.session.clone(),
            opener: conversation.opener,
            max_turns: conversation.max_turns,
            inter_turn_delay: conversation.inter_turn_delay(),
            ready_timeout: conversation.ready_timeout(),
            run_timeout: conversation.run_timeout(),
            intro_duration: conversation.intro_duration(),
        }
    }

    pub fn identity(&self, agent: AgentId) -> &AgentIdentity {
        &self.agents[agent.index()]
    }
}

/// Drives one conversation from connect to teardown
pub struct LifecycleController {
    config: RunConfig,
    connector: Arc<dyn Connector>,
    surface: Arc<dyn PresentationSurface>,
    phase: watch::Sender<LifecyclePhase>,
}

impl LifecycleController {
    pub fn new(
        config: RunConfig,
        connector: Arc<dyn Connector>,
        surface: Arc<dyn PresentationSurface>,
    ) -> Self {
        let (phase, _) = watch::channel(LifecyclePhase::Idle);
        Self {
            config,
            connector,
            surface,
            phase,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    /// Run until an end condition
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(std::future::pending()).await
    }

    /// Run until an end condition or until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        if self.phase() != LifecyclePhase::Idle {
            return Err(AgentError::AlreadyRun);
        }

        let started = Instant::now();
        let mut shutdown = std::pin::pin!(shutdown);
        let mut sessions: [Option<Session>; 2] = [None, None];

        let outcome = self.drive(&mut sessions, shutdown.as_mut(), started).await;

        self.set_phase(LifecyclePhase::Terminating);
        self.teardown(&sessions).await;
        self.set_phase(LifecyclePhase::Closed);

        match &outcome {
            Ok(report) => {
                tracing::info!(
                    reason = report.end_reason.as_str(),
                    turns = report.turns_taken,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Conversation finished"
                );
                crate::metrics::record_run(report.end_reason.as_str());
            },
            Err(e) => {
                tracing::error!(error = %e, "Conversation aborted during startup");
                crate::metrics::record_run("startup_failure");
            },
        }

        outcome
    }

    async fn drive<F>(
        &self,
        slots: &mut [Option<Session>; 2],
        mut shutdown: Pin<&mut F>,
        started: Instant,
    ) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        // Connecting: sessions land in their slots as soon as they open so
        // teardown closes them whatever ends the run
        self.set_phase(LifecyclePhase::Connecting);
        let mut connecting: FuturesUnordered<_> =
            [AgentId::A, AgentId::B].into_iter().map(|agent| self.open(agent)).collect();
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.as_mut() => {
                    return Ok(RunReport::empty(EndReason::Cancelled, started.elapsed()));
                }
                next = connecting.next() => next,
            };
            let Some((agent, result)) = next else {
                break;
            };
            match result {
                Ok(session) => slots[agent.index()] = Some(session),
                Err(e) => {
                    tracing::error!(agent = %agent, error = %e, "Session failed to connect");
                    return Err(e);
                },
            }
        }

        let sessions: &[Option<Session>; 2] = slots;
        let (tx, mut events) = mpsc::unbounded_channel();
        for session in sessions.iter().flatten() {
            session.on_event(tx.clone())?;
        }

        // AwaitingReady
        self.set_phase(LifecyclePhase::AwaitingReady);
        let bound = self.config.ready_timeout;
        let session_a = session_at(sessions, AgentId::A)?;
        let session_b = session_at(sessions, AgentId::B)?;
        let ready = tokio::select! {
            biased;
            _ = shutdown.as_mut() => {
                return Ok(RunReport::empty(EndReason::Cancelled, started.elapsed()));
            }
            ready = futures::future::try_join(session_a.wait_ready(bound), session_b.wait_ready(bound)) => ready,
        };
        ready?;

        // PresentingIntro
        self.set_phase(LifecyclePhase::PresentingIntro);
        let intro = self.config.intro_duration;
        report("initialize", self.surface.initialize(&self.config.agents));
        report("run_intro_sequence", self.surface.run_intro_sequence(intro));
        tokio::select! {
            biased;
            _ = shutdown.as_mut() => {
                return Ok(RunReport::empty(EndReason::Cancelled, started.elapsed()));
            }
            _ = tokio::time::sleep(intro) => {}
        }

        // Running
        self.set_phase(LifecyclePhase::Running);
        let deadline = started + self.config.run_timeout;
        let mut run = Conversation::new(&self.config, sessions, self.surface.clone());
        let mut end = run.begin();

        let end_reason = loop {
            if let Some(reason) = end.take() {
                break reason;
            }
            let wake = run.scheduled.as_ref().map(|s| s.at).unwrap_or(deadline);

            tokio::select! {
                biased;
                _ = shutdown.as_mut() => {
                    tracing::info!("Shutdown requested, ending conversation");
                    break EndReason::Cancelled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        timeout_secs = self.config.run_timeout.as_secs(),
                        speaker = ?run.coordinator.state().current_speaker,
                        "Conversation timed out"
                    );
                    break EndReason::Timeout;
                }
                Some(event) = events.recv() => {
                    end = run.handle(event);
                }
                _ = tokio::time::sleep_until(wake), if run.scheduled.is_some() => {
                    end = run.fire_scheduled();
                }
            }
        };

        Ok(run.finish(end_reason, started.elapsed()))
    }

    async fn open(&self, agent: AgentId) -> (AgentId, Result<Session>) {
        let identity = Arc::new(self.config.identity(agent).clone());
        let params = SessionParams::for_agent(&identity, &self.config.session);
        (agent, Session::connect(identity, params, self.connector.as_ref()).await)
    }

    async fn teardown(&self, sessions: &[Option<Session>; 2]) {
        futures::future::join_all(sessions.iter().flatten().map(|session| session.close())).await;
        report("close", self.surface.close());
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        self.phase.send_replace(phase);
        tracing::info!(phase = phase.as_str(), "Lifecycle phase");
    }
}

fn session_at(sessions: &[Option<Session>; 2], agent: AgentId) -> Result<&Session> {
    sessions[agent.index()]
        .as_ref()
        .ok_or(AgentError::SessionClosed(agent))
}

struct ScheduledTurn {
    at: Instant,
    speaker: AgentId,
    turn: u32,
    kind: TurnKind,
}

/// State of the running phase
struct Conversation<'a> {
    config: &'a RunConfig,
    sessions: &'a [Option<Session>; 2],
    coordinator: TurnCoordinator,
    relay: AudioRelay,
    recorder: TranscriptRecorder,
    scheduled: Option<ScheduledTurn>,
}

impl<'a> Conversation<'a> {
    fn new(
        config: &'a RunConfig,
        sessions: &'a [Option<Session>; 2],
        surface: Arc<dyn PresentationSurface>,
    ) -> Self {
        Self {
            config,
            sessions,
            coordinator: TurnCoordinator::new(config.opener, config.max_turns, config.inter_turn_delay),
            relay: AudioRelay::new(surface.clone(), config.session.output_audio_format),
            recorder: TranscriptRecorder::new(surface),
            scheduled: None,
        }
    }

    fn begin(&mut self) -> Option<EndReason> {
        let directive = self.coordinator.start();
        self.apply(directive)
    }

    fn apply(&mut self, directive: TurnDirective) -> Option<EndReason> {
        match directive {
            TurnDirective::Request {
                speaker,
                turn,
                kind,
                delay,
            } => {
                if delay.is_zero() {
                    self.start_turn(speaker, turn, kind)
                } else {
                    self.scheduled = Some(ScheduledTurn {
                        at: Instant::now() + delay,
                        speaker,
                        turn,
                        kind,
                    });
                    None
                }
            },
            TurnDirective::Finished => Some(EndReason::TurnLimit),
            TurnDirective::Abort { agent } => Some(EndReason::SessionDropped(agent)),
        }
    }

    fn fire_scheduled(&mut self) -> Option<EndReason> {
        let next = self.scheduled.take()?;
        self.start_turn(next.speaker, next.turn, next.kind)
    }

    fn start_turn(&mut self, speaker: AgentId, turn: u32, kind: TurnKind) -> Option<EndReason> {
        match self.request(speaker, turn, kind) {
            Ok(()) => None,
            Err(AgentError::SessionClosed(agent)) => {
                self.coordinator.stop();
                Some(EndReason::SessionDropped(agent))
            },
            Err(e) => {
                tracing::error!(agent = %speaker, turn, error = %e, "Turn request rejected");
                self.coordinator.stop();
                Some(EndReason::TurnDiscipline(e.to_string()))
            },
        }
    }

    fn request(&mut self, speaker: AgentId, turn: u32, kind: TurnKind) -> Result<()> {
        let session = session_at(self.sessions, speaker)?;
        let partner = session_at(self.sessions, speaker.other())?;

        if partner.is_speaking() {
            return Err(AgentError::TurnDiscipline(format!(
                "agent {} asked to speak while agent {} is speaking",
                speaker,
                partner.agent()
            )));
        }

        let instructions = match kind {
            TurnKind::Opener => self
                .config
                .session
                .opener_for(session.identity(), partner.identity()),
            TurnKind::Continuation => self
                .config
                .session
                .continuation_for(session.identity(), partner.identity()),
        };

        session.request_turn(&instructions)?;
        self.coordinator.turn_requested(speaker, turn);
        self.recorder.begin_turn(turn, session.identity());

        tracing::info!(agent = %speaker, turn, kind = ?kind, "Turn requested");
        Ok(())
    }

    fn handle(&mut self, event: SessionEvent) -> Option<EndReason> {
        let agent = event.agent;
        let kind = event.kind.name();
        match event.kind {
            SessionEventKind::Created | SessionEventKind::Ready => {
                tracing::trace!(agent = %agent, kind, "Session event");
                None
            },
            SessionEventKind::TranscriptDelta(delta) => {
                if self.coordinator.is_speaking(agent) {
                    self.recorder.on_delta(agent, &delta);
                }
                None
            },
            SessionEventKind::AudioDelta(payload) => {
                if self.coordinator.is_speaking(agent) {
                    let turn = self.coordinator.state().current_turn;
                    if let Some(bytes) = self.relay.on_audio_delta(agent, turn, &payload) {
                        self.recorder.on_audio(agent, bytes);
                    }
                } else {
                    tracing::debug!(agent = %agent, "Dropping audio outside the agent's turn");
                }
                None
            },
            SessionEventKind::TranscriptDone(transcript) => {
                self.recorder.on_transcript_done(agent, &transcript);
                None
            },
            SessionEventKind::TurnDone => self.complete(agent, TurnOutcome::Completed),
            SessionEventKind::Error(message) => {
                if self.coordinator.is_speaking(agent) {
                    crate::metrics::record_turn_error(agent);
                }
                self.complete(agent, TurnOutcome::Errored(message))
            },
            SessionEventKind::Disconnected(reason) => {
                tracing::error!(agent = %agent, reason = ?reason, "Session dropped mid-run");
                self.recorder.discard_open();
                self.scheduled = None;
                let directive = self.coordinator.on_disconnect(agent);
                self.apply(directive)
            },
        }
    }

    fn complete(&mut self, agent: AgentId, outcome: TurnOutcome) -> Option<EndReason> {
        if self.coordinator.is_speaking(agent) {
            self.recorder.on_turn_end(agent);
        }
        let directive = self.coordinator.on_turn_complete(agent, outcome)?;
        self.apply(directive)
    }

    fn finish(mut self, end_reason: EndReason, elapsed: Duration) -> RunReport {
        self.coordinator.stop();
        self.scheduled = None;

        let discarded_turn = self.recorder.discard_open().map(|turn| turn.index);
        let audio = self.relay.totals();
        self.relay.release();

        RunReport {
            end_reason,
            turns_taken: self.coordinator.state().turns_taken,
            log: self.recorder.into_log(),
            audio,
            elapsed,
            discarded_turn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::NullSurface;
    use crate::session::SessionState;
    use ::metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
    use voice_duet_transport::SimulatedConnector;

    /// Counts the turn error counter and ignores everything else
    #[derive(Default)]
    struct TurnErrorRecorder {
        turn_errors: Arc<AtomicU64>,
    }

    impl Recorder for TurnErrorRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            if key.name() == crate::metrics::TURN_ERRORS {
                Counter::from_arc(self.turn_errors.clone())
            } else {
                Counter::noop()
            }
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    fn config(max_turns: u32) -> RunConfig {
        let mut config = RunConfig::from_settings(&Settings::default());
        config.max_turns = max_turns;
        config.inter_turn_delay = Duration::from_millis(5);
        config.ready_timeout = Duration::from_secs(1);
        config.run_timeout = Duration::from_secs(10);
        config.intro_duration = Duration::ZERO;
        config
    }

    #[test]
    fn test_run_config_from_settings() {
        let mut settings = Settings::default();
        settings.conversation.opener = AgentId::B;
        settings.conversation.ready_poll_attempts = 4;
        settings.conversation.ready_poll_interval_ms = 25;

        let config = RunConfig::from_settings(&settings);
        assert_eq!(config.opener, AgentId::B);
        assert_eq!(config.ready_timeout, Duration::from_millis(100));
        assert_eq!(config.identity(AgentId::B).name, "Sam");
    }

    #[tokio::test]
    async fn test_phases_end_closed() {
        let connector = SimulatedConnector::new().with_frame_interval(Duration::ZERO);
        let controller = LifecycleController::new(config(2), Arc::new(connector), Arc::new(NullSurface));
        let phase = controller.subscribe_phase();
        assert_eq!(controller.phase(), LifecyclePhase::Idle);

        let report = controller.run().await.unwrap();
        assert_eq!(report.end_reason, EndReason::TurnLimit);
        assert_eq!(*phase.borrow(), LifecyclePhase::Closed);

        // a controller is single-use
        assert!(matches!(controller.run().await, Err(AgentError::AlreadyRun)));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_run() {
        let connector = SimulatedConnector::new().with_frame_interval(Duration::from_millis(50));
        let stats = connector.stats();
        let controller = LifecycleController::new(config(50), Arc::new(connector), Arc::new(NullSurface));

        let report = controller
            .run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(report.end_reason, EndReason::Cancelled);
        assert!(report.turns_taken < 50);
        assert_eq!(stats.closes(AgentId::A), 1);
        assert_eq!(stats.closes(AgentId::B), 1);
    }

    #[tokio::test]
    async fn test_at_most_one_session_speaks() {
        let config = config(4);
        let connector = SimulatedConnector::new().with_frame_interval(Duration::from_millis(2));
        let controller = LifecycleController::new(config.clone(), Arc::new(connector), Arc::new(NullSurface));

        let mut slots: [Option<Session>; 2] = [None, None];
        for agent in [AgentId::A, AgentId::B] {
            let (_, session) = controller.open(agent).await;
            slots[agent.index()] = Some(session.unwrap());
        }
        let (tx, mut events) = mpsc::unbounded_channel();
        for session in slots.iter().flatten() {
            session.on_event(tx.clone()).unwrap();
            session.wait_ready(Duration::from_secs(1)).await.unwrap();
        }

        // observe every transition on both state channels
        let mut state_a = slots[0].as_ref().unwrap().subscribe_state();
        let mut state_b = slots[1].as_ref().unwrap().subscribe_state();
        let overlap = Arc::new(AtomicBool::new(false));
        let speaking_seen = Arc::new(AtomicU32::new(0));
        let watcher = tokio::spawn({
            let overlap = overlap.clone();
            let speaking_seen = speaking_seen.clone();
            async move {
                loop {
                    let changed = tokio::select! {
                        changed = state_a.changed() => changed,
                        changed = state_b.changed() => changed,
                    };
                    if changed.is_err() {
                        break;
                    }
                    let a = *state_a.borrow_and_update();
                    let b = *state_b.borrow_and_update();
                    if a == SessionState::Speaking || b == SessionState::Speaking {
                        speaking_seen.fetch_add(1, Ordering::SeqCst);
                    }
                    if a == SessionState::Speaking && b == SessionState::Speaking {
                        overlap.store(true, Ordering::SeqCst);
                    }
                }
            }
        });

        let mut run = Conversation::new(&config, &slots, Arc::new(NullSurface));
        assert!(run.begin().is_none());
        assert!(slots[0].as_ref().unwrap().is_speaking());

        // B may not take the floor while A holds it
        let err = run.request(AgentId::B, 1, TurnKind::Continuation).unwrap_err();
        assert!(matches!(err, AgentError::TurnDiscipline(_)));
        assert_eq!(slots[1].as_ref().unwrap().state(), SessionState::Ready);

        let end = loop {
            let wake = run.scheduled.as_ref().map(|s| s.at);
            let end = tokio::select! {
                Some(event) = events.recv() => run.handle(event),
                _ = tokio::time::sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {
                    run.fire_scheduled()
                }
            };
            assert!(!slots.iter().flatten().all(|s| s.is_speaking()));
            if let Some(end) = end {
                break end;
            }
        };

        assert_eq!(end, EndReason::TurnLimit);
        let report = run.finish(end, Duration::ZERO);
        assert_eq!(report.turns_taken, 4);
        assert_eq!(report.log.speakers(), vec![AgentId::A, AgentId::B, AgentId::A, AgentId::B]);

        for session in slots.iter().flatten() {
            session.close().await;
        }
        watcher.abort();
        assert!(!overlap.load(Ordering::SeqCst));
        assert!(speaking_seen.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_errors_count_only_during_a_turn() {
        let config = config(4);
        let sessions: [Option<Session>; 2] = [None, None];
        let recorder = TurnErrorRecorder::default();
        let errors = recorder.turn_errors.clone();
        let mut run = Conversation::new(&config, &sessions, Arc::new(NullSurface));
        let error = |agent| SessionEvent::new(agent, SessionEventKind::Error("boom".to_string()));

        ::metrics::with_local_recorder(&recorder, || {
            // nothing in flight yet
            assert!(run.handle(error(AgentId::A)).is_none());
            assert_eq!(errors.load(Ordering::SeqCst), 0);

            let _ = run.coordinator.start();
            run.coordinator.turn_requested(AgentId::A, 0);

            // the partner's error is not part of A's turn
            assert!(run.handle(error(AgentId::B)).is_none());
            assert_eq!(errors.load(Ordering::SeqCst), 0);

            assert!(run.handle(error(AgentId::A)).is_none());
            assert_eq!(errors.load(Ordering::SeqCst), 1);
        });

        assert_eq!(run.coordinator.state().turns_taken, 1);
        assert_eq!(run.scheduled.as_ref().map(|s| s.speaker), Some(AgentId::B));
    }

    #[test]
    fn test_end_reason_serializes() {
        assert_eq!(serde_json::to_value(EndReason::TurnLimit).unwrap(), "turn_limit");
        assert_eq!(
            serde_json::to_value(EndReason::SessionDropped(AgentId::B)).unwrap(),
            serde_json::json!({"session_dropped": "b"})
        );
    }
}
