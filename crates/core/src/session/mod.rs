//! The rating session state machine.
//!
//! [`SessionController::handle`] is the only way state changes. It validates
//! an [`Action`] against the current [`SessionState`], updates the ledger and
//! returns the audio commands the caller should run. Audio is never touched
//! directly, so the machine can be driven without a sound device.

use std::fmt;

use rand::Rng;

use crate::{
    encouragement::{self, EncouragementSelection, MessagePool},
    ClipId, ImageRef, PlayerCommand, Result, Score, ScoreLedger, ScoreRecord,
};

/// Which screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Start screen; offers start, or continue and restart when resuming.
    Menu,
    /// The current clip is being played and rated.
    Testing,
    /// Interstitial shown after each rating except the last.
    Encouragement,
    /// Every clip has been rated.
    Completion,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Menu => "menu",
            Self::Testing => "testing",
            Self::Encouragement => "encouragement",
            Self::Completion => "completion",
        };
        f.write_str(name)
    }
}

/// User intents understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartOrContinue,
    Restart,
    Rate(Score),
    Play,
    Repeat,
    Stop,
    ReturnToPrevious,
    ContinueRating,
    Exit,
}

impl Action {
    /// Parses a textual action name. Unknown names return `None` and are
    /// meant to be ignored by the caller.
    pub fn parse(input: &str) -> Option<Self> {
        let name = input.trim().to_lowercase();
        let action = match name.as_str() {
            "start" | "continue" => Self::StartOrContinue,
            "restart" => Self::Restart,
            "play" => Self::Play,
            "repeat" => Self::Repeat,
            "stop" => Self::Stop,
            "return" | "back" => Self::ReturnToPrevious,
            "continue_rating" | "next" => Self::ContinueRating,
            "exit" | "quit" => Self::Exit,
            other => {
                let digits = other.strip_prefix("score_").unwrap_or(other);
                let value = digits.parse::<u8>().ok()?;
                Self::Rate(Score::new(value).ok()?)
            }
        };
        Some(action)
    }
}

/// Side effects requested by one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Audio commands to run, in order.
    pub commands: Vec<PlayerCommand>,
    /// Set when the session has finished and the caller should shut down.
    pub terminate: bool,
}

impl Transition {
    fn ignored() -> Self {
        Self::default()
    }

    fn play(&mut self, clip: &ClipId) {
        self.commands.push(PlayerCommand::Play(clip.clone()));
    }

    fn stop(&mut self) {
        self.commands.push(PlayerCommand::Stop);
    }
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, Copy)]
pub struct SessionSnapshot<'a> {
    pub state: SessionState,
    /// Number of clips rated so far.
    pub position: usize,
    /// Number of clips in the session.
    pub total: usize,
    /// Clip at `position`, absent once everything is rated.
    pub current_clip: Option<&'a ClipId>,
    /// Only set while the encouragement screen is shown.
    pub encouragement: Option<&'a EncouragementSelection>,
    /// Whether the ledger holds a prior session, which decides between
    /// "start" and "continue / restart" on the menu.
    pub has_progress: bool,
}

/// Owns the whole mutable state of a listening session.
pub struct SessionController<R> {
    clips: Vec<ClipId>,
    images: Vec<ImageRef>,
    messages: MessagePool,
    ledger: ScoreLedger,
    rng: R,
    state: SessionState,
    encouragement: Option<EncouragementSelection>,
    terminated: bool,
}

impl<R: Rng> SessionController<R> {
    /// Builds a controller resuming from whatever `ledger` already holds.
    ///
    /// A ledger that is not a prefix of `clips` is cut back to the longest
    /// matching prefix and persisted. With no clips at all the session starts
    /// in [`SessionState::Completion`].
    pub fn new(
        clips: Vec<ClipId>,
        images: Vec<ImageRef>,
        messages: MessagePool,
        mut ledger: ScoreLedger,
        rng: R,
    ) -> Result<Self> {
        let matching = ledger
            .records()
            .iter()
            .zip(&clips)
            .take_while(|(record, clip)| &record.clip == *clip)
            .count();
        if matching < ledger.len() {
            tracing::warn!(
                kept = matching,
                dropped = ledger.len() - matching,
                "stored ratings do not match the clip list; truncating"
            );
            ledger.truncate(matching)?;
        }

        let state = if clips.is_empty() {
            SessionState::Completion
        } else {
            SessionState::Menu
        };

        tracing::info!(
            clips = clips.len(),
            images = images.len(),
            resumed_at = ledger.len(),
            %state,
            "session ready"
        );

        Ok(Self {
            clips,
            images,
            messages,
            ledger,
            rng,
            state,
            encouragement: None,
            terminated: false,
        })
    }

    /// Current screen.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Index of the next clip to rate; always the ledger length.
    pub fn position(&self) -> usize {
        self.ledger.len()
    }

    /// Number of clips under test.
    pub fn total(&self) -> usize {
        self.clips.len()
    }

    /// The fixed clip order for this session.
    pub fn clips(&self) -> &[ClipId] {
        &self.clips
    }

    /// Ratings recorded so far.
    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Next clip to rate, if any remain.
    pub fn current_clip(&self) -> Option<&ClipId> {
        self.clips.get(self.position())
    }

    /// Selection drawn on the latest entry into the encouragement screen,
    /// cleared on leaving it.
    pub fn encouragement(&self) -> Option<&EncouragementSelection> {
        self.encouragement.as_ref()
    }

    /// True once the listener has exited from the completion screen.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Read-only view for renderers.
    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot {
            state: self.state,
            position: self.position(),
            total: self.total(),
            current_clip: self.current_clip(),
            encouragement: self.encouragement(),
            has_progress: !self.ledger.is_empty(),
        }
    }

    /// Applies one action. Actions that are not valid in the current state
    /// are ignored and produce an empty [`Transition`]. Errors only come from
    /// ledger persistence; the controller is left as it was before the call.
    pub fn handle(&mut self, action: Action) -> Result<Transition> {
        if self.terminated {
            return Ok(Transition::ignored());
        }

        let mut transition = Transition::default();
        match (self.state, action) {
            (SessionState::Menu, Action::StartOrContinue) => {
                self.enter_testing(&mut transition);
            }
            (SessionState::Menu, Action::Restart) if !self.ledger.is_empty() => {
                self.ledger.reset()?;
                tracing::info!("ratings reset");
                self.enter_testing(&mut transition);
            }
            (SessionState::Testing, Action::Rate(score)) => {
                let Some(clip) = self.current_clip().cloned() else {
                    return Ok(self.ignore(action));
                };
                self.ledger.append(ScoreRecord::new(clip.clone(), score))?;
                tracing::info!(%clip, %score, position = self.position(), "clip rated");
                transition.stop();

                if self.position() >= self.total() {
                    tracing::info!(rated = self.position(), "all clips rated");
                    self.state = SessionState::Completion;
                } else {
                    self.enter_encouragement();
                }
            }
            (SessionState::Testing, Action::Play | Action::Repeat) => {
                if let Some(clip) = self.current_clip() {
                    transition.play(clip);
                }
            }
            (SessionState::Testing, Action::Stop) => {
                transition.stop();
            }
            (
                SessionState::Testing | SessionState::Encouragement,
                Action::ReturnToPrevious,
            ) if self.position() > 0 => {
                if let Some(record) = self.ledger.pop_last()? {
                    tracing::info!(clip = %record.clip, "rating undone");
                }
                transition.stop();
                self.encouragement = None;
                self.enter_testing(&mut transition);
            }
            (SessionState::Encouragement, Action::ContinueRating) => {
                self.encouragement = None;
                self.enter_testing(&mut transition);
            }
            (SessionState::Completion, Action::Exit) => {
                tracing::info!(rated = self.position(), "session finished");
                self.terminated = true;
                transition.terminate = true;
            }
            _ => return Ok(self.ignore(action)),
        }

        Ok(transition)
    }

    fn ignore(&self, action: Action) -> Transition {
        tracing::debug!(?action, state = %self.state, "ignoring action");
        Transition::ignored()
    }

    /// Moves to Testing and starts the current clip, or straight to
    /// Completion when nothing is left to rate.
    fn enter_testing(&mut self, transition: &mut Transition) {
        match self.current_clip() {
            Some(clip) => {
                transition.play(clip);
                self.state = SessionState::Testing;
            }
            None => {
                self.state = SessionState::Completion;
            }
        }
    }

    fn enter_encouragement(&mut self) {
        let selection = encouragement::pick(&self.messages, &self.images, &mut self.rng);
        tracing::debug!(text = %selection.message, image = ?selection.image, "encouragement picked");
        self.encouragement = Some(selection);
        self.state = SessionState::Encouragement;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, RngCore, SeedableRng};
    use std::{cell::Cell, rc::Rc};
    use tempfile::TempDir;

    fn clips(n: usize) -> Vec<ClipId> {
        (0..n).map(|i| ClipId::new(format!("audios/clip{i}.wav"))).collect()
    }

    fn score(value: u8) -> Score {
        Score::new(value).unwrap()
    }

    fn controller(dir: &TempDir, n: usize) -> SessionController<StdRng> {
        controller_with_images(dir, n, Vec::new())
    }

    fn controller_with_images(
        dir: &TempDir,
        n: usize,
        images: Vec<ImageRef>,
    ) -> SessionController<StdRng> {
        let ledger = ScoreLedger::open(dir.path().join("mos_scores.json"));
        SessionController::new(
            clips(n),
            images,
            MessagePool::default(),
            ledger,
            StdRng::seed_from_u64(7),
        )
        .unwrap()
    }

    fn play(clip: &ClipId) -> PlayerCommand {
        PlayerCommand::Play(clip.clone())
    }

    #[test]
    fn parses_action_names() {
        assert_eq!(Action::parse("start"), Some(Action::StartOrContinue));
        assert_eq!(Action::parse(" Continue "), Some(Action::StartOrContinue));
        assert_eq!(Action::parse("score_3"), Some(Action::Rate(score(3))));
        assert_eq!(Action::parse("5"), Some(Action::Rate(score(5))));
        assert_eq!(Action::parse("next"), Some(Action::ContinueRating));
        assert_eq!(Action::parse("score_6"), None);
        assert_eq!(Action::parse("0"), None);
        assert_eq!(Action::parse("dance"), None);
    }

    #[test]
    fn start_plays_first_clip() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 3);
        assert_eq!(session.state(), SessionState::Menu);

        let t = session.handle(Action::StartOrContinue).unwrap();

        assert_eq!(session.state(), SessionState::Testing);
        assert_eq!(t.commands, vec![play(&session.clips()[0])]);
    }

    #[test]
    fn ratings_are_persisted_in_clip_order() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 4);
        session.handle(Action::StartOrContinue).unwrap();

        for value in [5, 3, 1] {
            session.handle(Action::Rate(score(value))).unwrap();
            session.handle(Action::ContinueRating).unwrap();
        }

        let stored = ScoreLedger::load(session.ledger().path());
        let ids: Vec<_> = stored.iter().map(|r| r.clip.clone()).collect();
        assert_eq!(ids, session.clips()[..3].to_vec());
        let scores: Vec<_> = stored.iter().map(|r| r.score.value()).collect();
        assert_eq!(scores, vec![5, 3, 1]);
    }

    #[test]
    fn continue_after_two_ratings_plays_third_clip() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 3);
        session.handle(Action::StartOrContinue).unwrap();

        let t = session.handle(Action::Rate(score(4))).unwrap();
        assert_eq!(t.commands, vec![PlayerCommand::Stop]);
        session.handle(Action::ContinueRating).unwrap();
        session.handle(Action::Rate(score(2))).unwrap();

        assert_eq!(session.position(), 2);
        assert_eq!(session.state(), SessionState::Encouragement);
        let clips = session.clips().to_vec();
        assert_eq!(
            session.ledger().records(),
            &[
                ScoreRecord::new(clips[0].clone(), score(4)),
                ScoreRecord::new(clips[1].clone(), score(2)),
            ]
        );

        let t = session.handle(Action::ContinueRating).unwrap();
        assert_eq!(session.state(), SessionState::Testing);
        assert_eq!(session.position(), 2);
        assert_eq!(t.commands, vec![play(&clips[2])]);
        assert!(session.encouragement().is_none());
    }

    #[test]
    fn rating_last_clip_skips_encouragement() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 1);
        session.handle(Action::StartOrContinue).unwrap();

        session.handle(Action::Rate(score(3))).unwrap();

        assert_eq!(session.state(), SessionState::Completion);
        assert!(session.encouragement().is_none());

        let t = session.handle(Action::Exit).unwrap();
        assert!(t.terminate);
        assert!(session.is_terminated());
    }

    #[test]
    fn empty_clip_list_completes_without_playing() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 0);
        assert_eq!(session.state(), SessionState::Completion);

        let t = session.handle(Action::StartOrContinue).unwrap();
        assert!(t.commands.is_empty());
        assert_eq!(session.state(), SessionState::Completion);
    }

    #[test]
    fn return_at_start_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 2);
        session.handle(Action::StartOrContinue).unwrap();

        for _ in 0..2 {
            let t = session.handle(Action::ReturnToPrevious).unwrap();
            assert!(t.commands.is_empty());
            assert_eq!(session.position(), 0);
            assert!(session.ledger().is_empty());
            assert_eq!(session.state(), SessionState::Testing);
        }
    }

    #[test]
    fn return_from_encouragement_undoes_and_replays() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 3);
        session.handle(Action::StartOrContinue).unwrap();
        session.handle(Action::Rate(score(4))).unwrap();
        assert!(session.encouragement().is_some());

        let t = session.handle(Action::ReturnToPrevious).unwrap();

        assert_eq!(session.state(), SessionState::Testing);
        assert_eq!(session.position(), 0);
        assert!(session.encouragement().is_none());
        assert_eq!(
            t.commands,
            vec![PlayerCommand::Stop, play(&session.clips()[0])]
        );
        assert!(ScoreLedger::load(session.ledger().path()).is_empty());
    }

    #[test]
    fn return_while_testing_replays_previous_clip() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 3);
        session.handle(Action::StartOrContinue).unwrap();
        session.handle(Action::Rate(score(4))).unwrap();
        session.handle(Action::ContinueRating).unwrap();

        let t = session.handle(Action::ReturnToPrevious).unwrap();

        assert_eq!(session.position(), 0);
        assert_eq!(
            t.commands,
            vec![PlayerCommand::Stop, play(&session.clips()[0])]
        );
    }

    #[test]
    fn selection_is_fixed_while_encouragement_is_shown() {
        let dir = TempDir::new().unwrap();
        let images = vec![ImageRef::new("a.png"), ImageRef::new("b.png")];
        let mut session = controller_with_images(&dir, 3, images);
        session.handle(Action::StartOrContinue).unwrap();
        session.handle(Action::Rate(score(3))).unwrap();

        let shown = session.encouragement().cloned();
        assert!(shown.is_some());
        // actions not valid here must not reroll the selection
        session.handle(Action::Play).unwrap();
        session.handle(Action::Rate(score(1))).unwrap();
        let _ = session.snapshot();

        assert_eq!(session.encouragement().cloned(), shown);
        assert_eq!(session.position(), 1);
    }

    #[test]
    fn restart_clears_prior_progress() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = controller(&dir, 3);
            session.handle(Action::StartOrContinue).unwrap();
            session.handle(Action::Rate(score(5))).unwrap();
            session.handle(Action::ContinueRating).unwrap();
            session.handle(Action::Rate(score(5))).unwrap();
        }

        let mut session = controller(&dir, 3);
        assert_eq!(session.position(), 2);
        assert!(session.snapshot().has_progress);

        let t = session.handle(Action::Restart).unwrap();

        assert_eq!(session.position(), 0);
        assert!(session.ledger().is_empty());
        assert!(!session.ledger().path().exists());
        assert_eq!(session.state(), SessionState::Testing);
        assert_eq!(t.commands, vec![play(&session.clips()[0])]);
    }

    #[test]
    fn restart_without_progress_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 2);

        let t = session.handle(Action::Restart).unwrap();

        assert!(t.commands.is_empty());
        assert_eq!(session.state(), SessionState::Menu);
    }

    #[test]
    fn resume_continues_at_first_unrated_clip() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = controller(&dir, 3);
            session.handle(Action::StartOrContinue).unwrap();
            session.handle(Action::Rate(score(2))).unwrap();
        }

        let mut session = controller(&dir, 3);
        assert_eq!(session.state(), SessionState::Menu);
        let t = session.handle(Action::StartOrContinue).unwrap();

        assert_eq!(t.commands, vec![play(&session.clips()[1])]);
    }

    #[test]
    fn fully_rated_ledger_continues_to_completion() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = controller(&dir, 1);
            session.handle(Action::StartOrContinue).unwrap();
            session.handle(Action::Rate(score(2))).unwrap();
        }

        let mut session = controller(&dir, 1);
        assert_eq!(session.state(), SessionState::Menu);
        let t = session.handle(Action::StartOrContinue).unwrap();

        assert!(t.commands.is_empty());
        assert_eq!(session.state(), SessionState::Completion);
    }

    #[test]
    fn mismatched_ledger_is_cut_to_matching_prefix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mos_scores.json");
        let mut ledger = ScoreLedger::open(&path);
        ledger
            .append(ScoreRecord::new(clips(3)[0].clone(), score(4)))
            .unwrap();
        ledger
            .append(ScoreRecord::new(ClipId::new("audios/removed.wav"), score(1)))
            .unwrap();

        let session = controller(&dir, 3);

        assert_eq!(session.position(), 1);
        assert_eq!(ScoreLedger::load(&path).len(), 1);
    }

    #[test]
    fn actions_outside_their_state_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 2);

        for action in [
            Action::Rate(score(3)),
            Action::Play,
            Action::Stop,
            Action::ContinueRating,
            Action::ReturnToPrevious,
            Action::Exit,
        ] {
            let t = session.handle(action).unwrap();
            assert_eq!(t, Transition::default());
            assert_eq!(session.state(), SessionState::Menu);
        }
    }

    #[test]
    fn play_stop_and_repeat_keep_testing() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 2);
        session.handle(Action::StartOrContinue).unwrap();
        let first = session.clips()[0].clone();

        assert_eq!(
            session.handle(Action::Stop).unwrap().commands,
            vec![PlayerCommand::Stop]
        );
        assert_eq!(
            session.handle(Action::Repeat).unwrap().commands,
            vec![play(&first)]
        );
        assert_eq!(
            session.handle(Action::Play).unwrap().commands,
            vec![play(&first)]
        );
        assert_eq!(session.state(), SessionState::Testing);
    }

    #[test]
    fn failed_persistence_keeps_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("occupied");
        std::fs::create_dir_all(path.join("child")).unwrap();
        let mut session = SessionController::new(
            clips(2),
            Vec::new(),
            MessagePool::default(),
            ScoreLedger::open(&path),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        session.handle(Action::StartOrContinue).unwrap();

        assert!(session.handle(Action::Rate(score(3))).is_err());
        assert_eq!(session.state(), SessionState::Testing);
        assert_eq!(session.position(), 0);
    }

    struct CountingRng {
        inner: StdRng,
        draws: Rc<Cell<usize>>,
    }

    impl CountingRng {
        fn tick(&self) {
            self.draws.set(self.draws.get() + 1);
        }
    }

    impl RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.tick();
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.tick();
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            self.tick();
            self.inner.fill_bytes(dst)
        }
    }

    #[test]
    fn each_entry_draws_a_new_selection() {
        let dir = TempDir::new().unwrap();
        let draws = Rc::new(Cell::new(0));
        let rng = CountingRng {
            inner: StdRng::seed_from_u64(11),
            draws: Rc::clone(&draws),
        };
        let mut session = SessionController::new(
            clips(3),
            vec![ImageRef::new("a.png"), ImageRef::new("b.png")],
            MessagePool::default(),
            ScoreLedger::open(dir.path().join("mos_scores.json")),
            rng,
        )
        .unwrap();
        session.handle(Action::StartOrContinue).unwrap();
        assert_eq!(draws.get(), 0);

        session.handle(Action::Rate(score(3))).unwrap();
        let after_first = draws.get();
        assert!(after_first > 0);
        assert!(session.encouragement().is_some());

        session.handle(Action::ContinueRating).unwrap();
        session.handle(Action::Play).unwrap();
        assert_eq!(draws.get(), after_first);
        assert!(session.encouragement().is_none());

        session.handle(Action::Rate(score(2))).unwrap();
        assert!(draws.get() > after_first);
        assert_eq!(session.state(), SessionState::Encouragement);
        assert!(session.encouragement().is_some());
    }

    #[test]
    fn failed_undo_keeps_state_and_selection() {
        let dir = TempDir::new().unwrap();
        let mut session = controller(&dir, 3);
        session.handle(Action::StartOrContinue).unwrap();
        session.handle(Action::Rate(score(4))).unwrap();
        let shown = session.encouragement().cloned();

        // a non-empty directory in place of the ledger makes the rewrite fail
        let path = session.ledger().path().to_path_buf();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir_all(path.join("child")).unwrap();

        assert!(session.handle(Action::ReturnToPrevious).is_err());
        assert_eq!(session.state(), SessionState::Encouragement);
        assert_eq!(session.position(), 1);
        assert_eq!(session.encouragement().cloned(), shown);
    }
}
