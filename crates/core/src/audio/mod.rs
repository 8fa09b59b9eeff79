use crate::{ClipId, Result};

/// Instruction for the audio backend emitted by a session transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Load the clip and start it from the beginning, replacing whatever was
    /// playing.
    Play(ClipId),
    Stop,
}

/// Single-clip audio backend. Calls must return promptly; playback progress is
/// never reported back to the session.
pub trait AudioPlayer {
    fn play(&mut self, clip: &ClipId) -> Result<()>;
    fn stop(&mut self) -> Result<()>;

    /// Runs one command against this player.
    fn execute(&mut self, command: &PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play(clip) => self.play(clip),
            PlayerCommand::Stop => self.stop(),
        }
    }
}

/// Runs every command in order. A failing command is logged and skipped so a
/// broken clip never ends the session.
pub fn apply_commands<P: AudioPlayer + ?Sized>(player: &mut P, commands: &[PlayerCommand]) {
    for command in commands {
        if let Err(err) = player.execute(command) {
            tracing::warn!(?command, %err, "audio command failed");
        }
    }
}

/// Player that only logs what it was asked to do. Used when no audio output is
/// compiled in.
#[derive(Debug, Default)]
pub struct SilentPlayer {
    current: Option<ClipId>,
}

impl SilentPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clip most recently started and not stopped since.
    pub fn current(&self) -> Option<&ClipId> {
        self.current.as_ref()
    }
}

impl AudioPlayer for SilentPlayer {
    fn play(&mut self, clip: &ClipId) -> Result<()> {
        tracing::info!(%clip, "play");
        self.current = Some(clip.clone());
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        tracing::info!("stop");
        self.current = None;
        Ok(())
    }
}
