//! Core library for the MOS listening test.
//!
//! A session walks one listener through a fixed list of clips, collecting a
//! 1-5 rating for each. The [`session`] module holds the state machine; the
//! ratings live in a [`ScoreLedger`] on disk so an interrupted session can be
//! resumed. Audio output and presentation sit behind the [`AudioPlayer`] and
//! [`Renderer`] traits.

pub mod assets;
pub mod audio;
pub mod config;
pub mod encouragement;
pub mod error;
pub mod ledger;
pub mod render;
pub mod session;

pub use assets::{AssetCatalog, ClipId, ImageRef};
pub use audio::{apply_commands, AudioPlayer, PlayerCommand, SilentPlayer};
pub use config::{AppConfig, AssetConfig, EncouragementConfig, LedgerConfig};
pub use encouragement::{pick, EncouragementSelection, MessagePool};
pub use error::{MosError, Result};
pub use ledger::{Score, ScoreLedger, ScoreRecord};
pub use render::{Choice, Frame, Renderer, TextRenderer};
pub use session::{Action, SessionController, SessionSnapshot, SessionState, Transition};
