use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use mos_test_core::{
    apply_commands, Action, AppConfig, AssetCatalog, AudioPlayer, MessagePool, Renderer,
    SessionController, ScoreLedger, SilentPlayer, TextRenderer,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "rodio")]
mod playback;

fn main() -> mos_test_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.paths.resolve()?;

    match cli.command {
        Commands::Run { seed } => run_session(&config, seed),
        Commands::Status => show_status(&config),
        Commands::Reset => reset_ledger(&config),
    }
}

fn run_session(config: &AppConfig, seed: Option<u64>) -> mos_test_core::Result<()> {
    let catalog = AssetCatalog::load(&config.assets)?;
    let ledger = ScoreLedger::open(&config.ledger.path);
    let messages = MessagePool::new(config.encouragement.messages.clone())?;
    let rng = match seed.or(config.encouragement.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    tracing::info!(
        audio_dir = %config.assets.audio_dir.display(),
        ledger = %config.ledger.path.display(),
        "starting listening test"
    );

    let mut session = SessionController::new(
        catalog.list_clips().to_vec(),
        catalog.list_images().to_vec(),
        messages,
        ledger,
        rng,
    )?;
    let mut player = open_player();
    let mut renderer = TextRenderer::new(io::stdout());

    drive(&mut session, io::stdin().lock(), &mut renderer, player.as_mut())?;
    player.stop()
}

/// Feeds input lines to the session until it terminates or input runs out.
///
/// A failed ledger write is reported and the session carries on in its prior
/// state, so the listener can retry the same rating.
fn drive<R, I, D, P>(
    session: &mut SessionController<R>,
    input: I,
    renderer: &mut D,
    player: &mut P,
) -> mos_test_core::Result<()>
where
    R: Rng,
    I: BufRead,
    D: Renderer,
    P: AudioPlayer + ?Sized,
{
    let mut lines = input.lines();
    loop {
        renderer.render(&session.snapshot())?;

        let Some(line) = lines.next() else {
            tracing::info!("input closed");
            return Ok(());
        };
        let line = line?;
        let Some(action) = Action::parse(&line) else {
            tracing::debug!(input = %line.trim(), "unrecognised input");
            continue;
        };

        match session.handle(action) {
            Ok(transition) => {
                apply_commands(player, &transition.commands);
                if transition.terminate {
                    return Ok(());
                }
            }
            Err(err) => {
                tracing::error!(%err, ?action, "could not save ratings");
            }
        }
    }
}

fn show_status(config: &AppConfig) -> mos_test_core::Result<()> {
    let catalog = AssetCatalog::load(&config.assets)?;
    let records = ScoreLedger::load(&config.ledger.path);

    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{}/{} audio files rated",
        records.len(),
        catalog.list_clips().len()
    )?;
    for record in &records {
        writeln!(
            out,
            "{}\t{} ({})",
            record.clip,
            record.score,
            record.score.label()
        )?;
    }
    Ok(())
}

fn reset_ledger(config: &AppConfig) -> mos_test_core::Result<()> {
    let mut ledger = ScoreLedger::open(&config.ledger.path);
    let dropped = ledger.len();
    ledger.reset()?;
    tracing::info!(dropped, path = %config.ledger.path.display(), "ledger reset");
    Ok(())
}

fn open_player() -> Box<dyn AudioPlayer> {
    #[cfg(feature = "rodio")]
    {
        match playback::RodioPlayer::new() {
            Ok(player) => return Box::new(player),
            Err(err) => tracing::warn!(%err, "no audio output available; continuing silently"),
        }
    }

    Box::new(SilentPlayer::new())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Mean Opinion Score listening test", long_about = None)]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct PathArgs {
    /// JSON config file; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the clips to rate.
    #[arg(long, global = true)]
    audio_dir: Option<PathBuf>,
    /// Directory holding encouragement images.
    #[arg(long, global = true)]
    image_dir: Option<PathBuf>,
    /// Where ratings are stored.
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
}

impl PathArgs {
    fn resolve(&self) -> mos_test_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(dir) = &self.audio_dir {
            config.assets.audio_dir = dir.clone();
        }
        if let Some(dir) = &self.image_dir {
            config.assets.image_dir = dir.clone();
        }
        if let Some(path) = &self.ledger {
            config.ledger.path = path.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the interactive listening test.
    Run {
        /// Seed for encouragement selection, for reproducible sessions.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print how many clips have been rated and the stored scores.
    Status,
    /// Delete all stored ratings.
    Reset,
}
