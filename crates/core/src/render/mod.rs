use std::io::Write;

use crate::{
    session::{SessionSnapshot, SessionState},
    ImageRef, Result, Score,
};

const TITLE: &str = "MOS Audio Test";
const FALLBACK_DECORATION: &str = "(( o ))";

/// Presentation backend. Renderers only read the snapshot; they never feed
/// anything back into the session.
pub trait Renderer {
    fn render(&mut self, snapshot: &SessionSnapshot<'_>) -> Result<()>;
}

/// A selectable entry on screen: the text the user types and its caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub key: String,
    pub caption: String,
}

impl Choice {
    fn new(key: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caption: caption.into(),
        }
    }
}

/// Screen contents derived from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<String>,
    pub choices: Vec<Choice>,
}

impl Frame {
    /// Lays out the screen for the snapshot's state. Only actions the state
    /// accepts are offered.
    pub fn compose(snapshot: &SessionSnapshot<'_>) -> Self {
        let mut frame = Self::default();
        match snapshot.state {
            SessionState::Menu => frame.menu(snapshot),
            SessionState::Testing => frame.testing(snapshot),
            SessionState::Encouragement => frame.encouragement(snapshot),
            SessionState::Completion => frame.completion(snapshot),
        }
        frame
    }

    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn menu(&mut self, snapshot: &SessionSnapshot<'_>) {
        self.line(TITLE);
        if snapshot.has_progress {
            self.line(format!(
                "Progress: {}/{} audio files rated",
                snapshot.position, snapshot.total
            ));
            self.choices.push(Choice::new("continue", "Continue Test"));
            self.choices.push(Choice::new("restart", "Restart Test"));
        } else {
            self.line(format!("Total audio files: {}", snapshot.total));
            self.choices.push(Choice::new("start", "Start Test"));
        }
    }

    fn testing(&mut self, snapshot: &SessionSnapshot<'_>) {
        self.line(format!(
            "Audio {} of {}",
            snapshot.position + 1,
            snapshot.total
        ));
        if let Some(clip) = snapshot.current_clip {
            self.line(clip.file_name());
        }
        self.line("Rate the Audio Quality");

        for score in Score::all() {
            self.choices
                .push(Choice::new(score.to_string(), score.label()));
        }
        self.choices.push(Choice::new("play", "Play"));
        self.choices.push(Choice::new("repeat", "Repeat"));
        self.choices.push(Choice::new("stop", "Stop"));
        if snapshot.position > 0 {
            self.choices.push(Choice::new("return", "Return"));
        }
    }

    fn encouragement(&mut self, snapshot: &SessionSnapshot<'_>) {
        let selection = snapshot.encouragement;
        let image = selection.and_then(|s| s.image.as_ref());
        self.line(image_line(image));

        if let Some(selection) = selection {
            self.line(selection.message.clone());
        }
        let plural = if snapshot.position == 1 { "" } else { "s" };
        self.line(format!("{} audio file{plural} rated!", snapshot.position));

        self.choices.push(Choice::new("next", "Continue"));
        self.choices.push(Choice::new("return", "Return"));
    }

    fn completion(&mut self, snapshot: &SessionSnapshot<'_>) {
        self.line("Test Completed!");
        self.line(format!("You rated {} audio files", snapshot.position));
        self.choices.push(Choice::new("exit", "Exit"));
    }
}

/// Describes the encouragement image, or the fallback decoration when there
/// is none or it cannot be read.
fn image_line(image: Option<&ImageRef>) -> String {
    let Some(image) = image else {
        return FALLBACK_DECORATION.to_string();
    };

    match std::fs::metadata(image.path()) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            format!("[image: {}]", image.path().display())
        }
        Ok(_) => {
            tracing::warn!(image = %image.path().display(), "encouragement image is empty");
            FALLBACK_DECORATION.to_string()
        }
        Err(err) => {
            tracing::warn!(image = %image.path().display(), %err, "encouragement image unreadable");
            FALLBACK_DECORATION.to_string()
        }
    }
}

/// Draws frames as plain text on any writer.
#[derive(Debug)]
pub struct TextRenderer<W> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, snapshot: &SessionSnapshot<'_>) -> Result<()> {
        let frame = Frame::compose(snapshot);

        writeln!(self.out)?;
        for line in &frame.lines {
            writeln!(self.out, "  {line}")?;
        }
        let options: Vec<String> = frame
            .choices
            .iter()
            .map(|choice| format!("[{}] {}", choice.key, choice.caption))
            .collect();
        writeln!(self.out, "  {}", options.join("  "))?;
        write!(self.out, "> ")?;
        self.out.flush()?;
        Ok(())
    }
}
