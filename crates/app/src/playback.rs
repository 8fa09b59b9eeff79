use std::{fs::File, io::BufReader};

use mos_test_core::{AudioPlayer, ClipId, MosError, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

/// Plays clips on the default output device. Each `play` replaces the
/// previous sink, so at most one clip is audible.
pub struct RodioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl RodioPlayer {
    pub fn new() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|err| MosError::msg(format!("opening audio output: {err}")))?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&mut self, clip: &ClipId) -> Result<()> {
        self.stop()?;

        let file = File::open(clip.as_path())?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|err| MosError::msg(format!("decoding {clip}: {err}")))?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|err| MosError::msg(format!("creating sink: {err}")))?;
        sink.append(source);

        tracing::debug!(%clip, "playback started");
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        Ok(())
    }
}
