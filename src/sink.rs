//! Destinations for rendered audio
//!
//! - [`MemorySink`] keeps everything in memory
//! - [`WavSink`] writes integer PCM through `hound` (feature `wav`)
//! - [`PlaybackSink`] plays the stream on the default output device through `cpal` (feature `cpal`)

use crate::{Error, Result, SampleSink, StreamFormat};

/// Collects the rendered stream in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    format: Option<StreamFormat>,
    samples: Vec<i32>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format announced by the renderer, once it has begun
    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    /// Frames per channel received so far
    pub fn frames(&self) -> usize {
        match self.format {
            Some(format) if format.channels > 0 => self.samples.len() / usize::from(format.channels),
            _ => 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }
}

impl SampleSink for MemorySink {
    fn begin(&mut self, format: StreamFormat) -> Result<()> {
        self.format = Some(format);
        self.samples.clear();
        self.finished = false;
        Ok(())
    }

    fn write(&mut self, samples: &[i32]) -> Result<()> {
        if self.format.is_none() {
            return Err(Error::Sink("write before begin".into()));
        }
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(feature = "wav")]
pub use wav::WavSink;

#[cfg(feature = "wav")]
mod wav {
    use std::fs::File;
    use std::io::BufWriter;
    use std::path::{Path, PathBuf};

    use hound::{SampleFormat, WavSpec, WavWriter};

    use crate::{Error, Result, SampleSink, StreamFormat};

    /// Writes a WAV file; the file is created when rendering begins
    pub struct WavSink {
        path: PathBuf,
        writer: Option<WavWriter<BufWriter<File>>>,
    }

    impl WavSink {
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
                writer: None,
            }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl SampleSink for WavSink {
        fn begin(&mut self, format: StreamFormat) -> Result<()> {
            let spec = WavSpec {
                channels: format.channels,
                sample_rate: format.sample_rate,
                bits_per_sample: format.bits_per_sample,
                sample_format: SampleFormat::Int,
            };
            self.writer = Some(WavWriter::create(&self.path, spec)?);
            tracing::debug!(path = %self.path.display(), ?format, "writing WAV");
            Ok(())
        }

        fn write(&mut self, samples: &[i32]) -> Result<()> {
            let writer = self
                .writer
                .as_mut()
                .ok_or_else(|| Error::Sink("write before begin".into()))?;
            for &sample in samples {
                writer.write_sample(sample)?;
            }
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            if let Some(writer) = self.writer.take() {
                writer.finalize()?;
                tracing::info!(path = %self.path.display(), "WAV written");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "cpal")]
pub use playback::PlaybackSink;

#[cfg(feature = "cpal")]
mod playback {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use crate::{Error, Result, SampleSink, StreamFormat};

    /// Plays the rendered stream on the default output device once rendering finishes
    ///
    /// `finish` blocks until playback has drained. The device must accept
    /// the render's sample rate and channel count.
    #[derive(Default)]
    pub struct PlaybackSink {
        format: Option<StreamFormat>,
        samples: Vec<f32>,
    }

    impl PlaybackSink {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl SampleSink for PlaybackSink {
        fn begin(&mut self, format: StreamFormat) -> Result<()> {
            self.format = Some(format);
            self.samples.clear();
            Ok(())
        }

        fn write(&mut self, samples: &[i32]) -> Result<()> {
            let format = self
                .format
                .ok_or_else(|| Error::Sink("write before begin".into()))?;
            let scale = ((1i64 << (format.bits_per_sample - 1)) - 1) as f32;
            self.samples.extend(samples.iter().map(|&s| s as f32 / scale));
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            let Some(format) = self.format.take() else {
                return Ok(());
            };
            let samples = Arc::new(std::mem::take(&mut self.samples));
            if samples.is_empty() {
                return Ok(());
            }

            let device = cpal::default_host()
                .default_output_device()
                .ok_or_else(|| Error::Sink("no output device available".into()))?;
            let config = cpal::StreamConfig {
                channels: format.channels,
                sample_rate: cpal::SampleRate(format.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
            let position = Arc::new(AtomicUsize::new(0));
            let source = Arc::clone(&samples);
            let cursor = Arc::clone(&position);

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let start = cursor.load(Ordering::Relaxed);
                        let available = source.len().saturating_sub(start).min(data.len());
                        data[..available].copy_from_slice(&source[start..start + available]);
                        data[available..].fill(0.0);
                        cursor.store(start + available, Ordering::Relaxed);
                        if start + available >= source.len() {
                            let _ = done_tx.try_send(());
                        }
                    },
                    |err| tracing::warn!(error = %err, "output stream error"),
                    None,
                )
                .map_err(|e| Error::Sink(format!("failed to open output stream: {}", e)))?;
            stream
                .play()
                .map_err(|e| Error::Sink(format!("failed to start playback: {}", e)))?;

            let frames = samples.len() / usize::from(format.channels.max(1));
            let length = Duration::from_secs_f64(frames as f64 / f64::from(format.sample_rate));
            tracing::info!(seconds = length.as_secs_f64(), "playing rendered audio");
            if done_rx.recv_timeout(length + Duration::from_secs(2)).is_err() {
                tracing::warn!(
                    played = position.load(Ordering::Relaxed),
                    total = samples.len(),
                    "playback did not drain in time"
                );
            }
            Ok(())
        }
    }
}
