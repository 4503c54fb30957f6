//! Fire-and-forget tone playback through the default cpal output device.

use crate::error::AudioError;
use crate::tone::{synthesize, Tone, SAMPLE_RATE};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Extra time allowed for the device to pull the whole buffer.
const DRAIN_GRACE: Duration = Duration::from_millis(250);
/// Time the stream stays open after the last sample was handed over.
const TAIL: Duration = Duration::from_millis(40);

/// Plays keypress feedback tones when sound is enabled.
#[derive(Debug, Clone)]
pub struct SoundPlayer {
    enabled: bool,
    volume: f32,
}

impl SoundPlayer {
    pub fn new(enabled: bool, volume: f32) -> Self {
        Self {
            enabled,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Synthesizes `tone` scaled by the master volume.
    pub fn render(&self, tone: Tone) -> Vec<i16> {
        let spec = tone.spec();
        synthesize(spec.frequency_hz, spec.duration_ms, spec.amplitude * self.volume)
    }

    /// Starts playback on a detached thread and returns immediately.
    /// Errors, including a missing audio device, are logged and dropped.
    ///
    /// Returns whether a playback thread was started.
    pub fn play(&self, tone: Tone) -> bool {
        if !self.enabled {
            return false;
        }
        let samples = self.render(tone);
        let spawned = thread::Builder::new()
            .name("tone".to_string())
            .spawn(move || {
                if let Err(err) = play_samples(samples) {
                    debug!(error = %err, ?tone, "tone playback failed");
                }
            });
        match spawned {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "could not spawn tone thread");
                false
            }
        }
    }
}

/// Opens the default output, plays `samples` to the end and closes the
/// device again. The stream is dropped on every return path.
fn play_samples(samples: Vec<i16>) -> Result<(), AudioError> {
    if samples.is_empty() {
        return Ok(());
    }
    let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(SAMPLE_RATE));

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let config = device.default_output_config()?;
    let format = config.sample_format();
    let device_rate = config.sample_rate().0;
    let stream_config: cpal::StreamConfig = config.into();
    trace!(?format, device_rate, channels = stream_config.channels, "opening tone stream");

    let source = PcmSource::new(samples, device_rate);
    let (done_tx, done_rx) = mpsc::channel();
    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, source, done_tx)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, source, done_tx)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, source, done_tx)?,
        other => return Err(AudioError::UnsupportedFormat(other)),
    };
    stream.play()?;

    if done_rx.recv_timeout(duration + DRAIN_GRACE).is_err() {
        debug!("tone stream did not drain in time");
    }
    thread::sleep(TAIL);
    Ok(())
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut source: PcmSource,
    done: mpsc::Sender<()>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = usize::from(config.channels).max(1);
    let mut signalled = false;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = source.next_sample().unwrap_or(0.0);
                for sample in frame.iter_mut() {
                    *sample = T::from_sample(value);
                }
            }
            if source.is_exhausted() && !signalled {
                signalled = true;
                let _ = done.send(());
            }
        },
        |err| debug!(error = %err, "tone stream error"),
        None,
    )?;

    Ok(stream)
}

/// 44.1 kHz mono PCM read back at the device rate with linear interpolation.
#[derive(Debug)]
struct PcmSource {
    samples: Vec<i16>,
    position: f64,
    step: f64,
}

impl PcmSource {
    fn new(samples: Vec<i16>, device_rate: u32) -> Self {
        Self {
            samples,
            position: 0.0,
            step: f64::from(SAMPLE_RATE) / f64::from(device_rate.max(1)),
        }
    }

    fn next_sample(&mut self) -> Option<f32> {
        let index = self.position as usize;
        let current = *self.samples.get(index)?;
        let next = self.samples.get(index + 1).copied().unwrap_or(0);
        let frac = self.position - index as f64;
        self.position += self.step;

        let value = f64::from(current) + (f64::from(next) - f64::from(current)) * frac;
        Some((value / f64::from(i16::MAX)) as f32)
    }

    fn is_exhausted(&self) -> bool {
        self.position as usize >= self.samples.len()
    }
}
