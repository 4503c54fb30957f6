use crate::calculator::Input;
use std::f64::consts::TAU;

/// Rate of every synthesized buffer, in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Fraction of the buffer spent fading in.
const ATTACK_FRACTION: f64 = 0.01;
/// Fraction of the buffer spent fading out.
const RELEASE_FRACTION: f64 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub amplitude: f32,
}

/// Feedback sounds, one per kind of keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Digit,
    Operator,
    /// Clear and backspace.
    Minor,
    Equals,
    Error,
}

impl Tone {
    pub fn spec(self) -> ToneSpec {
        let (frequency_hz, duration_ms, amplitude) = match self {
            Tone::Digit => (880.0, 35, 0.25),
            Tone::Operator => (660.0, 55, 0.30),
            Tone::Minor => (440.0, 40, 0.20),
            Tone::Equals => (1046.5, 90, 0.30),
            Tone::Error => (220.0, 220, 0.35),
        };
        ToneSpec {
            frequency_hz,
            duration_ms,
            amplitude,
        }
    }

    pub fn for_input(input: &Input) -> Self {
        match input {
            Input::Digit(_) | Input::Dot => Tone::Digit,
            Input::Operator(_) => Tone::Operator,
            Input::Equals => Tone::Equals,
            Input::Clear | Input::Backspace => Tone::Minor,
        }
    }
}

/// Renders a mono 16-bit sine burst at [`SAMPLE_RATE`].
///
/// The burst fades in over the first 1% of samples and out over the last 8%
/// so it starts and ends at zero.
pub fn synthesize(frequency_hz: f32, duration_ms: u32, amplitude: f32) -> Vec<i16> {
    let len = sample_count(duration_ms);
    let amplitude = f64::from(amplitude.clamp(0.0, 1.0));
    let step = TAU * f64::from(frequency_hz) / f64::from(SAMPLE_RATE);
    let attack = ((len as f64 * ATTACK_FRACTION) as usize).max(1);
    let release = ((len as f64 * RELEASE_FRACTION) as usize).max(1);

    (0..len)
        .map(|i| {
            let gain = envelope(i, len, attack, release);
            let value = (step * i as f64).sin() * amplitude * gain;
            (value * f64::from(i16::MAX)).round() as i16
        })
        .collect()
}

/// `round(duration_ms / 1000 * SAMPLE_RATE)`, half up.
pub fn sample_count(duration_ms: u32) -> usize {
    ((u64::from(duration_ms) * u64::from(SAMPLE_RATE) + 500) / 1000) as usize
}

fn envelope(i: usize, len: usize, attack: usize, release: usize) -> f64 {
    let rise = i as f64 / attack as f64;
    let fall = (len - 1 - i) as f64 / release as f64;
    rise.min(fall).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{DigitKey, Operator};

    fn render(tone: Tone) -> Vec<i16> {
        let spec = tone.spec();
        synthesize(spec.frequency_hz, spec.duration_ms, spec.amplitude)
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(0), 0);
        assert_eq!(sample_count(10), 441);
        assert_eq!(sample_count(100), 4410);
        assert_eq!(sample_count(1000), 44_100);
        // 35 ms is 1543.5 samples
        assert_eq!(sample_count(35), 1544);
    }

    #[test]
    fn test_synthesize_length_and_edges() {
        let samples = synthesize(440.0, 100, 0.5);
        assert_eq!(samples.len(), 4410);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[samples.len() - 1], 0);
    }

    #[test]
    fn test_zero_duration_is_empty() {
        assert!(synthesize(440.0, 0, 1.0).is_empty());
    }

    #[test]
    fn test_silent_amplitude() {
        assert!(synthesize(440.0, 50, 0.0).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_amplitude_is_clamped() {
        let loud = synthesize(1000.0, 100, 4.0);
        let full = synthesize(1000.0, 100, 1.0);
        assert_eq!(loud, full);
    }

    #[test]
    fn test_body_reaches_full_amplitude() {
        // 1 kHz at 44.1 kHz hits near-peak several times in the flat middle.
        let samples = synthesize(1000.0, 100, 0.5);
        let peak = samples.iter().map(|s| i32::from(*s).abs()).max().unwrap();
        let expected = (0.5 * f64::from(i16::MAX)) as i32;
        assert!(peak > expected * 99 / 100, "peak {peak}");
        assert!(peak <= expected + 1);
    }

    #[test]
    fn test_envelope_shape() {
        let len = 1000;
        let (attack, release) = (10, 80);
        assert_eq!(envelope(0, len, attack, release), 0.0);
        assert_eq!(envelope(5, len, attack, release), 0.5);
        assert_eq!(envelope(500, len, attack, release), 1.0);
        assert_eq!(envelope(959, len, attack, release), 0.5);
        assert_eq!(envelope(999, len, attack, release), 0.0);
    }

    #[test]
    fn test_tiny_buffer_still_fades() {
        // 1 ms: 44 samples, attack floored to one sample
        let samples = synthesize(440.0, 1, 1.0);
        assert_eq!(samples.len(), 44);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[43], 0);
    }

    #[test]
    fn test_presets_are_distinct() {
        let tones = [Tone::Digit, Tone::Operator, Tone::Minor, Tone::Equals, Tone::Error];
        for (i, a) in tones.iter().enumerate() {
            for b in &tones[i + 1..] {
                assert_ne!(a.spec().frequency_hz, b.spec().frequency_hz);
            }
            let spec = a.spec();
            assert!(spec.amplitude > 0.0 && spec.amplitude <= 1.0);
            assert_eq!(render(*a).len(), sample_count(spec.duration_ms));
        }
    }

    #[test]
    fn test_tone_for_input() {
        let seven = Input::Digit(DigitKey::new(7).unwrap());
        assert_eq!(Tone::for_input(&seven), Tone::Digit);
        assert_eq!(Tone::for_input(&Input::Dot), Tone::Digit);
        assert_eq!(Tone::for_input(&Input::Operator(Operator::Div)), Tone::Operator);
        assert_eq!(Tone::for_input(&Input::Equals), Tone::Equals);
        assert_eq!(Tone::for_input(&Input::Clear), Tone::Minor);
        assert_eq!(Tone::for_input(&Input::Backspace), Tone::Minor);
    }

    #[test]
    fn prop_samples_stay_within_amplitude() {
        fn property(freq: u16, duration: u8, level: u8) -> bool {
            let amplitude = f32::from(level) / 255.0;
            let limit = (f64::from(amplitude) * f64::from(i16::MAX)).round() as i32;
            synthesize(f32::from(freq), u32::from(duration), amplitude)
                .iter()
                .all(|s| i32::from(*s).abs() <= limit)
        }

        let mut qc = quickcheck::QuickCheck::new().tests(30);
        qc.quickcheck(property as fn(u16, u8, u8) -> bool);
    }
}
