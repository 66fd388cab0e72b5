//! Audio I/O
//!
//! Microphone capture, utterance segmentation and playback of synthesized audio.

pub mod capture;
pub mod engine;
pub mod segmenter;

pub use capture::{start_capture, Capture, SAMPLE_RATE};
pub use engine::SoundEngine;
pub use segmenter::{SegmenterConfig, UtteranceSegmenter};

use anyhow::Result;
use std::io::Cursor;

/// Calculate audio energy for VAD
pub fn calculate_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: i64 = samples.iter().map(|&s| (s as i64).pow(2)).sum();
    (sum as f32 / samples.len() as f32).sqrt()
}

/// Wrap mono 16-bit PCM into an in-memory WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0i16; 100];
        assert_eq!(calculate_energy(&silence), 0.0);

        let loud = vec![1000i16; 100];
        assert!(calculate_energy(&loud) > 0.0);
        assert_eq!(calculate_energy(&[]), 0.0);
    }

    #[test]
    fn test_encode_wav_header() {
        let wav = encode_wav(&[0, 1, -1, i16::MAX], SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 8);

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 4);
    }
}
