//! Energy-based utterance segmentation
//!
//! Turns a continuous stream of capture chunks into discrete utterances that
//! can be posted to a short-audio recognizer.

use super::calculate_energy;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Segmenter tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// RMS energy above which a chunk counts as speech
    pub energy_threshold: f32,
    /// Trailing silence that ends an utterance
    pub silence_ms: u32,
    /// Utterances shorter than this are dropped as noise
    pub min_utterance_ms: u32,
    /// Hard cap on utterance length
    pub max_utterance_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 500.0,
            silence_ms: 800,
            min_utterance_ms: 300,
            max_utterance_ms: 15_000,
        }
    }
}

#[derive(Debug)]
pub struct UtteranceSegmenter {
    config: SegmenterConfig,
    sample_rate: u32,
    buffer: Vec<i16>,
    in_speech: bool,
    silent_samples: usize,
}

impl UtteranceSegmenter {
    pub fn new(config: SegmenterConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            buffer: Vec::new(),
            in_speech: false,
            silent_samples: 0,
        }
    }

    fn samples_for(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }

    pub fn is_in_speech(&self) -> bool {
        self.in_speech
    }

    /// Feed one chunk; returns a finished utterance when one ends
    pub fn push(&mut self, chunk: &[i16]) -> Option<Vec<i16>> {
        let energy = calculate_energy(chunk);

        if energy >= self.config.energy_threshold {
            if !self.in_speech {
                debug!("🗣️ Speech start (energy {:.0})", energy);
                self.in_speech = true;
            }
            self.silent_samples = 0;
            self.buffer.extend_from_slice(chunk);
        } else if self.in_speech {
            self.buffer.extend_from_slice(chunk);
            self.silent_samples += chunk.len();
            if self.silent_samples >= self.samples_for(self.config.silence_ms) {
                return self.finish();
            }
        }

        if self.in_speech && self.buffer.len() >= self.samples_for(self.config.max_utterance_ms) {
            debug!("Utterance reached max length, cutting");
            return self.finish();
        }

        None
    }

    /// End any utterance in progress
    pub fn flush(&mut self) -> Option<Vec<i16>> {
        if self.in_speech {
            self.finish()
        } else {
            None
        }
    }

    fn finish(&mut self) -> Option<Vec<i16>> {
        self.in_speech = false;
        self.silent_samples = 0;
        let utterance = std::mem::take(&mut self.buffer);
        if utterance.len() < self.samples_for(self.config.min_utterance_ms) {
            debug!("Dropping {} sample blip", utterance.len());
            return None;
        }
        debug!("🗣️ Utterance complete ({} samples)", utterance.len());
        Some(utterance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;
    // 100 ms chunks
    const CHUNK: usize = 1600;

    fn loud() -> Vec<i16> {
        vec![2000i16; CHUNK]
    }

    fn quiet() -> Vec<i16> {
        vec![0i16; CHUNK]
    }

    #[test]
    fn test_silence_produces_nothing() {
        let mut seg = UtteranceSegmenter::new(SegmenterConfig::default(), RATE);
        for _ in 0..50 {
            assert!(seg.push(&quiet()).is_none());
        }
        assert!(!seg.is_in_speech());
        assert!(seg.flush().is_none());
    }

    #[test]
    fn test_utterance_ends_after_trailing_silence() {
        let mut seg = UtteranceSegmenter::new(SegmenterConfig::default(), RATE);
        for _ in 0..5 {
            assert!(seg.push(&loud()).is_none());
        }
        // 800 ms of silence = 8 chunks; the 8th closes the utterance
        for _ in 0..7 {
            assert!(seg.push(&quiet()).is_none());
        }
        let utterance = seg.push(&quiet()).expect("utterance should end");
        assert_eq!(utterance.len(), 13 * CHUNK);
        assert!(!seg.is_in_speech());
    }

    #[test]
    fn test_short_blips_are_dropped() {
        let config = SegmenterConfig {
            min_utterance_ms: 2000,
            ..SegmenterConfig::default()
        };
        let mut seg = UtteranceSegmenter::new(config, RATE);
        seg.push(&loud());
        let mut result = None;
        for _ in 0..8 {
            result = result.or(seg.push(&quiet()));
        }
        assert!(result.is_none());
        assert!(!seg.is_in_speech());
    }

    #[test]
    fn test_max_length_cuts() {
        let config = SegmenterConfig {
            max_utterance_ms: 500,
            ..SegmenterConfig::default()
        };
        let mut seg = UtteranceSegmenter::new(config, RATE);
        for _ in 0..4 {
            assert!(seg.push(&loud()).is_none());
        }
        assert_eq!(seg.push(&loud()).map(|u| u.len()), Some(5 * CHUNK));
    }

    #[test]
    fn test_flush_returns_pending_speech() {
        let mut seg = UtteranceSegmenter::new(SegmenterConfig::default(), RATE);
        for _ in 0..4 {
            seg.push(&loud());
        }
        assert_eq!(seg.flush().map(|u| u.len()), Some(4 * CHUNK));
    }
}
