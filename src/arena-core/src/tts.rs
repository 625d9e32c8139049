//! Speech side effect for finalized utterances.
//!
//! The scheduler only sees the [`SpeechSink`] trait: fire-and-forget
//! `speak`, unconditional `cancel`, and a best-effort "currently speaking"
//! probe it consults before kicking off a new cycle. The kokoro-backed
//! sink synthesizes each utterance to a WAV file in the output directory.

use kokoro_tiny::TtsEngine;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::VoicesConfig;
use crate::error::ArenaError;
use crate::persona::Side;

/// Matches the UI reading pace: utterances are assumed spoken at 2.5 wps.
const SPOKEN_WORDS_PER_SECOND: f64 = 2.5;
/// Kokoro has a strict limit on input length per synthesis call.
const CHUNK_CHARS: usize = 200;
const SAMPLE_RATE: u32 = 24_000;

pub trait SpeechSink: Send + Sync {
    /// Fire-and-forget: queue `text` for synthesis as `side`'s voice.
    fn speak(&self, text: &str, side: Side);
    /// Immediately and unconditionally stop any in-flight speech.
    fn cancel(&self);
    /// Best-effort probe; the scheduler defers cycle kickoff while true.
    fn is_speaking(&self) -> bool;
}

/// Sink that swallows everything. Used headless and in tests.
#[derive(Debug, Default)]
pub struct NullSpeech;

impl SpeechSink for NullSpeech {
    fn speak(&self, _text: &str, _side: Side) {}
    fn cancel(&self) {}
    fn is_speaking(&self) -> bool {
        false
    }
}

struct KokoroInner {
    engine: tokio::sync::Mutex<TtsEngine>,
    voices: VoicesConfig,
    out_dir: PathBuf,
    /// Utterances synthesized so far, used for output numbering.
    counter: AtomicU64,
    /// Bumped on cancel; queued synthesis from an older epoch is dropped.
    epoch: AtomicU64,
    speaking_until: Mutex<Option<Instant>>,
}

impl KokoroInner {
    fn speaking_until(&self) -> MutexGuard<'_, Option<Instant>> {
        self.speaking_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// TTS sink backed by kokoro-tiny.
pub struct KokoroSpeech {
    inner: Arc<KokoroInner>,
}

impl KokoroSpeech {
    /// Initialize the TTS engine (downloads the model on first run) and
    /// validate the configured voices against it.
    pub async fn new(voices: VoicesConfig, out_dir: PathBuf) -> Result<Self, ArenaError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| ArenaError::TtsError(format!("Failed to initialize TTS: {}", e)))?;

        let available = engine.voices();
        for voice in [&voices.side_a_voice, &voices.side_b_voice] {
            if !available.contains(&voice.to_string()) {
                return Err(ArenaError::TtsError(format!(
                    "Unknown voice '{}'. Available voices: {}",
                    voice,
                    available.join(", ")
                )));
            }
        }

        std::fs::create_dir_all(&out_dir)
            .map_err(|e| ArenaError::TtsError(format!("Failed to create output dir: {}", e)))?;

        Ok(Self {
            inner: Arc::new(KokoroInner {
                engine: tokio::sync::Mutex::new(engine),
                voices,
                out_dir,
                counter: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                speaking_until: Mutex::new(None),
            }),
        })
    }
}

impl SpeechSink for KokoroSpeech {
    fn speak(&self, text: &str, side: Side) {
        let spoken = strip_emojis(text);
        if spoken.trim().is_empty() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let epoch = inner.epoch.load(Ordering::SeqCst);
        let duration = estimated_spoken_duration(&spoken);
        *inner.speaking_until() = Some(Instant::now() + duration);

        tokio::spawn(async move {
            let voice = inner.voices.voice_for(side).to_string();
            let index = inner.counter.fetch_add(1, Ordering::SeqCst);
            let path = inner.out_dir.join(format!("utterance-{index:04}.wav"));

            let mut engine = inner.engine.lock().await;
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                return; // cancelled while queued
            }

            let mut samples: Vec<f32> = Vec::new();
            for chunk in split_into_chunks(&spoken, CHUNK_CHARS) {
                match engine.synthesize(&chunk, Some(&voice)) {
                    Ok(chunk_samples) => {
                        samples.extend(chunk_samples);
                        // Short pause between chunks to prevent cutoff.
                        samples.extend(std::iter::repeat_n(0.0, 7_200));
                    }
                    Err(e) => {
                        warn!("synthesis failed: {e}");
                        return;
                    }
                }
            }

            if let Err(e) = write_wav(&path, &samples) {
                warn!("failed to write {}: {e}", path.display());
            }
        });
    }

    fn cancel(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        *self.inner.speaking_until() = None;
    }

    fn is_speaking(&self) -> bool {
        self.inner
            .speaking_until()
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }
}

fn write_wav(path: &std::path::Path, samples: &[f32]) -> Result<(), ArenaError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| ArenaError::TtsError(format!("Failed to create WAV: {}", e)))?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer
            .write_sample(value)
            .map_err(|e| ArenaError::TtsError(format!("Failed to write WAV: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| ArenaError::TtsError(format!("Failed to finalize WAV: {}", e)))
}

/// How long the utterance takes to speak at the assumed reading pace.
fn estimated_spoken_duration(text: &str) -> Duration {
    let words = text.split_whitespace().count() as f64;
    Duration::from_millis(((words / SPOKEN_WORDS_PER_SECOND) * 1000.0) as u64)
}

/// Remove emoji so they are not read out as "fire emoji" or "clown face".
fn strip_emojis(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F700..=0x1FAFF
            | 0x2600..=0x27BF
    )
}

/// Split text into synthesis-safe chunks at sentence boundaries.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + sentence.len() > max_chars {
            chunks.push(current.trim().to_string());
            current = String::new();
        }
        current.push_str(sentence);
        current.push(' ');
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_emojis() {
        assert_eq!(strip_emojis("Dogs win. 🐶"), "Dogs win. ");
        assert_eq!(strip_emojis("🤬 furious 🔥 day"), " furious  day");
        assert_eq!(strip_emojis("no emoji here"), "no emoji here");
    }

    #[test]
    fn test_estimated_duration_scales_with_words() {
        assert_eq!(
            estimated_spoken_duration("one two three four five"),
            Duration::from_millis(2000)
        );
        assert_eq!(estimated_spoken_duration(""), Duration::ZERO);
    }

    #[test]
    fn test_split_into_chunks_respects_limit() {
        let text = "First sentence here. Second sentence follows! Third one? Yes.";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 50, "oversized chunk: {chunk}");
        }
    }

    #[test]
    fn test_null_speech_is_silent() {
        let sink = NullSpeech;
        sink.speak("anything", Side::A);
        assert!(!sink.is_speaking());
        sink.cancel();
    }
}
