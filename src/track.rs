//! Track — a decoded audio file held entirely in memory.

use std::io::Cursor;

use tracing::debug;

use crate::error::{DecodeError, PlayerError};

/// Decoded PCM audio, one `Vec<f32>` per channel, normalized to [-1, 1].
///
/// Immutable once built; the session shares it with render jobs by `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl Track {
    /// Build a track from planar channel data.
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidLayout {
                reason: "sample rate is zero".into(),
            });
        }
        let Some(first) = channels.first() else {
            return Err(DecodeError::InvalidLayout {
                reason: "no channels".into(),
            });
        };
        let frames = first.len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(DecodeError::InvalidLayout {
                reason: "channels differ in length".into(),
            });
        }
        if frames == 0 {
            return Err(DecodeError::Empty);
        }
        Ok(Track {
            sample_rate,
            channels,
        })
    }

    /// Build a track from interleaved samples.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: usize,
        samples: &[f32],
    ) -> Result<Self, DecodeError> {
        if channel_count == 0 {
            return Err(DecodeError::InvalidLayout {
                reason: "no channels".into(),
            });
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &s) in channels.iter_mut().zip(frame) {
                channel.push(s);
            }
        }
        Track::from_channels(sample_rate, channels)
    }

    /// Decode file bytes. `mime` must be an `audio/*` type.
    pub fn decode(bytes: &[u8], mime: &str) -> Result<Self, PlayerError> {
        if !is_audio_mime(mime) {
            return Err(PlayerError::InputRejected {
                mime: mime.to_string(),
            });
        }
        if bytes.is_empty() {
            return Err(DecodeError::Empty.into());
        }

        let track = match sniff_format(bytes, mime) {
            Some(Container::Wav) => decode_wav(bytes)?,
            Some(Container::Mp3) => decode_mp3(bytes)?,
            None => {
                return Err(DecodeError::UnsupportedFormat {
                    mime: mime.to_string(),
                }
                .into());
            }
        };
        debug!(
            sample_rate = track.sample_rate,
            channels = track.channel_count(),
            frames = track.frames(),
            "decoded track"
        );
        Ok(track)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample frames per channel.
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Nominal duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Left/right views; mono is duplicated, extra channels are ignored.
    pub fn stereo(&self) -> (&[f32], &[f32]) {
        let left = &self.channels[0];
        let right = self.channels.get(1).unwrap_or(left);
        (left, right)
    }
}

/// MIME check applied to every picked or dropped file.
pub fn is_audio_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("audio/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Wav,
    Mp3,
}

fn sniff_format(bytes: &[u8], mime: &str) -> Option<Container> {
    if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WAVE") {
        return Some(Container::Wav);
    }
    if bytes.starts_with(b"ID3") || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
    {
        return Some(Container::Mp3);
    }
    let subtype = mime.trim().to_ascii_lowercase();
    match subtype.as_str() {
        "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some(Container::Wav),
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Some(Container::Mp3),
        _ => None,
    }
}

fn decode_wav(bytes: &[u8]) -> Result<Track, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Track::from_interleaved(spec.sample_rate, spec.channels as usize, &samples)
}

#[cfg(feature = "codecs")]
fn decode_mp3(bytes: &[u8]) -> Result<Track, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples: Vec<f32> = Vec::new();
    let mut layout: Option<(u32, usize)> = None;

    loop {
        match decoder.next_frame() {
            Ok(minimp3::Frame {
                data,
                sample_rate,
                channels,
                ..
            }) => {
                let frame_layout = (sample_rate as u32, channels);
                match layout {
                    None => layout = Some(frame_layout),
                    // Variable layouts only happen in broken streams; skip those frames.
                    Some(l) if l != frame_layout => continue,
                    Some(_) => {}
                }
                samples.extend(data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(DecodeError::Mp3(format!("{e:?}"))),
        }
    }

    let (sample_rate, channels) = layout.ok_or(DecodeError::Empty)?;
    Track::from_interleaved(sample_rate, channels, &samples)
}

#[cfg(not(feature = "codecs"))]
fn decode_mp3(_bytes: &[u8]) -> Result<Track, DecodeError> {
    Err(DecodeError::UnsupportedFormat {
        mime: "audio/mpeg (build with the `codecs` feature)".into(),
    })
}
