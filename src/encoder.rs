//! Export encoder — MP3 when a compressed encoder is available, WAV otherwise.

use std::io::Cursor;

use tracing::{info, warn};

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::render::PcmBuffer;

/// Frames per chunk fed to the compressed encoder (one MPEG-1 Layer III frame).
pub const CHUNK_FRAMES: usize = 1152;

/// An encoded export ready for download.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub mime_type: &'static str,
    base_name: String,
}

impl EncodedAudio {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.base_name, self.extension)
    }
}

/// A streaming compressed encoder fed 16-bit stereo chunks.
pub trait CompressedEncoder {
    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn mime_type(&self) -> &'static str {
        "audio/mp3"
    }

    /// Encode one chunk, appending any finished bytes to `out`.
    fn encode_chunk(
        &mut self,
        left: &[i16],
        right: &[i16],
        out: &mut Vec<u8>,
    ) -> Result<(), PlayerError>;

    /// Drain buffered frames into `out`.
    fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), PlayerError>;
}

/// Float sample to 16-bit, scaled by 32767 and truncated.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Run `pcm` through a compressed encoder in [`CHUNK_FRAMES`] chunks.
pub fn encode_compressed(
    pcm: &PcmBuffer,
    encoder: &mut dyn CompressedEncoder,
) -> Result<Vec<u8>, PlayerError> {
    let left: Vec<i16> = pcm.left.iter().map(|&s| to_i16(s)).collect();
    let right: Vec<i16> = pcm.right.iter().map(|&s| to_i16(s)).collect();

    let mut out = Vec::new();
    for (l, r) in left.chunks(CHUNK_FRAMES).zip(right.chunks(CHUNK_FRAMES)) {
        encoder.encode_chunk(l, r, &mut out)?;
    }
    encoder.flush(&mut out)?;
    Ok(out)
}

/// Bytes of sample data a 16-bit stereo WAV can describe in its header.
fn wav_data_len(frames: usize) -> Result<u32, PlayerError> {
    frames
        .checked_mul(2 * 2)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .filter(|&bytes| bytes <= u32::MAX - 36)
        .ok_or_else(|| PlayerError::Encode(format!("{frames} frames exceed the WAV size limit")))
}

/// Encode as RIFF/WAVE, 16-bit PCM, interleaved stereo.
pub fn encode_wav(pcm: &PcmBuffer) -> Result<Vec<u8>, PlayerError> {
    let data_len = wav_data_len(pcm.frames())?;
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).map_err(wav_error)?;
    for (&l, &r) in pcm.left.iter().zip(&pcm.right) {
        writer
            .write_sample((l.clamp(-1.0, 1.0) * 32767.0) as i16)
            .map_err(wav_error)?;
        writer
            .write_sample((r.clamp(-1.0, 1.0) * 32767.0) as i16)
            .map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(bytes)
}

fn wav_error(e: hound::Error) -> PlayerError {
    PlayerError::Encode(format!("WAV: {e}"))
}

/// The compressed encoder this build can offer, if any.
#[cfg(feature = "codecs")]
pub fn default_compressed_encoder(
    sample_rate: u32,
    bitrate_kbps: u32,
) -> Option<Box<dyn CompressedEncoder>> {
    match lame::LameEncoder::new(sample_rate, bitrate_kbps) {
        Ok(encoder) => Some(Box::new(encoder)),
        Err(e) => {
            warn!(error = %e, "MP3 encoder could not be initialized");
            None
        }
    }
}

#[cfg(not(feature = "codecs"))]
pub fn default_compressed_encoder(
    _sample_rate: u32,
    _bitrate_kbps: u32,
) -> Option<Box<dyn CompressedEncoder>> {
    None
}

/// Encode an export, preferring `compressed` and falling back to WAV.
pub fn encode(
    pcm: &PcmBuffer,
    compressed: Option<&mut dyn CompressedEncoder>,
    base_name: &str,
) -> Result<EncodedAudio, PlayerError> {
    let encoded = match compressed {
        Some(encoder) => EncodedAudio {
            bytes: encode_compressed(pcm, encoder)?,
            extension: encoder.extension(),
            mime_type: encoder.mime_type(),
            base_name: base_name.to_string(),
        },
        None => {
            warn!("compressed encoder unavailable, exporting WAV");
            EncodedAudio {
                bytes: encode_wav(pcm)?,
                extension: "wav",
                mime_type: "audio/wav",
                base_name: base_name.to_string(),
            }
        }
    };
    info!(
        file = %encoded.file_name(),
        bytes = encoded.bytes.len(),
        "export encoded"
    );
    Ok(encoded)
}

/// Encode with whatever encoder this build provides.
pub fn encode_with_config(pcm: &PcmBuffer, config: &PlayerConfig) -> Result<EncodedAudio, PlayerError> {
    match default_compressed_encoder(pcm.sample_rate, config.mp3_bitrate_kbps) {
        Some(mut encoder) => encode(pcm, Some(encoder.as_mut()), &config.export_base_name),
        None => encode(pcm, None, &config.export_base_name),
    }
}

#[cfg(feature = "codecs")]
mod lame {
    use mp3lame_encoder::{Bitrate, Builder, DualPcm, Encoder, FlushNoGap, Quality};

    use super::CompressedEncoder;
    use crate::error::PlayerError;

    pub struct LameEncoder {
        inner: Encoder,
    }

    fn bitrate(kbps: u32) -> Bitrate {
        match kbps {
            0..=96 => Bitrate::Kbps96,
            97..=128 => Bitrate::Kbps128,
            129..=160 => Bitrate::Kbps160,
            161..=192 => Bitrate::Kbps192,
            193..=256 => Bitrate::Kbps256,
            _ => Bitrate::Kbps320,
        }
    }

    impl LameEncoder {
        pub fn new(sample_rate: u32, bitrate_kbps: u32) -> Result<Self, PlayerError> {
            let mut builder =
                Builder::new().ok_or_else(|| PlayerError::Encode("LAME unavailable".into()))?;
            let err = |e: mp3lame_encoder::BuildError| PlayerError::Encode(format!("{e:?}"));
            builder.set_num_channels(2).map_err(err)?;
            builder.set_sample_rate(sample_rate).map_err(err)?;
            builder.set_brate(bitrate(bitrate_kbps)).map_err(err)?;
            builder.set_quality(Quality::Best).map_err(err)?;
            let inner = builder.build().map_err(err)?;
            Ok(Self { inner })
        }
    }

    impl CompressedEncoder for LameEncoder {
        fn encode_chunk(
            &mut self,
            left: &[i16],
            right: &[i16],
            out: &mut Vec<u8>,
        ) -> Result<(), PlayerError> {
            out.reserve(mp3lame_encoder::max_required_buffer_size(left.len()));
            self.inner
                .encode_to_vec(DualPcm { left, right }, out)
                .map_err(|e| PlayerError::Encode(format!("{e:?}")))?;
            Ok(())
        }

        fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), PlayerError> {
            out.reserve(7200);
            self.inner
                .flush_to_vec::<FlushNoGap>(out)
                .map_err(|e| PlayerError::Encode(format!("{e:?}")))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(left: Vec<f32>, right: Vec<f32>) -> PcmBuffer {
        PcmBuffer {
            sample_rate: 22050,
            left,
            right,
        }
    }

    /// Records the chunk sizes it is fed.
    #[derive(Default)]
    struct Recorder {
        chunks: Vec<usize>,
        flushed: bool,
    }

    impl CompressedEncoder for Recorder {
        fn encode_chunk(
            &mut self,
            left: &[i16],
            right: &[i16],
            out: &mut Vec<u8>,
        ) -> Result<(), PlayerError> {
            assert_eq!(left.len(), right.len());
            self.chunks.push(left.len());
            out.push(left.len() as u8);
            Ok(())
        }

        fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), PlayerError> {
            self.flushed = true;
            out.push(0xFF);
            Ok(())
        }
    }

    struct Failing;

    impl CompressedEncoder for Failing {
        fn encode_chunk(&mut self, _: &[i16], _: &[i16], _: &mut Vec<u8>) -> Result<(), PlayerError> {
            Err(PlayerError::Encode("boom".into()))
        }

        fn flush(&mut self, _: &mut Vec<u8>) -> Result<(), PlayerError> {
            Ok(())
        }
    }

    #[test]
    fn wav_round_trips_through_hound() {
        let left: Vec<f32> = (0..500).map(|i| (i as f32 * 0.01).sin() * 0.9).collect();
        let right: Vec<f32> = left.iter().map(|s| -s * 0.5).collect();
        let buffer = pcm(left.clone(), right.clone());
        let bytes = encode_wav(&buffer).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 500 * 2 * 2);

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        for (i, frame) in samples.chunks(2).enumerate() {
            assert!((frame[0] as f32 / 32767.0 - left[i]).abs() <= 1.0 / 32767.0);
            assert!((frame[1] as f32 / 32767.0 - right[i]).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn wav_clamps_overs() {
        let bytes = encode_wav(&pcm(vec![1.5, -2.0], vec![0.0, 0.0])).unwrap();
        let l0 = i16::from_le_bytes([bytes[44], bytes[45]]);
        let l1 = i16::from_le_bytes([bytes[48], bytes[49]]);
        assert_eq!(l0, 32767);
        assert_eq!(l1, -32767);
    }

    #[test]
    fn wav_size_limit_is_an_error() {
        assert_eq!(wav_data_len(1000).unwrap(), 4000);
        let too_long = (u32::MAX as usize) / 4 + 1;
        assert!(matches!(wav_data_len(too_long), Err(PlayerError::Encode(_))));
    }

    #[test]
    fn i16_conversion_truncates() {
        assert_eq!(to_i16(0.5), 16383);
        assert_eq!(to_i16(-0.5), -16383);
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-2.0), -32768);
    }

    #[test]
    fn compressed_path_chunks_and_flushes() {
        let buffer = pcm(vec![0.1; 2500], vec![0.1; 2500]);
        let mut recorder = Recorder::default();
        let encoded = encode(&buffer, Some(&mut recorder), "processed_audio").unwrap();
        assert_eq!(recorder.chunks, vec![1152, 1152, 196]);
        assert!(recorder.flushed);
        assert_eq!(encoded.file_name(), "processed_audio.mp3");
        assert_eq!(encoded.mime_type, "audio/mp3");
        assert_eq!(encoded.bytes.last(), Some(&0xFF));
    }

    #[test]
    fn missing_encoder_falls_back_to_wav() {
        let buffer = pcm(vec![0.0; 10], vec![0.0; 10]);
        let encoded = encode(&buffer, None, "processed_audio").unwrap();
        assert_eq!(encoded.file_name(), "processed_audio.wav");
        assert_eq!(encoded.mime_type, "audio/wav");
        assert_eq!(&encoded.bytes[0..4], b"RIFF");
    }

    #[test]
    fn encoder_failure_propagates() {
        let buffer = pcm(vec![0.0; 10], vec![0.0; 10]);
        let err = encode(&buffer, Some(&mut Failing), "x").unwrap_err();
        assert!(matches!(err, PlayerError::Encode(_)));
    }
}
