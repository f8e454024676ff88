//! WAV renderer — encodes one loop of a LoopBuffer as a WAV byte buffer.

use super::loop_buffer::LoopBuffer;

/// RIFF + fmt + data chunk headers of a canonical PCM file.
const HEADER_LEN: usize = 44;
const BYTES_PER_SAMPLE: usize = 2;
const FORMAT_PCM: u16 = 1;
const MONO: u16 = 1;

/// Render the playable loop region of a buffer as 16-bit mono PCM WAV bytes.
pub fn render_wav(buffer: &LoopBuffer) -> Vec<u8> {
    let (start, end) = buffer.loop_region();
    encode_mono_wav(&to_pcm_i16(&buffer.samples()[start..end]), buffer.sample_rate())
}

/// Convert float samples to i16, clamping to [-1, 1].
pub fn to_pcm_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

fn put_chunk_header(out: &mut Vec<u8>, id: &[u8; 4], len: usize) {
    out.extend_from_slice(id);
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

/// Lay out a single-channel 16-bit WAV file around `pcm`.
fn encode_mono_wav(pcm: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() * BYTES_PER_SAMPLE;
    let mut out = Vec::with_capacity(HEADER_LEN + data_len);

    // RIFF size excludes the 8-byte RIFF chunk header itself.
    put_chunk_header(&mut out, b"RIFF", HEADER_LEN - 8 + data_len);
    out.extend_from_slice(b"WAVE");

    put_chunk_header(&mut out, b"fmt ", 16);
    for field in [FORMAT_PCM, MONO] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    for field in [sample_rate, sample_rate * BYTES_PER_SAMPLE as u32] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    for field in [BYTES_PER_SAMPLE as u16, 8 * BYTES_PER_SAMPLE as u16] {
        out.extend_from_slice(&field.to_le_bytes());
    }

    put_chunk_header(&mut out, b"data", data_len);
    out.extend(pcm.iter().flat_map(|s| s.to_le_bytes()));
    debug_assert_eq!(out.len(), HEADER_LEN + data_len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::WaveCollection;
    use crate::dsp::loop_buffer::LoopBufferBuilder;
    use crate::dsp::oscillator::Waveform;
    use crate::wave::Wave;

    fn loop_buffer(sample_rate: u32) -> LoopBuffer {
        let collection = WaveCollection::with_wave(Wave::new(Waveform::Sine, 110.0, 0.0));
        LoopBufferBuilder::new(sample_rate, 0.25)
            .with_loop_search(0.01)
            .build(&collection.snapshot())
            .expect("build failed")
    }

    #[test]
    fn wav_header_valid() {
        let wav = render_wav(&loop_buffer(22050));

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 22050);

        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 1);
    }

    #[test]
    fn fmt_chunk_describes_16_bit_mono() {
        let wav = encode_mono_wav(&[0, 1, -1], 48000);
        let u16_at = |i: usize| u16::from_le_bytes([wav[i], wav[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([wav[i], wav[i + 1], wav[i + 2], wav[i + 3]]);

        assert_eq!(u32_at(4), 36 + 6);
        assert_eq!(u32_at(16), 16);
        assert_eq!(u16_at(20), 1);
        assert_eq!(u32_at(28), 96000);
        assert_eq!(u16_at(32), 2);
        assert_eq!(u16_at(34), 16);
        assert_eq!(&wav[44..], &[0, 0, 1, 0, 0xff, 0xff]);
    }

    #[test]
    fn wav_holds_exactly_one_loop() {
        let buffer = loop_buffer(44100);
        let wav = render_wav(&buffer);

        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size as usize, buffer.loop_end() * 2);
        assert_eq!(wav.len(), 44 + buffer.loop_end() * 2);
    }

    #[test]
    fn rendered_loop_is_not_silent() {
        let wav = render_wav(&loop_buffer(22050));
        let has_nonzero = wav[44..]
            .chunks_exact(2)
            .any(|b| i16::from_le_bytes([b[0], b[1]]) != 0);
        assert!(has_nonzero, "rendered loop should contain audio");
    }

    #[test]
    fn pcm_conversion_clamps() {
        assert_eq!(to_pcm_i16(&[2.0, -2.0, 0.0]), vec![i16::MAX, -i16::MAX, 0]);
    }
}
