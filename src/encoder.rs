// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Packs synthesized samples into the container the playback engine decodes.
//!
//! The container is a 23 word (46 byte) RIFF/WAVE style preamble followed by
//! little-endian 16-bit samples. Its layout is a fixed contract with the host
//! decoder: the RIFF size field is `2 * length + 15` and the block alignment
//! is always 4, whatever the channel count.

use std::path::Path;

/// Number of 16-bit words in the header.
pub const HEADER_WORDS: usize = 23;

/// Size of the header in bytes.
pub const HEADER_BYTES: usize = HEADER_WORDS * 2;

/// PCM format tag.
pub const FORMAT_PCM: u16 = 0x0001;

/// Bits per encoded sample.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Largest sample count whose data size still fits the header's 32-bit size
/// fields.
pub const MAX_SAMPLES: usize = (u32::MAX as usize - 15) / 2;

const FMT_CHUNK_SIZE: u16 = 0x0012;
const BLOCK_ALIGN: u16 = 0x0004;

/// An encoded sample: header followed by quantized sample words.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    bytes: Vec<u8>,
}

impl SampleBuffer {
    /// Creates an empty buffer with room for `samples` samples plus the header.
    pub fn with_capacity(samples: usize) -> SampleBuffer {
        SampleBuffer {
            bytes: Vec::with_capacity((HEADER_WORDS + samples) * 2),
        }
    }

    /// The encoded container bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of 16-bit words, header included.
    pub fn word_count(&self) -> usize {
        self.bytes.len() / 2
    }

    /// Number of samples after the header.
    pub fn sample_count(&self) -> usize {
        self.word_count().saturating_sub(HEADER_WORDS)
    }

    /// Reads word `index`.
    pub fn word(&self, index: usize) -> Option<i16> {
        let start = index.checked_mul(2)?;
        let bytes = self.bytes.get(start..start + 2)?;
        Some(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Iterates the quantized samples.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .get(HEADER_BYTES..)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Allocated capacity in samples, excluding the header.
    pub fn capacity(&self) -> usize {
        (self.bytes.capacity() / 2).saturating_sub(HEADER_WORDS)
    }

    fn clear(&mut self) {
        self.bytes.clear();
    }

    fn push_word(&mut self, word: u16) {
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }
}

/// Quantizes one sample. Values at or above 1.0 saturate to `i16::MAX`; all
/// other values are scaled by 32768, truncated toward zero and wrapped into 16
/// bits, so values below -1.0 wrap around rather than clamp.
pub fn quantize(value: f64) -> i16 {
    if value >= 1.0 {
        i16::MAX
    } else {
        (value * 32768.0) as i32 as i16
    }
}

/// Encodes `samples` into a new buffer.
pub fn encode(samples: &[f64], sample_rate: u32, channels: u16) -> SampleBuffer {
    let mut buffer = SampleBuffer::with_capacity(samples.len());
    encode_into(&mut buffer, samples, sample_rate, channels);
    buffer
}

/// Encodes `samples` into `buffer`, replacing its contents.
pub fn encode_into(buffer: &mut SampleBuffer, samples: &[f64], sample_rate: u32, channels: u16) {
    buffer.clear();
    buffer.bytes.reserve((HEADER_WORDS + samples.len()) * 2);
    write_header(buffer, samples.len(), sample_rate, channels);
    for sample in samples {
        buffer.push_word(quantize(*sample) as u16);
    }
}

fn write_header(buffer: &mut SampleBuffer, length: usize, sample_rate: u32, channels: u16) {
    let data_size = (2 * length) as u32;
    let riff_size = data_size.wrapping_add(15);
    let byte_rate = 2u32
        .wrapping_mul(channels as u32)
        .wrapping_mul(sample_rate);

    buffer.push_word(0x4952); // RI
    buffer.push_word(0x4646); // FF
    push_u32(buffer, riff_size);
    buffer.push_word(0x4157); // WA
    buffer.push_word(0x4556); // VE
    buffer.push_word(0x6d66); // fm
    buffer.push_word(0x2074); // t
    push_u32(buffer, FMT_CHUNK_SIZE as u32);
    buffer.push_word(FORMAT_PCM);
    buffer.push_word(channels);
    push_u32(buffer, sample_rate);
    push_u32(buffer, byte_rate);
    buffer.push_word(BLOCK_ALIGN);
    buffer.push_word(BITS_PER_SAMPLE);
    buffer.push_word(0x0000); // cb size
    buffer.push_word(0x6164); // da
    buffer.push_word(0x6174); // ta
    push_u32(buffer, data_size);
}

/// Low word first.
fn push_u32(buffer: &mut SampleBuffer, value: u32) {
    buffer.push_word((value & 0x0000_ffff) as u16);
    buffer.push_word(((value & 0xffff_0000) >> 16) as u16);
}

/// Writes `samples` to a standard 16-bit mono WAV file, quantized the same way
/// as the container.
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f64],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        writer.write_sample(quantize(*sample))?;
    }
    writer.finalize()
}

/// The fields of a container header, as read back by [`parse_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Size of the sample data in bytes.
    pub data_size: u32,
}

/// Parses the preamble of `bytes`. Returns `None` when the tags do not match
/// or the buffer is shorter than a header.
pub fn parse_header(bytes: &[u8]) -> Option<HeaderInfo> {
    if bytes.len() < HEADER_BYTES {
        return None;
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..16] != b"WAVEfmt " || &bytes[38..42] != b"data" {
        return None;
    }

    let word = |index: usize| u16::from_le_bytes([bytes[index * 2], bytes[index * 2 + 1]]);
    let long = |index: usize| word(index) as u32 | (word(index + 1) as u32) << 16;

    if word(10) != FORMAT_PCM {
        return None;
    }

    Some(HeaderInfo {
        channels: word(11),
        sample_rate: long(12),
        bits_per_sample: word(17),
        data_size: long(21),
    })
}
