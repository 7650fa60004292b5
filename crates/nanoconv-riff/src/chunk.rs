//! Sub-chunk types of a RIFF/WAVE container.
//!
//! Only three chunk kinds are decoded structurally:
//!
//! - `fmt ` ([`FormatChunk`]): sample format, needed for the sample period
//! - `data` ([`DataChunk`]): the audio frames, passed through untouched
//! - `smpl` ([`SampleChunk`]): sampler metadata carrying loop points
//!
//! Anything else is kept as an opaque [`RiffChunk::Other`] payload.

use crate::error::{fourcc_name, ChunkError, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;

/// A four-character chunk identifier.
pub type FourCC = [u8; 4];

pub const RIFF_MAGIC: FourCC = *b"RIFF";
pub const WAVE_FORM: FourCC = *b"WAVE";
pub const FORMAT_ID: FourCC = *b"fmt ";
pub const DATA_ID: FourCC = *b"data";
pub const SAMPLE_ID: FourCC = *b"smpl";

/// Key of a chunk inside a container.
///
/// The derived ordering is the canonical output order: format, data, sample
/// loop, then any extension chunk sorted by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkKey {
    Format,
    Data,
    SampleLoop,
    Other(FourCC),
}

impl ChunkKey {
    /// Classify a raw chunk id.
    pub fn from_id(id: FourCC) -> Self {
        match &id {
            b"fmt " => ChunkKey::Format,
            b"data" => ChunkKey::Data,
            b"smpl" => ChunkKey::SampleLoop,
            _ => ChunkKey::Other(id),
        }
    }

    /// The four-character id written to the file.
    pub fn id(&self) -> FourCC {
        match self {
            ChunkKey::Format => FORMAT_ID,
            ChunkKey::Data => DATA_ID,
            ChunkKey::SampleLoop => SAMPLE_ID,
            ChunkKey::Other(id) => *id,
        }
    }
}

/// The `fmt ` chunk.
///
/// The decoded fields are read-only views; the raw payload is kept so that
/// re-encoding reproduces the original bytes including any extension block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChunk {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    payload: Vec<u8>,
}

impl FormatChunk {
    /// Minimum payload length of a `fmt ` chunk (PCMWAVEFORMAT).
    pub const MIN_LEN: usize = 16;

    /// Build a plain PCM format chunk.
    ///
    /// Derived fields that do not fit their header field saturate.
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let bytes_per_sample = (u32::from(bits_per_sample) + 7) / 8;
        let block_align = u16::try_from(u32::from(channels) * bytes_per_sample).unwrap_or(u16::MAX);
        let byte_rate = u32::try_from(u64::from(sample_rate) * u64::from(block_align)).unwrap_or(u32::MAX);

        let mut payload = vec![0u8; Self::MIN_LEN];
        LittleEndian::write_u16(&mut payload[0..2], 1);
        LittleEndian::write_u16(&mut payload[2..4], channels);
        LittleEndian::write_u32(&mut payload[4..8], sample_rate);
        LittleEndian::write_u32(&mut payload[8..12], byte_rate);
        LittleEndian::write_u16(&mut payload[12..14], block_align);
        LittleEndian::write_u16(&mut payload[14..16], bits_per_sample);

        Self {
            audio_format: 1,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            payload,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_LEN {
            return Err(ChunkError::Malformed {
                id: fourcc_name(&FORMAT_ID),
                message: format!(
                    "payload is {} bytes, expected at least {}",
                    payload.len(),
                    Self::MIN_LEN
                ),
            });
        }

        Ok(Self {
            audio_format: LittleEndian::read_u16(&payload[0..2]),
            channels: LittleEndian::read_u16(&payload[2..4]),
            sample_rate: LittleEndian::read_u32(&payload[4..8]),
            byte_rate: LittleEndian::read_u32(&payload[8..12]),
            block_align: LittleEndian::read_u16(&payload[12..14]),
            bits_per_sample: LittleEndian::read_u16(&payload[14..16]),
            payload: payload.to_vec(),
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// The `data` chunk. Frames are never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub payload: Vec<u8>,
}

impl DataChunk {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }
}

/// One loop record of a `smpl` chunk (24 bytes on disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleLoop {
    pub cue_point_id: u32,
    /// 0 = forward, 1 = alternating, 2 = backward.
    pub loop_type: u32,
    pub start: u32,
    pub end: u32,
    pub fraction: u32,
    /// 0 loops forever.
    pub play_count: u32,
}

/// The `smpl` chunk: a fixed 36-byte header, one 24-byte record per loop,
/// then sampler-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleChunk {
    pub manufacturer: u32,
    pub product: u32,
    /// Duration of one sample in nanoseconds.
    pub sample_period: u32,
    pub midi_unity_note: u32,
    pub midi_pitch_fraction: u32,
    pub smpte_format: u32,
    pub smpte_offset: u32,
    pub loops: Vec<SampleLoop>,
    pub sampler_data: Vec<u8>,
}

impl SampleChunk {
    pub const HEADER_LEN: usize = 36;
    pub const LOOP_LEN: usize = 24;
    pub const DEFAULT_UNITY_NOTE: u32 = 60;

    /// A chunk carrying a single infinite forward loop over
    /// `start..=end` (sample frame indices).
    pub fn with_loop(sample_rate: u32, start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(ChunkError::InvalidLoop { start, end });
        }

        Ok(Self {
            manufacturer: 0,
            product: 0,
            sample_period: Self::sample_period_for(sample_rate)?,
            midi_unity_note: Self::DEFAULT_UNITY_NOTE,
            midi_pitch_fraction: 0,
            smpte_format: 0,
            smpte_offset: 0,
            loops: vec![SampleLoop {
                start,
                end,
                ..SampleLoop::default()
            }],
            sampler_data: Vec::new(),
        })
    }

    /// Sample period in nanoseconds, `round(1e9 / sample_rate)`.
    pub fn sample_period_for(sample_rate: u32) -> Result<u32> {
        if sample_rate == 0 {
            return Err(ChunkError::Malformed {
                id: fourcc_name(&FORMAT_ID),
                message: "sample rate is zero".to_string(),
            });
        }
        Ok((1e9 / sample_rate as f64).round() as u32)
    }

    /// The first loop, if any.
    pub fn first_loop(&self) -> Option<&SampleLoop> {
        self.loops.first()
    }

    /// Payload length without the 8-byte chunk frame.
    pub fn payload_len(&self) -> usize {
        Self::HEADER_LEN + Self::LOOP_LEN * self.loops.len() + self.sampler_data.len()
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::HEADER_LEN {
            return Err(ChunkError::Malformed {
                id: fourcc_name(&SAMPLE_ID),
                message: format!(
                    "payload is {} bytes, header needs {}",
                    payload.len(),
                    Self::HEADER_LEN
                ),
            });
        }

        let field = |index: usize| LittleEndian::read_u32(&payload[index * 4..index * 4 + 4]);
        let loop_count = field(7) as usize;
        let sampler_data_len = field(8) as usize;

        let required = loop_count
            .checked_mul(Self::LOOP_LEN)
            .and_then(|n| n.checked_add(Self::HEADER_LEN))
            .and_then(|n| n.checked_add(sampler_data_len))
            .ok_or_else(|| ChunkError::Malformed {
                id: fourcc_name(&SAMPLE_ID),
                message: "declared sizes overflow".to_string(),
            })?;
        if payload.len() < required {
            return Err(ChunkError::Malformed {
                id: fourcc_name(&SAMPLE_ID),
                message: format!(
                    "{} loops and {} bytes of sampler data need {} bytes, payload has {}",
                    loop_count,
                    sampler_data_len,
                    required,
                    payload.len()
                ),
            });
        }
        if payload.len() > required {
            log::debug!(
                "Ignoring {} trailing bytes in smpl chunk",
                payload.len() - required
            );
        }

        let loops = payload[Self::HEADER_LEN..Self::HEADER_LEN + loop_count * Self::LOOP_LEN]
            .chunks_exact(Self::LOOP_LEN)
            .map(|record| SampleLoop {
                cue_point_id: LittleEndian::read_u32(&record[0..4]),
                loop_type: LittleEndian::read_u32(&record[4..8]),
                start: LittleEndian::read_u32(&record[8..12]),
                end: LittleEndian::read_u32(&record[12..16]),
                fraction: LittleEndian::read_u32(&record[16..20]),
                play_count: LittleEndian::read_u32(&record[20..24]),
            })
            .collect();

        let data_start = Self::HEADER_LEN + loop_count * Self::LOOP_LEN;

        Ok(Self {
            manufacturer: field(0),
            product: field(1),
            sample_period: field(2),
            midi_unity_note: field(3),
            midi_pitch_fraction: field(4),
            smpte_format: field(5),
            smpte_offset: field(6),
            loops,
            sampler_data: payload[data_start..data_start + sampler_data_len].to_vec(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.payload_len());

        buf.write_u32::<LittleEndian>(self.manufacturer)?;
        buf.write_u32::<LittleEndian>(self.product)?;
        buf.write_u32::<LittleEndian>(self.sample_period)?;
        buf.write_u32::<LittleEndian>(self.midi_unity_note)?;
        buf.write_u32::<LittleEndian>(self.midi_pitch_fraction)?;
        buf.write_u32::<LittleEndian>(self.smpte_format)?;
        buf.write_u32::<LittleEndian>(self.smpte_offset)?;
        buf.write_u32::<LittleEndian>(self.loops.len() as u32)?;
        buf.write_u32::<LittleEndian>(self.sampler_data.len() as u32)?;

        for sample_loop in &self.loops {
            buf.write_u32::<LittleEndian>(sample_loop.cue_point_id)?;
            buf.write_u32::<LittleEndian>(sample_loop.loop_type)?;
            buf.write_u32::<LittleEndian>(sample_loop.start)?;
            buf.write_u32::<LittleEndian>(sample_loop.end)?;
            buf.write_u32::<LittleEndian>(sample_loop.fraction)?;
            buf.write_u32::<LittleEndian>(sample_loop.play_count)?;
        }

        buf.write_all(&self.sampler_data)?;
        Ok(buf)
    }
}

/// A decoded sub-chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiffChunk {
    Format(FormatChunk),
    Data(DataChunk),
    SampleLoop(SampleChunk),
    Other { id: FourCC, payload: Vec<u8> },
}

impl RiffChunk {
    /// Decode a payload according to its chunk id.
    pub fn decode(id: FourCC, payload: &[u8]) -> Result<Self> {
        Ok(match ChunkKey::from_id(id) {
            ChunkKey::Format => RiffChunk::Format(FormatChunk::decode(payload)?),
            ChunkKey::Data => RiffChunk::Data(DataChunk::new(payload.to_vec())),
            ChunkKey::SampleLoop => RiffChunk::SampleLoop(SampleChunk::decode(payload)?),
            ChunkKey::Other(id) => RiffChunk::Other {
                id,
                payload: payload.to_vec(),
            },
        })
    }

    pub fn key(&self) -> ChunkKey {
        match self {
            RiffChunk::Format(_) => ChunkKey::Format,
            RiffChunk::Data(_) => ChunkKey::Data,
            RiffChunk::SampleLoop(_) => ChunkKey::SampleLoop,
            RiffChunk::Other { id, .. } => ChunkKey::from_id(*id),
        }
    }

    pub fn id(&self) -> FourCC {
        self.key().id()
    }

    /// Serialized payload, without id, length or pad byte.
    pub fn payload(&self) -> Result<Vec<u8>> {
        Ok(match self {
            RiffChunk::Format(format) => format.payload().to_vec(),
            RiffChunk::Data(data) => data.payload.clone(),
            RiffChunk::SampleLoop(sample) => sample.encode()?,
            RiffChunk::Other { payload, .. } => payload.clone(),
        })
    }

    /// Size on disk: 8-byte frame, payload, pad byte when the payload is odd.
    pub fn framed_len(&self) -> usize {
        let len = match self {
            RiffChunk::Format(format) => format.payload().len(),
            RiffChunk::Data(data) => data.payload.len(),
            RiffChunk::SampleLoop(sample) => sample.payload_len(),
            RiffChunk::Other { payload, .. } => payload.len(),
        };
        8 + len + (len & 1)
    }
}
