//! RIFF container decoding and encoding.
//!
//! Layout: `"RIFF"`, u32 size, form type, then sub-chunks framed as
//! id, u32 length, payload and one pad byte when the length is odd. All
//! integers are little-endian.

use crate::chunk::*;
use crate::error::{fourcc_name, ChunkError, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::Write;

/// A RIFF file held in memory, one chunk per [`ChunkKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiffContainer {
    form_type: FourCC,
    chunks: BTreeMap<ChunkKey, RiffChunk>,
}

impl RiffContainer {
    const HEADER_LEN: usize = 12;

    pub fn new(form_type: FourCC) -> Self {
        Self {
            form_type,
            chunks: BTreeMap::new(),
        }
    }

    /// An empty `WAVE` container.
    pub fn wave() -> Self {
        Self::new(WAVE_FORM)
    }

    pub fn form_type(&self) -> FourCC {
        self.form_type
    }

    /// Insert a chunk, returning the one it replaced.
    pub fn insert(&mut self, chunk: RiffChunk) -> Option<RiffChunk> {
        self.chunks.insert(chunk.key(), chunk)
    }

    pub fn remove(&mut self, key: ChunkKey) -> Option<RiffChunk> {
        self.chunks.remove(&key)
    }

    pub fn get(&self, key: ChunkKey) -> Option<&RiffChunk> {
        self.chunks.get(&key)
    }

    pub fn format(&self) -> Option<&FormatChunk> {
        match self.chunks.get(&ChunkKey::Format) {
            Some(RiffChunk::Format(format)) => Some(format),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&DataChunk> {
        match self.chunks.get(&ChunkKey::Data) {
            Some(RiffChunk::Data(data)) => Some(data),
            _ => None,
        }
    }

    pub fn sample_loop(&self) -> Option<&SampleChunk> {
        match self.chunks.get(&ChunkKey::SampleLoop) {
            Some(RiffChunk::SampleLoop(sample)) => Some(sample),
            _ => None,
        }
    }

    /// Chunks in output order.
    pub fn chunks(&self) -> impl Iterator<Item = &RiffChunk> {
        self.chunks.values()
    }

    /// Value of the RIFF size field: form type plus every framed chunk.
    pub fn riff_size(&self) -> usize {
        4 + self.chunks.values().map(RiffChunk::framed_len).sum::<usize>()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::HEADER_LEN {
            return Err(ChunkError::Truncated {
                context: "RIFF header".to_string(),
                needed: Self::HEADER_LEN,
                available: bytes.len(),
            });
        }

        let magic = fourcc(&bytes[0..4]);
        if magic != RIFF_MAGIC {
            return Err(ChunkError::BadMagic {
                expected: fourcc_name(&RIFF_MAGIC),
                found: fourcc_name(&magic),
            });
        }

        let declared = LittleEndian::read_u32(&bytes[4..8]) as usize;
        let available = bytes.len() - 8;
        if declared > available {
            return Err(ChunkError::LengthMismatch {
                id: fourcc_name(&RIFF_MAGIC),
                declared,
                available,
            });
        }
        if declared < available {
            log::debug!("Ignoring {} bytes after the RIFF body", available - declared);
        }

        let mut container = Self::new(fourcc(&bytes[8..12]));
        let end = 8 + declared;
        let mut pos = Self::HEADER_LEN;

        while pos + 8 <= end {
            let id = fourcc(&bytes[pos..pos + 4]);
            let len = LittleEndian::read_u32(&bytes[pos + 4..pos + 8]) as usize;
            let body = pos + 8;

            if len > end - body {
                return Err(ChunkError::LengthMismatch {
                    id: fourcc_name(&id),
                    declared: len,
                    available: end - body,
                });
            }

            let chunk = RiffChunk::decode(id, &bytes[body..body + len])?;
            log::debug!("Decoded '{}' chunk ({} bytes)", fourcc_name(&id), len);
            if container.insert(chunk).is_some() {
                log::warn!(
                    "Duplicate '{}' chunk, keeping the last one",
                    fourcc_name(&id)
                );
            }

            pos = body + len + (len & 1);
        }

        if pos < end {
            log::debug!("Ignoring {} trailing bytes inside the RIFF body", end - pos);
        }

        Ok(container)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let size = self.riff_size();
        let size_field = u32::try_from(size).map_err(|_| ChunkError::Malformed {
            id: fourcc_name(&RIFF_MAGIC),
            message: format!("container of {} bytes exceeds the 4 GiB limit", size),
        })?;

        let mut buf = Vec::with_capacity(size + 8);
        buf.write_all(&RIFF_MAGIC)?;
        buf.write_u32::<LittleEndian>(size_field)?;
        buf.write_all(&self.form_type)?;

        for chunk in self.chunks.values() {
            let payload = chunk.payload()?;
            buf.write_all(&chunk.id())?;
            buf.write_u32::<LittleEndian>(payload.len() as u32)?;
            buf.write_all(&payload)?;
            if payload.len() % 2 == 1 {
                buf.write_u8(0)?;
            }
        }

        Ok(buf)
    }
}

fn fourcc(bytes: &[u8]) -> FourCC {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_container() -> RiffContainer {
        let mut container = RiffContainer::wave();
        container.insert(RiffChunk::Format(FormatChunk::pcm(1, 44100, 16)));
        container.insert(RiffChunk::Data(DataChunk::new(
            (0..200u16).flat_map(|s| s.to_le_bytes()).collect(),
        )));
        container.insert(RiffChunk::SampleLoop(
            SampleChunk::with_loop(44100, 12, 150).unwrap(),
        ));
        container
    }

    #[test]
    fn test_round_trip_preserves_payloads_and_size() {
        let container = synthetic_container();
        let bytes = container.encode().unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        let size = LittleEndian::read_u32(&bytes[4..8]) as usize;
        assert_eq!(size, bytes.len() - 8);
        assert_eq!(size, container.riff_size());

        let decoded = RiffContainer::decode(&bytes).unwrap();
        assert_eq!(decoded, container);
        for (a, b) in decoded.chunks().zip(container.chunks()) {
            assert_eq!(a.payload().unwrap(), b.payload().unwrap());
        }
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn test_encode_orders_chunks_canonically() {
        let mut container = RiffContainer::wave();
        container.insert(RiffChunk::Other {
            id: *b"LIST",
            payload: b"INFOabc".to_vec(),
        });
        container.insert(RiffChunk::SampleLoop(
            SampleChunk::with_loop(22050, 0, 4).unwrap(),
        ));
        container.insert(RiffChunk::Data(DataChunk::new(vec![1, 2, 3, 4])));
        container.insert(RiffChunk::Format(FormatChunk::pcm(1, 22050, 8)));

        let bytes = container.encode().unwrap();
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(&bytes[48..52], b"smpl");
        assert_eq!(&bytes[48 + 68..48 + 72], b"LIST");
        // odd LIST payload is padded
        assert_eq!(bytes.len(), 48 + 68 + 8 + 7 + 1);

        let decoded = RiffContainer::decode(&bytes).unwrap();
        assert_eq!(decoded, container);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = synthetic_container().encode().unwrap();
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(
            RiffContainer::decode(&bytes),
            Err(ChunkError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        assert!(matches!(
            RiffContainer::decode(b"RIFF\x04\x00"),
            Err(ChunkError::Truncated { .. })
        ));

        let bytes = synthetic_container().encode().unwrap();
        assert!(matches!(
            RiffContainer::decode(&bytes[..bytes.len() - 10]),
            Err(ChunkError::LengthMismatch { ref id, .. }) if id == "RIFF"
        ));
    }

    #[test]
    fn test_decode_reports_oversized_chunk() {
        let mut bytes = synthetic_container().encode().unwrap();
        // inflate the data chunk length (fmt chunk occupies bytes 12..36)
        LittleEndian::write_u32(&mut bytes[40..44], 10_000);
        match RiffContainer::decode(&bytes) {
            Err(ChunkError::LengthMismatch { id, declared, .. }) => {
                assert_eq!(id, "data");
                assert_eq!(declared, 10_000);
            }
            other => panic!("expected a length mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ignores_bytes_after_riff_body() {
        let mut bytes = synthetic_container().encode().unwrap();
        bytes.extend_from_slice(b"garbage");
        assert_eq!(RiffContainer::decode(&bytes).unwrap(), synthetic_container());
    }
}
