//! Loop editing for WAVE files.

use crate::chunk::{ChunkKey, RiffChunk, SampleChunk, SampleLoop, FORMAT_ID, DATA_ID, WAVE_FORM};
use crate::container::RiffContainer;
use crate::error::{fourcc_name, ChunkError, Result};

/// Insert or replace the `smpl` chunk of a WAVE file.
///
/// The format and data chunks are copied verbatim, any other chunk is kept,
/// and a single forward loop from `loop_start` to `loop_end` (sample frame
/// indices) is written with the sample period derived from the file's
/// sample rate.
///
/// # Errors
///
/// Fails when the buffer is not a RIFF/WAVE container, when the `fmt ` or
/// `data` chunk is missing, or when `loop_start > loop_end`.
pub fn add_loop_to_wave(bytes: &[u8], loop_start: u32, loop_end: u32) -> Result<Vec<u8>> {
    let mut container = decode_wave(bytes)?;

    let sample_rate = container
        .format()
        .ok_or_else(|| ChunkError::MissingChunk(fourcc_name(&FORMAT_ID)))?
        .sample_rate;
    if container.data().is_none() {
        return Err(ChunkError::MissingChunk(fourcc_name(&DATA_ID)));
    }

    let sample = SampleChunk::with_loop(sample_rate, loop_start, loop_end)?;
    if container.insert(RiffChunk::SampleLoop(sample)).is_some() {
        log::debug!("Replaced existing smpl chunk");
    }

    log::debug!(
        "Loop {}..{} at {} Hz written into {} byte container",
        loop_start,
        loop_end,
        sample_rate,
        container.riff_size() + 8
    );

    container.encode()
}

/// The first loop stored in a WAVE file, if it has a `smpl` chunk.
pub fn read_loop(bytes: &[u8]) -> Result<Option<SampleLoop>> {
    let container = decode_wave(bytes)?;
    Ok(container
        .sample_loop()
        .and_then(|sample| sample.first_loop().copied()))
}

/// Remove the `smpl` chunk of a WAVE file, if present.
pub fn strip_loop(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut container = decode_wave(bytes)?;
    container.remove(ChunkKey::SampleLoop);
    container.encode()
}

fn decode_wave(bytes: &[u8]) -> Result<RiffContainer> {
    let container = RiffContainer::decode(bytes)?;
    if container.form_type() != WAVE_FORM {
        return Err(ChunkError::BadMagic {
            expected: fourcc_name(&WAVE_FORM),
            found: fourcc_name(&container.form_type()),
        });
    }
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{DataChunk, FormatChunk};
    use byteorder::{ByteOrder, LittleEndian};
    use std::io::Cursor;

    fn tone_wav(sample_rate: u32, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                writer.write_sample(((i % 100) as i16 - 50) * 300).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_add_loop_appends_smpl_chunk() {
        let input = tone_wav(44100, 37586);
        let output = add_loop_to_wave(&input, 10000, 20000).unwrap();

        assert_eq!(output.len(), input.len() + 68);
        assert_eq!(
            LittleEndian::read_u32(&output[4..8]) as usize,
            output.len() - 8
        );
        // format and data chunks are untouched
        assert_eq!(&output[8..input.len()], &input[8..]);

        let smpl = &output[input.len()..];
        assert_eq!(&smpl[0..4], b"smpl");
        assert_eq!(LittleEndian::read_u32(&smpl[4..8]), 60);
        assert_eq!(LittleEndian::read_u32(&smpl[16..20]), 22676);
        assert_eq!(LittleEndian::read_u32(&smpl[52..56]), 10000);
        assert_eq!(LittleEndian::read_u32(&smpl[56..60]), 20000);
    }

    #[test]
    fn test_looped_file_still_reads_as_wave() {
        let input = tone_wav(48000, 4800);
        let output = add_loop_to_wave(&input, 100, 4000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(output.clone())).unwrap();
        assert_eq!(reader.spec().sample_rate, 48000);
        assert_eq!(reader.len(), 4800);

        let sample_loop = read_loop(&output).unwrap().unwrap();
        assert_eq!((sample_loop.start, sample_loop.end), (100, 4000));
        assert_eq!(sample_loop.play_count, 0);
    }

    #[test]
    fn test_existing_loop_is_replaced() {
        let input = tone_wav(44100, 1000);
        let first = add_loop_to_wave(&input, 1, 2).unwrap();
        let second = add_loop_to_wave(&first, 300, 900).unwrap();

        assert_eq!(second.len(), first.len());
        let sample_loop = read_loop(&second).unwrap().unwrap();
        assert_eq!((sample_loop.start, sample_loop.end), (300, 900));

        assert_eq!(strip_loop(&second).unwrap(), input);
        assert_eq!(read_loop(&input).unwrap(), None);
    }

    #[test]
    fn test_missing_data_chunk_is_reported() {
        let mut container = RiffContainer::wave();
        container.insert(RiffChunk::Format(FormatChunk::pcm(1, 44100, 16)));
        let bytes = container.encode().unwrap();

        match add_loop_to_wave(&bytes, 0, 10) {
            Err(ChunkError::MissingChunk(id)) => assert_eq!(id, "data"),
            other => panic!("expected missing data chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_format_chunk_is_reported() {
        let mut container = RiffContainer::wave();
        container.insert(RiffChunk::Data(DataChunk::new(vec![0; 8])));
        let bytes = container.encode().unwrap();

        match add_loop_to_wave(&bytes, 0, 10) {
            Err(ChunkError::MissingChunk(id)) => assert_eq!(id, "fmt "),
            other => panic!("expected missing fmt chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_non_wave_form_is_rejected() {
        let mut container = RiffContainer::new(*b"AVI ");
        container.insert(RiffChunk::Format(FormatChunk::pcm(1, 44100, 16)));
        container.insert(RiffChunk::Data(DataChunk::new(vec![0; 8])));
        let bytes = container.encode().unwrap();

        assert!(matches!(
            add_loop_to_wave(&bytes, 0, 4),
            Err(ChunkError::BadMagic { .. })
        ));
    }
}
