//! Motion-JPEG AVI writer built on `riff` chunks.
//!
//! Frames stream into `<name>.part` as `00dc` chunks. `finish` appends the
//! `idx1` index, rewrites the `hdrl` list with the final counts, patches the
//! two open list sizes and renames the file to its final name.

use crate::prelude::{RecorderError, RecorderResult};
use crate::recording::sink::{part_path, AviSummary, VideoFormat, VideoSink, WriteOutcome};
use crate::storage::jpeg::encode_jpeg;
use image::RgbImage;
use riff::{ChunkContents, ChunkId};
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER_LEN: u64 = 224;
const RIFF_SIZE_AT: u64 = 4;
const HDRL_AT: u64 = 12;
const MOVI_SIZE_AT: u64 = 216;
const MOVI_FOURCC_AT: u64 = 220;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

fn id(tag: &[u8; 4]) -> ChunkId {
    ChunkId { value: *tag }
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    frames: u32,
    largest_frame: u32,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u32,
    size: u32,
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn main_header(width: u32, height: u32, fps: u32, totals: Totals) -> Vec<u8> {
    let buffer = if totals.frames == 0 { 0 } else { totals.largest_frame + 8 };
    let mut h = Vec::with_capacity(56);
    put_u32(&mut h, 1_000_000 / fps);
    put_u32(&mut h, totals.largest_frame.saturating_mul(fps));
    put_u32(&mut h, 0);
    put_u32(&mut h, AVIF_HASINDEX);
    put_u32(&mut h, totals.frames);
    put_u32(&mut h, 0);
    put_u32(&mut h, 1);
    put_u32(&mut h, buffer);
    put_u32(&mut h, width);
    put_u32(&mut h, height);
    h.resize(56, 0);
    h
}

fn stream_header(width: u32, height: u32, fps: u32, totals: Totals) -> Vec<u8> {
    let buffer = if totals.frames == 0 { 0 } else { totals.largest_frame + 8 };
    let mut h = Vec::with_capacity(56);
    h.extend_from_slice(b"vids");
    h.extend_from_slice(b"MJPG");
    put_u32(&mut h, 0); // flags
    put_u16(&mut h, 0); // priority
    put_u16(&mut h, 0); // language
    put_u32(&mut h, 0); // initial frames
    put_u32(&mut h, 1); // scale
    put_u32(&mut h, fps); // rate
    put_u32(&mut h, 0); // start
    put_u32(&mut h, totals.frames);
    put_u32(&mut h, buffer);
    put_u32(&mut h, u32::MAX); // quality
    put_u32(&mut h, 0); // sample size
    put_u16(&mut h, 0);
    put_u16(&mut h, 0);
    put_u16(&mut h, width.min(u16::MAX as u32) as u16);
    put_u16(&mut h, height.min(u16::MAX as u32) as u16);
    h
}

fn stream_format(width: u32, height: u32) -> Vec<u8> {
    let mut f = Vec::with_capacity(40);
    put_u32(&mut f, 40);
    put_u32(&mut f, width);
    put_u32(&mut f, height);
    put_u16(&mut f, 1);
    put_u16(&mut f, 24);
    f.extend_from_slice(b"MJPG");
    put_u32(&mut f, width * height * 3);
    f.resize(40, 0);
    f
}

fn header_list(width: u32, height: u32, fps: u32, totals: Totals) -> ChunkContents {
    let strl = ChunkContents::Children(
        riff::LIST_ID.clone(),
        id(b"strl"),
        vec![
            ChunkContents::Data(id(b"strh"), stream_header(width, height, fps, totals)),
            ChunkContents::Data(id(b"strf"), stream_format(width, height)),
        ],
    );
    ChunkContents::Children(
        riff::LIST_ID.clone(),
        id(b"hdrl"),
        vec![
            ChunkContents::Data(id(b"avih"), main_header(width, height, fps, totals)),
            strl,
        ],
    )
}

/// Writes the `RIFF`/`AVI ` opener, the header list and an empty `movi` list.
fn write_preamble<W: Write + Seek>(out: &mut W, hdrl: &ChunkContents) -> io::Result<u64> {
    let opener = ChunkContents::Children(riff::RIFF_ID.clone(), id(b"AVI "), Vec::new());
    let movi = ChunkContents::Children(riff::LIST_ID.clone(), id(b"movi"), Vec::new());
    let mut written = opener.write(out)?;
    written += hdrl.write(out)?;
    written += movi.write(out)?;
    Ok(written)
}

pub struct AviWriter {
    final_path: PathBuf,
    part_path: PathBuf,
    out: BufWriter<File>,
    format: VideoFormat,
    position: u64,
    index: Vec<IndexEntry>,
    largest_frame: u32,
}

impl AviWriter {
    pub fn create(path: &Path, format: VideoFormat) -> RecorderResult<Self> {
        let VideoFormat {
            width, height, fps, ..
        } = format;
        if width == 0 || height == 0 || fps == 0 {
            return Err(RecorderError::InvalidInput(format!(
                "video geometry {}x{} @ {} fps",
                width, height, fps
            )));
        }

        let part_path = part_path(path);
        let shown = part_path.display().to_string();
        let file = File::create(&part_path)
            .map_err(|err| RecorderError::storage(format!("creating {}", shown), err))?;
        let mut out = BufWriter::new(file);
        let hdrl = header_list(width, height, fps, Totals::default());
        let position = write_preamble(&mut out, &hdrl)
            .map_err(|err| RecorderError::storage(format!("writing {}", shown), err))?;
        debug_assert_eq!(position, HEADER_LEN);

        Ok(Self {
            final_path: path.to_path_buf(),
            part_path,
            out,
            format,
            position,
            index: Vec::new(),
            largest_frame: 0,
        })
    }

    fn totals(&self) -> Totals {
        Totals {
            frames: self.index.len() as u32,
            largest_frame: self.largest_frame,
        }
    }

    fn patch(&mut self) -> io::Result<u64> {
        let movi_end = self.position;
        // Drop any bytes of a frame whose append failed part-way.
        self.out.seek(SeekFrom::Start(movi_end))?;
        self.out.get_ref().set_len(movi_end)?;

        let mut entries = Vec::with_capacity(16 * self.index.len());
        for entry in &self.index {
            entries.extend_from_slice(b"00dc");
            put_u32(&mut entries, AVIIF_KEYFRAME);
            put_u32(&mut entries, entry.offset);
            put_u32(&mut entries, entry.size);
        }
        let total = movi_end + ChunkContents::Data(id(b"idx1"), entries).write(&mut self.out)?;

        let VideoFormat {
            width, height, fps, ..
        } = self.format;
        self.out.seek(SeekFrom::Start(HDRL_AT))?;
        header_list(width, height, fps, self.totals()).write(&mut self.out)?;

        for (at, value) in [
            (RIFF_SIZE_AT, (total - 8) as u32),
            (MOVI_SIZE_AT, (movi_end - MOVI_FOURCC_AT) as u32),
        ] {
            self.out.seek(SeekFrom::Start(at))?;
            self.out.write_all(&value.to_le_bytes())?;
        }
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(total)
    }
}

impl VideoSink for AviWriter {
    /// Encodes and appends one frame; the image must match the container geometry.
    fn write_frame(&mut self, image: &RgbImage) -> RecorderResult<WriteOutcome> {
        if image.dimensions() != (self.format.width, self.format.height) {
            return Err(RecorderError::InvalidInput(format!(
                "frame {:?} does not match container {}x{}",
                image.dimensions(),
                self.format.width,
                self.format.height
            )));
        }

        let jpeg = encode_jpeg(image, self.format.quality)?;
        let size = jpeg.len() as u64;
        let padded = size + (size & 1);
        let projected = self.position + 8 + padded + 16 * (self.index.len() as u64 + 1) + 8;
        if projected > self.format.max_bytes {
            return Ok(WriteOutcome::Full);
        }

        let offset = (self.position - MOVI_FOURCC_AT) as u32;
        let written = ChunkContents::Data(id(b"00dc"), jpeg)
            .write(&mut self.out)
            .map_err(|err| {
                RecorderError::storage(format!("appending to {}", self.part_path.display()), err)
            })?;

        self.position += written;
        self.index.push(IndexEntry {
            offset,
            size: size as u32,
        });
        self.largest_frame = self.largest_frame.max(size as u32);
        Ok(WriteOutcome::Written)
    }

    fn frames(&self) -> u32 {
        self.index.len() as u32
    }

    fn finish(mut self: Box<Self>) -> RecorderResult<Option<AviSummary>> {
        if self.index.is_empty() {
            self.discard();
            return Ok(None);
        }

        let part_display = self.part_path.display().to_string();
        let frames = self.index.len() as u32;
        let total = self
            .patch()
            .map_err(|err| RecorderError::storage(format!("finalizing {}", part_display), err))?;

        fs::rename(&self.part_path, &self.final_path).map_err(|err| {
            RecorderError::storage(format!("renaming {} into place", part_display), err)
        })?;

        Ok(Some(AviSummary {
            path: self.final_path.clone(),
            frames,
            bytes: total,
            duration_secs: f64::from(frames) / f64::from(self.format.fps),
        }))
    }

    /// Drops the partial file without producing a container.
    fn discard(self: Box<Self>) {
        let AviWriter { out, part_path, .. } = *self;
        drop(out);
        let _ = fs::remove_file(&part_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::sink::MAX_CONTAINER_BYTES;
    use std::io::Cursor;

    fn read_u32(bytes: &[u8], at: u64) -> u32 {
        let at = at as usize;
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn gradient(width: u32, height: u32, shift: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x as u8).wrapping_add(shift), y as u8, 90])
        })
    }

    fn format(width: u32, height: u32, fps: u32) -> VideoFormat {
        VideoFormat {
            width,
            height,
            fps,
            quality: 80,
            max_bytes: MAX_CONTAINER_BYTES,
        }
    }

    fn create(path: &Path, format: VideoFormat) -> Box<AviWriter> {
        Box::new(AviWriter::create(path, format).unwrap())
    }

    #[test]
    fn preamble_layout_matches_patch_offsets() {
        let mut cursor = Cursor::new(Vec::new());
        let hdrl = header_list(320, 240, 25, Totals::default());
        assert_eq!(write_preamble(&mut cursor, &hdrl).unwrap(), HEADER_LEN);

        let header = cursor.into_inner();
        assert_eq!(header.len() as u64, HEADER_LEN);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"AVI ");
        assert_eq!(&header[12..16], b"LIST");
        assert_eq!(read_u32(&header, 16), 200);
        assert_eq!(&header[108..112], b"vids");
        assert_eq!(&header[112..116], b"MJPG");
        assert_eq!(&header[MOVI_FOURCC_AT as usize..HEADER_LEN as usize], b"movi");
        assert_eq!(read_u32(&header, 32), 40_000);
        assert_eq!(read_u32(&header, 132), 25);
    }

    #[test]
    fn finished_container_has_counts_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let mut writer = create(&path, format(32, 24, 5));
        for shift in 0..7 {
            let outcome = writer.write_frame(&gradient(32, 24, shift * 10)).unwrap();
            assert_eq!(outcome, WriteOutcome::Written);
        }
        assert!(!path.exists());

        let summary = writer.finish().unwrap().unwrap();
        assert_eq!(summary.frames, 7);
        assert!((summary.duration_secs - 1.4).abs() < 1e-9);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, summary.bytes);
        assert_eq!(read_u32(&bytes, RIFF_SIZE_AT) as usize, bytes.len() - 8);
        // avih total frames and strh length
        assert_eq!(read_u32(&bytes, 48), 7);
        assert_eq!(read_u32(&bytes, 140), 7);

        let movi_size = read_u32(&bytes, MOVI_SIZE_AT) as usize;
        let idx_at = MOVI_FOURCC_AT as usize + movi_size;
        assert_eq!(&bytes[idx_at..idx_at + 4], b"idx1");
        assert_eq!(read_u32(&bytes, idx_at as u64 + 4), 7 * 16);

        let first_offset = read_u32(&bytes, idx_at as u64 + 16) as usize;
        let chunk_at = MOVI_FOURCC_AT as usize + first_offset;
        assert_eq!(&bytes[chunk_at..chunk_at + 4], b"00dc");
        assert_eq!(&bytes[chunk_at + 8..chunk_at + 10], &[0xFF, 0xD8]);
        assert!(!dir.path().join("clip.avi.part").exists());
    }

    #[test]
    fn size_limit_refuses_frames_and_keeps_container_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capped.avi");
        let mut capped = format(16, 12, 10);
        capped.max_bytes = 2048;
        let mut writer = create(&path, capped);

        let mut written = 0;
        let outcome = loop {
            match writer.write_frame(&gradient(16, 12, written as u8)).unwrap() {
                WriteOutcome::Written => written += 1,
                WriteOutcome::Full => break WriteOutcome::Full,
            }
            assert!(written < 100);
        };
        assert_eq!(outcome, WriteOutcome::Full);
        assert!(written >= 1);
        assert_eq!(writer.frames(), written);

        let summary = writer.finish().unwrap().unwrap();
        assert_eq!(summary.frames, written);
        assert!(summary.bytes <= 2048);
        assert_eq!(fs::metadata(&path).unwrap().len(), summary.bytes);
    }

    #[test]
    fn empty_container_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let writer = create(&dir.path().join("empty.avi"), format(8, 8, 25));
        assert!(writer.finish().unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn mismatched_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = create(&dir.path().join("a.avi"), format(8, 8, 25));
        assert!(writer.write_frame(&gradient(4, 4, 0)).is_err());
        assert_eq!(writer.frames(), 0);
        writer.discard();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn create_in_missing_directory_fails_with_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AviWriter::create(&dir.path().join("nope/a.avi"), format(8, 8, 25));
        assert!(matches!(result, Err(RecorderError::Storage(_))));
    }
}
