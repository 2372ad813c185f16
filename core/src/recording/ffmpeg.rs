//! Motion-JPEG AVI through libavcodec/libavformat, enabled by the `ffmpeg` feature.

use crate::prelude::{RecorderError, RecorderResult};
use crate::recording::sink::{part_path, AviSummary, VideoFormat, VideoSink, WriteOutcome};
use ffmpeg::format::{self, Pixel};
use ffmpeg::software::scaling;
use ffmpeg::{codec, encoder, frame, Packet, Rational};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Room left for the muxer's headers and OpenDML reservations.
const HEADER_ALLOWANCE: u64 = 64 * 1024;
/// Chunk header plus one index entry per packet.
const PACKET_OVERHEAD: u64 = 8 + 16;

/// Maps JPEG quality 1..=100 onto the MJPEG quantizer range 31..=2.
fn qscale(quality: u8) -> i32 {
    let quality = i32::from(quality.clamp(1, 100));
    2 + (100 - quality) * 29 / 99
}

fn av_error(operation: &str, path: &Path, err: ffmpeg::Error) -> RecorderError {
    RecorderError::storage(format!("{} {}", operation, path.display()), err)
}

pub struct FfmpegWriter {
    final_path: PathBuf,
    part_path: PathBuf,
    octx: format::context::Output,
    encoder: encoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    time_base: Rational,
    format: VideoFormat,
    next_pts: i64,
    frames: u32,
    bytes: u64,
}

impl FfmpegWriter {
    pub fn create(path: &Path, format: VideoFormat) -> RecorderResult<Self> {
        if format.width == 0 || format.height == 0 || format.fps == 0 {
            return Err(RecorderError::InvalidInput(format!(
                "video geometry {}x{} @ {} fps",
                format.width, format.height, format.fps
            )));
        }
        ffmpeg::init().map_err(|err| RecorderError::storage("initializing ffmpeg", err))?;

        let part_path = part_path(path);
        match Self::open(path, &part_path, format) {
            Ok(writer) => Ok(writer),
            Err(err) => {
                let _ = fs::remove_file(&part_path);
                Err(err)
            }
        }
    }

    fn open(path: &Path, part_path: &Path, format: VideoFormat) -> RecorderResult<Self> {
        let VideoFormat {
            width, height, fps, quality, ..
        } = format;
        let mut octx = format::output_as(part_path, "avi")
            .map_err(|err| av_error("creating", part_path, err))?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let codec = encoder::find(codec::Id::MJPEG)
            .ok_or_else(|| RecorderError::Storage("no MJPEG encoder in libavcodec".to_string()))?;
        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|err| av_error("configuring encoder for", part_path, err))?;

        let time_base = Rational::new(1, fps as i32);
        video.set_width(width);
        video.set_height(height);
        video.set_format(Pixel::YUVJ420P);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(Rational::new(fps as i32, 1)));
        video.set_qmin(qscale(quality));
        video.set_qmax(qscale(quality));
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = video
            .open_as(codec)
            .map_err(|err| av_error("opening encoder for", part_path, err))?;

        let stream_index = {
            let mut stream = octx
                .add_stream(codec)
                .map_err(|err| av_error("adding stream to", part_path, err))?;
            stream.set_parameters(&encoder);
            stream.index()
        };
        octx.write_header()
            .map_err(|err| av_error("writing header of", part_path, err))?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUVJ420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|err| av_error("creating scaler for", part_path, err))?;

        Ok(Self {
            final_path: path.to_path_buf(),
            part_path: part_path.to_path_buf(),
            octx,
            encoder,
            scaler,
            stream_index,
            time_base,
            format,
            next_pts: 0,
            frames: 0,
            bytes: HEADER_ALLOWANCE,
        })
    }

    fn receive_packets(&mut self) -> Vec<Packet> {
        let mut packets = Vec::new();
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packets.push(packet);
            packet = Packet::empty();
        }
        packets
    }

    fn write_packets(&mut self, packets: Vec<Packet>) -> RecorderResult<()> {
        let stream_time_base = self
            .octx
            .stream(self.stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(self.time_base);
        for mut packet in packets {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, stream_time_base);
            packet
                .write_interleaved(&mut self.octx)
                .map_err(|err| av_error("appending to", &self.part_path, err))?;
        }
        Ok(())
    }

    fn to_frame(image: &RgbImage) -> frame::Video {
        let (width, height) = image.dimensions();
        let mut rgb = frame::Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let row = width as usize * 3;
        let plane = rgb.data_mut(0);
        for (y, src) in image.as_raw().chunks_exact(row).enumerate() {
            plane[y * stride..y * stride + row].copy_from_slice(src);
        }
        rgb
    }
}

impl VideoSink for FfmpegWriter {
    fn write_frame(&mut self, image: &RgbImage) -> RecorderResult<WriteOutcome> {
        if image.dimensions() != (self.format.width, self.format.height) {
            return Err(RecorderError::InvalidInput(format!(
                "frame {:?} does not match container {}x{}",
                image.dimensions(),
                self.format.width,
                self.format.height
            )));
        }

        let rgb = Self::to_frame(image);
        let mut yuv = frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .map_err(|err| av_error("converting frame for", &self.part_path, err))?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;
        self.encoder
            .send_frame(&yuv)
            .map_err(|err| av_error("encoding frame for", &self.part_path, err))?;

        let packets = self.receive_packets();
        let added: u64 = packets
            .iter()
            .map(|packet| packet.size() as u64 + PACKET_OVERHEAD)
            .sum();
        if self.bytes + added > self.format.max_bytes {
            return Ok(WriteOutcome::Full);
        }

        self.write_packets(packets)?;
        self.bytes += added;
        self.frames += 1;
        Ok(WriteOutcome::Written)
    }

    fn frames(&self) -> u32 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> RecorderResult<Option<AviSummary>> {
        if self.frames == 0 {
            self.discard();
            return Ok(None);
        }

        self.encoder
            .send_eof()
            .map_err(|err| av_error("flushing encoder for", &self.part_path, err))?;
        let packets = self.receive_packets();
        self.write_packets(packets)?;
        self.octx
            .write_trailer()
            .map_err(|err| av_error("finalizing", &self.part_path, err))?;

        let FfmpegWriter {
            final_path,
            part_path,
            octx,
            format,
            frames,
            ..
        } = *self;
        drop(octx);

        let shown = part_path.display().to_string();
        let bytes = fs::metadata(&part_path)
            .map_err(|err| RecorderError::storage(format!("reading {}", shown), err))?
            .len();
        fs::rename(&part_path, &final_path)
            .map_err(|err| RecorderError::storage(format!("renaming {} into place", shown), err))?;

        Ok(Some(AviSummary {
            path: final_path,
            frames,
            bytes,
            duration_secs: f64::from(frames) / f64::from(format.fps),
        }))
    }

    fn discard(self: Box<Self>) {
        let FfmpegWriter { octx, part_path, .. } = *self;
        drop(octx);
        let _ = fs::remove_file(&part_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_maps_onto_quantizer_range() {
        assert_eq!(qscale(100), 2);
        assert_eq!(qscale(1), 31);
        assert_eq!(qscale(0), 31);
        assert!(qscale(85) < qscale(50));
    }
}
