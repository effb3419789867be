use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::Error;
use crate::pipeline::{FrameSink, FrameSource, StreamInfo};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Image files of a directory played back in file name order.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    info: StreamInfo,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(dir: P, fps: f64) -> Result<Self, Error> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|err| Error::SourceUnavailable(format!("{}: {}", dir.display(), err)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if is_frame_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        // an empty or unreadable first frame reports 0x0
        let (width, height) = match files.first() {
            Some(first) => image::image_dimensions(first).unwrap_or_else(|err| {
                log::warn!("cannot read {}: {}", first.display(), err);
                (0, 0)
            }),
            None => (0, 0),
        };

        log::info!("found {} frames in {}", files.len(), dir.display());

        Ok(Self {
            files,
            next: 0,
            info: StreamInfo { width, height, fps },
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    type Frame = RgbImage;

    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, Error> {
        let path = match self.files.get(self.next) {
            Some(path) => path,
            None => return Ok(None),
        };
        self.next += 1;

        Ok(Some(image::open(path)?.to_rgb8()))
    }

    fn release(&mut self) {
        self.next = self.files.len();
    }
}

/// Writes every frame as `frame_NNNNNN.png` into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    size: (u32, u32),
    written: u64,
}

impl ImageSequenceSink {
    pub fn create<P: AsRef<Path>>(dir: P, info: &StreamInfo) -> Result<Self, Error> {
        info.ensure_dimensions()?;

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        log::info!(
            "writing {}x{} frames to {}",
            info.width,
            info.height,
            dir.display()
        );

        Ok(Self {
            dir,
            size: (info.width, info.height),
            written: 0,
        })
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, idx: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", idx))
    }
}

impl FrameSink<RgbImage> for ImageSequenceSink {
    fn write(&mut self, frame: &RgbImage) -> Result<(), Error> {
        if frame.dimensions() != self.size {
            return Err(Error::InvalidDimensions {
                width: frame.width(),
                height: frame.height(),
            });
        }

        frame.save(self.frame_path(self.written))?;
        self.written += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), Error> {
        log::info!("saved {} frames to {}", self.written, self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frames(dir: &Path, names: &[&str]) {
        for (i, name) in names.iter().enumerate() {
            RgbImage::from_pixel(8, 6, Rgb([i as u8, 0, 0]))
                .save(dir.join(name))
                .unwrap();
        }
    }

    #[test]
    fn plays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), &["b.png", "a.png", "c.bmp"]);
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 25.0).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(
            source.info(),
            StreamInfo {
                width: 8,
                height: 6,
                fps: 25.0
            }
        );

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), &Rgb([1, 0, 0]));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageSequenceSource::open(dir.path().join("nope"), 30.0);
        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
    }

    #[test]
    fn empty_directory_reports_zero_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();

        assert!(source.is_empty());
        assert!(matches!(
            ImageSequenceSink::create(dir.path().join("out"), &source.info()),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn sink_numbers_frames() {
        let dir = tempfile::tempdir().unwrap();
        let info = StreamInfo {
            width: 4,
            height: 4,
            fps: 30.0,
        };
        let mut sink = ImageSequenceSink::create(dir.path().join("out"), &info).unwrap();

        sink.write(&RgbImage::new(4, 4)).unwrap();
        sink.write(&RgbImage::new(4, 4)).unwrap();
        assert!(sink.write(&RgbImage::new(5, 4)).is_err());
        sink.release().unwrap();

        assert_eq!(sink.written(), 2);
        assert!(dir.path().join("out/frame_000000.png").is_file());
        assert!(dir.path().join("out/frame_000001.png").is_file());
    }
}
