pub mod photo_writer {
    use crate::error::PhotoError;
    use chrono::{Local, NaiveDateTime};
    use image::{ImageEncoder, RgbImage};
    use std::path::{Path, PathBuf};
    use tracing::info;

    const JPEG_QUALITY: u8 = 95;

    /// Receives frames handed over by a `Capture` trigger.
    pub trait PhotoSink {
        /// Persists one frame and returns where it went.
        fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, PhotoError>;
    }

    /// `photo_<YYYYMMDD_HHMMSS>` for a timestamp.
    pub fn photo_stem(timestamp: NaiveDateTime) -> String {
        format!("photo_{}", timestamp.format("%Y%m%d_%H%M%S"))
    }

    /// First free `<stem>.jpg`, `<stem>_1.jpg`, `<stem>_2.jpg`, ... in `dir`.
    fn unused_path(dir: &Path, stem: &str) -> PathBuf {
        let mut candidate = dir.join(format!("{stem}.jpg"));
        let mut suffix = 0u64;
        while candidate.exists() {
            suffix += 1;
            candidate = dir.join(format!("{stem}_{suffix}.jpg"));
        }
        candidate
    }

    /// Writes JPEG files named after the local time into one directory.
    pub struct JpegPhotoWriter {
        output_dir: PathBuf,
    }

    impl JpegPhotoWriter {
        pub fn new(output_dir: impl Into<PathBuf>) -> Self {
            Self {
                output_dir: output_dir.into(),
            }
        }

        pub fn output_dir(&self) -> &Path {
            &self.output_dir
        }

        /// Saves `frame` as if it were captured at `timestamp`.
        ///
        /// The JPEG is encoded in memory, written next to its destination and
        /// renamed into place, so a photo on disk is always complete.
        pub fn save_at(&self, frame: &RgbImage, timestamp: NaiveDateTime) -> Result<PathBuf, PhotoError> {
            std::fs::create_dir_all(&self.output_dir).map_err(|source| PhotoError::OutputDir {
                path: self.output_dir.clone(),
                source,
            })?;

            let mut encoded = Vec::new();
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
            encoder.write_image(frame.as_raw(), frame.width(), frame.height(), image::ExtendedColorType::Rgb8)?;

            let path = unused_path(&self.output_dir, &photo_stem(timestamp));
            let partial = path.with_extension("jpg.part");
            let write_err = |source| PhotoError::Write {
                path: path.clone(),
                source,
            };
            std::fs::write(&partial, &encoded).map_err(write_err)?;
            std::fs::rename(&partial, &path).map_err(write_err)?;

            info!(path = %path.display(), bytes = encoded.len(), "photo saved");
            Ok(path)
        }
    }

    impl PhotoSink for JpegPhotoWriter {
        fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, PhotoError> {
            self.save_at(frame, Local::now().naive_local())
        }
    }
}

#[cfg(test)]
mod tests {

    use super::photo_writer::*;
    use chrono::NaiveDate;
    use image::{Rgb, RgbImage};

    fn noon() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(12, 4, 5))
            .expect("valid timestamp")
    }

    #[test]
    fn stem_uses_second_resolution() {
        assert_eq!(photo_stem(noon()), "photo_20240309_120405");
    }

    #[test]
    fn creates_missing_directory_and_writes_jpeg() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("nested").join("photos");
        let writer = JpegPhotoWriter::new(&dir);
        let frame = RgbImage::from_pixel(64, 48, Rgb([200, 10, 10]));

        let path = writer.save_at(&frame, noon()).expect("Error Saving File.");
        assert_eq!(path, dir.join("photo_20240309_120405.jpg"));

        let decoded = image::open(&path).expect("readable jpeg").to_rgb8();
        assert_eq!(decoded.dimensions(), (64, 48));
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn same_second_captures_do_not_overwrite() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let writer = JpegPhotoWriter::new(tmp.path());
        let frame = RgbImage::new(8, 8);

        let first = writer.save_at(&frame, noon()).unwrap();
        let second = writer.save_at(&frame, noon()).unwrap();
        let third = writer.save_at(&frame, noon()).unwrap();

        assert_eq!(first.file_name().unwrap(), "photo_20240309_120405.jpg");
        assert_eq!(second.file_name().unwrap(), "photo_20240309_120405_1.jpg");
        assert_eq!(third.file_name().unwrap(), "photo_20240309_120405_2.jpg");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 3);
    }

    #[test]
    fn existing_directory_is_reused() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let writer = JpegPhotoWriter::new(tmp.path());
        writer.save_at(&RgbImage::new(4, 4), noon()).unwrap();
        assert_eq!(writer.output_dir(), tmp.path());
    }
}
