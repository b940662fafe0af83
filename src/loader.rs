use std::path::{Path, PathBuf};

use eframe::egui;
use image::imageops::FilterType;
use walkdir::WalkDir;

use crate::config::IMAGE_EXTENSIONS;
use crate::error::{AppError, Result};
use crate::events::{EventSink, UiEvent};

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Files directly inside `folder` with a supported extension, sorted by name.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(AppError::DirectoryScan(format!(
            "{} is not a directory",
            folder.display()
        )));
    }

    Ok(WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| is_supported_image(path))
        .collect())
}

/// Decode `path` and scale it to fit a `max_side` square, keeping the aspect ratio.
pub fn decode_scaled(path: &Path, max_side: u32) -> Result<egui::ColorImage> {
    let img = image::io::Reader::open(path)?.with_guessed_format()?.decode()?;

    let img = img.resize(max_side, max_side, FilterType::Triangle);
    let size = [img.width() as usize, img.height() as usize];
    let rgba = img.to_rgba8();
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

/// One-shot decode of a single file. Runs on a pool worker.
pub struct ImageLoadTask {
    pub path: PathBuf,
    pub generation: u64,
    pub max_side: u32,
    pub sink: EventSink,
}

impl ImageLoadTask {
    /// Delivers the bitmap on success. Unreadable or corrupt files are skipped.
    pub fn run(self) {
        match decode_scaled(&self.path, self.max_side) {
            Ok(image) => self.sink.send(UiEvent::ImageLoaded {
                generation: self.generation,
                image,
            }),
            Err(e) => log::debug!("skipping {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;

    pub(crate) fn write_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_image(Path::new("a.png")));
        assert!(is_supported_image(Path::new("b.JPG")));
        assert!(is_supported_image(Path::new("c.jpeg")));
        assert!(is_supported_image(Path::new("d.Bmp")));
        assert!(!is_supported_image(Path::new("e.gif")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn list_images_skips_unsupported_and_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("anim.gif"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.png"), b"x").unwrap();

        let names: Vec<_> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[test]
    fn list_images_on_missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_images(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, AppError::DirectoryScan(_)));
    }

    #[test]
    fn decode_scales_to_fit_preserving_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        write_png(&path, 800, 200);

        let image = decode_scaled(&path, 400).unwrap();
        assert_eq!(image.size, [400, 100]);
    }

    #[test]
    fn unreadable_file_is_an_image_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_scaled(&dir.path().join("missing.png"), 400).unwrap_err();
        assert!(matches!(err, AppError::ImageLoad(_)));

        let path = dir.path().join("garbage.jpg");
        fs::write(&path, b"not a jpeg").unwrap();
        assert!(matches!(decode_scaled(&path, 400), Err(AppError::ImageLoad(_))));
    }

    #[test]
    fn corrupt_file_delivers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();

        let (sink, rx) = EventSink::channel(None);
        ImageLoadTask { path, generation: 1, max_side: 400, sink }.run();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn good_file_delivers_tagged_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.bmp");
        write_png(&dir.path().join("tmp.png"), 20, 40);
        image::open(dir.path().join("tmp.png")).unwrap().save(&path).unwrap();

        let (sink, rx) = EventSink::channel(None);
        ImageLoadTask { path, generation: 7, max_side: 400, sink }.run();
        match rx.try_recv().unwrap() {
            UiEvent::ImageLoaded { generation, image } => {
                assert_eq!(generation, 7);
                assert_eq!(image.size, [200, 400]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
