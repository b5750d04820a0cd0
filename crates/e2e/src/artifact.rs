//! Screenshot artifact handling

use std::path::{Path, PathBuf};

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};

/// What was found at the screenshot path after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

/// Resolve a screenshot path against the working directory so the browser
/// writes where the caller expects.
pub fn absolute(path: &Path) -> E2eResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Make room for a fresh screenshot. Any earlier file is removed so a stale
/// capture can never pass verification.
pub fn prepare(path: &Path) -> E2eResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed previous screenshot {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Check the screenshot exists, is non-empty and decodes as an image
pub fn verify(path: &Path) -> E2eResult<ScreenshotReport> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(E2eError::Screenshot(format!("not written: {}", path.display())));
        }
        Err(e) => return Err(e.into()),
    };

    if data.is_empty() {
        return Err(E2eError::Screenshot(format!("empty file: {}", path.display())));
    }

    let img = image::load_from_memory(&data)?;
    let (width, height) = img.dimensions();

    let report = ScreenshotReport {
        path: path.to_path_buf(),
        bytes: data.len() as u64,
        width,
        height,
        sha256: hash_bytes(&data),
    };

    info!(
        "Screenshot {} ({}x{}, {} bytes)",
        report.path.display(),
        report.width,
        report.height,
        report.bytes
    );
    Ok(report)
}

fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_prepare_creates_parent_and_removes_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jules-scratch/verification/verification.png");

        prepare(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());

        write_png(&path, 4, 4);
        prepare(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_verify_reports_dimensions_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        write_png(&path, 8, 6);

        let report = verify(&path).unwrap();
        assert_eq!((report.width, report.height), (8, 6));
        assert!(report.bytes > 0);
        assert_eq!(report.sha256.len(), 64);
        assert_eq!(report.sha256, hash_bytes(&std::fs::read(&path).unwrap()));
    }

    #[test]
    fn test_verify_rejects_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        assert!(matches!(verify(&path), Err(E2eError::Screenshot(_))));

        std::fs::write(&path, b"").unwrap();
        assert!(matches!(verify(&path), Err(E2eError::Screenshot(_))));

        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(verify(&path), Err(E2eError::Image(_))));
    }

    #[test]
    fn test_repeated_capture_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");

        write_png(&path, 8, 8);
        let first = verify(&path).unwrap();

        prepare(&path).unwrap();
        write_png(&path, 16, 4);
        let second = verify(&path).unwrap();

        assert_ne!(first.sha256, second.sha256);
        assert_eq!((second.width, second.height), (16, 4));
    }

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(absolute(dir.path()).unwrap(), dir.path());
        assert!(absolute(Path::new("relative.png")).unwrap().is_absolute());
    }
}
