//! Content-addressed PNG persistence.
//!
//! A banner is first written to a hidden temp file in the output directory and
//! then renamed into place, so readers never see a partial file. Identical PNG
//! bytes map to the same file name.

use crate::raster::RasterOutput;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const HASH_PREFIX_LEN: usize = 16;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBanner {
    pub file_name: String,
    pub path: PathBuf,
    /// `<url_prefix>/<file_name>`.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct BannerStore {
    dir: PathBuf,
    url_prefix: String,
}

impl BannerStore {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Self {
            dir: dir.into(),
            url_prefix,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn persist(&self, output: &RasterOutput) -> io::Result<StoredBanner> {
        fs::create_dir_all(&self.dir)?;
        let file_name = banner_file_name(&output.png);
        let path = self.dir.join(&file_name);
        let temp = self.dir.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(err) = write_then_rename(&temp, &path, &output.png) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }
        log::debug!("stored {} ({} bytes)", path.display(), output.png.len());
        let url = format!("{}/{}", self.url_prefix, file_name);
        let path = fs::canonicalize(&path).unwrap_or(path);
        Ok(StoredBanner {
            file_name,
            path,
            url,
        })
    }
}

fn write_then_rename(temp: &Path, dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, dest)
}

/// `banner_<16 hex chars of sha256>.png`.
pub fn banner_file_name(png: &[u8]) -> String {
    let digest = Sha256::digest(png);
    let hex = hex::encode(digest);
    format!("banner_{}.png", &hex[..HASH_PREFIX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(bytes: &[u8]) -> RasterOutput {
        RasterOutput {
            png: bytes.to_vec(),
            width: 1,
            height: 1,
            draw_ops: 1,
        }
    }

    #[test]
    fn file_name_is_content_hash() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(banner_file_name(b"abc"), "banner_ba7816bf8f01cfea.png");
        assert_ne!(banner_file_name(b"abc"), banner_file_name(b"abd"));
    }

    #[test]
    fn persist_writes_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = BannerStore::new(dir.path().join("banners"), "/banners/");
        let stored = store.persist(&output(b"png-bytes")).unwrap();
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"png-bytes");
        assert_eq!(stored.url, format!("/banners/{}", stored.file_name));
        let names: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![stored.file_name.clone()]);
    }

    #[test]
    fn identical_output_reuses_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = BannerStore::new(dir.path(), "/banners");
        let a = store.persist(&output(b"same")).unwrap();
        let b = store.persist(&output(b"same")).unwrap();
        assert_eq!(a, b);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unwritable_dir_fails_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let store = BannerStore::new(&blocker, "/banners");
        assert!(store.persist(&output(b"data")).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
