use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::debug;
use tar::Archive;
use walkdir::WalkDir;
use zip::read::ZipArchive;

use crate::error::{PipelineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else {
            None
        }
    }
}

/// Expand `archive_path` into `dest` and return the number of entries written.
///
/// `dest` must already exist. Entries that would land outside `dest` are
/// skipped and not counted.
pub fn extract(archive_path: &Path, kind: ArchiveKind, dest: &Path) -> Result<usize> {
    debug!("extract: {} as {:?}", archive_path.display(), kind);
    match kind {
        ArchiveKind::TarGz => extract_targz(archive_path, dest),
        ArchiveKind::Zip => extract_zip(archive_path, dest),
    }
}

fn extract_targz(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive_path)
        .map_err(|e| PipelineError::io_at("tar.gz open error", archive_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let corrupt = |e: io::Error| PipelineError::extract(archive_path, format!("tar.gz error: {e}"));

    let mut count = 0;
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if entry.unpack_in(dest).map_err(corrupt)? {
            count += 1;
        }
    }
    Ok(count)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = fs::File::open(archive_path)
        .map_err(|e| PipelineError::io_at("zip open error", archive_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| PipelineError::extract(archive_path, format!("zip parse error: {e}")))?;

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| PipelineError::extract(archive_path, format!("zip entry error: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            debug!("extract: skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| PipelineError::io_at("zip dir create error", &out_path, e))?;
            count += 1;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io_at("zip parent dir error", parent, e))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .map_err(|e| PipelineError::io_at("zip create file error", &out_path, e))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| PipelineError::extract(archive_path, format!("zip write error: {e}")))?;

        #[cfg(not(target_os = "windows"))]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode));
            }
        }
        count += 1;
    }
    Ok(count)
}

/// Find a regular file named `file_name` anywhere under `root`, preferring
/// the shallowest match.
#[must_use]
pub fn find_file(root: &Path, file_name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .min_by_key(walkdir::DirEntry::depth)
        .map(walkdir::DirEntry::into_path)
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;

    #[test]
    fn recognizes_archive_extensions() {
        assert_eq!(
            ArchiveKind::from_file_name("memos-linux-x86_64.tar.gz"),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(ArchiveKind::from_file_name("memos.tgz"), Some(ArchiveKind::TarGz));
        assert_eq!(
            ArchiveKind::from_file_name("memos-windows-x86_64.zip"),
            Some(ArchiveKind::Zip)
        );
        assert_eq!(ArchiveKind::from_file_name("memos.7z"), None);
    }

    #[test]
    fn extracts_tarball_and_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("memos.tar.gz");
        fs::write(
            &archive,
            fixtures::tar_gz(&[("memos", "elf"), ("dist/index.html", "<html>")]),
        )
        .unwrap();
        let dest = dir.path().join("out");
        fs::create_dir(&dest).unwrap();

        let count = extract(&archive, ArchiveKind::TarGz, &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read(dest.join("memos")).unwrap(), b"elf");
        assert_eq!(fs::read(dest.join("dist/index.html")).unwrap(), b"<html>");
    }

    #[test]
    fn extracts_zip_and_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("memos.zip");
        fs::write(
            &archive,
            fixtures::zip(&[("memos.exe", "MZ"), ("README.md", "hi")]),
        )
        .unwrap();
        let dest = dir.path().join("out");
        fs::create_dir(&dest).unwrap();

        let count = extract(&archive, ArchiveKind::Zip, &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read(dest.join("memos.exe")).unwrap(), b"MZ");
    }

    #[test]
    fn corrupt_archives_are_extract_errors() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        fs::create_dir(&dest).unwrap();

        let tarball = dir.path().join("broken.tar.gz");
        fs::write(&tarball, b"definitely not gzip").unwrap();
        assert!(matches!(
            extract(&tarball, ArchiveKind::TarGz, &dest),
            Err(PipelineError::Extract { .. })
        ));

        let zipped = dir.path().join("broken.zip");
        fs::write(&zipped, b"definitely not zip").unwrap();
        assert!(matches!(
            extract(&zipped, ArchiveKind::Zip, &dest),
            Err(PipelineError::Extract { .. })
        ));
    }

    #[test]
    fn finds_shallowest_binary() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/memos"), b"deep").unwrap();
        fs::write(dir.path().join("a/memos"), b"shallow").unwrap();
        fs::create_dir_all(dir.path().join("memos.d")).unwrap();

        let found = find_file(dir.path(), "memos").unwrap();
        assert_eq!(found, dir.path().join("a/memos"));
        assert!(find_file(dir.path(), "memos.exe").is_none());
    }
}
