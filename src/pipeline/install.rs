use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::archive::{self, ArchiveKind};
use crate::env;
use crate::error::{PipelineError, Result};
use crate::triplet::Triplet;

/// One verified archive waiting to be unpacked into its canonical binary.
#[derive(Debug, Clone)]
pub struct InstallJob {
    pub asset_name: String,
    pub archive: PathBuf,
    pub output_dir: PathBuf,
    pub binary_name: String,
    pub frontend_dir: String,
}

/// Unpack `job.archive` into a fresh scratch directory and move the platform
/// binary to its canonical path.
///
/// The scratch directory and the archive are removed on every path out of
/// this function. Blocking; call it from `spawn_blocking`.
pub fn install(job: &InstallJob) -> Result<PathBuf> {
    let outcome = tempfile::Builder::new()
        .prefix(env::SCRATCH_PREFIX)
        .tempdir_in(&job.output_dir)
        .map_err(|e| PipelineError::io_at("failed to create scratch dir in", &job.output_dir, e))
        .and_then(|scratch| {
            let placed = place_binary(job, scratch.path());
            let discarded = discard_scratch(scratch);
            placed.and_then(|dest| discarded.map(|()| dest))
        });

    if let Err(err) = fs::remove_file(&job.archive) {
        warn!(
            "extract: failed to remove archive {}: {err}",
            job.archive.display()
        );
    }
    outcome
}

fn place_binary(job: &InstallJob, scratch: &Path) -> Result<PathBuf> {
    let kind = ArchiveKind::from_file_name(&job.asset_name)
        .ok_or_else(|| PipelineError::extract(&job.archive, "unsupported archive format"))?;
    let entries = archive::extract(&job.archive, kind, scratch)?;
    info!("extract: [OK] {} extracted {entries} files", job.asset_name);

    let triplet = Triplet::from_file_name(&job.asset_name);
    let file_name = format!("{}{}", job.binary_name, triplet.exe_suffix());
    let found = archive::find_file(scratch, &file_name).ok_or_else(|| {
        PipelineError::extract(&job.archive, format!("{file_name} not found in archive"))
    })?;

    let dest = env::canonical_binary_path(&job.output_dir, &job.binary_name, &triplet);
    fs::rename(&found, &dest)
        .map_err(|e| PipelineError::io_at("failed to move binary to", &dest, e))?;
    if !triplet.is_windows() {
        make_executable(&dest)?;
    }
    debug!("extract: {} -> {}", job.asset_name, dest.display());

    promote_frontend(
        &scratch.join(&job.frontend_dir),
        &env::frontend_path(&job.output_dir, &job.frontend_dir),
    )?;
    Ok(dest)
}

/// Move a bundled front-end out of the scratch tree. The payload is the
/// same in every platform archive of a release, so the first task to get
/// here wins and later ones leave theirs behind.
fn promote_frontend(bundled: &Path, target: &Path) -> Result<()> {
    if !bundled.is_dir() {
        return Ok(());
    }
    if target.exists() {
        debug!("extract: front-end already present at {}", target.display());
        return Ok(());
    }
    match fs::rename(bundled, target) {
        Ok(()) => {
            info!("extract: front-end moved to {}", target.display());
            Ok(())
        }
        Err(_) if target.exists() => {
            debug!("extract: front-end placed concurrently at {}", target.display());
            Ok(())
        }
        Err(e) => Err(PipelineError::io_at("failed to move front-end to", target, e)),
    }
}

fn discard_scratch(scratch: TempDir) -> Result<()> {
    let path = scratch.path().to_path_buf();
    make_tree_writable(&path);
    scratch.close().map_err(|e| {
        warn!("extract: failed to remove scratch dir {}: {e}", path.display());
        PipelineError::io_at("failed to remove scratch dir", &path, e)
    })
}

/// Archives may carry read-only directory modes, which block removal of
/// their contents.
#[cfg(not(target_os = "windows"))]
fn make_tree_writable(root: &Path) {
    use std::os::unix::fs::PermissionsExt;
    // Directories are yielded before their contents are read, so a
    // directory without read or search bits is fixed before descending.
    for entry in WalkDir::new(root).into_iter().flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let mode = meta.permissions().mode();
        if mode & 0o700 != 0o700 {
            let _ = fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode | 0o700));
        }
    }
}

#[cfg(target_os = "windows")]
fn make_tree_writable(root: &Path) {
    for entry in WalkDir::new(root).into_iter().flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        let mut perms = meta.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            let _ = fs::set_permissions(entry.path(), perms);
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| PipelineError::io_at("failed to chmod", path, e))
}

#[cfg(target_os = "windows")]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
