use std::fs;
use std::path::{Path, PathBuf};

use crate::triplet::Triplet;

/// Prefix of per-asset extraction directories inside the output directory.
pub const SCRATCH_PREFIX: &str = ".extract-";

/// `<output_dir>/<binary>-<triplet>[.exe]`
pub fn canonical_binary_path(output_dir: &Path, binary_name: &str, triplet: &Triplet) -> PathBuf {
    output_dir.join(triplet.binary_file_name(binary_name))
}

pub fn frontend_path(output_dir: &Path, frontend_dir: &str) -> PathBuf {
    output_dir.join(frontend_dir)
}

/// Create the output directory (0755 on Unix) if it is missing.
pub fn ensure_output_dir(output_dir: &Path) -> std::io::Result<()> {
    if output_dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(output_dir)?;

    #[cfg(not(target_os = "windows"))]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(output_dir, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
