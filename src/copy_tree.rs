use std::fs;
use std::path::Path;

/// Entries never copied into a fresh build container.
const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
    "dist",
    "build",
];

const SKIP_SUFFIXES: &[&str] = &[".o", ".obj", ".pyc", ".pyo", ".orig", ".rej"];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn copy_dir_with(src: &Path, dst: &Path, skip: &dyn Fn(&str) -> bool) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if skip(&name.to_string_lossy()) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_with(&src_path, &dst_path, skip)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // symlinks and special files are not part of an image
    }
    Ok(())
}

/// Copy an image tree into a container, leaving out VCS metadata and build output.
pub fn copy_dir_filtered(src: &Path, dst: &Path) -> std::io::Result<()> {
    copy_dir_with(src, dst, &should_skip)
}

/// Copy every regular file under `src`.
pub fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    copy_dir_with(src, dst, &|_| false)
}
