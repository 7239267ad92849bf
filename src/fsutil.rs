//! Filesystem helpers shared by the backup manager and the rollback ledger.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Recursively copy a directory tree.
///
/// Symlinks are recreated as symlinks (not followed); file permissions come
/// along with `fs::copy`. Returns the number of entries copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst)
        .with_context(|| format!("creating destination directory '{}'", dst.display()))?;

    let mut copied = 0u64;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry =
            entry.with_context(|| format!("walking source directory '{}'", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("resolving path relative to '{}'", src.display()))?;
        let target = dst.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("creating directory '{}'", target.display()))?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())
                .with_context(|| format!("reading symlink '{}'", entry.path().display()))?;
            std::os::unix::fs::symlink(&link, &target)
                .with_context(|| format!("recreating symlink '{}'", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory '{}'", parent.display()))?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "copying '{}' -> '{}'",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
        copied += 1;
    }

    Ok(copied)
}

/// Replace `dst` with a copy of `src`, removing whatever was at `dst` first.
///
/// Used when restoring a snapshot: the destination must end up byte-for-byte
/// identical to the snapshot, with no leftovers from the failed run.
pub fn replace_dir_with(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        fs::remove_dir_all(dst)
            .with_context(|| format!("removing directory '{}' before restore", dst.display()))?;
    }
    copy_dir_recursive(src, dst)?;
    Ok(())
}

/// Content digest of a directory tree: sha256 over sorted relative paths,
/// file bytes, and symlink targets. Stable across copies of the same tree.
pub fn dir_digest(dir: &Path) -> Result<String> {
    let mut entries: Vec<_> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("walking directory '{}'", dir.display()))?;
        entries.push(entry);
    }
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    let mut hasher = Sha256::new();
    for entry in entries {
        let rel = entry
            .path()
            .strip_prefix(dir)
            .with_context(|| format!("resolving path relative to '{}'", dir.display()))?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())
                .with_context(|| format!("reading symlink '{}'", entry.path().display()))?;
            hasher.update(b"l");
            hasher.update(link.to_string_lossy().as_bytes());
        } else if file_type.is_file() {
            let bytes = fs::read(entry.path())
                .with_context(|| format!("reading '{}'", entry.path().display()))?;
            hasher.update(b"f");
            hasher.update(&bytes);
        } else {
            hasher.update(b"d");
        }
        hasher.update([0u8]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_copy_dir_recursive_copies_tree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "a.txt", "alpha");
        write(src.path(), "sub/b.txt", "beta");

        let copied = copy_dir_recursive(src.path(), &dst.path().join("out")).unwrap();
        assert!(copied >= 3); // a.txt, sub, sub/b.txt
        assert_eq!(
            fs::read_to_string(dst.path().join("out/sub/b.txt")).unwrap(),
            "beta"
        );
    }

    #[test]
    fn test_copy_preserves_symlinks() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "real.txt", "data");
        std::os::unix::fs::symlink("real.txt", src.path().join("link")).unwrap();

        copy_dir_recursive(src.path(), &dst.path().join("out")).unwrap();
        let copied_link = dst.path().join("out/link");
        assert!(copied_link.is_symlink());
        assert_eq!(
            fs::read_link(&copied_link).unwrap(),
            Path::new("real.txt").to_path_buf()
        );
    }

    #[test]
    fn test_replace_dir_with_removes_leftovers() {
        let snapshot = TempDir::new().unwrap();
        let live = TempDir::new().unwrap();
        write(snapshot.path(), "keep.txt", "original");
        write(live.path(), "keep.txt", "modified");
        write(live.path(), "stray.txt", "left behind by failed run");

        replace_dir_with(snapshot.path(), live.path()).unwrap();
        assert_eq!(
            fs::read_to_string(live.path().join("keep.txt")).unwrap(),
            "original"
        );
        assert!(!live.path().join("stray.txt").exists());
    }

    #[test]
    fn test_dir_digest_stable_across_copies() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write(src.path(), "a.txt", "alpha");
        write(src.path(), "sub/b.txt", "beta");

        copy_dir_recursive(src.path(), &dst.path().join("copy")).unwrap();
        assert_eq!(
            dir_digest(src.path()).unwrap(),
            dir_digest(&dst.path().join("copy")).unwrap()
        );
    }

    #[test]
    fn test_dir_digest_detects_content_change() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "alpha");
        let before = dir_digest(dir.path()).unwrap();
        write(dir.path(), "a.txt", "changed");
        assert_ne!(before, dir_digest(dir.path()).unwrap());
    }
}
