use crate::runner::{Invocation, ToolRunner};
use crate::RuntimeError;
use kiln_schema::{NormalizedSource, Revision, SourceKind, AUTO_REVISION, LOCK_FILENAME};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A source tree checked out into the per-package source folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredSource {
    /// Folder the build runs in: the checkout joined with the recipe's subfolder.
    pub root: PathBuf,
    pub revision: Revision,
}

/// Pin `source.revision`.
///
/// `auto` becomes the commit checked out in `recipe_dir` for git sources, or a
/// blake3 digest of the tree for local sources. Anything else is already pinned.
pub fn resolve_revision(
    source: &NormalizedSource,
    recipe_dir: &Path,
    runner: &dyn ToolRunner,
) -> Result<Revision, RuntimeError> {
    if source.revision != AUTO_REVISION {
        return Ok(Revision::new(source.revision.clone()));
    }

    match source.kind {
        SourceKind::Git => {
            let output = runner.run_checked(
                &Invocation::new("git", recipe_dir).args(["rev-parse", "HEAD"]),
            )?;
            let commit = output.stdout.trim();
            if commit.is_empty() || !commit.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(RuntimeError::SourceFailed(format!(
                    "cannot pin revision: 'git rev-parse HEAD' returned '{commit}'"
                )));
            }
            debug!("resolved git revision {commit}");
            Ok(Revision::new(commit))
        }
        SourceKind::Local => {
            let tree = local_path(&source.url, recipe_dir);
            let digest = tree_digest(&tree)?;
            debug!("resolved local tree {} to {digest}", tree.display());
            Ok(Revision::new(digest))
        }
    }
}

/// Fetch the source tree at `revision` into `dest`.
pub fn acquire_source(
    source: &NormalizedSource,
    revision: &Revision,
    recipe_dir: &Path,
    dest: &Path,
    runner: &dyn ToolRunner,
) -> Result<AcquiredSource, RuntimeError> {
    if revision.as_str() == AUTO_REVISION || revision.is_empty() {
        return Err(RuntimeError::SourceFailed(
            "source revision must be pinned before acquisition".to_owned(),
        ));
    }
    fs::create_dir_all(dest)?;

    match source.kind {
        SourceKind::Git => {
            info!("cloning {} at {revision}", source.url);
            runner.run_checked(
                &Invocation::new("git", dest).args(["clone", source.url.as_str(), "."]),
            )?;
            runner.run_checked(
                &Invocation::new("git", dest).args(["checkout", revision.as_str()]),
            )?;
        }
        SourceKind::Local => {
            let tree = local_path(&source.url, recipe_dir);
            if !tree.is_dir() {
                return Err(RuntimeError::SourceFailed(format!(
                    "local source '{}' is not a directory",
                    tree.display()
                )));
            }
            let actual = tree_digest(&tree)?;
            if actual != revision.as_str() {
                return Err(RuntimeError::SourceFailed(format!(
                    "local source changed since it was pinned: expected {revision}, found {actual}"
                )));
            }
            info!("copying local source {}", tree.display());
            copy_tree(&tree, dest)?;
        }
    }

    let root = if source.subfolder.is_empty() {
        dest.to_path_buf()
    } else {
        dest.join(&source.subfolder)
    };
    if !root.is_dir() {
        return Err(RuntimeError::SourceFailed(format!(
            "source subfolder '{}' does not exist",
            source.subfolder
        )));
    }

    Ok(AcquiredSource {
        root,
        revision: revision.clone(),
    })
}

fn local_path(url: &str, recipe_dir: &Path) -> PathBuf {
    let path = Path::new(url);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        recipe_dir.join(path)
    }
}

/// Tree walks skip `.git` and a top-level `kiln.lock`, which is written after the digest.
fn skip_vcs(entry: &walkdir::DirEntry) -> bool {
    match entry.depth() {
        0 => true,
        1 => entry.file_name() != ".git" && entry.file_name() != LOCK_FILENAME,
        _ => entry.file_name() != ".git",
    }
}

/// Regular files and symlinks to files. A file symlink is staged as a copy of its target.
fn is_file_like(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Recursively copy `src` into `dest`, skipping `.git` and the lock file.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), RuntimeError> {
    for entry in WalkDir::new(src).into_iter().filter_entry(skip_vcs) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if is_file_like(&entry) {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        } else {
            debug!("skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(())
}

/// Content digest of a directory tree (relative paths and file bytes), ignoring `.git`.
pub fn tree_digest(root: &Path) -> Result<String, RuntimeError> {
    let mut hasher = blake3::Hasher::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(skip_vcs)
    {
        let entry = entry?;
        if !is_file_like(&entry) {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        hasher.update(rel.join("/").as_bytes());
        hasher.update(&[0]);
        hasher.update(&fs::read(entry.path())?);
        hasher.update(&[0]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{mock_commit, MockRunner};

    fn local_source(url: &str) -> NormalizedSource {
        NormalizedSource {
            kind: SourceKind::Local,
            url: url.to_owned(),
            revision: AUTO_REVISION.to_owned(),
            subfolder: String::new(),
        }
    }

    fn git_source() -> NormalizedSource {
        NormalizedSource {
            kind: SourceKind::Git,
            url: "https://github.com/jackdaimond/MichaQtUtilisLib.git".to_owned(),
            revision: AUTO_REVISION.to_owned(),
            subfolder: String::new(),
        }
    }

    fn sample_tree(dir: &Path) {
        fs::create_dir_all(dir.join("upstream/src")).unwrap();
        fs::create_dir_all(dir.join("upstream/.git")).unwrap();
        fs::write(dir.join("upstream/src/a.h"), "#pragma once\n").unwrap();
        fs::write(dir.join("upstream/.git/HEAD"), "ref: refs/heads/master\n").unwrap();
    }

    #[test]
    fn pinned_revision_is_returned_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = git_source();
        source.revision = "v0.2".to_owned();
        let runner = MockRunner::new();
        let rev = resolve_revision(&source, dir.path(), &runner).unwrap();
        assert_eq!(rev, "v0.2");
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn auto_git_revision_uses_rev_parse() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let rev = resolve_revision(&git_source(), dir.path(), &runner).unwrap();
        assert_eq!(rev.as_str(), mock_commit());
        assert_eq!(runner.invocations()[0].args, vec!["rev-parse", "HEAD"]);
    }

    #[test]
    fn auto_git_revision_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new().with_stdout("git", "fatal: not a git repository");
        assert!(resolve_revision(&git_source(), dir.path(), &runner).is_err());
    }

    #[test]
    fn local_revision_ignores_vcs_metadata() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let runner = MockRunner::new();
        let r1 = resolve_revision(&local_source("upstream"), dir.path(), &runner).unwrap();
        fs::write(dir.path().join("upstream/.git/HEAD"), "changed").unwrap();
        let r2 = resolve_revision(&local_source("upstream"), dir.path(), &runner).unwrap();
        assert_eq!(r1, r2);
        fs::write(dir.path().join("upstream/src/a.h"), "changed").unwrap();
        let r3 = resolve_revision(&local_source("upstream"), dir.path(), &runner).unwrap();
        assert_ne!(r1, r3);
    }

    #[test]
    fn local_revision_ignores_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let root = dir.path().join("upstream");
        let before = tree_digest(&root).unwrap();
        fs::write(root.join(LOCK_FILENAME), "lock_version = 1").unwrap();
        assert_eq!(tree_digest(&root).unwrap(), before);
    }

    #[test]
    fn local_acquire_copies_tree_without_git() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let dest = dir.path().join("work/source");
        let runner = MockRunner::new();
        let source = local_source("upstream");
        let rev = resolve_revision(&source, dir.path(), &runner).unwrap();

        let acquired = acquire_source(&source, &rev, dir.path(), &dest, &runner).unwrap();
        assert_eq!(acquired.root, dest);
        assert!(dest.join("src/a.h").exists());
        assert!(!dest.join(".git").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_survive_staging() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        std::os::unix::fs::symlink("a.h", dir.path().join("upstream/src/alias.h")).unwrap();
        let dest = dir.path().join("staged");

        copy_tree(&dir.path().join("upstream"), &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("src/alias.h")).unwrap(),
            "#pragma once\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn local_revision_covers_symlink_targets() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let root = dir.path().join("upstream");
        fs::write(root.join("libx.so.1"), "v1").unwrap();
        std::os::unix::fs::symlink("libx.so.1", root.join("libx.so")).unwrap();
        let before = tree_digest(&root).unwrap();
        fs::remove_file(root.join("libx.so")).unwrap();
        assert_ne!(tree_digest(&root).unwrap(), before);
    }

    #[test]
    fn local_acquire_detects_changed_tree() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let runner = MockRunner::new();
        let source = local_source("upstream");
        let rev = resolve_revision(&source, dir.path(), &runner).unwrap();
        fs::write(dir.path().join("upstream/src/b.h"), "new").unwrap();

        let dest = dir.path().join("work/source");
        assert!(matches!(
            acquire_source(&source, &rev, dir.path(), &dest, &runner),
            Err(RuntimeError::SourceFailed(_))
        ));
    }

    #[test]
    fn git_acquire_clones_then_checks_out() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let rev = Revision::new("0123abcd");
        acquire_source(&git_source(), &rev, dir.path(), &dir.path().join("src"), &runner)
            .unwrap();

        let calls = runner.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[0], "clone");
        assert_eq!(calls[1].args, vec!["checkout", "0123abcd"]);
    }

    #[test]
    fn acquire_refuses_unpinned_revision() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let rev = Revision::new(AUTO_REVISION);
        assert!(
            acquire_source(&git_source(), &rev, dir.path(), &dir.path().join("src"), &runner)
                .is_err()
        );
    }

    #[test]
    fn missing_subfolder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        sample_tree(dir.path());
        let runner = MockRunner::new();
        let mut source = local_source("upstream");
        source.subfolder = "nope".to_owned();
        let rev = resolve_revision(&source, dir.path(), &runner).unwrap();
        assert!(acquire_source(&source, &rev, dir.path(), &dir.path().join("w"), &runner).is_err());
    }
}
