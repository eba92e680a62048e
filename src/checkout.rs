//! Working-tree materialization: walk a commit's tree and write it to disk.

use crate::commit::Commit;
use crate::object::{split_header, ObjectMode, ObjectStore, ObjectType};
use crate::repo::Repo;
use crate::error::{GitError, Result};
use crate::tree;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Read the commit at `commit_oid`, extract its root tree, and
/// recursively materialize it under `dest`. `dest` must already exist.
pub fn checkout_commit(
    repo: &Repo,
    commit_oid: &crate::object::ObjectHash,
    dest: &Path,
) -> Result<()> {
    let store = ObjectStore::new(repo);
    let canonical = store.read(commit_oid)?;
    let (obj_type, _, payload) = split_header(&canonical)?;
    if obj_type != ObjectType::Commit {
        return Err(GitError::Malformed {
            what: "checkout target",
            detail: format!("{commit_oid} is a {obj_type}, not a commit"),
        });
    }
    let commit = Commit::parse(payload)?;
    checkout_tree(repo, &commit.tree, dest)
}

fn checkout_tree(repo: &Repo, tree_oid: &crate::object::ObjectHash, dest: &Path) -> Result<()> {
    let store = ObjectStore::new(repo);
    let canonical = store.read(tree_oid)?;
    let (obj_type, _, payload) = split_header(&canonical)?;
    if obj_type != ObjectType::Tree {
        return Err(GitError::Malformed {
            what: "checkout target",
            detail: format!("{tree_oid} is a {obj_type}, not a tree"),
        });
    }

    for entry in tree::parse(payload)? {
        let entry_path = dest.join(entry.name_lossy().as_ref());

        match entry.mode {
            ObjectMode::Directory => {
                fs::create_dir(&entry_path)?;
                checkout_tree(repo, &entry.oid, &entry_path)?;
            }
            ObjectMode::Normal | ObjectMode::Executable => {
                let canonical = store.read(&entry.oid)?;
                let (_, _, blob) = split_header(&canonical)?;
                fs::write(&entry_path, blob)?;
                if entry.mode == ObjectMode::Executable {
                    let mut perms = fs::metadata(&entry_path)?.permissions();
                    perms.set_mode(0o755);
                    fs::set_permissions(&entry_path, perms)?;
                }
            }
            ObjectMode::Symlink => {
                tracing::warn!(
                    path = %entry_path.display(),
                    "skipping symlink entry during checkout",
                );
            }
        }
    }

    Ok(())
}
