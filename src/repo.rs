//! On-disk repository layout: `.git/HEAD`, `.git/refs/heads/*`, `.git/objects/<aa>/<...>`.

use crate::error::Result;
use crate::object::ObjectHash;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Repo {
    root: PathBuf,
}

impl Repo {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The repository rooted at the current working directory.
    pub fn discover() -> Self {
        Self::at(".")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> PathBuf {
        self.root.join(".git")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.git_dir().join("objects")
    }

    pub fn object_path(&self, oid: &ObjectHash) -> PathBuf {
        let hex = oid.as_hex();
        self.objects_dir().join(&hex[..2]).join(&hex[2..])
    }

    pub fn refs_heads_dir(&self) -> PathBuf {
        self.git_dir().join("refs").join("heads")
    }

    pub fn ref_path(&self, branch: &str) -> PathBuf {
        self.refs_heads_dir().join(branch)
    }

    pub fn head_path(&self) -> PathBuf {
        self.git_dir().join("HEAD")
    }

    /// Create `.git/{objects,refs}` and write `HEAD` pointing at
    /// `refs/heads/<default_branch>`. Idempotent: if `.git` already
    /// exists, this is a no-op that reports success to the caller,
    /// matching `git init`'s behavior on an existing repository.
    pub fn init(&self, default_branch: &str) -> Result<()> {
        if self.git_dir().exists() {
            return Ok(());
        }

        fs::create_dir_all(self.root())?;
        fs::create_dir(self.git_dir())?;
        fs::create_dir(self.objects_dir())?;
        fs::create_dir(self.git_dir().join("refs"))?;
        fs::write(
            self.head_path(),
            format!("ref: refs/heads/{default_branch}\n"),
        )?;

        Ok(())
    }

    pub fn write_ref(&self, branch: &str, oid: &ObjectHash) -> Result<()> {
        fs::create_dir_all(self.refs_heads_dir())?;
        fs::write(self.ref_path(branch), format!("{}\n", oid.as_hex()))?;
        Ok(())
    }

    pub fn set_head_to_branch(&self, branch: &str) -> Result<()> {
        fs::write(self.head_path(), format!("ref: refs/heads/{branch}\n"))?;
        Ok(())
    }
}

impl Default for Repo {
    fn default() -> Self {
        Self::discover()
    }
}
