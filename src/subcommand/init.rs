use crate::repo::Repo;
use eyre::{Context, Result};

pub fn run() -> Result<()> {
    run_with_default_branch("main")
}

pub fn run_with_default_branch(default_branch: &str) -> Result<()> {
    let repo = Repo::discover();
    let already_existed = repo.git_dir().exists();

    repo.init(default_branch)
        .context("initialize .git directory")?;

    let pwd = repo.root().canonicalize()?;
    if already_existed {
        eprintln!("Git repository already exists in {}/.git", pwd.display());
    } else {
        eprintln!("Initialized Git repository in {}/.git", pwd.display());
    }

    Ok(())
}
