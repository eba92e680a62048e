use crate::object::Source;
use crate::repo::Repo;
use eyre::Result;

pub fn run() -> Result<()> {
    let repo = Repo::discover();
    let hash = Source::tree(repo.root()).hash(&repo, true)?;

    println!("{hash}");

    Ok(())
}
