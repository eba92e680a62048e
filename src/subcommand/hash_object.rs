use crate::object::Source;
use crate::repo::Repo;
use eyre::Result;

pub fn run(write: bool, path: &str) -> Result<()> {
    let repo = Repo::discover();
    let hash = Source::blob(path).hash(&repo, write)?;

    println!("{hash}");

    Ok(())
}
