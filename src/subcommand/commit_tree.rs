use crate::commit::Commit;
use crate::object::{ObjectHash, Source};
use crate::repo::Repo;
use eyre::Result;

pub fn run(tree_hash: String, parent_hashes: Vec<String>, message: String) -> Result<()> {
    let repo = Repo::discover();

    let tree = ObjectHash::from_hex(&tree_hash)?;
    let parents = parent_hashes
        .iter()
        .map(|s| ObjectHash::from_hex(s))
        .collect::<Result<Vec<_>, _>>()?;

    let commit = Commit::new(tree, parents, message);
    let hash = Source::commit(commit).hash(&repo, true)?;

    println!("{hash}");

    Ok(())
}
