use crate::object::{split_header, ObjectHash, ObjectStore, ObjectType};
use crate::repo::Repo;
use eyre::{Context, Result};
use std::io::Write as _;

pub fn run(pretty: bool, object_hash: &str) -> Result<()> {
    eyre::ensure!(pretty, "only pretty-printing is supported for now");

    let repo = Repo::discover();
    let store = ObjectStore::new(&repo);
    let oid = ObjectHash::from_hex(object_hash)?;
    let canonical = store.read(&oid).context("read object")?;
    let (obj_type, _, payload) = split_header(&canonical)?;

    match obj_type {
        ObjectType::Blob => {
            std::io::stdout()
                .write_all(payload)
                .context("write contents to stdout")
        }
        ObjectType::Tree => crate::subcommand::ls_tree::print_tree(&repo, false, payload),
        ObjectType::Commit => {
            std::io::stdout()
                .write_all(payload)
                .context("write contents to stdout")
        }
        ObjectType::Tag => eyre::bail!("tag objects are not supported"),
    }
}
