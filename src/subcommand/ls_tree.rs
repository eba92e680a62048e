use crate::object::{split_header, ObjectHash, ObjectStore, ObjectType};
use crate::repo::Repo;
use crate::tree;
use eyre::{Context, Result};

pub fn run(name_only: bool, object_hash: &str) -> Result<()> {
    let repo = Repo::discover();
    let store = ObjectStore::new(&repo);
    let oid = ObjectHash::from_hex(object_hash)?;
    let canonical = store.read(&oid).context("read tree object")?;
    let (obj_type, _, payload) = split_header(&canonical)?;

    if obj_type != ObjectType::Tree {
        eyre::bail!("the object specified by the given hash isn't a tree object");
    }

    print_tree(&repo, name_only, payload)
}

pub(crate) fn print_tree(_repo: &Repo, name_only: bool, payload: &[u8]) -> Result<()> {
    for entry in tree::parse(payload)? {
        if !name_only {
            print!(
                "{:0>6} {} {}\t",
                entry.mode,
                entry.object_type(),
                entry.oid
            );
        }
        println!("{}", entry.name_lossy());
    }

    Ok(())
}
