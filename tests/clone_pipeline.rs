//! End-to-end exercise of the packfile resolver, object store, and
//! working-tree checkout together, without any network involved: a
//! synthetic packfile containing a blob, a tree, and a commit is
//! resolved, written into a fresh repository, and checked out.

use mini_git::checkout;
use mini_git::object::{canonicalize, ObjectHash, ObjectStore, ObjectType};
use mini_git::pack;
use mini_git::repo::Repo;

fn deflate(bytes: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn entry_header(kind: u8, size: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut first = (kind << 4) | (size as u8 & 0x0F);
    let mut remaining = size >> 4;
    if remaining > 0 {
        first |= 0x80;
    }
    bytes.push(first);
    while remaining > 0 {
        let mut b = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining > 0 {
            b |= 0x80;
        }
        bytes.push(b);
    }
    bytes
}

#[test]
fn resolved_commit_checks_out_a_working_tree() {
    let blob_contents = b"hello from a packed blob\n".to_vec();
    let blob_canonical = canonicalize(ObjectType::Blob, &blob_contents);
    let blob_oid = ObjectHash::from_bytes(mini_git::hash::sha1(&blob_canonical));

    let mut tree_payload = Vec::new();
    tree_payload.extend_from_slice(b"100644 greeting.txt\0");
    tree_payload.extend_from_slice(blob_oid.as_bytes());
    let tree_canonical = canonicalize(ObjectType::Tree, &tree_payload);
    let tree_oid = ObjectHash::from_bytes(mini_git::hash::sha1(&tree_canonical));

    let commit_payload = format!(
        "tree {}\nauthor a <a@example.com> 0 +0000\ncommitter a <a@example.com> 0 +0000\n\ninitial\n",
        tree_oid
    )
    .into_bytes();

    let mut pack_bytes = Vec::new();
    pack_bytes.extend_from_slice(b"PACK");
    pack_bytes.extend_from_slice(&2u32.to_be_bytes());
    pack_bytes.extend_from_slice(&3u32.to_be_bytes());

    pack_bytes.extend(entry_header(3, blob_contents.len()));
    pack_bytes.extend(deflate(&blob_contents));

    pack_bytes.extend(entry_header(2, tree_payload.len()));
    pack_bytes.extend(deflate(&tree_payload));

    pack_bytes.extend(entry_header(1, commit_payload.len()));
    pack_bytes.extend(deflate(&commit_payload));

    pack_bytes.extend_from_slice(&[0u8; 20]);

    let resolved = pack::parse_and_resolve(&pack_bytes).expect("packfile resolves");
    assert_eq!(resolved.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    let repo = Repo::at(dir.path());
    repo.init("main").unwrap();
    let store = ObjectStore::new(&repo);

    let mut commit_oid = None;
    for object in &resolved {
        let canonical = canonicalize(object.kind, &object.payload);
        let oid = store.write(&canonical).unwrap();
        if object.kind == ObjectType::Commit {
            commit_oid = Some(oid);
        }
    }
    let commit_oid = commit_oid.expect("one commit in the synthetic pack");

    repo.write_ref("main", &commit_oid).unwrap();
    repo.set_head_to_branch("main").unwrap();

    checkout::checkout_commit(&repo, &commit_oid, repo.root()).unwrap();

    let checked_out = std::fs::read_to_string(dir.path().join("greeting.txt")).unwrap();
    assert_eq!(checked_out, "hello from a packed blob\n");
}

#[test]
fn offset_delta_and_ref_delta_resolve_to_the_same_cache() {
    let base = vec![b'x'; 2000];
    let base_canonical = canonicalize(ObjectType::Blob, &base);
    let base_oid = ObjectHash::from_bytes(mini_git::hash::sha1(&base_canonical));

    fn vlq(mut n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut b = (n & 0x7F) as u8;
            n >>= 7;
            if n > 0 {
                b |= 0x80;
            }
            out.push(b);
            if n == 0 {
                break;
            }
        }
        out
    }

    // delta: copy all 2000 bytes of base, unchanged
    let mut delta_stream = Vec::new();
    delta_stream.extend(vlq(base.len()));
    delta_stream.extend(vlq(base.len()));
    delta_stream.push(0b1001_0111); // offset byte0 + size byte0,1
    delta_stream.push(0); // offset = 0
    delta_stream.push((base.len() & 0xFF) as u8);
    delta_stream.push(((base.len() >> 8) & 0xFF) as u8);

    let mut pack_bytes = Vec::new();
    pack_bytes.extend_from_slice(b"PACK");
    pack_bytes.extend_from_slice(&2u32.to_be_bytes());
    pack_bytes.extend_from_slice(&2u32.to_be_bytes());

    let entry1_start = pack_bytes.len();
    pack_bytes.extend(entry_header(3, base.len()));
    pack_bytes.extend(deflate(&base));

    let entry2_start = pack_bytes.len();
    let offset_delta = entry2_start - entry1_start;

    fn encode_ofs_offset(mut offset: usize) -> Vec<u8> {
        let mut bytes = vec![(offset & 0x7F) as u8];
        offset >>= 7;
        while offset > 0 {
            offset -= 1;
            bytes.insert(0, 0x80 | (offset & 0x7F) as u8);
            offset >>= 7;
        }
        bytes
    }

    pack_bytes.extend(entry_header(6, delta_stream.len()));
    pack_bytes.extend(encode_ofs_offset(offset_delta));
    pack_bytes.extend(deflate(&delta_stream));

    pack_bytes.extend_from_slice(&[0u8; 20]);

    let resolved = pack::parse_and_resolve(&pack_bytes).expect("resolves OFS_DELTA");
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[1].payload, base);
    assert_eq!(resolved[0].oid, base_oid);
}
