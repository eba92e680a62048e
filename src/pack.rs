//! Packfile parser and delta resolver (C6).
//!
//! A packfile is `PACK` + version(4) + object count(4), then that many
//! entries, then a trailing 20-byte SHA-1 checksum of everything before
//! it. Each entry carries a variable-length type+size header, an
//! optional delta base reference, and a zlib-deflated payload. Deltas
//! are resolved in two passes: the first scan decodes every entry and
//! hashes base objects as it goes; the second repeatedly resolves
//! deltas whose base has become available, until the queue drains or a
//! full pass makes no progress.

use crate::compress::inflate_at;
use crate::hash::sha1;
use crate::object::{canonicalize, ObjectHash, ObjectType};
use crate::error::{GitError, Result};
use std::collections::HashMap;

const MAGIC: &[u8; 4] = b"PACK";

/// A single resolved object produced by [`parse_and_resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedObject {
    pub offset_in_pack: usize,
    pub oid: ObjectHash,
    pub kind: ObjectType,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
enum BaseSelector {
    Ref(ObjectHash),
    Offset(usize),
}

#[derive(Debug)]
struct PendingDelta {
    offset_in_pack: usize,
    base: BaseSelector,
    instructions_source: Vec<u8>,
}

/// Parse a full packfile and resolve every delta, returning the
/// resolved objects ordered by `offset_in_pack` ascending regardless of
/// the order in which resolution actually occurred.
pub fn parse_and_resolve(pack: &[u8]) -> Result<Vec<ResolvedObject>> {
    if pack.len() < 4 + 4 + 4 + 20 || &pack[0..4] != MAGIC {
        return Err(GitError::CorruptPack("missing PACK magic".into()));
    }

    let _version = u32::from_be_bytes(pack[4..8].try_into().unwrap());
    let obj_count = u32::from_be_bytes(pack[8..12].try_into().unwrap()) as usize;

    let mut cursor = 12usize;
    let mut cache: HashMap<[u8; 20], (ObjectType, Vec<u8>)> = HashMap::new();
    let mut offset_to_oid: HashMap<usize, ObjectHash> = HashMap::new();
    let mut resolved: Vec<ResolvedObject> = Vec::with_capacity(obj_count);
    let mut queue: Vec<PendingDelta> = Vec::new();

    for _ in 0..obj_count {
        let offset_in_pack = cursor;
        let (kind_tag, declared_size, header_len) = decode_entry_header(pack, cursor)?;
        cursor += header_len;

        match kind_tag {
            1..=4 => {
                let obj_type = base_object_type(kind_tag)?;
                let (payload, consumed) = inflate_at(&pack[cursor..], declared_size)?;
                cursor += consumed;

                let canonical = canonicalize(obj_type, &payload);
                let oid = ObjectHash::from_bytes(sha1(&canonical));
                offset_to_oid.insert(offset_in_pack, oid.clone());
                cache.insert(*oid.as_bytes(), (obj_type, payload.clone()));
                resolved.push(ResolvedObject {
                    offset_in_pack,
                    oid,
                    kind: obj_type,
                    payload,
                });
            }

            6 => {
                let (offset_delta, vlq_len) = decode_negative_offset_vlq(pack, cursor)?;
                cursor += vlq_len;
                if offset_delta == 0 || offset_delta > offset_in_pack {
                    return Err(GitError::CorruptPack(
                        "OFS_DELTA base offset is non-positive".into(),
                    ));
                }
                let base_offset = offset_in_pack - offset_delta;

                let (delta_bytes, consumed) = inflate_at(&pack[cursor..], declared_size)?;
                cursor += consumed;

                queue.push(PendingDelta {
                    offset_in_pack,
                    base: BaseSelector::Offset(base_offset),
                    instructions_source: delta_bytes,
                });
            }

            7 => {
                if cursor + 20 > pack.len() {
                    return Err(GitError::CorruptPack("truncated REF_DELTA base oid".into()));
                }
                let mut raw = [0u8; 20];
                raw.copy_from_slice(&pack[cursor..cursor + 20]);
                cursor += 20;
                let base_oid = ObjectHash::from_bytes(raw);

                let (delta_bytes, consumed) = inflate_at(&pack[cursor..], declared_size)?;
                cursor += consumed;

                queue.push(PendingDelta {
                    offset_in_pack,
                    base: BaseSelector::Ref(base_oid),
                    instructions_source: delta_bytes,
                });
            }

            5 => return Err(GitError::CorruptPack("object kind 5 is reserved".into())),
            _ => unreachable!("decode_entry_header only yields 1..=7"),
        }
    }

    // Pass 2: resolve deltas whose base is available, looping until the
    // queue is empty or a full pass makes zero progress.
    while !queue.is_empty() {
        let before = queue.len();
        let mut still_pending = Vec::new();

        for pending in queue {
            let base = match &pending.base {
                BaseSelector::Ref(oid) => cache.get(oid.as_bytes()).cloned(),
                BaseSelector::Offset(off) => offset_to_oid
                    .get(off)
                    .and_then(|oid| cache.get(oid.as_bytes()).cloned()),
            };

            let Some((base_kind, base_payload)) = base else {
                still_pending.push(pending);
                continue;
            };

            let payload = apply_delta(&base_payload, &pending.instructions_source)?;
            let canonical = canonicalize(base_kind, &payload);
            let oid = ObjectHash::from_bytes(sha1(&canonical));

            offset_to_oid.insert(pending.offset_in_pack, oid.clone());
            cache.insert(*oid.as_bytes(), (base_kind, payload.clone()));
            resolved.push(ResolvedObject {
                offset_in_pack: pending.offset_in_pack,
                oid,
                kind: base_kind,
                payload,
            });
        }

        if still_pending.len() == before {
            return Err(GitError::UnresolvedDeltas(still_pending.len()));
        }

        queue = still_pending;
    }

    resolved.sort_by_key(|o| o.offset_in_pack);
    Ok(resolved)
}

fn base_object_type(tag: u8) -> Result<ObjectType> {
    Ok(match tag {
        1 => ObjectType::Commit,
        2 => ObjectType::Tree,
        3 => ObjectType::Blob,
        4 => ObjectType::Tag,
        other => {
            return Err(GitError::CorruptPack(format!(
                "unexpected base object kind {other}"
            )))
        }
    })
}

/// Decode the per-entry header at `pos`: returns `(kind, declared_size, bytes_consumed)`.
/// The low 4 bits of the first byte are the low 4 bits of the size;
/// continuation bytes (while `0x80` is set) each contribute 7 more bits,
/// the byte at index k shifted left by `4 + 7*(k-1)`.
fn decode_entry_header(pack: &[u8], pos: usize) -> Result<(u8, usize, usize)> {
    let mut i = pos;
    let first = *pack
        .get(i)
        .ok_or_else(|| GitError::CorruptPack("truncated entry header".into()))?;
    i += 1;

    let kind = (first >> 4) & 0x07;
    let mut size = (first & 0x0F) as usize;
    let mut shift = 4;
    let mut continues = first & 0x80 != 0;
    let mut k = 0usize;

    while continues {
        let byte = *pack
            .get(i)
            .ok_or_else(|| GitError::CorruptPack("truncated entry header".into()))?;
        i += 1;
        size |= ((byte & 0x7F) as usize) << shift;
        shift += 7;
        continues = byte & 0x80 != 0;
        k += 1;
        if k > 16 {
            return Err(GitError::CorruptPack("entry header VLQ too long".into()));
        }
    }

    Ok((kind, size, i - pos))
}

/// Decode the negative-offset VLQ used by OFS_DELTA:
/// `offset = b0 & 0x7F`, then for each continuation byte
/// `offset = ((offset + 1) << 7) | (b & 0x7F)`.
fn decode_negative_offset_vlq(pack: &[u8], pos: usize) -> Result<(usize, usize)> {
    let mut i = pos;
    let first = *pack
        .get(i)
        .ok_or_else(|| GitError::CorruptPack("truncated OFS_DELTA offset".into()))?;
    i += 1;
    let mut offset = (first & 0x7F) as usize;

    let mut continues = first & 0x80 != 0;
    while continues {
        let byte = *pack
            .get(i)
            .ok_or_else(|| GitError::CorruptPack("truncated OFS_DELTA offset".into()))?;
        i += 1;
        offset = ((offset + 1) << 7) | (byte & 0x7F) as usize;
        continues = byte & 0x80 != 0;
    }

    Ok((offset, i - pos))
}

/// Decode a generic delta-header VLQ: pure 7-bit chunks starting at
/// shift 0, distinct from both the entry-header and negative-offset
/// encodings above.
fn decode_generic_vlq(buf: &[u8], pos: usize) -> Result<(usize, usize)> {
    let mut i = pos;
    let mut value = 0usize;
    let mut shift = 0;
    loop {
        let byte = *buf
            .get(i)
            .ok_or_else(|| GitError::CorruptPack("truncated delta-header VLQ".into()))?;
        i += 1;
        value |= ((byte & 0x7F) as usize) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok((value, i - pos))
}

fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let (base_size, mut cursor) = decode_generic_vlq(delta, 0)?;
    if base_size != base.len() {
        return Err(GitError::CorruptPack(format!(
            "delta base size {base_size} does not match actual base length {}",
            base.len()
        )));
    }
    let (target_size, consumed) = decode_generic_vlq(delta, cursor)?;
    cursor += consumed;

    let mut out = Vec::with_capacity(target_size);

    while cursor < delta.len() {
        let control = delta[cursor];
        cursor += 1;

        if control & 0x80 != 0 {
            let mut offset: usize = 0;
            for bit in 0..4 {
                if control & (1 << bit) != 0 {
                    let byte = *delta
                        .get(cursor)
                        .ok_or_else(|| GitError::CorruptPack("truncated copy offset".into()))?;
                    offset |= (byte as usize) << (8 * bit);
                    cursor += 1;
                }
            }

            let mut size: usize = 0;
            for bit in 0..3 {
                if control & (1 << (4 + bit)) != 0 {
                    let byte = *delta
                        .get(cursor)
                        .ok_or_else(|| GitError::CorruptPack("truncated copy size".into()))?;
                    size |= (byte as usize) << (8 * bit);
                    cursor += 1;
                }
            }
            if size == 0 {
                size = 0x10000;
            }

            let end = offset
                .checked_add(size)
                .ok_or_else(|| GitError::CorruptPack("copy instruction overflow".into()))?;
            if end > base.len() {
                return Err(GitError::CorruptPack(
                    "copy instruction out of bounds of base object".into(),
                ));
            }
            out.extend_from_slice(&base[offset..end]);
        } else if control == 0 {
            return Err(GitError::CorruptPack("delta opcode 0x00 is reserved".into()));
        } else {
            let len = control as usize;
            let end = cursor + len;
            if end > delta.len() {
                return Err(GitError::CorruptPack("truncated add instruction".into()));
            }
            out.extend_from_slice(&delta[cursor..end]);
            cursor = end;
        }
    }

    if out.len() != target_size {
        return Err(GitError::CorruptPack(format!(
            "delta produced {} bytes, expected {target_size}",
            out.len()
        )));
    }

    Ok(out)
}
