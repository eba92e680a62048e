//! Pkt-line framing and side-band demultiplexing (C5).
//!
//! A pkt-line is a 4-character ASCII hex length prefix followed by
//! `length - 4` payload bytes. `0000` is a flush packet; `0001` is a
//! delimiter packet, treated the same as flush for our purposes here.
//! `0002`/`0003` are reserved and treated as an empty data frame.

use crate::error::{GitError, Result};
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Flush,
    Data(Vec<u8>),
}

/// Encode a single pkt-line. An empty payload becomes a flush packet.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    if payload.is_empty() {
        return flush();
    }
    let mut out = format!("{:04x}", payload.len() + 4).into_bytes();
    out.extend_from_slice(payload);
    out
}

pub fn flush() -> Vec<u8> {
    b"0000".to_vec()
}

/// Decodes a pkt-line stream lazily from any [`Read`]r. The stream is
/// considered ended, not erroring, if the reader runs out of bytes
/// mid-frame — this tolerates a connection truncated right at EOF.
pub struct Decoder<R> {
    inner: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read the next frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut len_buf = [0u8; 4];
        if !fill_or_eof(&mut self.inner, &mut len_buf)? {
            return Ok(None);
        }

        let len_str = std::str::from_utf8(&len_buf).map_err(|_| GitError::Malformed {
            what: "pkt-line length",
            detail: "not ASCII".into(),
        })?;
        let len = usize::from_str_radix(len_str, 16).map_err(|_| GitError::Malformed {
            what: "pkt-line length",
            detail: format!("{len_str:?} is not hex"),
        })?;

        match len {
            0 | 1 => Ok(Some(Frame::Flush)),
            2 | 3 => Ok(Some(Frame::Data(Vec::new()))),
            n => {
                let mut payload = vec![0u8; n - 4];
                if !fill_or_eof(&mut self.inner, &mut payload)? {
                    return Ok(None);
                }
                Ok(Some(Frame::Data(payload)))
            }
        }
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}

/// Fills `buf` completely, returning `Ok(false)` if the reader hit EOF
/// (whether at the very start of `buf` or partway through it) instead
/// of erroring, per the stream's truncation-tolerant contract.
fn fill_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

/// Demultiplex a side-band stream. Band 1 bytes accumulate into the
/// returned packfile buffer; band 2 bytes are handed to `progress`;
/// band 3 aborts immediately with [`GitError::RemoteError`].
pub fn demux_side_band(
    frames: impl Iterator<Item = Result<Frame>>,
    mut progress: impl FnMut(&str),
) -> Result<Vec<u8>> {
    let mut packfile = Vec::new();

    for frame in frames {
        match frame? {
            Frame::Flush => continue,
            Frame::Data(bytes) => {
                let Some((&band, rest)) = bytes.split_first() else {
                    continue;
                };
                match band {
                    1 => packfile.extend_from_slice(rest),
                    2 => progress(&String::from_utf8_lossy(rest)),
                    3 => {
                        return Err(GitError::RemoteError(
                            String::from_utf8_lossy(rest).into_owned(),
                        ))
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(packfile)
}

/// One advertised ref from the discovery response.
#[derive(Debug, Clone)]
pub struct DiscoveredRef {
    pub name: String,
    pub oid: crate::object::ObjectHash,
}

/// Parse a ref-discovery pkt-line stream: skip the service announcement
/// packet, then parse `<hex-oid> <refname>[\0capabilities]` from every
/// subsequent data frame. Returns the refs (in stream order) and the
/// capability tokens advertised on the first ref line.
pub fn parse_ref_discovery<R: Read>(reader: R) -> Result<(Vec<DiscoveredRef>, Vec<String>)> {
    let mut decoder = Decoder::new(reader);
    let mut refs = Vec::new();
    let mut capabilities = Vec::new();
    let mut skipped_announcement = false;
    let mut seen_first_ref = false;

    while let Some(frame) = decoder.next_frame()? {
        let bytes = match frame {
            Frame::Flush => continue,
            Frame::Data(bytes) => bytes,
        };

        if !skipped_announcement {
            skipped_announcement = true;
            continue;
        }

        let text = std::str::from_utf8(&bytes)
            .map_err(|_| GitError::Malformed {
                what: "ref-discovery line",
                detail: "not valid UTF-8".into(),
            })?
            .trim_end_matches('\n');

        let (hash_hex, mut name) = text.split_once(' ').ok_or_else(|| GitError::Malformed {
            what: "ref-discovery line",
            detail: format!("missing space in {text:?}"),
        })?;

        if !seen_first_ref {
            if let Some((bare_name, caps)) = name.split_once('\0') {
                name = bare_name;
                capabilities = caps.split(' ').map(String::from).collect();
            }
            seen_first_ref = true;
        }

        if name.ends_with("^{}") {
            // peeled annotated-tag refs carry no independent branch
            // identity; we don't walk tag objects, so skip them
            continue;
        }

        refs.push(DiscoveredRef {
            name: name.to_owned(),
            oid: crate::object::ObjectHash::from_hex(hash_hex)?,
        });
    }

    Ok((refs, capabilities))
}

/// Resolve the OID of `HEAD`'s branch: prefer `refs/heads/main`, fall
/// back to `refs/heads/master`.
pub fn find_main_branch(refs: &[DiscoveredRef]) -> Result<&DiscoveredRef> {
    refs.iter()
        .find(|r| r.name == "refs/heads/main")
        .or_else(|| refs.iter().find(|r| r.name == "refs/heads/master"))
        .ok_or_else(|| GitError::NotFound("refs/heads/main or refs/heads/master".into()))
}

/// Resolve the default branch name from the discovery capabilities'
/// `symref=HEAD:refs/heads/<branch>` entry, if the server advertised
/// one.
pub fn symref_default_branch(capabilities: &[String]) -> Option<&str> {
    capabilities
        .iter()
        .find_map(|cap| cap.strip_prefix("symref=HEAD:refs/heads/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encode_decode_round_trip_for_data_and_flush() {
        let mut stream = Vec::new();
        stream.extend(encode(b"hello"));
        stream.extend(flush());
        stream.extend(encode(b"world"));

        let frames: Vec<Frame> = Decoder::new(Cursor::new(stream))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            frames,
            vec![
                Frame::Data(b"hello".to_vec()),
                Frame::Flush,
                Frame::Data(b"world".to_vec()),
            ]
        );
    }

    #[test]
    fn truncated_stream_ends_quietly_not_erroring() {
        // a length prefix promising 10 bytes but only 2 delivered
        let stream = b"000eab".to_vec();
        let frames: Vec<_> = Decoder::new(Cursor::new(stream)).collect();
        assert!(frames.is_empty());
    }

    #[test]
    fn side_band_separates_pack_from_progress() {
        let mut stream = Vec::new();
        stream.extend(encode(&[1, b'P', b'A']));
        stream.extend(encode(&[2, b'r', b'x']));
        stream.extend(encode(&[1, b'C', b'K']));
        stream.extend(flush());

        let mut progress_seen = Vec::new();
        let pack = demux_side_band(Decoder::new(Cursor::new(stream)), |msg| {
            progress_seen.push(msg.to_owned())
        })
        .unwrap();

        assert_eq!(pack, b"PACK");
        assert_eq!(progress_seen, vec!["rx".to_string()]);
    }

    #[test]
    fn side_band_aborts_on_band_three() {
        let stream = encode(&[3, b'n', b'o', b'p', b'e']);
        let result = demux_side_band(Decoder::new(Cursor::new(stream)), |_| {});
        assert!(matches!(result, Err(GitError::RemoteError(_))));
    }

    #[test]
    fn ref_discovery_falls_back_to_master() {
        let mut stream = Vec::new();
        stream.extend(encode(b"# service=git-upload-pack\n"));
        stream.extend(flush());
        stream.extend(encode(
            format!("{} refs/heads/master\0symref=HEAD:refs/heads/master\n", "a".repeat(40))
                .as_bytes(),
        ));
        stream.extend(flush());

        let (refs, caps) = parse_ref_discovery(Cursor::new(stream)).unwrap();
        let main = find_main_branch(&refs).unwrap();
        assert_eq!(main.name, "refs/heads/master");
        assert_eq!(symref_default_branch(&caps), Some("master"));
    }
}
