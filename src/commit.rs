//! Commit object model: headers (`tree`, `parent`, `author`,
//! `committer`), a blank line, then the message.

use crate::error::{GitError, Result};
use crate::object::ObjectHash;
use std::fmt::{self, Write as _};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct Commit {
    pub tree: ObjectHash,
    pub parents: Vec<ObjectHash>,
    pub author: CommitAttribution,
    pub committer: CommitAttribution,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CommitAttribution {
    pub name: String,
    pub email: String,
    pub timestamp: SystemTime,
}

impl CommitAttribution {
    /// The fixed identity used for commits created by this tool.
    ///
    /// A real client would read this from user configuration
    /// (`~/.gitconfig` or similar); that's out of scope here, so it's a
    /// constant.
    pub fn yours_truly() -> Self {
        Self {
            name: "mini-git".into(),
            email: "mini-git@localhost".into(),
            timestamp: SystemTime::now(),
        }
    }
}

impl fmt::Display for CommitAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        write!(f, "{} <{}> {} +0000", self.name, self.email, secs)
    }
}

impl Commit {
    pub fn new(tree: ObjectHash, parents: Vec<ObjectHash>, message: String) -> Self {
        Self {
            tree,
            parents,
            author: CommitAttribution::yours_truly(),
            committer: CommitAttribution::yours_truly(),
            message,
        }
    }

    /// Serialize to the commit payload (without the canonical header).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = String::new();
        writeln!(buf, "tree {}", self.tree).unwrap();
        for parent in &self.parents {
            writeln!(buf, "parent {}", parent).unwrap();
        }
        writeln!(buf, "author {}", self.author).unwrap();
        writeln!(buf, "committer {}", self.committer).unwrap();
        write!(buf, "\n{}", self.message).unwrap();
        buf.into_bytes()
    }

    /// Parse a commit payload (the bytes following the canonical
    /// header).
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload).map_err(|_| GitError::Malformed {
            what: "commit",
            detail: "not valid UTF-8".into(),
        })?;

        let mut tree: Option<ObjectHash> = None;
        let mut parents = Vec::new();
        let mut author: Option<String> = None;
        let mut committer: Option<String> = None;

        let mut lines = text.lines();
        for line in lines.by_ref() {
            if line.is_empty() {
                break;
            }

            let (key, value) = line.split_once(' ').ok_or_else(|| GitError::Malformed {
                what: "commit header",
                detail: format!("missing space in {line:?}"),
            })?;

            match key {
                "tree" => tree = Some(ObjectHash::from_hex(value)?),
                "parent" => parents.push(ObjectHash::from_hex(value)?),
                "author" => author = Some(value.to_owned()),
                "committer" => committer = Some(value.to_owned()),
                _ => {
                    return Err(GitError::Malformed {
                        what: "commit header",
                        detail: format!("unexpected key {key:?}"),
                    })
                }
            }
        }

        let message = lines.collect::<Vec<_>>().join("\n");

        Ok(Self {
            tree: tree.ok_or_else(|| GitError::Malformed {
                what: "commit",
                detail: "missing tree header".into(),
            })?,
            parents,
            author: parse_attribution(&author.ok_or_else(|| GitError::Malformed {
                what: "commit",
                detail: "missing author header".into(),
            })?),
            committer: parse_attribution(&committer.ok_or_else(|| GitError::Malformed {
                what: "commit",
                detail: "missing committer header".into(),
            })?),
            message,
        })
    }
}

/// Best-effort parse of `Name <email> <timestamp> <tz>` back into its
/// parts; only the name is load-bearing for anything this crate does
/// with a re-parsed commit, so a failure here just keeps the raw text
/// as the name.
fn parse_attribution(s: &str) -> CommitAttribution {
    if let Some((name_email, rest)) = s.rsplit_once(' ').and_then(|(a, _tz)| a.rsplit_once(' ')) {
        if let Some((name, email)) = name_email.rsplit_once(" <") {
            return CommitAttribution {
                name: name.to_owned(),
                email: email.trim_end_matches('>').to_owned(),
                timestamp: UNIX_EPOCH + std::time::Duration::from_secs(rest.parse().unwrap_or(0)),
            };
        }
    }
    CommitAttribution {
        name: s.to_owned(),
        email: String::new(),
        timestamp: SystemTime::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_then_parse_round_trips_structure() {
        let tree = ObjectHash::from_bytes([0xab; 20]);
        let commit = Commit::new(tree.clone(), vec![], "initial\n".to_string());
        let payload = commit.serialize();
        let parsed = Commit::parse(&payload).unwrap();
        assert_eq!(parsed.tree, tree);
        assert!(parsed.parents.is_empty());
        assert_eq!(parsed.message, "initial");
    }

    #[test]
    fn serialize_includes_parents_in_order() {
        let tree = ObjectHash::from_bytes([1; 20]);
        let p1 = ObjectHash::from_bytes([2; 20]);
        let p2 = ObjectHash::from_bytes([3; 20]);
        let commit = Commit::new(tree, vec![p1.clone(), p2.clone()], "msg".into());
        let parsed = Commit::parse(&commit.serialize()).unwrap();
        assert_eq!(parsed.parents, vec![p1, p2]);
    }
}
