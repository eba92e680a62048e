use crate::checkout;
use crate::error::GitError;
use crate::object::{canonicalize, ObjectStore};
use crate::pack;
use crate::pkt_line::{self, Decoder, Frame};
use crate::repo::Repo;
use eyre::{Context, Result};
use std::io::Cursor;

const USER_AGENT: &str = concat!("mini-git/", env!("CARGO_PKG_VERSION"));

pub fn run(repo_url: &str, output_dir: Option<&str>) -> Result<()> {
    let repo_url = repo_url.trim_end_matches('/');
    let client = reqwest::blocking::Client::new();

    let (refs, capabilities) = fetch_refs(&client, repo_url).context("discover refs")?;

    let symref_branch = pkt_line::symref_default_branch(&capabilities).map(str::to_owned);
    let target = match &symref_branch {
        Some(name) => refs
            .iter()
            .find(|r| r.name == format!("refs/heads/{name}"))
            .ok_or_else(|| eyre::eyre!("remote advertised HEAD -> {name} but no such ref"))?,
        None => pkt_line::find_main_branch(&refs)?,
    };
    let default_branch = symref_branch.unwrap_or_else(|| {
        target
            .name
            .strip_prefix("refs/heads/")
            .unwrap_or(&target.name)
            .to_owned()
    });
    let target_oid = target.oid.clone();

    let packfile =
        fetch_packfile(&client, repo_url, &target_oid.as_hex()).context("fetch packfile")?;
    if packfile.is_empty() {
        eyre::bail!("remote sent an empty packfile");
    }

    let resolved = pack::parse_and_resolve(&packfile).context("resolve packfile")?;
    tracing::debug!(count = resolved.len(), "resolved packfile objects");

    let output_dir = output_dir.map(str::to_owned).unwrap_or_else(|| {
        let (_, repo_name) = repo_url.rsplit_once('/').expect("repo url contains slash");
        repo_name.trim_end_matches(".git").to_owned()
    });

    std::fs::create_dir(&output_dir).context("create directory to clone into")?;
    let repo = Repo::at(&output_dir);
    repo.init(&default_branch).context("initialize repository")?;

    let store = ObjectStore::new(&repo);
    for object in &resolved {
        let canonical = canonicalize(object.kind, &object.payload);
        store.write(&canonical)?;
    }

    repo.write_ref(&default_branch, &target_oid)
        .context("write default branch ref")?;
    repo.set_head_to_branch(&default_branch)
        .context("point HEAD at default branch")?;

    checkout::checkout_commit(&repo, &target_oid, repo.root()).context("checkout working tree")?;

    Ok(())
}

fn fetch_refs(
    client: &reqwest::blocking::Client,
    repo_url: &str,
) -> Result<(Vec<pkt_line::DiscoveredRef>, Vec<String>)> {
    let url = format!("{repo_url}/info/refs?service=git-upload-pack");
    let resp = client.get(url).send()?;

    if !resp.status().is_success() {
        return Err(GitError::TransportError(format!(
            "GET info/refs returned {}",
            resp.status()
        ))
        .into());
    }

    const ADV_CONTENT_TYPE: &str = "application/x-git-upload-pack-advertisement";
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if content_type != ADV_CONTENT_TYPE {
        tracing::warn!(
            got = content_type,
            "remote did not advertise the smart-http content type"
        );
    }

    let bytes = resp.bytes()?;
    let (refs, capabilities) = pkt_line::parse_ref_discovery(Cursor::new(&bytes[..]))?;
    Ok((refs, capabilities))
}

fn fetch_packfile(
    client: &reqwest::blocking::Client,
    repo_url: &str,
    want_oid: &str,
) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    body.extend(pkt_line::encode(
        format!("want {want_oid} multi_ack_detailed no-done side-band-64k agent={USER_AGENT}\n")
            .as_bytes(),
    ));
    body.extend(pkt_line::flush());
    body.extend(pkt_line::encode(b"done\n"));

    let url = format!("{repo_url}/git-upload-pack");
    let resp = client
        .post(url)
        .header(
            reqwest::header::CONTENT_TYPE,
            "application/x-git-upload-pack-request",
        )
        .header(reqwest::header::ACCEPT, "application/x-git-upload-pack-result")
        .body(body)
        .send()?;

    if !resp.status().is_success() {
        return Err(GitError::TransportError(format!(
            "POST git-upload-pack returned {}",
            resp.status()
        ))
        .into());
    }

    let bytes = resp.bytes()?;
    let mut decoder = Decoder::new(Cursor::new(&bytes[..]));

    match decoder.next_frame()? {
        Some(Frame::Data(line)) => {
            let text = String::from_utf8_lossy(&line);
            if text.trim_end() != "NAK" {
                eyre::bail!("expected a leading NAK line, got {text:?}");
            }
        }
        other => eyre::bail!("expected a leading NAK line, got {other:?}"),
    }

    let packfile = pkt_line::demux_side_band(decoder, |msg| tracing::info!("remote: {msg}"))?;
    Ok(packfile)
}
