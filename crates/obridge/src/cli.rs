use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use obridge_core::domain::Peer;

pub const USAGE: &str = "\
usage:
  obridge compose <segments.json> [--peer group:<id>|direct:<uid>]
  obridge assign <long-id> [--peer group:<id>|direct:<uid>]
  obridge resolve <short-id|long-id>
";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Compose { input: PathBuf, peer: Peer },
    Assign { long_id: String, peer: Peer },
    Resolve { key: String },
    Help,
}

/// `group:<id>` or `direct:<uid>`.
pub fn parse_peer(s: &str) -> Result<Peer> {
    let (kind, id) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("peer must look like group:<id> or direct:<uid>, got {s:?}"))?;
    let id = id.trim();
    if id.is_empty() {
        bail!("peer id is empty in {s:?}");
    }
    match kind.trim().to_ascii_lowercase().as_str() {
        "group" => Ok(Peer::group(id)),
        "direct" | "private" => Ok(Peer::direct(id)),
        other => bail!("unknown peer kind {other:?}"),
    }
}

/// Splits `--peer <value>` out of the argument list.
fn take_peer(args: &[String]) -> Result<(Vec<&str>, Option<Peer>)> {
    let mut rest = Vec::new();
    let mut peer = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        if let Some(v) = arg.strip_prefix("--peer=") {
            peer = Some(parse_peer(v)?);
        } else if arg == "--peer" {
            let v = it.next().ok_or_else(|| anyhow!("--peer needs a value"))?;
            peer = Some(parse_peer(v)?);
        } else {
            rest.push(arg.as_str());
        }
    }
    Ok((rest, peer))
}

/// Parses everything after the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((cmd, tail)) = args.split_first() else {
        return Ok(Command::Help);
    };
    let (rest, peer) = take_peer(tail)?;
    let default_peer = || Peer::group("0");

    match cmd.as_str() {
        "compose" => match rest.as_slice() {
            [input] => Ok(Command::Compose {
                input: PathBuf::from(input),
                peer: peer.unwrap_or_else(default_peer),
            }),
            _ => bail!("compose takes exactly one input file\n{USAGE}"),
        },
        "assign" => match rest.as_slice() {
            [long_id] => Ok(Command::Assign {
                long_id: long_id.to_string(),
                peer: peer.unwrap_or_else(default_peer),
            }),
            _ => bail!("assign takes exactly one long id\n{USAGE}"),
        },
        "resolve" => match rest.as_slice() {
            [key] => Ok(Command::Resolve {
                key: key.to_string(),
            }),
            _ => bail!("resolve takes exactly one key\n{USAGE}"),
        },
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_compose_with_peer() {
        let cmd = parse_args(&args(&["compose", "in.json", "--peer", "direct:u_abc"])).unwrap();
        assert_eq!(
            cmd,
            Command::Compose {
                input: PathBuf::from("in.json"),
                peer: Peer::direct("u_abc"),
            }
        );
    }

    #[test]
    fn peer_flag_accepts_equals_form_and_defaults_to_group() {
        let cmd = parse_args(&args(&["assign", "--peer=group:123", "7301"])).unwrap();
        assert_eq!(
            cmd,
            Command::Assign {
                long_id: "7301".to_string(),
                peer: Peer::group("123"),
            }
        );

        let Command::Assign { peer, .. } = parse_args(&args(&["assign", "7301"])).unwrap() else {
            panic!("expected assign");
        };
        assert!(peer.is_group());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["compose"])).is_err());
        assert!(parse_args(&args(&["resolve", "a", "b"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
        assert!(parse_peer("channel:1").is_err());
        assert!(parse_peer("group:").is_err());
        assert!(parse_peer("123").is_err());
    }

    #[test]
    fn no_args_is_help() {
        assert_eq!(parse_args(&[]).unwrap(), Command::Help);
    }
}
