use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::runtime::NetworkSettings;

/// Collects `host port -> container port` for every published binding.
///
/// Exposed ports without a host binding are not reachable from the host and
/// are skipped. A port that fails to parse is logged and recorded as `0`.
pub fn listen_port_map(settings: &NetworkSettings) -> BTreeMap<u16, u16> {
    let mut map = BTreeMap::new();
    let Some(ports) = &settings.ports else {
        return map;
    };

    for (key, bindings) in ports {
        let Some(bindings) = bindings.as_deref().filter(|b| !b.is_empty()) else {
            continue;
        };

        let container_port = parse_port(key.split('/').next().unwrap_or(key), key);
        for binding in bindings {
            let host_port = parse_port(&binding.host_port, key);
            map.insert(host_port, container_port);
        }
    }

    map
}

fn parse_port(raw: &str, key: &str) -> u16 {
    raw.parse().unwrap_or_else(|err| {
        log::warn!("port binding `{key}`: invalid port `{raw}`: {err}");
        0
    })
}

/// Parses an RFC 3339 timestamp as reported by the runtime.
///
/// The runtime's zero time (`0001-01-01T00:00:00Z`) means "never" and yields
/// `None`, as does anything unparsable.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.timestamp() > 0)
}

/// The first token of the configured command, or an empty string.
pub fn first_command_token(cmd: Option<&[String]>) -> String {
    cmd.and_then(<[String]>::first).cloned().unwrap_or_default()
}

/// Strips the leading `/` the runtime puts in front of container names.
pub fn container_name(raw: &str) -> &str {
    raw.strip_prefix('/').unwrap_or(raw)
}

/// Splits a repo tag such as `registry:5000/app:1.2` into name and tag.
///
/// The separator is the last `:` after the last `/`, so a registry port is
/// never mistaken for a tag. A reference without a tag gets `latest`.
pub fn split_repo_tag(repo_tag: &str) -> (String, String) {
    let name_start = repo_tag.rfind('/').map_or(0, |i| i + 1);
    match repo_tag[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (
                repo_tag[..split].to_owned(),
                repo_tag[split + 1..].to_owned(),
            )
        }
        None => (repo_tag.to_owned(), "latest".to_owned()),
    }
}
