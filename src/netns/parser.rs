//! Parser for the link listing printed by `ip link show`.
//!
//! Every link starts a new line of the form
//!
//! ```text
//! 13: veth9a8b1c2@if12: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue ...
//!     link/ether 5e:2d:0a:11:22:33 brd ff:ff:ff:ff:ff:ff link-netnsid 0
//! ```
//!
//! Indented continuation lines carry link-layer details and are skipped.

/// A network link as listed by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Kernel interface index.
    pub index: u32,
    /// Interface name without the `@<peer>` suffix.
    pub name: String,
}

/// Errors that may occur when parsing a link header line.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing separator `: ` in line: `{0}`")]
    MissingSeparator(String),

    #[error("invalid link index in line: `{0}`")]
    InvalidIndex(String),

    #[error("missing interface name in line: `{0}`")]
    MissingName(String),
}

/// Parses a single link header line.
///
/// The returned name has the `@<peer>` annotation stripped, so `veth9a8b@if12`
/// yields `veth9a8b`.
///
/// # Errors
///
/// Returns [`ParseError`] variants for a missing separator, a non-numeric
/// index, or an empty interface name.
pub fn parse_link_line(line: &str) -> Result<Link, ParseError> {
    let (index, rest) = line
        .split_once(": ")
        .ok_or_else(|| ParseError::MissingSeparator(line.to_owned()))?;
    let index = index
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidIndex(line.to_owned()))?;

    let name = rest.split_once(':').map_or(rest, |(name, _)| name).trim();
    let name = name.split_once('@').map_or(name, |(name, _)| name);
    if name.is_empty() {
        return Err(ParseError::MissingName(line.to_owned()));
    }

    Ok(Link {
        index,
        name: name.to_owned(),
    })
}

/// Parses the complete output of `ip link show`.
///
/// Continuation lines are skipped. Malformed header lines are logged and
/// skipped so that one unexpected entry does not hide the rest of the table.
pub fn parse_links(output: &str) -> Vec<Link> {
    output
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with(char::is_whitespace))
        .filter_map(|line| match parse_link_line(line) {
            Ok(link) => Some(link),
            Err(err) => {
                log::debug!("skipping link line: {err}");
                None
            }
        })
        .collect()
}
