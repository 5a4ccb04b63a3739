//! Username lookup in `/etc/passwd` content.

use regex::Regex;

/// Location of the user database inside a container.
pub const PASSWD_PATH: &str = "/etc/passwd";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no passwd entry for uid {0}")]
    UidNotFound(u32),
    #[error("uid {uid} matches {matches} passwd entries")]
    Ambiguous { uid: u32, matches: usize },
    #[error("invalid passwd pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Returns the name of the single passwd record whose uid field equals `uid`.
///
/// Records are matched at line start; the uid is the third `:` separated
/// field and must match exactly, so uid `1000` never matches `10000`.
///
/// # Errors
///
/// [`Error::UidNotFound`] when no record matches, [`Error::Ambiguous`] when
/// more than one does.
pub fn lookup_username(content: &str, uid: u32) -> Result<String, Error> {
    let pattern = Regex::new(&format!(r"(?m)^([^:\n]*):[^:\n]*:{uid}:"))?;
    let names: Vec<&str> = pattern
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str())
        .collect();

    match names.as_slice() {
        [] => Err(Error::UidNotFound(uid)),
        [name] => Ok((*name).to_owned()),
        _ => Err(Error::Ambiguous {
            uid,
            matches: names.len(),
        }),
    }
}
