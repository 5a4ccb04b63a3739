//! Mapping between container network namespaces and host interfaces.

mod error;
mod parser;
mod resolve;
mod tool;

pub use error::{Error, Result};
pub use parser::{Link, ParseError, parse_link_line, parse_links};
pub use resolve::{CONTAINER_INTERFACE, NamespaceResolver, find_host_peer};
pub use tool::{IpCommand, NetnsTool};
