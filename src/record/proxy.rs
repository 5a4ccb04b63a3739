use std::collections::BTreeSet;
use std::io;
use std::path::Path;

const PROXY_BINARY: &str = "docker-proxy";

/// Extracts the `-host-port` argument from a NUL separated `docker-proxy`
/// command line. Any other program yields `None`.
pub fn proxy_host_port(cmdline: &[u8]) -> Option<u16> {
    let mut args = cmdline
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(String::from_utf8_lossy);

    let program = args.next()?;
    if Path::new(&*program).file_name()? != PROXY_BINARY {
        return None;
    }

    while let Some(arg) = args.next() {
        if arg == "-host-port" {
            return args.next()?.parse().ok();
        }
        if let Some(port) = arg.strip_prefix("-host-port=") {
            return port.parse().ok();
        }
    }
    None
}

/// Finds the lowest pid of a `docker-proxy` forwarding one of `host_ports`.
///
/// Processes that exit during the scan are skipped.
///
/// # Errors
///
/// Returns an error if `proc_root` itself cannot be listed.
pub fn find_proxy_pid(proc_root: &Path, host_ports: &BTreeSet<u16>) -> io::Result<Option<u32>> {
    if host_ports.is_empty() {
        return Ok(None);
    }

    let mut found = None;
    for entry in std::fs::read_dir(proc_root)? {
        let Ok(entry) = entry else { continue };
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        let cmdline = match std::fs::read(entry.path().join("cmdline")) {
            Ok(cmdline) => cmdline,
            Err(err) => {
                log::trace!("skipping pid {pid}: {err}");
                continue;
            }
        };

        if proxy_host_port(&cmdline).is_some_and(|port| host_ports.contains(&port)) {
            found = Some(found.map_or(pid, |current: u32| current.min(pid)));
        }
    }

    Ok(found)
}
