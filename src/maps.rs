use std::fs::File;
use std::io::BufRead as _;
use std::io::BufReader;
use std::ops::Range;
use std::path::PathBuf;

use crate::log;
use crate::Addr;
use crate::Error;
use crate::ErrorExt as _;
use crate::Pid;
use crate::Result;


/// The permission bits of a mapping, as reported by the kernel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Perms {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}


/// One entry of a process' memory map.
#[derive(Debug)]
pub(crate) struct MapsEntry {
    /// The virtual address range covered by this mapping.
    pub range: Range<Addr>,
    pub perms: Perms,
    /// The offset into the backing file at which the mapping starts.
    pub offset: u64,
    /// The path to the backing file, if any.
    pub path: PathBuf,
}


/// Parse a single line of a `/proc/<pid>/maps` file.
///
/// Lines have the format:
/// ```text
/// address           perms offset  dev   inode      pathname
/// 55f4a95cb000-55f4a95cf000 r-xp 00002000 00:20 41445      /usr/bin/cat
/// ```
fn parse_maps_line(line: &str, pid: Pid) -> Result<MapsEntry> {
    let mut fields = line.splitn(6, ' ');
    let mut next = |what| {
        fields
            .next()
            .ok_or_else(|| Error::with_invalid_data(format!("missing {what} in maps line: {line}")))
    };

    let range_str = next("address range")?;
    let (start_str, end_str) = range_str.split_once('-').ok_or_else(|| {
        Error::with_invalid_data(format!("malformed address range in maps line: {line}"))
    })?;
    let start = Addr::from_str_radix(start_str, 16)
        .map_err(|_| Error::with_invalid_data(format!("malformed start address: {line}")))?;
    let end = Addr::from_str_radix(end_str, 16)
        .map_err(|_| Error::with_invalid_data(format!("malformed end address: {line}")))?;

    let perms_str = next("permissions")?.as_bytes();
    let perms = Perms {
        read: perms_str.first() == Some(&b'r'),
        write: perms_str.get(1) == Some(&b'w'),
        exec: perms_str.get(2) == Some(&b'x'),
    };

    let offset_str = next("offset")?;
    let offset = u64::from_str_radix(offset_str, 16)
        .map_err(|_| Error::with_invalid_data(format!("malformed offset: {line}")))?;

    let _dev = next("device")?;
    let _inode = next("inode")?;
    // The path is absent for anonymous mappings. Padding between the
    // inode and the path ends up in the last field; trim it away.
    let path_str = fields.next().unwrap_or("").trim();
    let path = if path_str.ends_with(" (deleted)") {
        // The file backing the mapping was deleted, but the kernel still
        // exposes the data through the map_files link.
        PathBuf::from(format!("/proc/{pid}/map_files/{range_str}"))
    } else {
        PathBuf::from(path_str)
    };

    let entry = MapsEntry {
        range: start..end,
        perms,
        offset,
        path,
    };
    Ok(entry)
}

/// Parse the memory map of the process with the given PID.
///
/// Enumeration is best-effort: lines that fail to parse are reported and
/// skipped rather than failing the whole read.
pub(crate) fn parse(pid: Pid) -> Result<Vec<MapsEntry>> {
    let path = format!("/proc/{pid}/maps");
    let file = File::open(&path).with_context(|| format!("failed to open {path}"))?;

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("failed to read {path}"))?;
        let line = line.trim();
        if line.is_empty() {
            continue
        }
        match parse_maps_line(line, pid) {
            Ok(entry) => entries.push(entry),
            Err(err) => log::warn!("ignoring unparsable maps entry: {err}"),
        }
    }
    Ok(entries)
}

/// Check whether a maps entry describes a loaded object file usable for
/// symbolization: backed by an absolute regular-file path and mapped
/// readable and executable.
pub(crate) fn is_module_candidate(entry: &MapsEntry) -> bool {
    if !entry.path.is_absolute() {
        return false
    }

    if !(entry.perms.read && entry.perms.exec) {
        return false
    }

    entry
        .path
        .metadata()
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
