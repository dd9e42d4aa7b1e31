//! Linux input subsystem plumbing: device lookup by name, the lid switch
//! reader and the uinput tablet-mode switch.

pub mod lid;
pub mod uinput;

use std::{
    cmp::Ordering,
    fs,
    path::{Path, PathBuf},
};

use evdev::Device;
use log::debug;

use crate::error::{Error, Result};

fn device_name(path: &Path) -> Option<String> {
    Device::open(path).ok()?.name().map(str::to_owned)
}

/// Finds the evdev node under `dir` whose declared name is exactly `name`.
pub fn find_input_device(dir: &Path, name: &str) -> Result<PathBuf> {
    find_input_device_with(dir, name, device_name)
}

/// [`find_input_device`] with a pluggable name lookup.
pub fn find_input_device_with<F>(dir: &Path, name: &str, mut name_of: F) -> Result<PathBuf>
where
    F: FnMut(&Path) -> Option<String>,
{
    let mut entries: Vec<String> = fs::read_dir(dir)
        .map_err(|_| Error::DeviceNotFound(name.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort_by(|a, b| natural_cmp(a, b));

    entries
        .iter()
        .map(|entry| dir.join(entry))
        .find(|path| {
            let found = name_of(path);
            debug!("Checked {}: {:?}", path.display(), found);
            found.as_deref() == Some(name)
        })
        .ok_or_else(|| Error::DeviceNotFound(name.to_string()))
}

/// Orders names so that embedded numbers compare by value (`event2 < event10`).
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        let (chunk_a, rest_a) = split_chunk(a);
        let (chunk_b, rest_b) = split_chunk(b);
        let ord = match (chunk_a.parse::<u64>(), chunk_b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y).then(chunk_a.len().cmp(&chunk_b.len())),
            _ => chunk_a.cmp(chunk_b),
        };
        if ord != Ordering::Equal {
            return ord;
        }
        a = rest_a;
        b = rest_b;
    }
}

fn split_chunk(s: &str) -> (&str, &str) {
    let digits = s.starts_with(|c: char| c.is_ascii_digit());
    let end = s
        .find(|c: char| c.is_ascii_digit() != digits)
        .unwrap_or(s.len());
    s.split_at(end)
}
