//! Collision-free output file naming.
//!
//! Every stage picks its output name by trying numbered candidates until one
//! is not taken. The search is a pure function over a set of existing names
//! so it can be tested without touching the filesystem; [`existing_names`]
//! supplies that set from a real directory.
//!
//! The scheme is not safe against concurrent writers targeting the same
//! directory: two runs can observe the same free name.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

/// Return the first `candidate(attempt)` for `attempt = 0, 1, ..` not in `taken`.
pub fn first_free<F>(taken: &HashSet<String>, candidate: F) -> String
where
    F: Fn(u32) -> String,
{
    let mut attempt = 0;
    loop {
        let name = candidate(attempt);
        if !taken.contains(&name) {
            return name;
        }
        attempt += 1;
    }
}

/// `base`, then `1-base`, `2-base`, ...
pub fn counter_prefixed(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", attempt, base)
    }
}

/// `stem_<first + attempt>.ext`, or `stem_<n>` when `ext` is empty.
pub fn numbered_suffix(stem: &str, ext: &str, first: u32, attempt: u32) -> String {
    let n = first + attempt;
    if ext.is_empty() {
        format!("{}_{}", stem, n)
    } else {
        format!("{}_{}.{}", stem, n, ext)
    }
}

/// File names present in `dir`. A missing directory has no names.
pub fn existing_names(dir: &Path) -> io::Result<HashSet<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };

    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry?;
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}
