//! Working-directory search
//!
//! Finds directories whose name contains a query, to help pick a value for
//! `sessions set-dir`.

use colored::Colorize;
use directories::BaseDirs;
use std::collections::HashSet;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Default search roots: the home directory, plus `/home`, `/opt` and
/// `/var` on Unix. Roots that do not exist are dropped.
pub fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(base) = BaseDirs::new() {
        roots.push(base.home_dir().to_path_buf());
    }
    if cfg!(unix) {
        roots.extend(["/home", "/opt", "/var"].into_iter().map(PathBuf::from));
    }
    roots.retain(|root| root.is_dir());
    roots
}

/// Find directories below `roots` whose name contains `query`
///
/// Matching is case-insensitive. Each root is searched up to `max_depth`
/// levels below it (the root itself never matches). Shallower matches come
/// first; unreadable directories are skipped and duplicates reached from
/// several roots are reported once.
///
/// # Examples
///
/// ```
/// use agentgate::commands::search::search_directories;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::create_dir_all(dir.path().join("work/MyProject")).unwrap();
///
/// let found = search_directories("project", &[dir.path().to_path_buf()], 3, 15);
/// assert_eq!(found, vec![dir.path().join("work/MyProject")]);
/// ```
pub fn search_directories(
    query: &str,
    roots: &[PathBuf],
    max_depth: usize,
    limit: usize,
) -> Vec<PathBuf> {
    let query = query.to_lowercase();
    let mut seen = HashSet::new();
    let mut matches: Vec<(usize, PathBuf)> = Vec::new();

    for root in roots {
        let found = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&query)
            });

        for entry in found {
            if seen.insert(entry.path().to_path_buf()) {
                matches.push((entry.depth(), entry.into_path()));
            }
        }
    }

    matches.sort_by_key(|(depth, _)| *depth);
    matches
        .into_iter()
        .map(|(_, path)| path)
        .take(limit)
        .collect()
}

/// Handle `search-dirs`
pub fn handle_search(query: &str, roots: Vec<PathBuf>, max_depth: usize, limit: usize) {
    let roots = if roots.is_empty() { default_roots() } else { roots };
    tracing::debug!(?roots, query, "Searching for directories");

    let found = search_directories(query, &roots, max_depth, limit);
    if found.is_empty() {
        println!(
            "{}",
            format!("No directories found matching '{}'.", query).yellow()
        );
        println!("Try a shorter or more general search term.");
        return;
    }

    println!("Found {} matching directories:\n", found.len());
    for (i, path) in found.iter().enumerate() {
        println!("{:>3}. {}", i + 1, path.display());
    }
    println!(
        "\nUse {} to make one the working directory.",
        "agentgate sessions set-dir <KEY> <PATH>".cyan()
    );
}
