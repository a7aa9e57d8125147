//! Resolves command-line inputs (files or directories) to slide decks.

use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn deck_matcher() -> anyhow::Result<GlobMatcher> {
    Ok(GlobBuilder::new("*.pptx")
        .case_insensitive(true)
        .literal_separator(false)
        .build()?
        .compile_matcher())
}

/// Office lock files (`~$deck.pptx`) share the extension but are not decks.
fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("~$"))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.len() > 1)
        .unwrap_or(false)
}

/// Explicit file arguments are kept as given, whatever their extension, so
/// that an unreadable deck is reported rather than silently ignored.
/// Directories are walked for `.pptx` files, sorted by path.
pub fn find_decks(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let matcher = deck_matcher()?;
    let mut decks = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            decks.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| matcher.is_match(p) && !is_lock_file(p))
            .collect();
        found.sort();
        decks.extend(found);
    }
    Ok(decks)
}
