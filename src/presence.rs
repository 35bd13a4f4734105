//! Filesystem presence checks: sanitizing names, detecting items that are
//! already downloaded, and writing ignore markers.
//!
//! An ignore marker is a zero-byte hidden file named `.` followed by the
//! sanitized display name. It lives next to where the item would have been
//! downloaded, so deleting it by hand brings the item back on the next sync.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static ILLEGAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));

/// Replaces characters that are illegal on common filesystems with `_`.
///
/// Leading and trailing whitespace and trailing dots are trimmed (Windows
/// rejects them). Names that would end up empty become `_`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced = ILLEGAL_RE.replace_all(name, "_");
    let trimmed = replaced
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Filename of the ignore marker for a display name.
#[must_use]
pub fn marker_name(raw_name: &str) -> String {
    format!(".{}", sanitize_filename(raw_name))
}

/// Returns true if the item named `raw_name` under `base_path` needs no download.
///
/// Satisfied means an ignore marker exists, a file with the sanitized display
/// name exists, or (when known) a file with the sanitized `filename` exists.
/// A missing directory simply yields `false`.
#[must_use]
pub fn is_satisfied(base_path: &Path, raw_name: &str, filename: Option<&str>) -> bool {
    if base_path.join(marker_name(raw_name)).exists() {
        return true;
    }
    if base_path.join(sanitize_filename(raw_name)).is_file() {
        return true;
    }
    filename.is_some_and(|f| base_path.join(sanitize_filename(f)).is_file())
}

/// Writes the ignore marker for `raw_name` in `base_path`.
///
/// Intermediate directories are created. Marking an item twice leaves a
/// single empty marker.
///
/// # Errors
///
/// Returns an error if the directory or marker file cannot be created.
pub fn mark_ignored(base_path: &Path, raw_name: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(base_path)?;
    let marker = base_path.join(marker_name(raw_name));
    std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&marker)?;
    log::info!("Ignoring {raw_name:?} via marker {}", marker.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("Tut 4"), "Tut 4");
        assert_eq!(
            sanitize_filename("19S2-CE3007-DIGITAL SIGNAL PROCESSING"),
            "19S2-CE3007-DIGITAL SIGNAL PROCESSING"
        );
    }

    #[test]
    fn sanitize_trims_and_never_returns_empty() {
        assert_eq!(sanitize_filename("  notes.  "), "notes");
        assert_eq!(sanitize_filename(""), "_");
        assert_eq!(sanitize_filename(".."), "_");
    }

    #[test]
    fn missing_directory_is_not_satisfied() {
        let dir = TempDir::new().unwrap();
        assert!(!is_satisfied(&dir.path().join("nope"), "notes.pdf", None));
    }

    #[test]
    fn existing_file_by_display_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.pdf"), b"x").unwrap();
        assert!(is_satisfied(dir.path(), "notes.pdf", None));
    }

    #[test]
    fn existing_file_by_resolved_filename() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Lecture_Notes_v2.pdf"), b"x").unwrap();
        assert!(!is_satisfied(dir.path(), "Lecture Notes", None));
        assert!(is_satisfied(
            dir.path(),
            "Lecture Notes",
            Some("Lecture_Notes_v2.pdf")
        ));
    }

    #[test]
    fn directory_with_same_name_does_not_count() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("notes.pdf")).unwrap();
        assert!(!is_satisfied(dir.path(), "notes.pdf", None));
    }

    #[test]
    fn ignore_marker_round_trip() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("Course/Week 1");
        assert!(!is_satisfied(&base, "Tut 4", None));

        mark_ignored(&base, "Tut 4").unwrap();
        assert!(base.join(".Tut 4").exists());
        assert_eq!(std::fs::metadata(base.join(".Tut 4")).unwrap().len(), 0);
        assert!(is_satisfied(&base, "Tut 4", None));
    }

    #[test]
    fn mark_ignored_is_idempotent() {
        let dir = TempDir::new().unwrap();
        mark_ignored(dir.path(), "a/b").unwrap();
        mark_ignored(dir.path(), "a/b").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(dir.path().join(".a_b").exists());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitized_names_are_single_segments(name in ".*") {
                let s = sanitize_filename(&name);
                prop_assert!(!s.is_empty());
                prop_assert!(!s.contains('/'));
                prop_assert!(!s.contains('\\'));
                prop_assert!(!s.contains('\0'));
            }

            #[test]
            fn sanitize_is_idempotent(name in ".*") {
                let once = sanitize_filename(&name);
                prop_assert_eq!(sanitize_filename(&once), once.clone());
            }
        }
    }
}
