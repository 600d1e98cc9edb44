//! Mapping of untrusted, user-supplied names onto safe single path segments.
//!
//! A stored file has one canonical name that plays three roles: the file name on
//! disk, the segment used in download URLs and the name shown to users. The
//! canonicalizer is idempotent, so feeding a URL name back through it yields the
//! same disk name. [`FileName`] carries the result so callers never re-derive it.

use crate::error::StorageError;
use std::fmt;
use tracing::error;

/// Upper bound on a canonical name, counted both in characters and in UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 250;
/// Replacement stem for reserved device names (`CON.txt` becomes `DEV.txt`).
pub const RESERVED_MARKER: &str = "DEV";
/// Name used when nothing survives canonicalization.
pub const EMPTY_PLACEHOLDER: &str = "EMPTY";

const FORBIDDEN: [char; 18] =
    ['\\', ':', '\'', '[', ']', '/', '"', ',', '<', '>', '&', '^', '$', '+', '*', '?', ';', '|'];
const RESERVED_STEMS: [&[u8]; 4] = [b"CON", b"PRN", b"AUX", b"NUL"];
const RESERVED_NUMBERED: [&[u8]; 2] = [b"COM", b"LPT"];

/// Maps any string onto a safe, bounded file name. Never fails.
///
/// In order: truncate to [`MAX_NAME_LEN`], strip trailing dots and spaces, replace
/// forbidden and control characters with `_`, rewrite reserved device stems to
/// [`RESERVED_MARKER`] keeping the extension, and substitute [`EMPTY_PLACEHOLDER`]
/// for an empty result.
#[must_use]
pub fn canonicalize(name: &str) -> String {
    let trimmed = truncate(name).trim_end_matches(['.', ' ']);
    let replaced: String =
        trimmed.chars().map(|c| if is_forbidden(c) { '_' } else { c }).collect();
    let renamed = rename_reserved(replaced);
    if renamed.is_empty() { EMPTY_PLACEHOLDER.to_owned() } else { renamed }
}

fn truncate(name: &str) -> &str {
    let mut end = 0;
    for (count, (idx, c)) in name.char_indices().enumerate() {
        if count == MAX_NAME_LEN || idx + c.len_utf8() > MAX_NAME_LEN {
            break;
        }
        end = idx + c.len_utf8();
    }
    &name[..end]
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\0'..='\x1f') || FORBIDDEN.contains(&c)
}

fn rename_reserved(name: String) -> String {
    let stem_len = name.find('.').unwrap_or(name.len());
    if !is_reserved_stem(&name.as_bytes()[..stem_len]) {
        return name;
    }
    let mut renamed = String::with_capacity(RESERVED_MARKER.len() + name.len() - stem_len);
    renamed.push_str(RESERVED_MARKER);
    renamed.push_str(&name[stem_len..]);
    renamed
}

fn is_reserved_stem(stem: &[u8]) -> bool {
    match stem.len() {
        3 => RESERVED_STEMS.iter().any(|r| stem.eq_ignore_ascii_case(r)),
        4 => {
            RESERVED_NUMBERED.iter().any(|r| stem[..3].eq_ignore_ascii_case(r))
                && stem[3].is_ascii_digit()
        },
        _ => false,
    }
}

/// Canonicalizes `raw` and verifies the result is a fixed point of `canonicalize`.
fn checked(raw: &str, canonicalize: impl Fn(&str) -> String) -> Result<String, StorageError> {
    let canonical = canonicalize(raw);
    let again = canonicalize(&canonical);
    if again == canonical {
        return Ok(canonical);
    }
    error!(
        raw = %raw,
        canonical = %canonical,
        again = %again,
        "Name canonicalization is not idempotent"
    );
    Err(StorageError::Integrity {
        message: raw.to_owned().into(),
        context: Some(format!("{canonical:?} re-canonicalizes to {again:?}").into()),
    })
}

/// The canonical name of a stored file.
///
/// Disk, URL and display names are the same value in different roles; the
/// accessors exist so call sites say which role they mean.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileName(String);

impl FileName {
    /// Canonical name for a name supplied by an uploading client.
    ///
    /// # Errors
    /// Returns [`StorageError::Integrity`] if canonicalization is not idempotent for `original`.
    pub fn from_original(original: &str) -> Result<Self, StorageError> {
        checked(original, canonicalize).map(Self)
    }

    /// Canonical name for a name taken from a download or delete URL.
    ///
    /// # Errors
    /// Returns [`StorageError::Integrity`] if canonicalization is not idempotent for `url_name`.
    pub fn from_url(url_name: &str) -> Result<Self, StorageError> {
        checked(url_name, canonicalize).map(Self)
    }

    /// Wraps a name read back from the storage directory as-is.
    pub(crate) const fn from_disk(disk_name: String) -> Self {
        Self(disk_name)
    }

    #[must_use]
    pub fn disk_name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn url_name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_untouched() {
        assert_eq!(canonicalize("report.txt"), "report.txt");
        assert_eq!(canonicalize("русский.файл"), "русский.файл");
        assert_eq!(canonicalize("archive.tar.gz"), "archive.tar.gz");
    }

    #[test]
    fn forbidden_characters_become_underscores() {
        assert_eq!(canonicalize("a/b\\c:d"), "a_b_c_d");
        assert_eq!(canonicalize("x'[]\",<>&^$+*?;|y"), format!("x{}y", "_".repeat(15)));
        assert_eq!(canonicalize("tab\there\nnul\0"), "tab_here_nul_");
    }

    #[test]
    fn path_traversal_collapses_into_one_segment() {
        assert_eq!(canonicalize("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(canonicalize(".."), EMPTY_PLACEHOLDER);
        assert_eq!(canonicalize("."), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn trailing_dots_and_spaces_are_stripped() {
        assert_eq!(canonicalize("notes.txt. . "), "notes.txt");
        assert_eq!(canonicalize(" leading stays"), " leading stays");
    }

    #[test]
    fn reserved_device_names_are_rewritten() {
        assert_eq!(canonicalize("CON.txt"), "DEV.txt");
        assert_eq!(canonicalize("con"), "DEV");
        assert_eq!(canonicalize("Lpt9.tar.gz"), "DEV.tar.gz");
        assert_eq!(canonicalize("com1"), "DEV");
        assert_eq!(canonicalize("NUL..."), "DEV");
    }

    #[test]
    fn near_reserved_names_are_kept() {
        assert_eq!(canonicalize("CONSOLE.txt"), "CONSOLE.txt");
        assert_eq!(canonicalize("COM.txt"), "COM.txt");
        assert_eq!(canonicalize("COMX.txt"), "COMX.txt");
        assert_eq!(canonicalize("my CON.txt"), "my CON.txt");
        assert_eq!(canonicalize("coé.txt"), "coé.txt");
    }

    #[test]
    fn empty_input_gets_placeholder() {
        assert_eq!(canonicalize(""), EMPTY_PLACEHOLDER);
        assert_eq!(canonicalize("   "), EMPTY_PLACEHOLDER);
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(canonicalize(&"a".repeat(300)).len(), MAX_NAME_LEN);
        // Truncation happens before stripping, so a dot at the cut is removed too.
        let name = format!("{}.{}", "b".repeat(249), "c".repeat(20));
        assert_eq!(canonicalize(&name), "b".repeat(249));
    }

    #[test]
    fn multibyte_names_respect_the_byte_bound() {
        let canonical = canonicalize(&"я".repeat(200));
        assert!(canonical.len() <= MAX_NAME_LEN);
        assert_eq!(canonical.chars().count(), MAX_NAME_LEN / 2);
    }

    #[test]
    fn canonicalization_is_idempotent_on_edge_cases() {
        let long = "x".repeat(251);
        for raw in ["CON.", "con .txt", "AUX.txt. ", "a:..", "..", "?", "COM1.", long.as_str()] {
            let once = canonicalize(raw);
            assert_eq!(canonicalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn non_idempotent_canonicalizer_is_reported() {
        let err = checked("name", |s| format!("{s}_")).unwrap_err();
        assert!(matches!(err, StorageError::Integrity { .. }));
    }

    #[test]
    fn file_name_roles_share_one_value() {
        let name = FileName::from_original("CON.txt").unwrap();
        assert_eq!(name.disk_name(), "DEV.txt");
        assert_eq!(name.url_name(), name.disk_name());
        assert_eq!(name.display_name(), name.disk_name());
        assert_eq!(FileName::from_url(name.url_name()).unwrap(), name);
    }
}
