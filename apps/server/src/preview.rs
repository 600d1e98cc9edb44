//! How a stored file is presented to a browser on download.
//!
//! Text is shown inline as `text/plain` (never rendered as HTML), images inline
//! with their own type, and everything else is sent as an attachment.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Extensions browsers should preview as text even though they map to other types.
const EXTRA_TEXT_EXTENSIONS: [&str; 11] =
    ["cfg", "cmake", "cmd", "conf", "ini", "json", "log", "man", "md", "php", "sh"];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Characters left as-is in one URL path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// `attr-char` of RFC 5987, used for `filename*`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Presentation {
    pub(crate) content_type: String,
    pub(crate) inline: bool,
}

pub(crate) fn classify(display_name: &str) -> Presentation {
    let extension = display_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    if extension.as_deref().is_some_and(|ext| EXTRA_TEXT_EXTENSIONS.contains(&ext)) {
        return Presentation { content_type: TEXT_PLAIN.to_owned(), inline: true };
    }

    match mime_guess::from_path(display_name).first() {
        Some(guess) if guess.type_().as_str() == "text" => {
            Presentation { content_type: TEXT_PLAIN.to_owned(), inline: true }
        },
        Some(guess) if guess.type_().as_str() == "image" => {
            Presentation { content_type: guess.essence_str().to_owned(), inline: true }
        },
        _ => Presentation { content_type: OCTET_STREAM.to_owned(), inline: false },
    }
}

/// `Content-Disposition` value carrying `display_name` in both the ASCII and the
/// UTF-8 form.
pub(crate) fn content_disposition(display_name: &str, inline: bool) -> String {
    let kind = if inline { "inline" } else { "attachment" };
    let fallback: String = display_name
        .chars()
        .map(|c| {
            let safe = (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ';
            if safe { c } else { '_' }
        })
        .collect();
    let encoded = utf8_percent_encode(display_name, ATTR_CHAR);
    format!("{kind}; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

/// Download link for a URL name under `base`.
pub(crate) fn download_url(base: &str, url_name: &str) -> String {
    format!("{base}{}", utf8_percent_encode(url_name, SEGMENT))
}

/// Size for listings: plain bytes below 10 000, otherwise the largest decimal unit
/// in which the size is at least 10.
pub(crate) fn human_size(bytes: u64) -> String {
    const UNITS: [(u64, &str); 4] =
        [(1_000_000_000_000, "TB"), (1_000_000_000, "GB"), (1_000_000, "MB"), (1_000, "KB")];
    UNITS
        .iter()
        .find(|(unit, _)| bytes >= unit * 10)
        .map_or_else(
            || format!("{bytes} B"),
            |(unit, suffix)| format!("{} {suffix}", bytes.saturating_add(unit / 2) / unit),
        )
}

/// Age for listings: seconds below two minutes, then minutes, then hours and minutes.
pub(crate) fn human_age(seconds: u64) -> String {
    if seconds < 120 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes} m");
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}
