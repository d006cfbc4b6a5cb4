//! File-extension to media-type table for download responses.

use crate::http::constants::OCTET_STREAM;

const TABLE: &[(&str, &str)] = &[
    ("aac", "audio/aac"),
    ("avi", "video/x-msvideo"),
    ("css", "text/css"),
    ("flac", "audio/flac"),
    ("gif", "image/gif"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("m4a", "audio/mp4"),
    ("m4v", "video/x-m4v"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogg", "audio/ogg"),
    ("ogv", "video/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("srt", "application/x-subrip"),
    ("svg", "image/svg+xml"),
    ("torrent", "application/x-bittorrent"),
    ("ts", "video/mp2t"),
    ("txt", "text/plain"),
    ("vtt", "text/vtt"),
    ("wav", "audio/wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("xml", "text/xml"),
    ("zip", "application/zip"),
];

/// Media type for `file_name`, by extension, case-insensitively.
pub(crate) fn content_type_for(file_name: &str) -> &'static str {
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return OCTET_STREAM;
    };
    let extension = extension.to_ascii_lowercase();
    TABLE
        .binary_search_by(|(known, _)| known.cmp(&extension.as_str()))
        .map_or(OCTET_STREAM, |index| TABLE[index].1)
}

/// `Content-Disposition` value offering `file_name` as an attachment.
pub(crate) fn attachment_disposition(file_name: &str) -> String {
    let escaped: String = file_name
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii_graphic() || ch == ' ' => ch,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_lookup() {
        assert!(TABLE.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn content_types_follow_extensions() {
        let cases = [
            ("Episode.MKV", "video/x-matroska"),
            ("clip.mp4", "video/mp4"),
            ("subs.en.srt", "application/x-subrip"),
            ("README", OCTET_STREAM),
            ("archive.tar.xz", OCTET_STREAM),
        ];
        for (name, expected) in cases {
            assert_eq!(content_type_for(name), expected, "{name}");
        }
    }

    #[test]
    fn dispositions_are_quoted_and_ascii() {
        assert_eq!(
            attachment_disposition("my \"best\" clip.mp4"),
            "attachment; filename=\"my _best_ clip.mp4\""
        );
        assert_eq!(
            attachment_disposition("café.mkv"),
            "attachment; filename=\"caf_.mkv\""
        );
    }
}
