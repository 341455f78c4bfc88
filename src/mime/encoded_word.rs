//-
// Copyright (c) 2026, The Sealpost Authors
//
// This file is part of Sealpost.
//
// Sealpost is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Sealpost is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Sealpost. If not, see <http://www.gnu.org/licenses/>.

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

use super::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=").unwrap();
}

/// Decode an entire unstructured header value (e.g., `Subject`) or phrase
/// (e.g., the display name in `From`).
///
/// Encoded words may occur anywhere. Whitespace between two adjacent encoded
/// words is deleted, per RFC 2047; all other text is kept as-is. Bytes which
/// are not valid UTF-8 are replaced rather than causing failure. Leading and
/// trailing whitespace is trimmed.
pub fn decode_header_value(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut last_was_encoded = false;

    for captures in ENCODED_WORD.captures_iter(&text) {
        let whole = match captures.get(0) {
            Some(whole) => whole,
            None => continue,
        };

        let decoded = match (captures.get(1), captures.get(2), captures.get(3))
        {
            (Some(charset), Some(xfer), Some(content)) => decode_parts(
                charset.as_str(),
                xfer.as_str(),
                content.as_str(),
            ),
            _ => None,
        };

        let decoded = match decoded {
            Some(decoded) => decoded,
            // Leave the undecodable word in the text verbatim
            None => continue,
        };

        let between = &text[last_end..whole.start()];
        if !(last_was_encoded && between.trim().is_empty()) {
            out.push_str(between);
        }

        out.push_str(&decoded);
        last_end = whole.end();
        last_was_encoded = true;
    }

    out.push_str(&text[last_end..]);
    out.trim().to_owned()
}

fn decode_parts(charset: &str, xfer: &str, content: &str) -> Option<String> {
    let content = decode_xfer(xfer, content)?;

    // RFC 2231 allows a language suffix on the charset, e.g. `utf-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    Some(match Encoding::for_label_no_replacement(charset.as_bytes()) {
        Some(encoding) => {
            encoding.decode_with_bom_removal(&content).0.into_owned()
        },
        None => String::from_utf8_lossy(&content).into_owned(),
    })
}

fn decode_xfer(xfer: &str, content: &str) -> Option<Vec<u8>> {
    match xfer {
        // _ in the content (before transfer decoding) stands for ASCII space
        // regardless of charset
        "q" | "Q" => Some(qp_decode(content.replace('_', " ").as_bytes())),
        "b" | "B" => base64::decode(content).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn rfc2047_examples() {
        assert_eq!("hello world", decode_header_value(b"hello world"));
        assert_eq!(
            "x Keith Moore",
            decode_header_value(b"x =?US-ASCII?Q?Keith_Moore?=")
        );
        assert_eq!(
            "Keld Jørn Simonsen",
            decode_header_value(b"=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=")
        );
        assert_eq!(
            "If you can read this yo",
            decode_header_value(
                b"=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?="
            )
        );
        assert_eq!(
            "םולש ןב ילטפנ",
            decode_header_value(b"=?iso-8859-8?b?7eXs+SDv4SDp7Oj08A==?=")
        );
    }

    #[test]
    fn unknown_charset_decodes_permissively() {
        assert_eq!(
            "héllo",
            decode_header_value(b"=?x-no-such-charset?Q?h=C3=A9llo?=")
        );
    }

    #[test]
    fn test_decode_header_value() {
        assert_eq!("plain subject", decode_header_value(b" plain subject "));
        assert_eq!(
            "Olá mundo",
            decode_header_value(b"=?UTF-8?Q?Ol=C3=A1?= mundo")
        );
        // Whitespace between adjacent encoded words disappears
        assert_eq!(
            "ab",
            decode_header_value(b"=?ISO-8859-1?Q?a?=\r\n =?ISO-8859-1?Q?b?=")
        );
        assert_eq!(
            "a b",
            decode_header_value(b"=?ISO-8859-1?Q?a_?= =?ISO-8859-1?Q?b?=")
        );
        assert_eq!(
            "\"José\" <jose@example.com>",
            decode_header_value(
                b"\"=?utf-8?B?Sm9zw6k=?=\" <jose@example.com>"
            )
        );
        // Broken base64 is left alone
        assert_eq!("=?utf-8?B?***?=", decode_header_value(b"=?utf-8?B?***?="));
        // Invalid UTF-8 outside encoded words is replaced, not fatal
        assert_eq!("caf\u{FFFD}", decode_header_value(b"caf\xe9"));
    }

    proptest! {
        #[test]
        fn encoded_words_never_panic(s in r"=\?.*\?.*\?.*\?=") {
            decode_header_value(s.as_bytes());
        }

        #[test]
        fn decode_header_value_never_panics(s in ".*") {
            decode_header_value(s.as_bytes());
        }
    }
}
