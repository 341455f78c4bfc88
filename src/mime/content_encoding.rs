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

use std::borrow::Cow;

use super::header::ContentTransferEncoding;
use super::quoted_printable::qp_decode;

/// Undo the content transfer encoding of a body part.
///
/// This is lenient in the same way mail clients are: characters outside the
/// base64 alphabet (such as line breaks) are skipped, padding may be
/// missing, and if the base64 still cannot be decoded the raw content is
/// returned as-is.
pub fn decode_transfer(
    cte: ContentTransferEncoding,
    data: &[u8],
) -> Cow<'_, [u8]> {
    use super::header::ContentTransferEncoding as CTE;

    match cte {
        CTE::SevenBit | CTE::EightBit | CTE::Binary => Cow::Borrowed(data),
        CTE::QuotedPrintable => Cow::Owned(qp_decode(data)),
        CTE::Base64 => match decode_base64(data) {
            Some(decoded) => Cow::Owned(decoded),
            None => Cow::Borrowed(data),
        },
    }
}

fn decode_base64(data: &[u8]) -> Option<Vec<u8>> {
    let mut alphabet = data
        .iter()
        .copied()
        .take_while(|&b| b'=' != b)
        .filter(|&b| b.is_ascii_alphanumeric() || b'+' == b || b'/' == b)
        .collect::<Vec<u8>>();

    // A single dangling sextet can't encode anything
    if 1 == alphabet.len() % 4 {
        alphabet.pop();
    }

    clear_trailing_bits(&mut alphabet);
    base64::decode_config(&alphabet, base64::STANDARD_NO_PAD).ok()
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Zero the bits of the final symbol of a partial quantum which don't make it
/// into any output byte. Encoders are supposed to leave them zero, but not
/// all do, and the `base64` crate rejects the input when they don't.
fn clear_trailing_bits(symbols: &mut [u8]) {
    let mask = match symbols.len() % 4 {
        2 => 0x30,
        3 => 0x3C,
        _ => return,
    };

    if let Some(last) = symbols.last_mut() {
        if let Some(value) = BASE64_ALPHABET.iter().position(|&b| b == *last) {
            *last = BASE64_ALPHABET[value & mask];
        }
    }
}

/// Convert the content of a text part to UTF-8.
///
/// `charset` is the `charset` parameter of the part's content type, if any.
/// Unknown charsets and invalid sequences degrade to replacement characters
/// rather than failing.
pub fn decode_text(charset: Option<&[u8]>, data: &[u8]) -> String {
    match charset.and_then(encoding_rs::Encoding::for_label_no_replacement) {
        Some(encoding) => encoding.decode_with_bom_removal(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    }
}
