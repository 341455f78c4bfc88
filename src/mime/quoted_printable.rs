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

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// Soft line breaks are removed, with either DOS or UNIX line endings.
///
/// This never fails. Malformed escapes (including a dangling `=` at the end
/// of the input) are passed through verbatim, as is 8-bit data.
pub fn qp_decode(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut ix = 0;

    while ix < s.len() {
        let b = s[ix];
        if b'=' != b {
            out.push(b);
            ix += 1;
            continue;
        }

        let rest = &s[ix + 1..];
        if rest.starts_with(b"\r\n") {
            ix += 3;
        } else if rest.starts_with(b"\n") {
            ix += 2;
        } else if let Some(byte) = rest.get(..2).and_then(|hex| {
            Some((hex_value(hex[0])? << 4) | hex_value(hex[1])?)
        }) {
            out.push(byte);
            ix += 3;
        } else {
            out.push(b'=');
            ix += 1;
        }
    }

    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
