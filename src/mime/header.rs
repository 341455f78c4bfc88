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

//! Utilities for working with individual RFC 2822 / RFC 2045 headers.

use std::borrow::Cow;
use std::str;

use chrono::prelude::*;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, opt},
    multi::{fold_many0, many0},
    sequence::{delimited, preceded, tuple},
    IResult,
};

/// A parsed `Content-Type` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    /// Lower-cased.
    pub typ: String,
    /// Lower-cased.
    pub subtype: String,
    pub parms: Vec<(String, Vec<u8>)>,
}

impl ContentType {
    pub fn text_plain() -> Self {
        ContentType {
            typ: "text".to_owned(),
            subtype: "plain".to_owned(),
            parms: vec![],
        }
    }

    pub fn message_rfc822() -> Self {
        ContentType {
            typ: "message".to_owned(),
            subtype: "rfc822".to_owned(),
            parms: vec![],
        }
    }

    pub fn is_type(&self, typ: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ)
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype.eq_ignore_ascii_case(subtype)
    }

    pub fn parm(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        find_parm(&self.parms, name)
    }

    /// The `type/subtype` string.
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.typ, self.subtype)
    }
}

/// A parsed `Content-Disposition` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Lower-cased.
    pub disposition: String,
    pub parms: Vec<(String, Vec<u8>)>,
}

impl ContentDisposition {
    pub fn is_attachment(&self) -> bool {
        "attachment" == self.disposition
    }

    pub fn parm(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        find_parm(&self.parms, name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::SevenBit
    }
}

/// Look up parameter `name`, handling the RFC 2231 `name*=charset'lang'%XX`
/// and continued `name*0*=...; name*1=...` forms in addition to the plain
/// one.
///
/// The RFC 2231 forms are decoded to UTF-8 when a charset is given; the plain
/// form is returned raw since it may still contain RFC 2047 encoded words.
fn find_parm<'a>(
    parms: &'a [(String, Vec<u8>)],
    name: &str,
) -> Option<Cow<'a, [u8]>> {
    let mut extended_name = String::with_capacity(name.len() + 1);
    extended_name.push_str(name);
    extended_name.push('*');

    if let Some((_, value)) = parms
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(&extended_name))
    {
        if let Some(decoded) = decode_rfc2231(value) {
            return Some(Cow::Owned(decoded));
        }
    }

    if let Some(joined) = join_continuations(parms, name) {
        return Some(Cow::Owned(joined));
    }

    parms
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| Cow::Borrowed(&v[..]))
}

/// If `parm_name` is segment `N` of a continuation of `name`, return `N` and
/// whether the segment is percent-encoded.
fn continuation_index(parm_name: &str, name: &str) -> Option<(u32, bool)> {
    let prefix = parm_name.get(..name.len())?;
    if !prefix.eq_ignore_ascii_case(name) {
        return None;
    }

    let rest = parm_name[name.len()..].strip_prefix('*')?;
    let (index, encoded) = match rest.strip_suffix('*') {
        Some(index) => (index, true),
        None => (rest, false),
    };

    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((index.parse().ok()?, encoded))
}

/// Reassemble an RFC 2231 continued parameter.
///
/// Segments are joined in numeric order starting at 0, stopping at the first
/// gap. The charset, if any, comes from segment 0 and applies to all the
/// percent-encoded segments.
fn join_continuations(
    parms: &[(String, Vec<u8>)],
    name: &str,
) -> Option<Vec<u8>> {
    let mut segments = parms
        .iter()
        .filter_map(|(n, v)| {
            continuation_index(n, name)
                .map(|(index, encoded)| (index, encoded, &v[..]))
        })
        .collect::<Vec<_>>();
    segments.sort_by_key(|&(index, _, _)| index);

    if 0 != segments.first()?.0 {
        return None;
    }

    let mut charset = None;
    let mut raw = Vec::new();
    for (expected, &(index, encoded, value)) in segments.iter().enumerate() {
        if index as usize != expected {
            break;
        }

        if !encoded {
            raw.extend_from_slice(value);
            continue;
        }

        let value = if 0 == index {
            let (segment_charset, rest) = split_charset(value)?;
            charset = Some(segment_charset);
            rest
        } else {
            value
        };
        percent_decode_into(&mut raw, value);
    }

    Some(match charset {
        Some(charset) => decode_charset(charset, &raw),
        None => raw,
    })
}

fn decode_rfc2231(value: &[u8]) -> Option<Vec<u8>> {
    let (charset, encoded) = split_charset(value)?;
    let mut raw = Vec::with_capacity(encoded.len());
    percent_decode_into(&mut raw, encoded);
    Some(decode_charset(charset, &raw))
}

/// Split `charset'language'rest` into the charset and the rest.
fn split_charset(value: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut split = value.splitn(3, |&b| b'\'' == b);
    let charset = split.next()?;
    let _language = split.next()?;
    let encoded = split.next()?;
    Some((charset, encoded))
}

fn percent_decode_into(raw: &mut Vec<u8>, encoded: &[u8]) {
    let mut ix = 0;
    while ix < encoded.len() {
        let b = encoded[ix];
        let hex = encoded
            .get(ix + 1..ix + 3)
            .and_then(|h| str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (b, hex) {
            (b'%', Some(byte)) => {
                raw.push(byte);
                ix += 3;
            },
            _ => {
                raw.push(b);
                ix += 1;
            },
        }
    }
}

fn decode_charset(charset: &[u8], raw: &[u8]) -> Vec<u8> {
    let encoding = encoding_rs::Encoding::for_label(charset)
        .unwrap_or(encoding_rs::UTF_8);
    encoding
        .decode_without_bom_handling(raw)
        .0
        .into_owned()
        .into_bytes()
}

// RFC 2045 "tspecials", plus space and controls, which also can't occur in a
// token.
fn is_token_char(b: u8) -> bool {
    b > b' ' && b < 0x7F && !b"()<>@,;:\\\"/[]?=".contains(&b)
}

fn token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(is_token_char)(i)
}

fn quoted_string(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    delimited(
        char('"'),
        fold_many0(
            alt((preceded(char('\\'), take(1usize)), is_not("\\\""))),
            Vec::new(),
            |mut acc: Vec<u8>, item: &[u8]| {
                acc.extend_from_slice(item);
                acc
            },
        ),
        char('"'),
    )(i)
}

fn parm(i: &[u8]) -> IResult<&[u8], (String, Vec<u8>)> {
    map(
        tuple((
            multispace0,
            tag(";"),
            multispace0,
            token,
            multispace0,
            char('='),
            multispace0,
            alt((quoted_string, map(token, <[u8]>::to_vec))),
        )),
        |(_, _, _, name, _, _, _, value)| {
            (String::from_utf8_lossy(name).into_owned(), value)
        },
    )(i)
}

fn content_type(i: &[u8]) -> IResult<&[u8], ContentType> {
    map(
        tuple((
            multispace0,
            token,
            multispace0,
            char('/'),
            multispace0,
            token,
            many0(parm),
        )),
        |(_, typ, _, _, _, subtype, parms)| ContentType {
            typ: String::from_utf8_lossy(typ).to_ascii_lowercase(),
            subtype: String::from_utf8_lossy(subtype).to_ascii_lowercase(),
            parms,
        },
    )(i)
}

fn content_disposition(i: &[u8]) -> IResult<&[u8], ContentDisposition> {
    map(
        tuple((multispace0, token, many0(parm), opt(tag(";")))),
        |(_, disposition, parms, _)| ContentDisposition {
            disposition: String::from_utf8_lossy(disposition)
                .to_ascii_lowercase(),
            parms,
        },
    )(i)
}

/// Parse the value of a `Content-Type` header.
///
/// Anything after the last parameter that could be understood is ignored.
pub fn parse_content_type(value: &[u8]) -> Option<ContentType> {
    content_type(value).ok().map(|(_, ct)| ct)
}

/// Parse the value of a `Content-Disposition` header.
pub fn parse_content_disposition(value: &[u8]) -> Option<ContentDisposition> {
    content_disposition(value).ok().map(|(_, cd)| cd)
}

/// Parse the value of a `Content-Transfer-Encoding` header.
///
/// Unknown encodings are reported as `None`; callers generally treat that as
/// an identity encoding.
pub fn parse_content_transfer_encoding(
    value: &[u8],
) -> Option<ContentTransferEncoding> {
    let value = str::from_utf8(value).ok()?.trim();
    if value.eq_ignore_ascii_case("7bit") {
        Some(ContentTransferEncoding::SevenBit)
    } else if value.eq_ignore_ascii_case("8bit") {
        Some(ContentTransferEncoding::EightBit)
    } else if value.eq_ignore_ascii_case("binary") {
        Some(ContentTransferEncoding::Binary)
    } else if value.eq_ignore_ascii_case("base64") {
        Some(ContentTransferEncoding::Base64)
    } else if value.eq_ignore_ascii_case("quoted-printable") {
        Some(ContentTransferEncoding::QuotedPrintable)
    } else {
        None
    }
}

/// Parse an RFC 2822 date-time, such as from the `Date` header.
///
/// Trailing comments, such as the common `(UTC)` or `(PDT)`, are ignored.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let mut value = value.trim();
    if value.ends_with(')') {
        if let Some(comment_start) = value.rfind('(') {
            value = value[..comment_start].trim_end();
        }
    }

    DateTime::parse_from_rfc2822(value).ok()
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_content_type() {
        let ct = parse_content_type(b"text/plain").unwrap();
        assert!(ct.is_type("text"));
        assert!(ct.is_subtype("plain"));
        assert!(ct.parms.is_empty());

        let ct = parse_content_type(
            b" Multipart/Alternative;\r\n\tboundary=\"=_foo; bar\"; \
              charset=utf-8",
        )
        .unwrap();
        assert_eq!("multipart/alternative", ct.mime_type());
        assert_eq!(&b"=_foo; bar"[..], &ct.parm("BOUNDARY").unwrap()[..]);
        assert_eq!(&b"utf-8"[..], &ct.parm("charset").unwrap()[..]);
        assert!(ct.parm("name").is_none());

        let ct =
            parse_content_type(b"text/html; name=\"a \\\"b\\\" c\"").unwrap();
        assert_eq!(&b"a \"b\" c"[..], &ct.parm("name").unwrap()[..]);

        assert!(parse_content_type(b"garbage").is_none());
        assert!(parse_content_type(b"").is_none());
    }

    #[test]
    fn test_parse_content_disposition() {
        let cd = parse_content_disposition(
            b"Attachment; filename=\"invoice.pdf\"; size=1234",
        )
        .unwrap();
        assert!(cd.is_attachment());
        assert_eq!(&b"invoice.pdf"[..], &cd.parm("filename").unwrap()[..]);

        let cd = parse_content_disposition(b"inline").unwrap();
        assert!(!cd.is_attachment());
        assert!(cd.parm("filename").is_none());
    }

    #[test]
    fn rfc2231_parameters() {
        let cd = parse_content_disposition(
            b"attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf; \
              filename=\"resume.pdf\"",
        )
        .unwrap();
        assert_eq!("résumé.pdf".as_bytes(), &cd.parm("filename").unwrap()[..]);

        let cd = parse_content_disposition(
            b"attachment; filename*=iso-8859-1'en'caf%E9.txt",
        )
        .unwrap();
        assert_eq!("café.txt".as_bytes(), &cd.parm("filename").unwrap()[..]);
    }

    #[test]
    fn rfc2231_continuations() {
        let cd = parse_content_disposition(
            b"attachment;\r\n\tfilename*0*=UTF-8''Rechnung%20f%C3%BCr%20den%20\
              Monat%20;\r\n\tfilename*1*=Januar.pdf",
        )
        .unwrap();
        assert_eq!(
            "Rechnung für den Monat Januar.pdf".as_bytes(),
            &cd.parm("filename").unwrap()[..]
        );

        // Out of order, mixing plain and encoded segments
        let cd = parse_content_disposition(
            b"attachment; filename*2=\"end.txt\"; \
              filename*0*=iso-8859-1'de'caf%E9; filename*1=\"-\"",
        )
        .unwrap();
        assert_eq!(
            "café-end.txt".as_bytes(),
            &cd.parm("filename").unwrap()[..]
        );

        // Plain continuations are joined verbatim
        let ct = parse_content_type(
            b"application/pdf; name*0=\"very long \"; name*1=\"name.pdf\"",
        )
        .unwrap();
        assert_eq!(&b"very long name.pdf"[..], &ct.parm("name").unwrap()[..]);

        // A gap ends the value
        let ct =
            parse_content_type(b"text/plain; name*0=a; name*2=c").unwrap();
        assert_eq!(&b"a"[..], &ct.parm("name").unwrap()[..]);

        // Without segment 0 there is no value
        let ct = parse_content_type(b"text/plain; name*1=b").unwrap();
        assert!(ct.parm("name").is_none());
    }

    #[test]
    fn test_parse_content_transfer_encoding() {
        assert_eq!(
            Some(ContentTransferEncoding::Base64),
            parse_content_transfer_encoding(b" BASE64\r\n")
        );
        assert_eq!(
            Some(ContentTransferEncoding::QuotedPrintable),
            parse_content_transfer_encoding(b"quoted-printable")
        );
        assert_eq!(None, parse_content_transfer_encoding(b"x-uuencode"));
    }

    #[test]
    fn test_parse_datetime() {
        let dt = parse_datetime("Fri, 21 Nov 1997 09:55:06 -0600").unwrap();
        assert_eq!(880127706, dt.timestamp());

        let dt = parse_datetime("Thu, 13 Feb 1969 23:32:54 -0330").unwrap();
        assert_eq!(-27723426, dt.timestamp());

        let dt =
            parse_datetime("  Mon, 2 Jan 2023 10:00:00 +0000 (UTC)").unwrap();
        assert_eq!(1672653600, dt.timestamp());

        assert!(parse_datetime("yesterday at noon").is_none());
        assert!(parse_datetime("").is_none());
    }

    proptest! {
        #[test]
        fn header_parsers_never_panic(s in ".*") {
            parse_content_type(s.as_bytes());
            parse_content_disposition(s.as_bytes());
            parse_content_transfer_encoding(s.as_bytes());
            parse_datetime(&s);
        }
    }
}
