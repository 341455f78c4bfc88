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

//! Splitting a raw message into its header fields and leaf body parts.
//!
//! The MIME tree is walked iteratively with an explicit stack, and the result
//! is flattened into the leaf parts in document order. Like most mail
//! clients, this accepts wildly malformed input and does its best with it;
//! the only thing that is rejected outright is input with no header section
//! at all.

use std::borrow::Cow;
use std::str;

use super::content_encoding::{decode_text, decode_transfer};
use super::encoded_word::decode_header_value;
use super::header::{
    self, ContentDisposition, ContentTransferEncoding, ContentType,
};
use crate::support::error::Error;

const MAX_RECURSION: u32 = 20;
const MAX_PARTS: u32 = 1000;

/// A single header field, with folding undone and surrounding whitespace
/// removed from the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

/// Return the value of the first header called `name`.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a [u8]> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| &h.value[..])
}

/// A leaf of the MIME tree.
#[derive(Clone, Debug)]
pub struct BodyPart<'a> {
    pub content_type: ContentType,
    pub transfer_encoding: ContentTransferEncoding,
    pub disposition: Option<ContentDisposition>,
    /// The content, still transfer-encoded.
    pub content: &'a [u8],
    /// 0 for a non-multipart message, 1 for direct children of the top-level
    /// multipart, etc.
    pub depth: u32,
}

impl BodyPart<'_> {
    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_ref()
            .map_or(false, ContentDisposition::is_attachment)
    }

    /// The decoded file name of this part, from `Content-Disposition` or
    /// failing that the `name` parameter of `Content-Type`.
    pub fn filename(&self) -> Option<String> {
        self.disposition
            .as_ref()
            .and_then(|cd| cd.parm("filename"))
            .or_else(|| self.content_type.parm("name"))
            .map(|raw| decode_header_value(&raw))
            .filter(|name| !name.is_empty())
    }

    /// The content with the transfer encoding undone.
    pub fn decoded(&self) -> Cow<'_, [u8]> {
        decode_transfer(self.transfer_encoding, self.content)
    }

    /// The content as text, converted from the declared charset.
    pub fn text(&self) -> String {
        let charset = self.content_type.parm("charset");
        decode_text(charset.as_deref(), &self.decoded())
    }
}

/// A message split into its top-level headers and leaf body parts.
#[derive(Debug)]
pub struct SplitMessage<'a> {
    pub headers: Vec<Header>,
    pub parts: Vec<BodyPart<'a>>,
}

/// Split `data` into headers and leaf body parts.
///
/// Inline `message/rfc822` parts are descended into, contributing the leaves
/// of the encapsulated message; their headers are discarded.
///
/// Fails with `Error::Unparseable` if `data` does not begin with a header
/// section.
pub fn split_message(data: &[u8]) -> Result<SplitMessage<'_>, Error> {
    let data = skip_mbox_from_line(data);
    let (headers, body) = split_headers(data);
    if headers.is_empty() {
        return Err(Error::Unparseable);
    }

    let mut parts = Vec::new();
    let mut part_count = 1u32;
    let mut stack =
        vec![describe(&headers, ContentType::text_plain(), body, 0)];

    while let Some(part) = stack.pop() {
        if part.depth >= MAX_RECURSION {
            parts.push(part);
            continue;
        }

        // An inline forwarded message is walked like the rest of the body;
        // an attached one stays a single part.
        if part.content_type.is_type("message")
            && part.content_type.is_subtype("rfc822")
            && !part.is_attachment()
            && part_count < MAX_PARTS
        {
            part_count += 1;
            let (inner_headers, inner_body) = split_headers(part.content);
            stack.push(describe(
                &inner_headers,
                ContentType::text_plain(),
                inner_body,
                part.depth + 1,
            ));
            continue;
        }

        let boundary = if part.content_type.is_type("multipart") {
            part.content_type.parm("boundary").map(Cow::into_owned)
        } else {
            None
        };

        let boundary = match boundary {
            Some(boundary) => boundary,
            None => {
                parts.push(part);
                continue;
            },
        };

        let child_default = if part.content_type.is_subtype("digest") {
            ContentType::message_rfc822()
        } else {
            ContentType::text_plain()
        };

        let children = split_multipart(part.content, &boundary);
        let mut described = Vec::with_capacity(children.len());
        for child in children {
            if part_count >= MAX_PARTS {
                break;
            }
            part_count += 1;

            let (child_headers, child_body) = split_headers(child);
            described.push(describe(
                &child_headers,
                child_default.clone(),
                child_body,
                part.depth + 1,
            ));
        }

        // Reversed so that popping yields document order
        stack.extend(described.into_iter().rev());
    }

    Ok(SplitMessage { headers, parts })
}

fn describe<'a>(
    headers: &[Header],
    default_content_type: ContentType,
    content: &'a [u8],
    depth: u32,
) -> BodyPart<'a> {
    BodyPart {
        content_type: find_header(headers, "Content-Type")
            .and_then(header::parse_content_type)
            .unwrap_or(default_content_type),
        transfer_encoding: find_header(headers, "Content-Transfer-Encoding")
            .and_then(header::parse_content_transfer_encoding)
            .unwrap_or_default(),
        disposition: find_header(headers, "Content-Disposition")
            .and_then(header::parse_content_disposition),
        content,
        depth,
    }
}

/// Delivery agents are sometimes handed the mbox-style `From ` envelope line
/// before the real headers.
fn skip_mbox_from_line(data: &[u8]) -> &[u8] {
    if data.starts_with(b"From ") {
        let (_, end) = next_line(data, 0);
        &data[end..]
    } else {
        data
    }
}

/// Returns the content of the line starting at `start` without its line
/// ending, and the offset of the start of the next line.
fn next_line(data: &[u8], start: usize) -> (&[u8], usize) {
    let end = memchr::memchr(b'\n', &data[start..])
        .map_or(data.len(), |lf| start + lf + 1);
    (strip_line_ending(&data[start..end]), end)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Split the header section off the front of `data`.
///
/// The header section ends at the first blank line, or at the first line
/// which is neither a header nor a continuation, in which case that line
/// becomes part of the body.
fn split_headers(data: &[u8]) -> (Vec<Header>, &[u8]) {
    let mut headers = Vec::new();
    let mut current: Option<(String, Vec<u8>)> = None;
    let mut pos = 0;

    let body_start = loop {
        if pos >= data.len() {
            break data.len();
        }

        let (line, next) = next_line(data, pos);
        if line.is_empty() {
            break next;
        }

        if line.starts_with(b" ") || line.starts_with(b"\t") {
            if let Some((_, ref mut value)) = current {
                value.extend_from_slice(line);
                pos = next;
                continue;
            }
        }

        match split_header_line(line) {
            Some((name, value)) => {
                headers.extend(current.take().map(finish_header));
                current = Some((name, value.to_vec()));
            },
            None => break pos,
        }

        pos = next;
    };

    headers.extend(current.take().map(finish_header));
    (headers, &data[body_start..])
}

fn split_header_line(line: &[u8]) -> Option<(String, &[u8])> {
    let colon = memchr::memchr(b':', line)?;
    let name = trim_end(&line[..colon]);
    if name.is_empty() || !name.iter().all(|&b| b > b' ' && b < 0x7F) {
        return None;
    }

    let name = str::from_utf8(name).ok()?;
    Some((name.to_owned(), &line[colon + 1..]))
}

fn finish_header((name, value): (String, Vec<u8>)) -> Header {
    let start = value
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(value.len());
    let end = start + trim_end(&value[start..]).len();
    Header {
        name,
        value: value[start..end].to_vec(),
    }
}

fn trim_end(s: &[u8]) -> &[u8] {
    let end = s
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |ix| ix + 1);
    &s[..end]
}

/// Split the content of a multipart entity into the raw (header and body)
/// content of each part.
///
/// The preamble and epilogue are discarded. The line ending before each
/// delimiter belongs to the delimiter, not the preceding part. If the final
/// delimiter is missing, the last part runs to the end of the content.
fn split_multipart<'a>(content: &'a [u8], boundary: &[u8]) -> Vec<&'a [u8]> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary);

    let mut parts = Vec::new();
    let mut part_start = None;
    let mut prev_line_ending = 0;
    let mut pos = 0;

    while pos < content.len() {
        let (line, next) = next_line(content, pos);
        let line_ending = next - pos - line.len();

        if line.starts_with(&delimiter) {
            let rest = trim_end(&line[delimiter.len()..]);
            let is_close = rest.starts_with(b"--");

            if rest.is_empty() || is_close {
                if let Some(start) = part_start.take() {
                    let end = pos.saturating_sub(prev_line_ending).max(start);
                    parts.push(&content[start..end]);
                }

                if is_close {
                    return parts;
                }

                part_start = Some(next);
            }
        }

        prev_line_ending = line_ending;
        pos = next;
    }

    if let Some(start) = part_start {
        parts.push(&content[start..]);
    }

    parts
}
