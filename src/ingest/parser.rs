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

//! Extraction of the envelope, body text and attachment metadata from a raw
//! message.

use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;

use super::model::*;
use crate::mime::encoded_word::decode_header_value;
use crate::mime::header::parse_datetime;
use crate::mime::parts::{find_header, split_message, BodyPart, Header};
use crate::support::error::Error;

lazy_static! {
    static ref ADDRESS: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
            .unwrap();
}

/// Parse `data` into its envelope, body and attachments.
///
/// Only a message with no recognisable header section fails; anything else
/// produces a best-effort result, with absent headers treated as empty.
pub fn parse_message(data: &[u8]) -> Result<ParsedMessage, Error> {
    let message = split_message(data)?;
    let headers = &message.headers[..];

    let raw_from = raw_header(headers, "From");
    let from_name = decoded_header(headers, "From");
    let from = extract_addresses(&from_name);
    let message_id = raw_header(headers, "Message-ID");
    let thread_id = if message_id.is_empty() {
        Local::now().format("thread-%Y%m%d%H%M%S").to_string()
    } else {
        message_id.clone()
    };

    let envelope = EmailEnvelope {
        thread_id,
        from_address: from.into_iter().next().unwrap_or(raw_from),
        from_name,
        to: extract_addresses(&decoded_header(headers, "To")),
        cc: extract_addresses(&decoded_header(headers, "Cc")),
        bcc: extract_addresses(&decoded_header(headers, "Bcc")),
        subject: decoded_header(headers, "Subject"),
        date: parse_datetime(&raw_header(headers, "Date")),
        message_id,
    };

    Ok(ParsedMessage {
        envelope,
        body: select_body(&message.parts),
        attachments: message.parts.iter().filter_map(attachment_meta).collect(),
    })
}

/// Find everything that looks like an email address in `text`, in order and
/// with the original case.
pub fn extract_addresses(text: &str) -> Vec<String> {
    ADDRESS
        .find_iter(text)
        .map(|m| m.as_str().to_owned())
        .collect()
}

fn raw_header(headers: &[Header], name: &str) -> String {
    find_header(headers, name)
        .map(|value| String::from_utf8_lossy(value).into_owned())
        .unwrap_or_default()
}

fn decoded_header(headers: &[Header], name: &str) -> String {
    find_header(headers, name)
        .map(decode_header_value)
        .unwrap_or_default()
}

/// The HTML parts concatenated if there are any, otherwise the plain text
/// parts concatenated. Attachments never contribute.
fn select_body(parts: &[BodyPart<'_>]) -> String {
    let mut html = String::new();
    let mut text = String::new();

    for part in parts {
        if part.is_attachment() {
            continue;
        }

        let ct = &part.content_type;
        if ct.is_type("text") && ct.is_subtype("html") {
            html.push_str(&part.text());
        } else if (ct.is_type("text") && ct.is_subtype("plain"))
            || 0 == part.depth
        {
            // A single-part message is body text whatever it claims to be
            text.push_str(&part.text());
        }
    }

    if html.is_empty() {
        text
    } else {
        html
    }
}

fn attachment_meta(part: &BodyPart<'_>) -> Option<AttachmentMeta> {
    if !part.is_attachment() {
        return None;
    }

    Some(AttachmentMeta {
        filename: part.filename()?,
        content_type: part.content_type.mime_type(),
        size: part.decoded().len(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn html_preferred_over_plain() {
        let parsed = parse_message(
            b"From: Alice <alice@example.com>\r\n\
              To: bob@x.com\r\n\
              Subject: both\r\n\
              Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
              \r\n\
              --alt\r\n\
              Content-Type: text/plain; charset=utf-8\r\n\
              \r\n\
              plain version\r\n\
              --alt\r\n\
              Content-Type: text/html; charset=utf-8\r\n\
              \r\n\
              <p>html version</p>\r\n\
              --alt--\r\n",
        )
        .unwrap();

        assert_eq!("<p>html version</p>", parsed.body);
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn plain_parts_concatenate() {
        let parsed = parse_message(
            b"Content-Type: multipart/mixed; boundary=m\n\
              \n\
              --m\n\
              \n\
              one \n\
              --m\n\
              Content-Type: text/plain\n\
              Content-Transfer-Encoding: quoted-printable\n\
              \n\
              tw=C3=B3\n\
              --m--\n",
        )
        .unwrap();

        assert_eq!("one tw\u{f3}", parsed.body);
    }

    #[test]
    fn attachment_metadata() {
        let parsed = parse_message(
            b"From: alice@example.com\n\
              To: bob@x.com\n\
              Content-Type: multipart/mixed; boundary=\"mix\"\n\
              \n\
              --mix\n\
              Content-Type: text/plain\n\
              \n\
              See attached.\n\
              --mix\n\
              Content-Type: application/pdf\n\
              Content-Disposition: attachment; filename=\"invoice.pdf\"\n\
              Content-Transfer-Encoding: base64\n\
              \n\
              JVBERi0xLjQKJcfs\n\
              j6IK\n\
              --mix\n\
              Content-Type: application/octet-stream\n\
              Content-Disposition: attachment\n\
              \n\
              nameless\n\
              --mix--\n",
        )
        .unwrap();

        assert_eq!(
            vec![AttachmentMeta {
                filename: "invoice.pdf".to_owned(),
                content_type: "application/pdf".to_owned(),
                size: 15,
            }],
            parsed.attachments
        );
        assert_eq!("See attached.", parsed.body);
    }

    #[test]
    fn continued_filename_attachment() {
        let parsed = parse_message(
            b"From: alice@example.com\n\
              To: bob@x.com\n\
              Content-Type: multipart/mixed; boundary=\"mix\"\n\
              \n\
              --mix\n\
              Content-Type: text/plain\n\
              \n\
              Invoice attached.\n\
              --mix\n\
              Content-Type: application/pdf\n\
              Content-Disposition: attachment;\n\
              \tfilename*0*=UTF-8''Rechnung%20f%C3%BCr%20den%20Monat%20;\n\
              \tfilename*1*=Januar.pdf\n\
              Content-Transfer-Encoding: base64\n\
              \n\
              QR==\n\
              --mix--\n",
        )
        .unwrap();

        assert_eq!(
            vec![AttachmentMeta {
                filename: "Rechnung für den Monat Januar.pdf".to_owned(),
                content_type: "application/pdf".to_owned(),
                size: 1,
            }],
            parsed.attachments
        );
    }

    #[test]
    fn forwarded_message_contributes_body() {
        let parsed = parse_message(
            b"From: alice@example.com\n\
              To: bob@x.com\n\
              Subject: Fwd: news\n\
              Content-Type: multipart/mixed; boundary=m\n\
              \n\
              --m\n\
              Content-Type: text/plain\n\
              \n\
              See below. \n\
              --m\n\
              Content-Type: message/rfc822\n\
              \n\
              From: carol@example.com\n\
              Subject: news\n\
              \n\
              forwarded text\n\
              --m--\n",
        )
        .unwrap();

        assert_eq!("See below. forwarded text", parsed.body);
        assert_eq!("Fwd: news", parsed.envelope.subject);
        assert_eq!("alice@example.com", parsed.envelope.from_address);
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn envelope_fields() {
        let parsed = parse_message(
            b"From: =?UTF-8?Q?Jos=C3=A9?= <Jose@Example.com>\r\n\
              To: \"Bob\" <bob@x.com>, dave@x.com\r\n\
              Cc: carol@x.com\r\n\
              Subject: =?ISO-8859-1?Q?caf=E9?= time\r\n\
              Message-ID: <abc@example.com>\r\n\
              Date: Mon, 2 Jan 2023 10:00:00 +0000\r\n\
              \r\n\
              hello\r\n",
        )
        .unwrap();

        let envelope = &parsed.envelope;
        assert_eq!("<abc@example.com>", envelope.message_id);
        assert_eq!("<abc@example.com>", envelope.thread_id);
        assert_eq!("Jose@Example.com", envelope.from_address);
        assert_eq!("José <Jose@Example.com>", envelope.from_name);
        assert_eq!(vec!["bob@x.com", "dave@x.com"], envelope.to);
        assert_eq!(vec!["carol@x.com"], envelope.cc);
        assert!(envelope.bcc.is_empty());
        assert_eq!("café time", envelope.subject);
        assert_eq!(
            Some(1672653600),
            envelope.date.map(|d| d.timestamp())
        );
        assert_eq!("hello\r\n", parsed.body);
    }

    #[test]
    fn missing_headers_default_to_empty() {
        let parsed = parse_message(b"X-Nothing: here\n\nbody").unwrap();
        let envelope = &parsed.envelope;
        assert_eq!("", envelope.message_id);
        assert!(envelope.thread_id.starts_with("thread-"));
        assert_eq!("thread-".len() + 14, envelope.thread_id.len());
        assert_eq!("", envelope.from_address);
        assert_eq!("", envelope.from_name);
        assert_eq!("", envelope.subject);
        assert!(envelope.recipient_candidates().is_empty());
        assert_eq!(None, envelope.date);
    }

    #[test]
    fn from_without_address_is_kept_raw() {
        let parsed =
            parse_message(b"From: MAILER-DAEMON\nTo: a@b.cc\n\nx").unwrap();
        assert_eq!("MAILER-DAEMON", parsed.envelope.from_address);
    }

    #[test]
    fn unparseable_message() {
        assert_matches!(
            Err(Error::Unparseable),
            parse_message(b"this is not a message")
        );
    }

    #[test]
    fn address_extraction() {
        assert_eq!(
            vec!["A.B+c@Sub.Example.org", "x_y@z.io"],
            extract_addresses(
                "\"Last, First\" <A.B+c@Sub.Example.org>, x_y@z.io, nobody@localhost"
            )
        );
        assert!(extract_addresses("").is_empty());
    }
}
