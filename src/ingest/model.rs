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

//! The delivery-side model: what the parser extracts from a message, and the
//! record that ends up in the `emails` relation.

use std::fmt;

use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use crate::account::model::AccountId;

/// The identifier of a stored email (a row of `emails`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailId(pub i64);

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identifier of a webmail folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FolderId(pub i64);

impl FolderId {
    /// The folder every delivered message lands in.
    pub const INBOX: Self = Self(1);
}

/// Message metadata, independent of the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailEnvelope {
    /// The raw `Message-ID` header, empty if absent.
    pub message_id: String,
    /// The message id, or a time-derived id if there is none.
    pub thread_id: String,
    pub from_address: String,
    pub from_name: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    /// The decoded subject, empty if absent.
    pub subject: String,
    /// The `Date` header, if present and understood.
    pub date: Option<DateTime<FixedOffset>>,
}

impl EmailEnvelope {
    /// The addresses to try when looking for the owning account: all To
    /// addresses, then Cc, then Bcc.
    pub fn recipient_candidates(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .cloned()
            .collect()
    }
}

/// Metadata about one attachment. The content itself is never kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub filename: String,
    pub content_type: String,
    /// Size in bytes after the transfer encoding is undone.
    pub size: usize,
}

/// Everything the parser extracts from one message.
#[derive(Clone, Debug)]
pub struct ParsedMessage {
    pub envelope: EmailEnvelope,
    pub body: String,
    pub attachments: Vec<AttachmentMeta>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmailFlags {
    pub read: bool,
    pub starred: bool,
    pub draft: bool,
}

/// A row ready to be inserted into `emails`.
///
/// `subject` and `body` hold the encrypted (or, if encryption failed, the
/// plain) text.
#[derive(Clone, Debug)]
pub struct EmailRecord {
    pub account: AccountId,
    pub folder: FolderId,
    /// `None` when the message had no `Message-ID`.
    pub message_id: Option<String>,
    pub thread_id: String,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub cc_address: Option<String>,
    pub bcc_address: Option<String>,
    pub subject: String,
    pub body: String,
    /// JSON array of `AttachmentMeta`, `None` if there are no attachments.
    pub attachments: Option<String>,
    pub flags: EmailFlags,
    pub received_at: DateTime<Utc>,
}

impl EmailRecord {
    /// Build the record for `envelope` owned by `account`.
    ///
    /// `subject` and `body` are stored as given; the caller is responsible
    /// for encrypting them first.
    pub fn new(
        account: AccountId,
        envelope: &EmailEnvelope,
        subject: String,
        body: String,
        attachments: &[AttachmentMeta],
    ) -> Result<Self, serde_json::Error> {
        let attachments = if attachments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(attachments)?)
        };

        Ok(EmailRecord {
            account,
            folder: FolderId::INBOX,
            message_id: Some(envelope.message_id.clone())
                .filter(|id| !id.is_empty()),
            thread_id: envelope.thread_id.clone(),
            from_address: envelope.from_address.clone(),
            from_name: envelope.from_name.clone(),
            to_address: envelope.to.join(", "),
            cc_address: join_nonempty(&envelope.cc),
            bcc_address: join_nonempty(&envelope.bcc),
            subject,
            body,
            attachments,
            flags: EmailFlags::default(),
            received_at: envelope
                .date
                .map_or_else(Utc::now, |date| date.with_timezone(&Utc)),
        })
    }
}

fn join_nonempty(addresses: &[String]) -> Option<String> {
    if addresses.is_empty() {
        None
    } else {
        Some(addresses.join(", "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn envelope() -> EmailEnvelope {
        EmailEnvelope {
            message_id: String::new(),
            thread_id: "thread-20230102100000".to_owned(),
            from_address: "alice@example.com".to_owned(),
            from_name: "Alice <alice@example.com>".to_owned(),
            to: vec!["bob@x.com".to_owned(), "dave@x.com".to_owned()],
            cc: vec!["carol@x.com".to_owned()],
            bcc: vec![],
            subject: "hi".to_owned(),
            date: DateTime::parse_from_rfc2822(
                "Mon, 2 Jan 2023 10:00:00 +0000",
            )
            .ok(),
        }
    }

    #[test]
    fn recipient_candidates_are_ordered() {
        let mut envelope = envelope();
        envelope.bcc.push("erin@x.com".to_owned());
        assert_eq!(
            vec!["bob@x.com", "dave@x.com", "carol@x.com", "erin@x.com"],
            envelope.recipient_candidates()
        );
    }

    #[test]
    fn record_from_envelope() {
        let record = EmailRecord::new(
            AccountId(5),
            &envelope(),
            "s".to_owned(),
            "b".to_owned(),
            &[],
        )
        .unwrap();

        assert_eq!(AccountId(5), record.account);
        assert_eq!(FolderId::INBOX, record.folder);
        assert_eq!(None, record.message_id);
        assert_eq!("bob@x.com, dave@x.com", record.to_address);
        assert_eq!(Some("carol@x.com".to_owned()), record.cc_address);
        assert_eq!(None, record.bcc_address);
        assert_eq!(None, record.attachments);
        assert_eq!(EmailFlags::default(), record.flags);
        assert!(!record.flags.read);
        assert_eq!(1672653600, record.received_at.timestamp());
    }

    #[test]
    fn attachments_serialise_as_json() {
        let record = EmailRecord::new(
            AccountId(1),
            &envelope(),
            String::new(),
            String::new(),
            &[AttachmentMeta {
                filename: "invoice.pdf".to_owned(),
                content_type: "application/pdf".to_owned(),
                size: 3,
            }],
        )
        .unwrap();

        assert_eq!(
            Some(
                r#"[{"filename":"invoice.pdf","content_type":"application/pdf","size":3}]"#
                    .to_owned()
            ),
            record.attachments
        );
    }
}
