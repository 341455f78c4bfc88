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

//! Orchestration of a single delivery: parse, resolve, encrypt, store.

use std::fmt;

use log::{debug, info, warn};

use super::model::*;
use super::parser::parse_message;
use crate::account::resolver::{resolve_recipient, AccountDirectory};
use crate::crypt::ContentCipher;
use crate::storage::EmailStore;
use crate::support::{
    error::Error, log_prefix::LogPrefix, system_config::EncryptionConfig,
};

/// How a delivery ended, short of an outright failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored(EmailId),
    Rejected(Rejection),
}

/// Why a message was turned away without storing anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// There was nothing but whitespace to deliver.
    Empty,
    /// The input has no recognisable message structure.
    Unparseable,
    /// No account owns any of the recipients.
    NoRecipient,
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Empty => Error::EmptyMessage,
            Rejection::Unparseable => Error::Unparseable,
            Rejection::NoRecipient => Error::NoRecipient,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Parsing,
    Resolving,
    Encrypting,
    Storing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Stage::Parsing => "parsing",
            Stage::Resolving => "resolving",
            Stage::Encrypting => "encrypting",
            Stage::Storing => "storing",
        };
        f.write_str(name)
    }
}

/// Runs one message through to storage.
///
/// The stages only ever move forward, and nothing is retried; a failed
/// delivery is retried, if at all, by the MTA invoking us again.
pub struct IngestionPipeline {
    log_prefix: LogPrefix,
    cipher: ContentCipher,
}

impl IngestionPipeline {
    pub fn new(log_prefix: LogPrefix, config: &EncryptionConfig) -> Self {
        IngestionPipeline {
            log_prefix,
            cipher: ContentCipher::new(&config.secret),
        }
    }

    /// Deliver the raw message `data`, looking up accounts in and storing the
    /// result to `store`.
    ///
    /// Rejections are returned as `Ok`. `Err` is only returned if the store
    /// fails, in which case nothing has been written.
    pub fn ingest<S: AccountDirectory + EmailStore>(
        &self,
        store: &mut S,
        data: &[u8],
    ) -> Result<IngestOutcome, Error> {
        if data.iter().all(u8::is_ascii_whitespace) {
            warn!("{} No message content received", self.log_prefix);
            return Ok(IngestOutcome::Rejected(Rejection::Empty));
        }

        self.enter(Stage::Parsing);
        let parsed = match parse_message(data) {
            Ok(parsed) => parsed,
            Err(Error::Unparseable) => {
                warn!("{} Message has no header section", self.log_prefix);
                return Ok(IngestOutcome::Rejected(Rejection::Unparseable));
            },
            Err(e) => return Err(e),
        };

        let envelope = &parsed.envelope;
        self.log_prefix.set_message_id(&envelope.message_id);
        info!(
            "{} Processing message from {} ({} bytes of body, {} attachments)",
            self.log_prefix,
            envelope.from_address,
            parsed.body.len(),
            parsed.attachments.len()
        );

        self.enter(Stage::Resolving);
        let account = match resolve_recipient(
            &self.log_prefix,
            store,
            &envelope.recipient_candidates(),
        )? {
            Some(account) => account,
            None => return Ok(IngestOutcome::Rejected(Rejection::NoRecipient)),
        };
        self.log_prefix.set_account(account.0);

        self.enter(Stage::Encrypting);
        let subject =
            self.cipher
                .encrypt(&self.log_prefix, &envelope.subject, account);
        let body = self.cipher.encrypt(&self.log_prefix, &parsed.body, account);
        let record = EmailRecord::new(
            account,
            envelope,
            subject,
            body,
            &parsed.attachments,
        )?;

        self.enter(Stage::Storing);
        let id = store.insert_email(&record)?;
        info!("{} Stored as email {}", self.log_prefix, id);
        Ok(IngestOutcome::Stored(id))
    }

    fn enter(&self, stage: Stage) {
        debug!("{} Entering stage: {}", self.log_prefix, stage);
    }
}
