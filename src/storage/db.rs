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

use std::path::Path;
use std::time::Duration;

use rusqlite::OptionalExtension as _;

use super::types::*;
use crate::account::model::*;
use crate::account::resolver::AccountDirectory;
use crate::ingest::model::*;
use crate::support::error::Error;

/// Persistence of delivered messages.
pub trait EmailStore {
    /// Insert `record` as a single new row of `emails` and return its id.
    ///
    /// Fails with `Error::DuplicateMessage` if a message with the same
    /// `Message-ID` is already stored.
    fn insert_email(&mut self, record: &EmailRecord) -> Result<EmailId, Error>;
}

/// A connection to the webmail database.
///
/// Deliveries run as independent processes, each holding one of these for
/// the lifetime of the process.
#[derive(Debug)]
pub struct Connection {
    cxn: rusqlite::Connection,
}

impl Connection {
    /// Open the existing database at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let cxn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(cxn)
    }

    fn configure(cxn: rusqlite::Connection) -> Result<Self, Error> {
        cxn.pragma_update(None, "foreign_keys", true)?;
        cxn.busy_timeout(Duration::from_secs(10))?;
        Ok(Self { cxn })
    }
}

impl AccountDirectory for Connection {
    fn account_by_address(
        &mut self,
        address: &str,
    ) -> Result<Option<Account>, Error> {
        self.cxn
            .prepare_cached(
                "SELECT `id`, `email` FROM `users` \
                 WHERE LOWER(`email`) = LOWER(?) \
                 ORDER BY `id` LIMIT 1",
            )?
            .query_row((address,), from_row)
            .optional()
            .map_err(Into::into)
    }

    fn alias_by_forward_to(
        &mut self,
        address: &str,
    ) -> Result<Option<Alias>, Error> {
        self.cxn
            .prepare_cached(
                "SELECT `aliasName`, `forwardTo`, `userId`, `isActive` \
                 FROM `aliases` \
                 WHERE LOWER(`forwardTo`) = LOWER(?) AND `isActive` <> 0 \
                 ORDER BY `id` LIMIT 1",
            )?
            .query_row((address,), from_row)
            .optional()
            .map_err(Into::into)
    }
}

impl EmailStore for Connection {
    fn insert_email(&mut self, record: &EmailRecord) -> Result<EmailId, Error> {
        let result = self
            .cxn
            .prepare_cached(
                "INSERT INTO `emails` (\
                   `userId`, `folderId`, `messageId`, `threadId`, \
                   `fromAddress`, `fromName`, `toAddress`, `ccAddress`, \
                   `bccAddress`, `subject`, `body`, `attachments`, \
                   `isRead`, `isStarred`, `isDraft`, `receivedAt`\
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 RETURNING `id`",
            )?
            .query_row(
                rusqlite::params![
                    record.account,
                    record.folder,
                    record.message_id,
                    record.thread_id,
                    record.from_address,
                    record.from_name,
                    record.to_address,
                    record.cc_address,
                    record.bcc_address,
                    record.subject,
                    record.body,
                    record.attachments,
                    record.flags.read,
                    record.flags.starred,
                    record.flags.draft,
                    UnixTimestamp(record.received_at),
                ],
                from_single::<EmailId>,
            );

        match result {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE == e.extended_code =>
            {
                Err(Error::DuplicateMessage)
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
impl Connection {
    /// Create a database with a scratch copy of the webmail schema.
    pub fn create_for_test(path: &Path) -> Self {
        let cxn = rusqlite::Connection::open(path).unwrap();
        cxn.execute_batch(include_str!("schema.sql")).unwrap();
        Self::configure(cxn).unwrap()
    }

    pub fn add_account(&mut self, id: i64, email: &str) {
        self.cxn
            .execute(
                "INSERT INTO `users` (`id`, `email`) VALUES (?, ?)",
                (id, email),
            )
            .unwrap();
    }

    pub fn add_alias(
        &mut self,
        account: i64,
        alias: &str,
        forward_to: &str,
        active: bool,
    ) {
        self.cxn
            .execute(
                "INSERT INTO `aliases` \
                 (`userId`, `aliasName`, `forwardTo`, `isActive`) \
                 VALUES (?, ?, ?, ?)",
                (account, alias, forward_to, active),
            )
            .unwrap();
    }

    pub fn fetch_email(&mut self, id: EmailId) -> StoredEmail {
        self.cxn
            .query_row("SELECT * FROM `emails` WHERE `id` = ?", (id,), from_row)
            .unwrap()
    }

    pub fn count_emails(&mut self) -> i64 {
        self.cxn
            .query_row("SELECT COUNT(*) FROM `emails`", (), from_single)
            .unwrap()
    }
}

#[cfg(test)]
mod test {
    use chrono::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, Connection) {
        let tmpdir = TempDir::new().unwrap();
        let mut cxn =
            Connection::create_for_test(&tmpdir.path().join("mail.sqlite"));
        cxn.add_account(1, "Alice@Example.com");
        cxn.add_account(5, "carol-main@x.com");
        cxn.add_alias(5, "carol", "carol@x.com", true);
        cxn.add_alias(1, "old", "old@x.com", false);
        (tmpdir, cxn)
    }

    fn record(message_id: Option<&str>) -> EmailRecord {
        EmailRecord {
            account: AccountId(5),
            folder: FolderId::INBOX,
            message_id: message_id.map(str::to_owned),
            thread_id: "t".to_owned(),
            from_address: "alice@example.com".to_owned(),
            from_name: "Alice".to_owned(),
            to_address: "bob@x.com".to_owned(),
            cc_address: Some("carol@x.com".to_owned()),
            bcc_address: None,
            subject: "subject".to_owned(),
            body: "body".to_owned(),
            attachments: None,
            flags: EmailFlags::default(),
            received_at: Utc.timestamp_opt(1672653600, 0).unwrap(),
        }
    }

    #[test]
    fn account_lookup_ignores_case() {
        let (_tmpdir, mut cxn) = setup();
        assert_eq!(
            Some(Account {
                id: AccountId(1),
                address: "Alice@Example.com".to_owned(),
            }),
            cxn.account_by_address("alice@EXAMPLE.com").unwrap()
        );
        assert_eq!(None, cxn.account_by_address("carol@x.com").unwrap());
    }

    #[test]
    fn alias_lookup_only_sees_active_aliases() {
        let (_tmpdir, mut cxn) = setup();
        assert_eq!(
            Some(Alias {
                alias: "carol".to_owned(),
                forward_to: "carol@x.com".to_owned(),
                account: AccountId(5),
                active: true,
            }),
            cxn.alias_by_forward_to("CAROL@x.com").unwrap()
        );
        assert_eq!(None, cxn.alias_by_forward_to("old@x.com").unwrap());
    }

    #[test]
    fn insert_and_read_back() {
        let (_tmpdir, mut cxn) = setup();
        let id = cxn.insert_email(&record(Some("<m1@x.com>"))).unwrap();
        let stored = cxn.fetch_email(id);

        assert_eq!(id, stored.id);
        assert_eq!(AccountId(5), stored.account);
        assert_eq!(FolderId::INBOX, stored.folder);
        assert_eq!(Some("<m1@x.com>".to_owned()), stored.message_id);
        assert_eq!(Some("carol@x.com".to_owned()), stored.cc_address);
        assert_eq!(None, stored.bcc_address);
        assert_eq!(EmailFlags::default(), stored.flags);
        assert_eq!(1672653600, stored.received_at.0.timestamp());
    }

    #[test]
    fn duplicate_message_id_is_rejected() {
        let (_tmpdir, mut cxn) = setup();
        cxn.insert_email(&record(Some("<dup@x.com>"))).unwrap();
        assert_matches!(
            Err(Error::DuplicateMessage),
            cxn.insert_email(&record(Some("<dup@x.com>")))
        );
        assert_eq!(1, cxn.count_emails());

        // Absent message ids never collide
        cxn.insert_email(&record(None)).unwrap();
        cxn.insert_email(&record(None)).unwrap();
        assert_eq!(3, cxn.count_emails());
    }

    #[test]
    fn missing_account_is_an_error() {
        let (_tmpdir, mut cxn) = setup();
        let mut orphan = record(None);
        orphan.account = AccountId(99);
        assert_matches!(Err(Error::Sqlite(_)), cxn.insert_email(&orphan));
        assert_eq!(0, cxn.count_emails());
    }

    #[test]
    fn open_requires_existing_database() {
        let tmpdir = TempDir::new().unwrap();
        assert_matches!(
            Err(Error::Sqlite(_)),
            Connection::open(&tmpdir.path().join("nonexistent.sqlite"))
        );
    }
}
