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

//! Bindings for the model types to `rusqlite`.

use chrono::prelude::*;
use rusqlite::types::{
    FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef,
};

use crate::account::model::*;
use crate::ingest::model::*;

macro_rules! transparent_to_sql {
    ($t:ident) => {
        impl ToSql for $t {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }
    };
}

macro_rules! transparent_from_sql {
    ($t:ident) => {
        impl FromSql for $t {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                FromSql::column_result(value).map(Self)
            }
        }
    };
}

transparent_to_sql!(AccountId);
transparent_from_sql!(AccountId);
transparent_to_sql!(EmailId);
transparent_from_sql!(EmailId);
transparent_to_sql!(FolderId);
transparent_from_sql!(FolderId);

/// A timestamp stored as whole seconds since the epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnixTimestamp(pub DateTime<Utc>);

impl ToSql for UnixTimestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.timestamp()))
    }
}

impl FromSql for UnixTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let inner = i64::column_result(value)?;
        Utc.timestamp_opt(inner, 0)
            .single()
            .ok_or(FromSqlError::OutOfRange(inner))
            .map(Self)
    }
}

pub trait FromRow: Sized {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

pub fn from_row<T: FromRow>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    T::from_row(row)
}

pub fn from_single<T: FromSql>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    row.get(0)
}

impl FromRow for Account {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            address: row.get("email")?,
        })
    }
}

impl FromRow for Alias {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            alias: row.get("aliasName")?,
            forward_to: row.get("forwardTo")?,
            account: row.get("userId")?,
            active: row.get("isActive")?,
        })
    }
}

/// A row of `emails` as read back by tests.
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct StoredEmail {
    pub id: EmailId,
    pub account: AccountId,
    pub folder: FolderId,
    pub message_id: Option<String>,
    pub thread_id: String,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub cc_address: Option<String>,
    pub bcc_address: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Option<String>,
    pub flags: EmailFlags,
    pub received_at: UnixTimestamp,
}

#[cfg(test)]
impl FromRow for StoredEmail {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            account: row.get("userId")?,
            folder: row.get("folderId")?,
            message_id: row.get("messageId")?,
            thread_id: row.get("threadId")?,
            from_address: row.get("fromAddress")?,
            from_name: row.get("fromName")?,
            to_address: row.get("toAddress")?,
            cc_address: row.get("ccAddress")?,
            bcc_address: row.get("bccAddress")?,
            subject: row.get("subject")?,
            body: row.get("body")?,
            attachments: row.get("attachments")?,
            flags: EmailFlags {
                read: row.get("isRead")?,
                starred: row.get("isStarred")?,
                draft: row.get("isDraft")?,
            },
            received_at: row.get("receivedAt")?,
        })
    }
}
