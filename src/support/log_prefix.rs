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

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included in at the start of every log statement.
///
/// Clones of a `LogPrefix` share the same underlying data, so the pipeline
/// can fill in the message ID and the owning account as it learns them and
/// every component holding a clone picks that up.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone, Default)]
struct Inner {
    protocol: String,
    account: Option<i64>,
    message_id: Option<String>,
}

impl LogPrefix {
    pub fn new(protocol: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                protocol,
                ..Inner::default()
            })),
        }
    }

    pub fn set_account(&self, account: i64) {
        self.inner.lock().unwrap().account = Some(account);
    }

    pub fn set_message_id(&self, message_id: &str) {
        if message_id.is_empty() {
            return;
        }

        self.inner.lock().unwrap().message_id =
            Some(sanitise(message_id.to_owned()));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.protocol)?;
        if inner.account.is_some() || inner.message_id.is_some() {
            write!(f, "[")?;
            let mut first = true;
            if let Some(account) = inner.account {
                write!(f, "account={account}")?;
                first = false;
            }

            if let Some(ref message_id) = inner.message_id {
                if !mem::take(&mut first) {
                    write!(f, " ")?;
                }
                write!(f, "msgid={message_id}")?;
            }
            write!(f, "]")?;
        }

        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(128) {
        s.truncate(truncate_len);
    }

    s
}
