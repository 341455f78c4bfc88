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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Sealpost.
///
/// This is stored in a file named `sealpost.toml` under the Sealpost system
/// root, which is typically `/usr/local/etc/sealpost` or `/etc/sealpost`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Where the account and mail relations live.
    pub database: DatabaseConfig,

    /// Parameters of the at-rest encryption of subjects and bodies.
    pub encryption: EncryptionConfig,

    /// Settings to aid in diagnosing problems.
    #[serde(default)]
    pub diagnostic: DiagnosticConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct DatabaseConfig {
    /// The path to the SQLite database holding the `users`, `aliases` and
    /// `emails` tables.
    ///
    /// Relative paths are resolved against the system root.
    pub path: PathBuf,
}

#[derive(Clone, Deserialize, Serialize, Default)]
pub struct EncryptionConfig {
    /// The secret shared with the webmail front end.
    ///
    /// It is mixed into the passphrase of every account. If this does not
    /// match the value the webmail uses, everything delivered is unreadable
    /// to the user, and nothing reports an error.
    pub secret: String,
}

// Don't leak the secret into logs through `{:?}`.
impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DiagnosticConfig {
    /// If set, redirect standard error to this file on startup.
    ///
    /// Most MTAs discard whatever a delivery agent writes to standard error,
    /// which makes panics and early startup failures invisible.
    ///
    /// Relative paths are resolved against the system root.
    pub stderr: Option<PathBuf>,
}
