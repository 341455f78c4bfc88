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

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::error;

use crate::ingest::pipeline::{IngestOutcome, IngestionPipeline};
use crate::storage::Connection;
use crate::support::{
    error::Error, log_prefix::LogPrefix, sysexits::*,
    system_config::SystemConfig,
};

pub(super) fn deliver(system_config: SystemConfig, db_path: PathBuf) {
    let log_prefix = LogPrefix::new("deliver".to_owned());
    if let Err(exit) =
        run_delivery(&log_prefix, &system_config, &db_path, io::stdin().lock())
    {
        exit.exit();
    }
}

fn run_delivery(
    log_prefix: &LogPrefix,
    system_config: &SystemConfig,
    db_path: &Path,
    mut input: impl Read,
) -> Result<(), Sysexit> {
    let mut data = Vec::new();
    if let Err(e) = input.read_to_end(&mut data) {
        error!("{} Failed to read message: {}", log_prefix, e);
        return Err(EX_IOERR);
    }

    // Checked before touching the database so that an empty delivery is
    // never retried.
    if data.iter().all(u8::is_ascii_whitespace) {
        error!("{} {}", log_prefix, Error::EmptyMessage);
        return Err(EX_NOINPUT);
    }

    let mut cxn = match Connection::open(db_path) {
        Ok(cxn) => cxn,
        Err(e) => {
            error!(
                "{} Failed to open '{}': {}",
                log_prefix,
                db_path.display(),
                e
            );
            return Err(EX_TEMPFAIL);
        },
    };

    let pipeline =
        IngestionPipeline::new(log_prefix.clone(), &system_config.encryption);
    let error = match pipeline.ingest(&mut cxn, &data) {
        Ok(IngestOutcome::Stored(_)) => return Ok(()),
        Ok(IngestOutcome::Rejected(rejection)) => Error::from(rejection),
        Err(e) => e,
    };

    error!("{} Delivery failed: {}", log_prefix, error);
    Err(exit_status(&error))
}

fn exit_status(error: &Error) -> Sysexit {
    match *error {
        Error::EmptyMessage => EX_NOINPUT,
        Error::Unparseable | Error::DuplicateMessage => EX_DATAERR,
        Error::NoRecipient => EX_NOUSER,
        Error::Io(_) | Error::Sqlite(_) => EX_TEMPFAIL,
        Error::BadCiphertext
        | Error::BadPlaintext
        | Error::Ssl(_)
        | Error::Json(_) => EX_SOFTWARE,
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;
    use crate::support::system_config::*;

    struct Setup {
        tmpdir: TempDir,
        config: SystemConfig,
        log_prefix: LogPrefix,
    }

    impl Setup {
        fn db_path(&self) -> PathBuf {
            self.tmpdir.path().join("mail.sqlite")
        }

        fn deliver(&self, message: &[u8]) -> Result<(), Sysexit> {
            run_delivery(
                &self.log_prefix,
                &self.config,
                &self.db_path(),
                message,
            )
        }
    }

    fn set_up() -> Setup {
        crate::init_test_log();

        let tmpdir = TempDir::new().unwrap();
        let mut cxn =
            Connection::create_for_test(&tmpdir.path().join("mail.sqlite"));
        cxn.add_account(1, "alice@x.com");

        Setup {
            tmpdir,
            config: SystemConfig {
                database: DatabaseConfig {
                    path: "mail.sqlite".into(),
                },
                encryption: EncryptionConfig {
                    secret: "hunter2".to_owned(),
                },
                diagnostic: DiagnosticConfig::default(),
            },
            log_prefix: LogPrefix::new("deliver".to_owned()),
        }
    }

    #[test]
    fn exit_statuses() {
        let setup = set_up();

        assert_eq!(
            Ok(()),
            setup.deliver(b"To: alice@x.com\nMessage-ID: <1@x>\n\nhi\n")
        );
        assert_eq!(
            Err(EX_DATAERR),
            setup.deliver(b"To: alice@x.com\nMessage-ID: <1@x>\n\nhi\n")
        );
        assert_eq!(Err(EX_NOUSER), setup.deliver(b"To: bob@x.com\n\nhi\n"));
        assert_eq!(Err(EX_DATAERR), setup.deliver(b"no headers here\n"));
        assert_eq!(Err(EX_NOINPUT), setup.deliver(b""));
        assert_eq!(Err(EX_NOINPUT), setup.deliver(b"\r\n  \n"));

        let mut cxn = Connection::open(&setup.db_path()).unwrap();
        assert_eq!(1, cxn.count_emails());
    }

    #[test]
    fn unusable_database_is_temporary() {
        let setup = set_up();
        assert_eq!(
            Err(EX_TEMPFAIL),
            run_delivery(
                &setup.log_prefix,
                &setup.config,
                &setup.tmpdir.path().join("nonexistent.sqlite"),
                &b"To: alice@x.com\n\nhi\n"[..],
            )
        );
    }
}
