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

use std::io::{self, BufRead, Write};

use super::main::ServerDecryptSubcommand;
use crate::account::model::AccountId;
use crate::crypt::{ContentCipher, Decryption};
use crate::support::{
    log_prefix::LogPrefix, sysexits::*, system_config::SystemConfig,
};

pub(super) fn decrypt(
    system_config: SystemConfig,
    cmd: ServerDecryptSubcommand,
) {
    let log_prefix = LogPrefix::new("decrypt".to_owned());
    log_prefix.set_account(cmd.account);

    let decrypter = Decrypter {
        cipher: ContentCipher::new(&system_config.encryption.secret),
        log_prefix,
        account: AccountId(cmd.account),
        text_only: cmd.text_only,
    };

    let stdout = io::stdout();
    let result = if cmd.values.is_empty() {
        let stdin = io::stdin();
        let lines = stdin.lock().lines();
        decrypter.decrypt_all(lines, &mut stdout.lock())
    } else {
        decrypter
            .decrypt_all(cmd.values.into_iter().map(Ok), &mut stdout.lock())
    };

    match result {
        Ok(0) => (),
        Ok(_) => EX_DATAERR.exit(),
        Err(e) => {
            eprintln!("{}", e);
            EX_IOERR.exit()
        },
    }
}

struct Decrypter {
    cipher: ContentCipher,
    log_prefix: LogPrefix,
    account: AccountId,
    text_only: bool,
}

impl Decrypter {
    /// Write the decrypted form of each value in `values` to `out`, returning
    /// how many could not be decrypted.
    fn decrypt_all(
        &self,
        values: impl Iterator<Item = io::Result<String>>,
        out: &mut impl Write,
    ) -> io::Result<usize> {
        let mut failures = 0;
        for value in values {
            let value = value?;

            if self.text_only {
                let text = self.cipher.decrypt_or_original(
                    &self.log_prefix,
                    &value,
                    self.account,
                );
                writeln!(out, "{}", text)?;
                continue;
            }

            match self.cipher.decrypt(&value, self.account) {
                Decryption::Decrypted(text) => {
                    writeln!(out, "decrypted: {}", text)?
                },
                Decryption::PassThrough(text) => {
                    writeln!(out, "plaintext: {}", text)?
                },
                Decryption::Failed { original, reason } => {
                    failures += 1;
                    writeln!(out, "failed ({}): {}", reason, original)?;
                },
            }
        }

        Ok(failures)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TRUNCATED: &str = "U2FsdGVkX18BAgMEBQYHCA==";

    fn run(text_only: bool, values: Vec<String>) -> (usize, Vec<String>) {
        crate::init_test_log();

        let decrypter = Decrypter {
            cipher: ContentCipher::new("hunter2"),
            log_prefix: LogPrefix::new("decrypt".to_owned()),
            account: AccountId(5),
            text_only,
        };

        let mut out = Vec::new();
        let failures = decrypter
            .decrypt_all(values.into_iter().map(Ok), &mut out)
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        (failures, out.lines().map(str::to_owned).collect())
    }

    fn values() -> Vec<String> {
        let encrypted = ContentCipher::new("hunter2")
            .try_encrypt("secret", AccountId(5))
            .unwrap();
        vec![
            encrypted,
            "legacy subject".to_owned(),
            // Valid marker, but truncated ciphertext
            TRUNCATED.to_owned(),
        ]
    }

    #[test]
    fn reports_each_value() {
        let (failures, lines) = run(false, values());
        assert_eq!(1, failures);
        assert_eq!("decrypted: secret", lines[0]);
        assert_eq!("plaintext: legacy subject", lines[1]);
        assert!(lines[2].starts_with("failed ("));
        assert!(lines[2].ends_with(&format!("): {}", TRUNCATED)));
    }

    #[test]
    fn text_only_falls_back_to_original() {
        let (failures, lines) = run(true, values());
        assert_eq!(0, failures);
        assert_eq!(vec!["secret", "legacy subject", TRUNCATED], lines);
    }
}
