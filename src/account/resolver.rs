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

//! Mapping recipient addresses to the account that owns the message.

use log::{info, warn};

use super::model::*;
use crate::support::{error::Error, log_prefix::LogPrefix};

/// Read access to the account and alias relations.
///
/// Both lookups must compare addresses case-insensitively, and
/// `alias_by_forward_to` must only consider active aliases; the resolver
/// relies on this and does not check `Alias::active` itself.
pub trait AccountDirectory {
    /// Find the account whose primary address is `address`.
    fn account_by_address(
        &mut self,
        address: &str,
    ) -> Result<Option<Account>, Error>;

    /// Find an active alias forwarding `address`.
    fn alias_by_forward_to(
        &mut self,
        address: &str,
    ) -> Result<Option<Alias>, Error>;
}

/// Determine which account owns a message addressed to `candidates`.
///
/// `candidates` are the To, Cc, and Bcc addresses in that order. A direct
/// match on a primary address always wins, even if an alias matches an
/// earlier candidate; only when no candidate is anyone's primary address are
/// the aliases consulted, again in candidate order.
///
/// Returns `Ok(None)` if nobody owns any of the candidates.
pub fn resolve_recipient(
    log_prefix: &LogPrefix,
    directory: &mut impl AccountDirectory,
    candidates: &[String],
) -> Result<Option<AccountId>, Error> {
    for candidate in candidates {
        if let Some(account) = directory.account_by_address(candidate)? {
            info!(
                "{} Found direct account for {}: {} ({})",
                log_prefix, candidate, account.id, account.address
            );
            return Ok(Some(account.id));
        }
    }

    for candidate in candidates {
        if let Some(alias) = directory.alias_by_forward_to(candidate)? {
            info!(
                "{} Found alias {} forwarding {} for {}: {}",
                log_prefix,
                alias.alias,
                alias.forward_to,
                candidate,
                alias.account
            );
            return Ok(Some(alias.account));
        }
    }

    warn!(
        "{} No account found for destinations: {}",
        log_prefix,
        candidates.join(", ")
    );
    Ok(None)
}

/// An `AccountDirectory` over plain lists, used to exercise the resolution
/// rules without a database.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryDirectory {
    pub accounts: Vec<Account>,
    pub aliases: Vec<Alias>,
    pub lookups: usize,
}

#[cfg(test)]
impl AccountDirectory for MemoryDirectory {
    fn account_by_address(
        &mut self,
        address: &str,
    ) -> Result<Option<Account>, Error> {
        self.lookups += 1;
        Ok(self
            .accounts
            .iter()
            .find(|a| a.address.eq_ignore_ascii_case(address))
            .cloned())
    }

    fn alias_by_forward_to(
        &mut self,
        address: &str,
    ) -> Result<Option<Alias>, Error> {
        self.lookups += 1;
        Ok(self
            .aliases
            .iter()
            .filter(|a| a.active)
            .find(|a| a.forward_to.eq_ignore_ascii_case(address))
            .cloned())
    }
}
