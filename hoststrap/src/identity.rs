//! Resolution of system accounts to identities.

use std::path::{Path, PathBuf};

use hoststrap_config::AuthorizedKeyEntry;
use log::debug;
use nix::unistd::{Gid, Uid, geteuid};

use crate::Error;

/// The data of a system account as provided by the OS account database.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccountRecord {
    /// The login name.
    pub login: String,

    /// The numeric user ID.
    pub uid: Uid,

    /// The numeric ID of the primary group.
    pub gid: Gid,

    /// The home directory.
    pub home: PathBuf,
}

impl From<nix::unistd::User> for AccountRecord {
    fn from(value: nix::unistd::User) -> Self {
        Self {
            login: value.name,
            uid: value.uid,
            gid: value.gid,
            home: value.dir,
        }
    }
}

/// The OS account database.
pub trait AccountDatabase {
    /// Looks up the account with the login `login`.
    ///
    /// Returns [`None`] if no such account exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the account database can not be queried.
    fn lookup_account(&self, login: &str) -> Result<Option<AccountRecord>, Error>;

    /// Returns the login of the account running the current process.
    ///
    /// # Errors
    ///
    /// Returns an error if the account database can not be queried or has no entry for the
    /// current process.
    fn invoking_login(&self) -> Result<String, Error>;
}

/// A resolved system account.
///
/// An [`Identity`] is immutable once resolved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    login: String,
    uid: Uid,
    gid: Gid,
    home: PathBuf,
    authorized_keys: Vec<AuthorizedKeyEntry>,
}

impl Identity {
    /// Creates a new [`Identity`] from an account record.
    pub fn new(record: AccountRecord, authorized_keys: Vec<AuthorizedKeyEntry>) -> Self {
        Self {
            login: record.login,
            uid: record.uid,
            gid: record.gid,
            home: record.home,
            authorized_keys,
        }
    }

    /// Returns the login name.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Returns the numeric user ID.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Returns the numeric ID of the primary group.
    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Returns the home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Returns the SSH public keys allowed to log in as this identity.
    pub fn authorized_keys(&self) -> &[AuthorizedKeyEntry] {
        &self.authorized_keys
    }
}

/// Resolves `login` to an [`Identity`] carrying `authorized_keys`.
///
/// # Errors
///
/// Returns an error if
/// - the account database can not be queried
/// - no account with the login `login` exists ([`Error::IdentityNotFound`])
pub fn resolve_identity<A: AccountDatabase + ?Sized>(
    accounts: &A,
    login: &str,
    authorized_keys: &[AuthorizedKeyEntry],
) -> Result<Identity, Error> {
    let Some(record) = accounts.lookup_account(login)? else {
        return Err(Error::IdentityNotFound {
            login: login.to_string(),
        });
    };
    Ok(Identity::new(record, authorized_keys.to_vec()))
}

/// Returns whether an account with the login `login` exists.
///
/// Failures of the account database are logged and reported as a missing account.
pub fn account_exists<A: AccountDatabase + ?Sized>(accounts: &A, login: &str) -> bool {
    match accounts.lookup_account(login) {
        Ok(record) => record.is_some(),
        Err(error) => {
            debug!("Treating account {login} as missing: {error}");
            false
        }
    }
}

/// Resolves the [`Identity`] running the current process.
///
/// # Errors
///
/// Returns an error if the login of the current process can not be determined or resolved.
pub fn invoking_identity<A: AccountDatabase + ?Sized>(accounts: &A) -> Result<Identity, Error> {
    let login = accounts.invoking_login()?;
    resolve_identity(accounts, &login, &[])
}

/// Checks whether the current process is run by root.
///
/// # Errors
///
/// Returns an error if the effective user ID of the current process is not `0`.
pub fn ensure_root() -> Result<(), Error> {
    let euid = geteuid();
    if euid.is_root() {
        return Ok(());
    }

    let user = match nix::unistd::User::from_uid(euid) {
        Ok(Some(user)) => user.name,
        _ => format!("uid {euid}"),
    };
    Err(Error::NotRoot { user })
}
