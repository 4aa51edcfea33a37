//! User accounts managed on a host.

use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};
use ssh_key::authorized_keys::Entry;

use crate::{Error, utils::duplicates};

/// The maximum length of a login name accepted by `adduser`.
const LOGIN_NAME_MAX_LEN: usize = 32;

/// The login name of a user on a Unix system.
///
/// Follows the default `NAME_REGEX` of `adduser`: a lowercase letter or `_`, followed by
/// lowercase letters, digits, `_` or `-`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct LoginName(String);

impl LoginName {
    /// Creates a new [`LoginName`].
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is empty, too long or contains invalid characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use hoststrap_config::LoginName;
    ///
    /// # fn main() -> testresult::TestResult {
    /// LoginName::new("dev".to_string())?;
    /// LoginName::new("_svc-backup1".to_string())?;
    /// assert!(LoginName::new("Dev".to_string()).is_err());
    /// assert!(LoginName::new("1dev".to_string()).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(name: String) -> Result<Self, Error> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|char| char.is_ascii_lowercase() || char == '_');
        let valid_rest = chars.all(|char| {
            char.is_ascii_lowercase() || char.is_ascii_digit() || char == '_' || char == '-'
        });

        if !valid_start || !valid_rest || name.len() > LOGIN_NAME_MAX_LEN {
            return Err(Error::InvalidLoginName { name });
        }
        Ok(Self(name))
    }
}

impl AsRef<str> for LoginName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for LoginName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<LoginName> for String {
    fn from(value: LoginName) -> Self {
        value.0
    }
}

impl FromStr for LoginName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for LoginName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// An entry of an authorized_keys file.
///
/// This type ensures compliance with SSH's [AuthorizedKeysFile] format.
///
/// [AuthorizedKeysFile]: https://man.archlinux.org/man/sshd.8#AUTHORIZED_KEYS_FILE_FORMAT
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct AuthorizedKeyEntry(String);

impl AuthorizedKeyEntry {
    /// Creates a new [`AuthorizedKeyEntry`].
    ///
    /// Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if `entry` can not be parsed as an
    /// [`ssh_key::authorized_keys::Entry`].
    ///
    /// # Examples
    ///
    /// ```
    /// use hoststrap_config::AuthorizedKeyEntry;
    ///
    /// # fn main() -> testresult::TestResult {
    /// let entry = AuthorizedKeyEntry::new("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPkpXKiNhy39A3bZ1u19a5d4sFwYMBkWQyCbzgUfdKBm user@host".to_string())?;
    /// assert!(entry.to_string().starts_with("ssh-ed25519 "));
    ///
    /// assert!(AuthorizedKeyEntry::new("".to_string()).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(entry: String) -> Result<Self, Error> {
        let trimmed = entry.trim();
        if trimmed.is_empty() || Entry::from_str(trimmed).is_err() {
            return Err(Error::InvalidAuthorizedKeyEntry { entry });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for AuthorizedKeyEntry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for AuthorizedKeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AuthorizedKeyEntry> for String {
    fn from(value: AuthorizedKeyEntry) -> Self {
        value.0
    }
}

impl FromStr for AuthorizedKeyEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for AuthorizedKeyEntry {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The sudo entitlement granted to a user.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SudoPolicy {
    /// The user may run any command as any user without providing a passphrase.
    Passwordless,
}

impl SudoPolicy {
    /// Returns the sudoers rule implementing the policy for `login`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hoststrap_config::{LoginName, SudoPolicy};
    ///
    /// # fn main() -> testresult::TestResult {
    /// let login = LoginName::new("dev".to_string())?;
    /// assert_eq!(
    ///     SudoPolicy::Passwordless.sudoers_rule(&login),
    ///     "dev ALL=(ALL) NOPASSWD: ALL"
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn sudoers_rule(&self, login: &LoginName) -> String {
        match self {
            Self::Passwordless => format!("{login} ALL=(ALL) NOPASSWD: ALL"),
        }
    }
}

/// Validates that a list of authorized_keys entries has no duplicates.
#[allow(clippy::ptr_arg)]
fn validate_authorized_keys(keys: &Vec<AuthorizedKeyEntry>, _: &()) -> garde::Result {
    match duplicates(keys) {
        Some(duplicates) => Err(garde::Error::new(format!(
            "contains the duplicate authorized_keys entries {duplicates}"
        ))),
        None => Ok(()),
    }
}

/// A user account managed on the host.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct UserConfig {
    #[garde(skip)]
    login: LoginName,

    #[serde(default)]
    #[garde(custom(validate_authorized_keys))]
    authorized_keys: Vec<AuthorizedKeyEntry>,

    #[serde(default)]
    #[garde(skip)]
    sudo: Option<SudoPolicy>,

    #[serde(default)]
    #[garde(skip)]
    environment: bool,
}

impl UserConfig {
    /// Creates a new [`UserConfig`].
    pub fn new(
        login: LoginName,
        authorized_keys: Vec<AuthorizedKeyEntry>,
        sudo: Option<SudoPolicy>,
        environment: bool,
    ) -> Self {
        Self {
            login,
            authorized_keys,
            sudo,
            environment,
        }
    }

    /// Returns the login name of the user.
    pub fn login(&self) -> &LoginName {
        &self.login
    }

    /// Returns the SSH public keys allowed to log in as the user.
    pub fn authorized_keys(&self) -> &[AuthorizedKeyEntry] {
        &self.authorized_keys
    }

    /// Returns the sudo policy of the user, if any.
    pub fn sudo(&self) -> Option<SudoPolicy> {
        self.sudo
    }

    /// Returns whether the per-user declarative environment is managed for the user.
    pub fn environment(&self) -> bool {
        self.environment
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;

    const ED25519_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPkpXKiNhy39A3bZ1u19a5d4sFwYMBkWQyCbzgUfdKBm user@host";

    #[rstest]
    #[case("dev")]
    #[case("postgres")]
    #[case("_apt")]
    #[case("svc-backup2")]
    fn login_name_valid(#[case] name: &str) -> TestResult {
        let login = LoginName::from_str(name)?;
        assert_eq!(login.as_ref(), name);
        Ok(())
    }

    #[rstest]
    #[case("")]
    #[case("Dev")]
    #[case("9lives")]
    #[case("-dash")]
    #[case("dev user")]
    #[case("dev;rm")]
    #[case("averyveryveryveryverylongloginname")]
    fn login_name_invalid(#[case] name: &str) {
        assert!(LoginName::from_str(name).is_err());
    }

    #[rstest]
    #[case(ED25519_KEY)]
    #[case("  ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIPkpXKiNhy39A3bZ1u19a5d4sFwYMBkWQyCbzgUfdKBm\n")]
    fn authorized_key_entry_valid(#[case] entry: &str) -> TestResult {
        let entry = AuthorizedKeyEntry::from_str(entry)?;
        assert!(!entry.as_ref().ends_with('\n'));
        Ok(())
    }

    #[rstest]
    #[case("")]
    #[case("ssh-ed25519")]
    #[case("not a key at all")]
    fn authorized_key_entry_invalid(#[case] entry: &str) {
        assert!(AuthorizedKeyEntry::from_str(entry).is_err());
    }

    #[test]
    fn user_config_rejects_duplicate_keys() -> TestResult {
        let key = AuthorizedKeyEntry::from_str(ED25519_KEY)?;
        let user = UserConfig::new(
            LoginName::from_str("dev")?,
            vec![key.clone(), key],
            Some(SudoPolicy::Passwordless),
            false,
        );
        assert!(user.validate().is_err());
        Ok(())
    }

    #[test]
    fn sudo_policy_from_str() -> TestResult {
        assert_eq!(SudoPolicy::from_str("passwordless")?, SudoPolicy::Passwordless);
        Ok(())
    }
}
