use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "storekeep";

/// OS-keychain storage for the sign-in password, keyed by email. Lets the
/// CLI re-authenticate without prompting; purely optional.
pub struct CredentialStore;

impl CredentialStore {
    /// Store a password for an email in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for an email from the OS keychain
    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for an email
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email).context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    /// Check if credentials exist for an email
    pub fn has_credentials(email: &str) -> bool {
        match Entry::new(SERVICE_NAME, email) {
            Ok(entry) => entry.get_password().is_ok(),
            Err(_) => false,
        }
    }
}
