//! Lightning addresses (LUD-16): `local@domain`.

use std::fmt;
use std::str::FromStr;

use crate::error::GatingError;

/// A parsed Lightning address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lud16 {
    local: String,
    domain: String,
}

impl Lud16 {
    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Well-known LNURL-pay metadata endpoint for this address.
    pub fn metadata_url(&self) -> String {
        format!("https://{}/.well-known/lnurlp/{}", self.domain, self.local)
    }
}

impl fmt::Display for Lud16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl FromStr for Lud16 {
    type Err = GatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GatingError::Validation(format!("{s} is not a valid lud16"));

        let (local, domain) = s.trim().split_once('@').ok_or_else(invalid)?;
        let local = local.to_ascii_lowercase();
        let domain = domain.to_ascii_lowercase();

        let local_ok = !local.is_empty()
            && local
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && domain
                .split('.')
                .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
            && domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'));

        if !local_ok || !domain_ok {
            return Err(invalid());
        }

        Ok(Self { local, domain })
    }
}
