use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::debug;

use crate::{Error, Platform, PropertyBag};

const SUBJECT: &str = "Subject";
const VAPID_PUBLIC_KEY: &str = "VapidPublicKey";
const VAPID_PRIVATE_KEY: &str = "VapidPrivateKey";
const JWT_TTL: &str = "JwtTtl";

/// Push credential of a platform, kept in a [`PropertyBag`].
pub trait PnsCredential {
    /// Platform the credential authenticates against.
    fn app_platform(&self) -> Platform;

    /// Backing store.
    fn properties(&self) -> &PropertyBag;

    /// Mutable backing store.
    fn properties_mut(&mut self) -> &mut PropertyBag;

    /// Platform specific rules.
    fn on_validate(&self, allow_local_mock_pns: bool) -> Result<(), Error>;

    /// Validates the credential before it is persisted.
    fn validate(&self, allow_local_mock_pns: bool) -> Result<(), Error> {
        debug!(
            "validate {} credential ({} properties)",
            self.app_platform(),
            self.properties().len()
        );
        self.on_validate(allow_local_mock_pns)
    }
}

/// VAPID credential for web push. <https://www.rfc-editor.org/rfc/rfc8292>
#[derive(Clone, Debug, Default)]
pub struct BrowserCredential {
    properties: PropertyBag,
}

impl BrowserCredential {
    /// Creates a [`BrowserCredential`].
    ///
    /// ```rust
    /// # use hubs::BrowserCredential;
    /// let credential = BrowserCredential::new("mailto:admin@example.com", "public", "private");
    /// assert_eq!(Some("public"), credential.vapid_public_key());
    /// assert_eq!(-1, credential.jwt_ttl());
    /// ```
    pub fn new<T>(subject: T, vapid_public_key: T, vapid_private_key: T) -> Self
    where
        T: Into<String>,
    {
        let mut credential = Self::default();
        credential.set_subject(subject);
        credential.set_vapid_public_key(vapid_public_key);
        credential.set_vapid_private_key(vapid_private_key);
        credential
    }

    /// Contact URI of the application server, `mailto:` or `https:`.
    pub fn subject(&self) -> Option<&str> {
        self.properties.get(SUBJECT)
    }

    /// Sets [`BrowserCredential::subject`].
    pub fn set_subject<T: Into<String>>(&mut self, subject: T) {
        self.properties.set(SUBJECT, subject);
    }

    /// Application server public key.
    pub fn vapid_public_key(&self) -> Option<&str> {
        self.properties.get(VAPID_PUBLIC_KEY)
    }

    /// Sets [`BrowserCredential::vapid_public_key`].
    pub fn set_vapid_public_key<T: Into<String>>(&mut self, key: T) {
        self.properties.set(VAPID_PUBLIC_KEY, key);
    }

    /// Application server private key.
    pub fn vapid_private_key(&self) -> Option<&str> {
        self.properties.get(VAPID_PRIVATE_KEY)
    }

    /// Sets [`BrowserCredential::vapid_private_key`].
    pub fn set_vapid_private_key<T: Into<String>>(&mut self, key: T) {
        self.properties.set(VAPID_PRIVATE_KEY, key);
    }

    /// Lifetime of the signed JWT in seconds, `-1` when unset or unreadable.
    pub fn jwt_ttl(&self) -> i64 {
        self.properties
            .get(JWT_TTL)
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1)
    }

    /// Sets [`BrowserCredential::jwt_ttl`].
    pub fn set_jwt_ttl(&mut self, seconds: i64) {
        self.properties.set(JWT_TTL, seconds.to_string());
    }

    /// XOR of the hashes of every typed field, so equal credentials always agree.
    pub fn hash_code(&self) -> u64 {
        fn hash_of<T: Hash>(value: T) -> u64 {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        }
        hash_of(self.subject())
            ^ hash_of(self.vapid_private_key())
            ^ hash_of(self.vapid_public_key())
            ^ hash_of(self.jwt_ttl())
    }
}

impl PnsCredential for BrowserCredential {
    fn app_platform(&self) -> Platform {
        Platform::Browser
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    // Presence of the keys is enforced by the registrations embedding them.
    fn on_validate(&self, _allow_local_mock_pns: bool) -> Result<(), Error> {
        Ok(())
    }
}

impl PartialEq for BrowserCredential {
    fn eq(&self, other: &Self) -> bool {
        self.subject() == other.subject()
            && self.vapid_private_key() == other.vapid_private_key()
            && self.vapid_public_key() == other.vapid_public_key()
            && self.jwt_ttl() == other.jwt_ttl()
    }
}

impl Eq for BrowserCredential {}

impl Hash for BrowserCredential {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_credential() -> BrowserCredential {
        let mut c = BrowserCredential::new("mailto:admin@example.com", "public", "private");
        c.set_jwt_ttl(3600);
        c
    }

    #[test]
    fn t_accessors() {
        let c = build_credential();
        assert_eq!(Some("mailto:admin@example.com"), c.subject());
        assert_eq!(Some("public"), c.vapid_public_key());
        assert_eq!(Some("private"), c.vapid_private_key());
        assert_eq!(3600, c.jwt_ttl());
        assert_eq!(Some("3600"), c.properties().get("JwtTtl"));
        assert_eq!(Platform::Browser, c.app_platform());
    }

    #[test]
    fn t_unset_fields() {
        let c = BrowserCredential::default();
        assert_eq!(None, c.subject());
        assert_eq!(None, c.vapid_public_key());
        assert_eq!(None, c.vapid_private_key());
        assert_eq!(-1, c.jwt_ttl());
    }

    #[test]
    fn t_unparsable_jwt_ttl() {
        let mut c = build_credential();
        c.properties_mut().set("JwtTtl", "one hour");
        assert_eq!(-1, c.jwt_ttl());
    }

    #[test]
    fn t_validate() -> Result<(), Error> {
        build_credential().validate(false)?;
        BrowserCredential::default().validate(true)?;
        Ok(())
    }

    #[test]
    fn t_equality_and_hash() {
        let a = build_credential();
        let b = build_credential();
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());

        let mut changed = build_credential();
        changed.set_subject("mailto:other@example.com");
        assert_ne!(a, changed);

        let mut changed = build_credential();
        changed.set_vapid_public_key("other");
        assert_ne!(a, changed);

        let mut changed = build_credential();
        changed.set_vapid_private_key("other");
        assert_ne!(a, changed);

        let mut changed = build_credential();
        changed.set_jwt_ttl(60);
        assert_ne!(a, changed);
    }

    #[test]
    fn t_unknown_keys_ignored_by_equality() {
        let a = build_credential();
        let mut b = build_credential();
        b.properties_mut().set("Extra", "kept");
        assert_eq!(a, b);
        assert_eq!(Some("kept"), b.properties().get("Extra"));
    }

    #[test]
    fn t_hash_set() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(build_credential());
        set.insert(build_credential());
        assert_eq!(1, set.len());
    }
}
