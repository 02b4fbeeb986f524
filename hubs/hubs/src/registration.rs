use std::collections::BTreeSet;
use std::io;

use chrono::{DateTime, Utc};
use log::debug;
use serde::ser::{SerializeMap as _, Serializer as _};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Platform};

const ENDPOINT_PROPERTY: &str = "endpoint";
const P256DH_PROPERTY: &str = "p256dh";
const AUTH_PROPERTY: &str = "auth";

const MAX_TAGS: usize = 60;
const MAX_TAG_LENGTH: usize = 120;
const MAX_QUOTED_HANDLE: usize = 64;

/// Platform half of a [`RegistrationDescription`]: the device's push credential.
pub trait PlatformRegistration {
    /// Platform the device registered with.
    fn platform(&self) -> Platform;

    /// Rejects credentials the relay would refuse.
    fn validate(&self) -> Result<(), Error>;

    /// Opaque handle the relay stores. Must be deterministic.
    fn encode_handle(&self) -> Result<String, Error>;

    /// Replaces the credential with the one in `handle`, or leaves it untouched on error.
    fn decode_handle(&mut self, handle: &str) -> Result<(), Error>;
}

/// Device registration: fields shared by all platforms plus the platform credential.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegistrationDescription<P> {
    /// Path of the notification hub the registration belongs to.
    pub notification_hub_path: String,
    /// Identifier assigned by the relay.
    pub registration_id: Option<String>,
    /// Entity tag assigned by the relay, for optimistic concurrency.
    pub etag: Option<String>,
    /// When the relay drops the registration.
    pub expiration_time: Option<DateTime<Utc>>,
    /// Tags notifications can be routed by.
    pub tags: Option<BTreeSet<String>>,
    /// Platform credential.
    pub platform: P,
}

/// Registration of a browser push subscription.
pub type BrowserRegistrationDescription = RegistrationDescription<WebPushSubscription>;

impl<P: PlatformRegistration> RegistrationDescription<P> {
    /// Registration type the relay files the registration under.
    pub fn registration_type(&self) -> Platform {
        self.platform.platform()
    }

    /// Validates the platform credential, then the tags.
    pub fn validate(&self) -> Result<(), Error> {
        debug!("validate {} registration", self.registration_type());
        self.platform.validate()?;
        validate_tags(self.tags.as_ref())
    }

    /// Encodes the platform credential into the opaque handle.
    pub fn handle(&self) -> Result<String, Error> {
        self.platform.encode_handle()
    }

    /// Replaces the platform credential with the one decoded from `handle`.
    ///
    /// Blank required fields in the handle are rejected like in the constructors.
    pub fn set_handle(&mut self, handle: &str) -> Result<(), Error> {
        self.platform.decode_handle(handle)
    }
}

impl<P: PlatformRegistration + Default> RegistrationDescription<P> {
    /// Creates a registration from a stored handle.
    pub fn from_handle(handle: &str) -> Result<Self, Error> {
        let mut registration = Self::default();
        registration.set_handle(handle)?;
        Ok(registration)
    }
}

impl RegistrationDescription<WebPushSubscription> {
    /// Creates a [`BrowserRegistrationDescription`] from a `PushSubscription`.
    ///
    /// ```rust
    /// # use hubs::BrowserRegistrationDescription;
    /// let r = BrowserRegistrationDescription::new("https://push.example/1", "p256dh", "auth").unwrap();
    /// assert_eq!("auth", r.platform.auth);
    /// assert!(BrowserRegistrationDescription::new(" ", "p256dh", "auth").is_err());
    /// ```
    pub fn new<T: Into<String>>(endpoint: T, p256dh: T, auth: T) -> Result<Self, Error> {
        Ok(Self {
            platform: WebPushSubscription::new(endpoint, p256dh, auth)?,
            ..Default::default()
        })
    }

    /// Creates a [`BrowserRegistrationDescription`] with tags. Duplicate tags collapse.
    pub fn with_tags<T, I, S>(endpoint: T, p256dh: T, auth: T, tags: I) -> Result<Self, Error>
    where
        T: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registration = Self::new(endpoint, p256dh, auth)?;
        registration.tags = Some(tags.into_iter().map(Into::into).collect());
        Ok(registration)
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '#' | '.' | ':' | '-')
}

fn validate_tags(tags: Option<&BTreeSet<String>>) -> Result<(), Error> {
    let tags = match tags {
        Some(tags) => tags,
        None => return Ok(()),
    };
    if tags.len() > MAX_TAGS {
        return Err(Error::invalid_format(
            "Tags",
            format!("{} tags exceeds {MAX_TAGS}", tags.len()),
        ));
    }
    for tag in tags {
        let length = tag.chars().count();
        if length == 0 || length > MAX_TAG_LENGTH {
            return Err(Error::invalid_format(
                "Tags",
                format!("{tag:?} must be 1 to {MAX_TAG_LENGTH} characters"),
            ));
        }
        if let Some(c) = tag.chars().find(|c| !is_tag_char(*c)) {
            return Err(Error::invalid_format(
                "Tags",
                format!("character {c:?} in {tag:?} is not allowed"),
            ));
        }
    }
    Ok(())
}

/// Browser `PushSubscription`. <https://www.w3.org/TR/push-api/#pushsubscription-interface>
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct WebPushSubscription {
    /// Push service URL the notification is posted to.
    pub endpoint: String,
    /// User agent public key, base64url P-256 ECDH point.
    pub p256dh: String,
    /// User agent authentication secret, base64url.
    pub auth: String,
}

impl WebPushSubscription {
    /// Creates a [`WebPushSubscription`], rejecting empty or whitespace fields.
    pub fn new<T: Into<String>>(endpoint: T, p256dh: T, auth: T) -> Result<Self, Error> {
        let subscription = Self {
            endpoint: endpoint.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
        };
        for (field, value) in subscription.fields() {
            if value.trim().is_empty() {
                return Err(Error::MissingRequiredField(field));
            }
        }
        Ok(subscription)
    }

    fn fields(&self) -> [(&'static str, &str); 3] {
        [
            (ENDPOINT_PROPERTY, &self.endpoint),
            (P256DH_PROPERTY, &self.p256dh),
            (AUTH_PROPERTY, &self.auth),
        ]
    }
}

/// Compact JSON that also escapes U+0085, U+2028 and U+2029, as handles already
/// stored by the relay do.
#[derive(Clone, Copy, Debug)]
struct HandleFormatter;

impl serde_json::ser::Formatter for HandleFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}') {
                writer.write_all(fragment[start..i].as_bytes())?;
                write!(writer, "\\u{:04x}", u32::from(c))?;
                start = i + c.len_utf8();
            }
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

fn quote_handle(handle: &str) -> String {
    if handle.chars().count() <= MAX_QUOTED_HANDLE {
        format!("{handle:?}")
    } else {
        let prefix: String = handle.chars().take(MAX_QUOTED_HANDLE).collect();
        format!("{prefix:?}...")
    }
}

impl PlatformRegistration for WebPushSubscription {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    fn validate(&self) -> Result<(), Error> {
        for (field, value) in self.fields() {
            if value.trim().is_empty() {
                return Err(Error::invalid_format(
                    field,
                    "must not be empty or whitespace",
                ));
            }
        }
        Ok(())
    }

    // Properties are written one by one: stored handles are compared byte for byte,
    // so the order is endpoint, p256dh, auth forever.
    fn encode_handle(&self) -> Result<String, Error> {
        let mut json = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut json, HandleFormatter);
        let mut map = serializer.serialize_map(Some(3))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()?;
        Ok(base64::encode(&json))
    }

    fn decode_handle(&mut self, handle: &str) -> Result<(), Error> {
        let bytes = base64::decode(handle).map_err(|e| {
            Error::invalid_format(
                "handle",
                format!("{} is not base64: {e}", quote_handle(handle)),
            )
        })?;
        let json = String::from_utf8(bytes).map_err(|e| {
            Error::invalid_format(
                "handle",
                format!("{} is not UTF-8: {e}", quote_handle(handle)),
            )
        })?;
        let value: Value = serde_json::from_str(&json).map_err(|e| {
            Error::invalid_format(
                "handle",
                format!("{} is not JSON: {e}", quote_handle(handle)),
            )
        })?;
        if !value.is_object() {
            return Err(Error::invalid_format(
                "handle",
                format!(
                    "expected a base64 encoded UTF-8 JSON object, got {}",
                    quote_handle(handle)
                ),
            ));
        }
        let decoded: WebPushSubscription = serde_json::from_value(value).map_err(|e| {
            Error::invalid_format(
                "handle",
                format!("{} is not a push subscription: {e}", quote_handle(handle)),
            )
        })?;
        *self = WebPushSubscription::new(decoded.endpoint, decoded.p256dh, decoded.auth)?;
        Ok(())
    }
}
