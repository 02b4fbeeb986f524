#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

//! Hubs is a typed notification and registration model for a multi-platform push relay.
//!
//! A platform [`Notification`] is validated into a canonical header set before it is handed
//! to the transport, and a platform [`RegistrationDescription`] turns its push credential into
//! the opaque handle the relay stores.
//!
//! ```
//! use hubs::{BrowserNotification, BrowserRegistrationDescription, Urgency};
//!
//! let mut notification = BrowserNotification::new(r#"{"title":"hello"}"#);
//! notification.platform.urgency = Some(Urgency::High.to_string());
//! notification.validate().unwrap();
//! assert_eq!(Some("high"), notification.header("Urgency"));
//!
//! let registration = BrowserRegistrationDescription::new("https://x", "p", "a").unwrap();
//! let handle = registration.handle().unwrap();
//! let restored = BrowserRegistrationDescription::from_handle(&handle).unwrap();
//! assert_eq!("https://x", restored.platform.endpoint);
//! ```

use thiserror::Error;

pub use credential::{BrowserCredential, PnsCredential};
pub use notification::{
    add_or_update_header, BrowserNotification, Notification, PlatformNotification, Ttl, Urgency,
    WebPush, TOPIC_HEADER, TTL_HEADER, URGENCY_HEADER,
};
pub use property_bag::PropertyBag;
pub use registration::{
    BrowserRegistrationDescription, PlatformRegistration, RegistrationDescription,
    WebPushSubscription,
};

mod credential;
mod notification;
mod property_bag;
mod registration;

/// Validation and codec error.
#[derive(Error, Debug)]
pub enum Error {
    /// Field holds a malformed or out-of-range value.
    #[error("invalid {field}: {reason}")]
    InvalidFormat {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// Required string field is empty or whitespace.
    #[error("{0} is required")]
    MissingRequiredField(&'static str),
    /// Error from [`serde_json`] crate while writing a handle.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// See [`Error::InvalidFormat`].
    InvalidFormat,
    /// See [`Error::MissingRequiredField`].
    MissingRequiredField,
    /// See [`Error::Serialize`].
    Serialize,
}

impl Error {
    pub(crate) fn invalid_format<T: Into<String>>(field: &'static str, reason: T) -> Self {
        Error::InvalidFormat {
            field,
            reason: reason.into(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Error::MissingRequiredField(_) => ErrorKind::MissingRequiredField,
            Error::Serialize(_) => ErrorKind::Serialize,
        }
    }
}

/// Platform Notification Service a credential, notification or registration targets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum Platform {
    /// Web push, RFC 8030 <https://www.rfc-editor.org/rfc/rfc8030>
    Browser,
}
