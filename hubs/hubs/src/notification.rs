use std::collections::HashMap;
use std::str::FromStr as _;

use log::{debug, trace};
use mime::Mime;

use crate::{Error, Platform};

/// Header carrying [`WebPush::ttl`]. <https://www.rfc-editor.org/rfc/rfc8030#section-5.2>
pub const TTL_HEADER: &str = "TTL";
/// Header carrying [`WebPush::urgency`]. <https://www.rfc-editor.org/rfc/rfc8030#section-5.3>
pub const URGENCY_HEADER: &str = "Urgency";
/// Header carrying [`WebPush::topic`]. <https://www.rfc-editor.org/rfc/rfc8030#section-5.4>
pub const TOPIC_HEADER: &str = "Topic";

const MAX_TOPIC_LENGTH: usize = 32;
const DEFAULT_TTL_DAYS: i64 = 28;
const SECONDS_PER_DAY: i128 = 86_400;

/// Platform half of a [`Notification`].
pub trait PlatformNotification {
    /// Platform the notification is delivered through.
    fn platform(&self) -> Platform;

    /// Checks the typed fields and writes their canonical headers into `headers`.
    ///
    /// Implementations write through [`add_or_update_header`] so typed fields win over
    /// headers the caller set by hand.
    fn validate_and_populate_headers(
        &self,
        headers: &mut HashMap<String, String>,
    ) -> Result<(), Error>;
}

/// Writes `name`, replacing any header of the same name regardless of case.
pub fn add_or_update_header<V: Into<String>>(
    headers: &mut HashMap<String, String>,
    name: &str,
    value: V,
) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.into());
}

/// Notification payload, custom headers and the platform specific fields.
#[derive(Clone, Debug)]
pub struct Notification<P> {
    /// Payload.
    pub body: String,
    /// Optional tag, kept for the sending collaborator.
    pub tag: Option<String>,
    /// Platform specific fields.
    pub platform: P,
    content_type: String,
    headers: HashMap<String, String>,
}

/// Notification pushed to a browser, following RFC 8030 (Generic Event Delivery Using HTTP Push).
pub type BrowserNotification = Notification<WebPush>;

impl<P> Notification<P>
where
    P: PlatformNotification + Default,
{
    /// Creates a [`Notification`] with a JSON body.
    ///
    /// ```rust
    /// # use hubs::BrowserNotification;
    /// let n = BrowserNotification::new(r#"{"title":"hi"}"#);
    /// assert_eq!("application/json;charset=utf-8", n.content_type());
    /// ```
    pub fn new<T: Into<String>>(body: T) -> Self {
        Self {
            body: body.into(),
            tag: None,
            platform: P::default(),
            content_type: format!("{};charset=utf-8", mime::APPLICATION_JSON),
            headers: HashMap::new(),
        }
    }

    /// Creates a [`Notification`] whose body is in `content_type`, e.g. "text/plain".
    ///
    /// `;charset=utf-8` is appended when the content type names no charset.
    ///
    /// ```rust
    /// # use hubs::BrowserNotification;
    /// let n = BrowserNotification::with_content_type("hi", "text/plain").unwrap();
    /// assert_eq!("text/plain;charset=utf-8", n.content_type());
    /// ```
    pub fn with_content_type<T: Into<String>>(body: T, content_type: &str) -> Result<Self, Error> {
        Self::with_headers(body, content_type, HashMap::new())
    }

    /// Creates a [`Notification`] with custom headers sent alongside the canonical ones.
    pub fn with_headers<T: Into<String>>(
        body: T,
        content_type: &str,
        headers: HashMap<String, String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            body: body.into(),
            tag: None,
            platform: P::default(),
            content_type: with_charset(content_type)?,
            headers,
        })
    }
}

impl<P: PlatformNotification> Notification<P> {
    /// Media type of [`Notification::body`], always with a charset.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// All headers: custom ones plus, after [`Notification::validate`], the canonical ones.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a custom header. See [`add_or_update_header`].
    pub fn add_or_update_header<V: Into<String>>(&mut self, name: &str, value: V) {
        add_or_update_header(&mut self.headers, name, value);
    }

    /// Name of the platform, sent by the collaborator as the notification format.
    pub fn platform_type(&self) -> Platform {
        self.platform.platform()
    }

    /// Validates the platform fields and populates the canonical headers.
    ///
    /// Safe to call repeatedly. Headers are left untouched when validation fails.
    pub fn validate(&mut self) -> Result<(), Error> {
        debug!("validate {} notification", self.platform_type());
        let mut headers = self.headers.clone();
        self.platform.validate_and_populate_headers(&mut headers)?;
        trace!("populated headers: {headers:?}");
        self.headers = headers;
        Ok(())
    }
}

fn with_charset(content_type: &str) -> Result<String, Error> {
    let parsed = Mime::from_str(content_type)
        .map_err(|e| Error::invalid_format("ContentType", format!("{content_type:?}: {e}")))?;
    if parsed.get_param(mime::CHARSET).is_some() {
        Ok(content_type.to_string())
    } else {
        Ok(format!("{content_type};charset=utf-8"))
    }
}

/// How time sensitive a notification is. <https://www.rfc-editor.org/rfc/rfc8030#section-5.3>
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Urgency {
    /// very-low
    VeryLow,
    /// low
    Low,
    /// normal (default)
    Normal,
    /// high
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

/// Whole seconds a notification stays relevant. <https://www.rfc-editor.org/rfc/rfc8030#section-5.2>
///
/// Negative values can be held but never sent.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ttl {
    seconds: i128,
}

impl Ttl {
    /// Creates a [`Ttl`] from seconds.
    pub fn from_secs(seconds: i128) -> Self {
        Self { seconds }
    }

    /// Creates a [`Ttl`] from days.
    pub fn from_days(days: i64) -> Self {
        Self::from_secs(i128::from(days) * SECONDS_PER_DAY)
    }

    /// Seconds, possibly negative.
    pub fn as_secs(&self) -> i128 {
        self.seconds
    }

    /// Value of the `TTL` header, clamped to [`u64::MAX`].
    ///
    /// ```rust
    /// # use hubs::Ttl;
    /// assert_eq!("60", Ttl::from_secs(60).to_header_value().unwrap());
    /// assert!(Ttl::from_secs(-1).to_header_value().is_err());
    /// ```
    pub fn to_header_value(&self) -> Result<String, Error> {
        if self.seconds < 0 {
            return Err(Error::invalid_format(
                "Ttl",
                format!("{} seconds is negative", self.seconds),
            ));
        }
        let seconds = u64::try_from(self.seconds).unwrap_or(u64::MAX);
        Ok(seconds.to_string())
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self::from_days(DEFAULT_TTL_DAYS)
    }
}

impl From<std::time::Duration> for Ttl {
    fn from(d: std::time::Duration) -> Self {
        Self::from_secs(i128::from(d.as_secs()))
    }
}

impl From<chrono::Duration> for Ttl {
    fn from(d: chrono::Duration) -> Self {
        // floor, so a fraction of a second below zero stays negative
        let whole = d.num_seconds();
        let seconds = if d - chrono::Duration::seconds(whole) < chrono::Duration::zero() {
            whole - 1
        } else {
            whole
        };
        Self::from_secs(i128::from(seconds))
    }
}

/// Web push fields of a [`BrowserNotification`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WebPush {
    /// Wire value of the urgency, see [`Urgency`]. Unset sends `normal`.
    pub urgency: Option<String>,
    /// How long push services keep the notification before abandoning it, 28 days by default.
    pub ttl: Ttl,
    /// Replaces earlier notifications with the same topic.
    /// At most 32 characters of `A-Z a-z 0-9 - _ =`. <https://www.rfc-editor.org/rfc/rfc8030#section-5.4>
    /// Unset or empty drops any `Topic` header.
    pub topic: Option<String>,
}

fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=')
}

impl WebPush {
    fn urgency(&self) -> Result<Urgency, Error> {
        match self.urgency.as_deref() {
            None => Ok(Urgency::default()),
            Some(u) => Urgency::from_str(u).map_err(|_e| {
                Error::invalid_format(
                    "Urgency",
                    format!("{u:?} is not one of very-low, low, normal, high"),
                )
            }),
        }
    }

    fn topic(&self) -> Result<Option<&str>, Error> {
        let topic = match self.topic.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };
        let length = topic.chars().count();
        if length > MAX_TOPIC_LENGTH {
            return Err(Error::invalid_format(
                "Topic",
                format!("{length} characters exceeds {MAX_TOPIC_LENGTH}"),
            ));
        }
        if let Some(c) = topic.chars().find(|c| !is_topic_char(*c)) {
            return Err(Error::invalid_format(
                "Topic",
                format!("character {c:?} is not allowed"),
            ));
        }
        Ok(Some(topic))
    }
}

impl PlatformNotification for WebPush {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    fn validate_and_populate_headers(
        &self,
        headers: &mut HashMap<String, String>,
    ) -> Result<(), Error> {
        let urgency = self.urgency()?;
        let ttl = self.ttl.to_header_value()?;
        let topic = self.topic()?;

        add_or_update_header(headers, URGENCY_HEADER, urgency.to_string());
        add_or_update_header(headers, TTL_HEADER, ttl);
        match topic {
            Some(topic) => add_or_update_header(headers, TOPIC_HEADER, topic),
            None => headers.retain(|k, _| !k.eq_ignore_ascii_case(TOPIC_HEADER)),
        }
        Ok(())
    }
}
