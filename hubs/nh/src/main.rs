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

//! nh is a command line application based on the hubs notification model.
//!
//! To mint the handle a browser registration is stored under,
//!
//! ```
//! $ nh handle encode --endpoint https://push.example/1 --p256dh key --auth secret
//! ```
//!
//! Or you can set environment variables instead,
//!
//! ```
//! $ export NH_ENDPOINT=https://push.example/1
//! $ export NH_P256DH=key
//! $ export NH_AUTH=secret
//! $ nh handle encode
//! ```
//!
//! To see the headers a browser notification is sent with,
//!
//! ```
//! $ nh notify -b '{"title":"hi"}' --urgency high --ttl 60 --topic news -H X-Trace=1
//! ```

use std::collections::HashMap;

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use log::{debug, Level};
use logging_timer::{finish, stimer};
use serde_json::{json, Value};

use hubs::{BrowserNotification, BrowserRegistrationDescription, Ttl};

#[doc(hidden)]
#[derive(Parser)]
#[command(about, author, version)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[doc(hidden)]
#[derive(Subcommand)]
enum Command {
    /// Encode or decode the opaque handle of a browser registration.
    Handle {
        #[command(subcommand)]
        command: HandleCommand,
    },
    /// Validate a browser notification and print the headers it is sent with.
    Notify(NotifyOpts),
}

#[doc(hidden)]
#[derive(Subcommand)]
enum HandleCommand {
    /// Print the handle of a push subscription.
    Encode(EncodeOpts),
    /// Print the push subscription stored in a handle.
    Decode {
        /// Handle as stored by the relay.
        handle: String,
    },
}

#[doc(hidden)]
#[derive(Args)]
struct EncodeOpts {
    /// Push service URL of the subscription.
    #[arg(long, env = "NH_ENDPOINT")]
    endpoint: String,
    /// User agent public key of the subscription.
    #[arg(long, env = "NH_P256DH")]
    p256dh: String,
    /// User agent authentication secret of the subscription.
    #[arg(long, env = "NH_AUTH")]
    auth: String,
    /// Tag to check along with the subscription, may be repeated.
    #[arg(long)]
    tag: Vec<String>,
}

#[doc(hidden)]
#[derive(Args)]
struct NotifyOpts {
    /// Payload.
    #[arg(short, long)]
    body: String,
    /// Media type of the payload, JSON unless given.
    #[arg(long)]
    content_type: Option<String>,
    /// very-low, low, normal or high. <https://www.rfc-editor.org/rfc/rfc8030#section-5.3>
    #[arg(long)]
    urgency: Option<String>,
    /// Seconds the notification stays relevant. <https://www.rfc-editor.org/rfc/rfc8030#section-5.2>
    #[arg(long, allow_hyphen_values = true)]
    ttl: Option<i64>,
    /// Replaces earlier notifications with the same topic. <https://www.rfc-editor.org/rfc/rfc8030#section-5.4>
    #[arg(long)]
    topic: Option<String>,
    /// Tag the notification is routed by.
    #[arg(long)]
    tag: Option<String>,
    /// Custom header as NAME=VALUE, may be repeated.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got {s:?}")),
    }
}

fn encode(opts: &EncodeOpts) -> anyhow::Result<String> {
    let registration = if opts.tag.is_empty() {
        BrowserRegistrationDescription::new(&opts.endpoint, &opts.p256dh, &opts.auth)?
    } else {
        BrowserRegistrationDescription::with_tags(
            opts.endpoint.as_str(),
            opts.p256dh.as_str(),
            opts.auth.as_str(),
            opts.tag.iter().cloned(),
        )?
    };
    registration.validate()?;
    Ok(registration.handle()?)
}

fn decode(handle: &str) -> anyhow::Result<Value> {
    let registration = BrowserRegistrationDescription::from_handle(handle)?;
    let subscription = &registration.platform;
    Ok(json!({
        "endpoint": subscription.endpoint,
        "p256dh": subscription.p256dh,
        "auth": subscription.auth,
    }))
}

fn notify(opts: &NotifyOpts) -> anyhow::Result<Value> {
    let headers: HashMap<String, String> = opts.headers.iter().cloned().collect();
    let mut notification = match opts.content_type.as_deref() {
        Some(content_type) => BrowserNotification::with_headers(&opts.body, content_type, headers)?,
        None => {
            let mut n = BrowserNotification::new(&opts.body);
            for (name, value) in headers {
                n.add_or_update_header(&name, value);
            }
            n
        }
    };
    notification.tag = opts.tag.clone();
    notification.platform.urgency = opts.urgency.clone();
    notification.platform.topic = opts.topic.clone();
    if let Some(seconds) = opts.ttl {
        notification.platform.ttl = Ttl::from_secs(i128::from(seconds));
    }

    notification.validate()?;

    Ok(json!({
        "format": notification.platform_type().to_string(),
        "content_type": notification.content_type(),
        "tag": notification.tag,
        "headers": notification.headers(),
    }))
}

#[doc(hidden)]
fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let opts: Opts = Opts::parse();

    let tmr = stimer!(Level::Debug; "NH");
    let output = match opts.command {
        Command::Handle {
            command: HandleCommand::Encode(ref o),
        } => {
            debug!("encode handle for {}", o.endpoint);
            encode(o)?
        }
        Command::Handle {
            command: HandleCommand::Decode { ref handle },
        } => serde_json::to_string_pretty(&decode(handle)?)?,
        Command::Notify(ref o) => {
            if o.body.is_empty() {
                bail!("body is empty");
            }
            serde_json::to_string_pretty(&notify(o)?)?
        }
    };
    finish!(tmr);

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::{decode, encode, notify, Command, HandleCommand, NotifyOpts, Opts};

    fn parse_notify(args: &[&str]) -> NotifyOpts {
        let mut argv = vec!["nh", "notify"];
        argv.extend_from_slice(args);
        match Opts::parse_from(argv).command {
            Command::Notify(o) => o,
            _ => panic!("expected notify"),
        }
    }

    #[test]
    fn test_encode() -> anyhow::Result<()> {
        let opts = Opts::parse_from(vec![
            "nh",
            "handle",
            "encode",
            "--endpoint",
            "https://x",
            "--p256dh",
            "p",
            "--auth",
            "a",
        ]);
        let o = match opts.command {
            Command::Handle {
                command: HandleCommand::Encode(o),
            } => o,
            _ => panic!("expected handle encode"),
        };
        assert_eq!(
            "eyJlbmRwb2ludCI6Imh0dHBzOi8veCIsInAyNTZkaCI6InAiLCJhdXRoIjoiYSJ9",
            encode(&o)?
        );
        Ok(())
    }

    #[test]
    fn test_encode_rejects_bad_tag() {
        let opts = Opts::parse_from(vec![
            "nh",
            "handle",
            "encode",
            "--endpoint",
            "https://x",
            "--p256dh",
            "p",
            "--auth",
            "a",
            "--tag",
            "not a tag",
        ]);
        if let Command::Handle {
            command: HandleCommand::Encode(o),
        } = opts.command
        {
            assert!(encode(&o).is_err());
        } else {
            panic!("expected handle encode");
        }
    }

    #[test]
    fn test_decode() -> anyhow::Result<()> {
        let value = decode("eyJlbmRwb2ludCI6Imh0dHBzOi8veCIsInAyNTZkaCI6InAiLCJhdXRoIjoiYSJ9")?;
        assert_eq!("https://x", value["endpoint"]);
        assert_eq!("p", value["p256dh"]);
        assert_eq!("a", value["auth"]);
        assert!(decode("bnVsbA==").is_err());
        Ok(())
    }

    #[test]
    fn test_notify() -> anyhow::Result<()> {
        let o = parse_notify(&[
            "-b",
            "hi",
            "--content-type",
            "text/plain",
            "--urgency",
            "high",
            "--ttl",
            "60",
            "--topic",
            "news",
            "-H",
            "X-Trace=1",
            "-H",
            "urgency=low",
        ]);
        let value = notify(&o)?;
        assert_eq!("browser", value["format"]);
        assert_eq!("text/plain;charset=utf-8", value["content_type"]);
        assert_eq!("high", value["headers"]["Urgency"]);
        assert_eq!("60", value["headers"]["TTL"]);
        assert_eq!("news", value["headers"]["Topic"]);
        assert_eq!("1", value["headers"]["X-Trace"]);
        assert!(value["headers"].get("urgency").is_none());
        Ok(())
    }

    #[test]
    fn test_negative_ttl() {
        let o = parse_notify(&["-b", "hi", "--ttl", "-1"]);
        assert_eq!(Some(-1), o.ttl);
        assert!(notify(&o).is_err());
    }

    #[test]
    fn test_bad_header() {
        assert!(Opts::try_parse_from(vec!["nh", "notify", "-b", "hi", "-H", "novalue"]).is_err());
    }
}
