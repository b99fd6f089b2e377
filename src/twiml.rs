//! Renders a [`CallResponse`] as TwiML.

use crate::config::Config;
use crate::dialogue::{CallResponse, NextAction};
use std::fmt::Write;

pub const GATHER_PATH: &str = "/voice/gather";
pub const TRANSFER_STATUS_PATH: &str = "/voice/transfer-status";
pub const INCOMING_PATH: &str = "/voice/incoming";
pub const STATUS_PATH: &str = "/voice/status";

#[derive(Debug, Clone)]
pub struct TwimlOptions {
    pub base_url: String,
    pub voice: Option<String>,
    pub language: String,
}

impl TwimlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            voice: config.voice.clone(),
            language: config.language.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn say(out: &mut String, line: &str, options: &TwimlOptions) {
    match &options.voice {
        Some(voice) => {
            let _ = write!(
                out,
                r#"<Say voice="{}" language="{}">{}</Say>"#,
                escape(voice),
                escape(&options.language),
                escape(line)
            );
        }
        None => {
            let _ = write!(
                out,
                r#"<Say language="{}">{}</Say>"#,
                escape(&options.language),
                escape(line)
            );
        }
    }
}

pub fn render(response: &CallResponse, options: &TwimlOptions) -> String {
    let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
    match &response.next {
        NextAction::Listen => {
            let gather_url = escape(&options.url(GATHER_PATH));
            let _ = write!(
                out,
                r#"<Gather input="speech" action="{}" method="POST" speechTimeout="auto" language="{}">"#,
                gather_url,
                escape(&options.language)
            );
            for line in &response.speak {
                say(&mut out, line, options);
            }
            out.push_str("</Gather>");
            // no speech: the gather falls through and comes back as an empty turn
            let _ = write!(out, r#"<Redirect method="POST">{}</Redirect>"#, gather_url);
        }
        NextAction::Transfer {
            target,
            ring_timeout_secs,
        } => {
            for line in &response.speak {
                say(&mut out, line, options);
            }
            let _ = write!(
                out,
                r#"<Dial timeout="{}" action="{}" method="POST">{}</Dial>"#,
                ring_timeout_secs,
                escape(&options.url(TRANSFER_STATUS_PATH)),
                escape(target)
            );
        }
        NextAction::Hangup => {
            for line in &response.speak {
                say(&mut out, line, options);
            }
            out.push_str("<Hangup/>");
        }
    }
    out.push_str("</Response>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TwimlOptions {
        TwimlOptions {
            base_url: "https://calls.example.com".to_string(),
            voice: None,
            language: "en-US".to_string(),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"Tom & Jerry's <"show">"#),
            "Tom &amp; Jerry&apos;s &lt;&quot;show&quot;&gt;"
        );
    }

    #[test]
    fn test_render_listen() {
        let response = CallResponse {
            speak: vec!["Hi Dana.".to_string(), "What time works?".to_string()],
            next: NextAction::Listen,
        };
        let xml = render(&response, &options());
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><Response><Gather input="speech" action="https://calls.example.com/voice/gather""#));
        assert!(xml.contains(r#"<Say language="en-US">Hi Dana.</Say><Say language="en-US">What time works?</Say></Gather>"#));
        assert!(xml.ends_with(
            r#"<Redirect method="POST">https://calls.example.com/voice/gather</Redirect></Response>"#
        ));
    }

    #[test]
    fn test_render_transfer() {
        let response = CallResponse {
            speak: vec!["Please hold.".to_string()],
            next: NextAction::Transfer {
                target: "+15551112222".to_string(),
                ring_timeout_secs: 20,
            },
        };
        let xml = render(&response, &options());
        assert!(xml.contains(r#"<Dial timeout="20" action="https://calls.example.com/voice/transfer-status" method="POST">+15551112222</Dial>"#));
        assert!(!xml.contains("<Gather"));
    }

    #[test]
    fn test_render_hangup_with_voice() {
        let mut options = options();
        options.voice = Some("Polly.Joanna".to_string());
        let xml = render(&CallResponse::hangup("You're all set & done."), &options);
        assert!(xml.contains(
            r#"<Say voice="Polly.Joanna" language="en-US">You&apos;re all set &amp; done.</Say><Hangup/></Response>"#
        ));
    }
}
