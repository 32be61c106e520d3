/**
 * One-shot user messages, shown on the next rendered page
 *
 * Anything which wants to tell the user something talks to a `MessageSink`.
 * For real requests that is `FlashMessages`, which keeps undisplayed messages
 * in a cookie so that they survive a redirect. A plain `Vec<Message>` is a
 * sink too and is what the tests hand in.
 */
use log::*;
use serde::{Deserialize, Serialize};
use tide::http::cookies::SameSite;
use tide::http::Cookie;
use tide::{Request, Response};

pub const FLASH_COOKIE: &str = "messages";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn alert_class(&self) -> &'static str {
        match self {
            Level::Info => "alert-info",
            Level::Success => "alert-success",
            Level::Warning => "alert-warning",
            Level::Error => "alert-danger",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

impl Message {
    /**
     * CSS classes used by the templates to display the message
     */
    pub fn tags(&self) -> String {
        format!(
            "alert {} alert-dismissible fade show",
            self.level.alert_class()
        )
    }

    pub fn view(&self) -> serde_json::Value {
        serde_json::json!({
            "level": self.level,
            "text": self.text,
            "tags": self.tags(),
        })
    }
}

pub trait MessageSink {
    fn add(&mut self, level: Level, text: &str);

    fn info(&mut self, text: &str) {
        self.add(Level::Info, text)
    }

    fn success(&mut self, text: &str) {
        self.add(Level::Success, text)
    }

    fn warning(&mut self, text: &str) {
        self.add(Level::Warning, text)
    }

    fn error(&mut self, text: &str) {
        self.add(Level::Error, text)
    }
}

impl MessageSink for Vec<Message> {
    fn add(&mut self, level: Level, text: &str) {
        self.push(Message {
            level,
            text: text.to_string(),
        });
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FlashCookie {
    #[serde(default)]
    messages: Vec<Message>,
}

/**
 * Request-scoped message store backed by the `messages` cookie
 */
#[derive(Debug, Default)]
pub struct FlashMessages {
    pending: Vec<Message>,
    had_cookie: bool,
}

impl FlashMessages {
    pub fn from_request<State>(req: &Request<State>) -> Self {
        match req.cookie(FLASH_COOKIE) {
            Some(cookie) => Self {
                pending: decode(cookie.value()),
                had_cookie: true,
            },
            None => Self::default(),
        }
    }

    /**
     * Hand every pending message over for display, they will not be shown again
     */
    pub fn take(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.pending)
    }

    /**
     * Persist whatever has not been displayed yet onto the response
     */
    pub fn apply(self, res: &mut Response) {
        if !self.pending.is_empty() {
            match encode(&self.pending) {
                Ok(value) => {
                    let cookie = Cookie::build(FLASH_COOKIE, value)
                        .path("/")
                        .http_only(true)
                        .same_site(SameSite::Lax)
                        .finish();
                    res.insert_cookie(cookie);
                }
                Err(err) => error!("Failed to store flash messages: {}", err),
            }
        } else if self.had_cookie {
            let mut cookie = Cookie::named(FLASH_COOKIE);
            cookie.set_path("/");
            res.remove_cookie(cookie);
        }
    }
}

impl MessageSink for FlashMessages {
    fn add(&mut self, level: Level, text: &str) {
        self.pending.push(Message {
            level,
            text: text.to_string(),
        });
    }
}

fn encode(messages: &[Message]) -> Result<String, serde_qs::Error> {
    serde_qs::to_string(&FlashCookie {
        messages: messages.to_vec(),
    })
}

/**
 * A cookie which cannot be read back is dropped rather than failing the request
 */
fn decode(value: &str) -> Vec<Message> {
    match serde_qs::from_str::<FlashCookie>(value) {
        Ok(cookie) => cookie.messages,
        Err(err) => {
            warn!("Discarding unreadable flash cookie: {}", err);
            vec![]
        }
    }
}
