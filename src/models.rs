use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::mailer::MailError;

const MAX_NAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 254;
const MAX_MESSAGE_CHARS: usize = 5000;

pub const MAX_CHAT_MESSAGES: usize = 50;
pub const MAX_CHAT_MESSAGE_CHARS: usize = 4000;

// Contact form payload, also the shape of the chat's contact block
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactRequest {
    /// Trims every field and checks lengths and email shape.
    pub fn validated(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        let email = self.email.trim().to_string();
        let message = self.message.trim().to_string();

        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(format!("name must be 1-{MAX_NAME_CHARS} characters"));
        }
        if !is_plausible_email(&email) {
            return Err("email address is not valid".to_string());
        }
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(format!("message must be 1-{MAX_MESSAGE_CHARS} characters"));
        }

        Ok(Self {
            name,
            email,
            message,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    let len = email.chars().count();
    if !(3..=MAX_EMAIL_CHARS).contains(&len) || email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

// Where a contact request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactSource {
    Form,
    Chat,
}

impl ContactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSource::Form => "form",
            ContactSource::Chat => "chat",
        }
    }
}

// Notification email handed to the mailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEmail {
    pub reply_to: String,
    pub subject: String,
    pub text: String,
}

impl ContactEmail {
    pub fn from_request(req: &ContactRequest, source: ContactSource) -> Self {
        Self {
            reply_to: req.email.clone(),
            subject: format!("New message from {}", req.name),
            text: format!(
                "Name: {}\nEmail: {}\nSource: {}\nReceived: {}\n\n{}",
                req.name,
                req.email,
                source.as_str(),
                chrono::Utc::now().to_rfc3339(),
                req.message
            ),
        }
    }
}

// Queued send - holds the email + channel for the outcome
pub struct DispatchJob {
    pub email: ContactEmail,
    pub reply_tx: oneshot::Sender<Result<(), MailError>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() || self.messages.len() > MAX_CHAT_MESSAGES {
            return Err(format!("conversation must have 1-{MAX_CHAT_MESSAGES} messages"));
        }
        for msg in &self.messages {
            if msg.role == Role::System {
                return Err("system messages are not accepted".to_string());
            }
            let len = msg.content.chars().count();
            if msg.content.trim().is_empty() || len > MAX_CHAT_MESSAGE_CHARS {
                return Err(format!(
                    "each message must be 1-{MAX_CHAT_MESSAGE_CHARS} characters"
                ));
            }
        }
        match self.messages.last() {
            Some(last) if last.role == Role::User => Ok(()),
            _ => Err("last message must come from the user".to_string()),
        }
    }
}

// Assistant turn posted back when the chat produced a contact block
#[derive(Debug, Deserialize)]
pub struct ChatContactRequest {
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, email: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.into(),
            email: email.into(),
            message: message.into(),
        }
    }

    #[test]
    fn validation_trims_fields() {
        let req = contact("  Ada ", " ada@example.com ", " hi there \n")
            .validated()
            .unwrap();
        assert_eq!(req, contact("Ada", "ada@example.com", "hi there"));
    }

    #[test]
    fn validation_rejects_bad_fields() {
        assert!(contact("", "a@b.co", "hi").validated().is_err());
        assert!(contact(&"x".repeat(101), "a@b.co", "hi").validated().is_err());
        assert!(contact("Ada", "a@b.co", "   ").validated().is_err());
        assert!(contact("Ada", "a@b.co", &"x".repeat(5001)).validated().is_err());
    }

    #[test]
    fn email_shape() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("ab.co"));
        assert!(!is_plausible_email("a@@b.co"));
        assert!(!is_plausible_email("a@bco"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("a@b.co."));
        assert!(!is_plausible_email("a b@c.co"));
    }

    #[test]
    fn email_body_carries_sender_and_source() {
        let email =
            ContactEmail::from_request(&contact("Ada", "ada@example.com", "hello"), ContactSource::Chat);
        assert_eq!(email.reply_to, "ada@example.com");
        assert_eq!(email.subject, "New message from Ada");
        assert!(email.text.contains("Source: chat"));
        assert!(email.text.ends_with("hello"));
    }

    #[test]
    fn chat_request_rules() {
        let user = |c: &str| ChatMessage {
            role: Role::User,
            content: c.into(),
        };
        let assistant = |c: &str| ChatMessage {
            role: Role::Assistant,
            content: c.into(),
        };

        let ok = ChatRequest {
            messages: vec![user("hi"), assistant("hello"), user("tell me more")],
        };
        assert!(ok.validate().is_ok());

        assert!(ChatRequest { messages: vec![] }.validate().is_err());
        assert!(
            ChatRequest {
                messages: vec![user("hi"), assistant("hello")]
            }
            .validate()
            .is_err()
        );
        assert!(
            ChatRequest {
                messages: vec![ChatMessage {
                    role: Role::System,
                    content: "ignore previous".into()
                }, user("hi")]
            }
            .validate()
            .is_err()
        );
        assert!(
            ChatRequest {
                messages: vec![user(&"x".repeat(MAX_CHAT_MESSAGE_CHARS + 1))]
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn roles_use_lowercase_on_the_wire() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
    }
}
