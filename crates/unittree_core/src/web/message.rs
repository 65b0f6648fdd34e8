//! Redirect URL builders: plain page URLs and admin message URLs.

use url::form_urlencoded;

/// Page shown for stop and confirmation messages.
pub const JSP_ADMIN_MESSAGE: &str = "jsp/admin/AdminMessage.jsp";

const PARAMETER_MESSAGE_KEY: &str = "message";
const PARAMETER_MESSAGE_TYPE: &str = "type";
const PARAMETER_MESSAGE_TARGET: &str = "target";

/// Relative URL with an ordered, form-encoded query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlItem {
    root: String,
    parameters: Vec<(String, String)>,
}

impl UrlItem {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parameters.push((name.into(), value.to_string()));
        self
    }

    /// Adds the parameter only when a value is present.
    pub fn with_optional(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn url(&self) -> String {
        if self.parameters.is_empty() {
            return self.root.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.parameters.iter())
            .finish();
        format!("{}?{}", self.root, query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Stop,
    Confirmation,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Confirmation => "confirmation",
        }
    }
}

/// Localized message shown on the admin message page.
///
/// `key` is an i18n property key; confirmations carry the URL the
/// confirm button posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminMessage {
    pub key: String,
    pub message_type: MessageType,
    pub target: Option<String>,
}

impl AdminMessage {
    pub fn stop(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message_type: MessageType::Stop,
            target: None,
        }
    }

    pub fn confirmation(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message_type: MessageType::Confirmation,
            target: Some(target.into()),
        }
    }

    pub fn url(&self) -> String {
        UrlItem::new(JSP_ADMIN_MESSAGE)
            .with(PARAMETER_MESSAGE_KEY, &self.key)
            .with(PARAMETER_MESSAGE_TYPE, self.message_type.as_str())
            .with_optional(PARAMETER_MESSAGE_TARGET, self.target.as_ref())
            .url()
    }
}
