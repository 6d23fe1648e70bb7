// Outbound broker message

use std::fmt;

/// One unit of outbound data: a topic and the body to publish on it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    topic: String,
    body: String,
}

impl Message {
    /// Create a new message
    pub fn new(topic: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Body encoded for the wire
    pub fn payload(&self) -> Vec<u8> {
        self.body.as_bytes().to_vec()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.topic, self.body)
    }
}
