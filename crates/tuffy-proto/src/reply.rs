//! Replies sent back to clients.

use std::fmt;

/// A reply produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text. Embedded newlines become separate protocol lines.
    Text(String),
    /// Structured content with a title and optional fields.
    Embed(Embed),
}

/// A titled block of content, rendered as several lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    /// First line of the rendering.
    pub title: String,
    /// Free text under the title.
    pub description: Option<String>,
    /// `name: value` pairs rendered one per line.
    pub fields: Vec<EmbedField>,
    /// Image URL, rendered last.
    pub image: Option<String>,
}

/// One `name: value` pair of an [`Embed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    /// Field label.
    pub name: String,
    /// Field content.
    pub value: String,
}

impl Embed {
    /// Start an embed with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Set the image URL.
    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }
}

impl Reply {
    /// Shorthand for [`Reply::Text`].
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Flatten the reply to protocol lines. Never returns an empty vector.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self {
            Self::Text(text) => lines.extend(text.lines().map(str::to_string)),
            Self::Embed(embed) => {
                lines.push(format!("== {} ==", embed.title));
                if let Some(desc) = &embed.description {
                    lines.extend(desc.lines().map(str::to_string));
                }
                for field in &embed.fields {
                    lines.push(format!("{}: {}", field.name, field.value));
                }
                if let Some(url) = &embed.image {
                    lines.push(format!("image: {url}"));
                }
            }
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_lines().join("\n"))
    }
}

impl From<Embed> for Reply {
    fn from(embed: Embed) -> Self {
        Self::Embed(embed)
    }
}
