use base64::{Engine, engine::general_purpose::STANDARD as Base64Standard};
use serde::{Deserialize, Serialize};

/// MIME type of every figure a script produces.
pub const PNG_MIME_TYPE: &str = "image/png";

/// A content block in a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text(TextContent),
    /// A base64-encoded image.
    #[serde(rename = "image")]
    Image(ImageContent),
}

impl ContentBlock {
    /// Text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent::new(text))
    }

    /// The text of a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(content) => Some(&content.text),
            Self::Image(_) => None,
        }
    }

    /// Whether this is an image block.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }
}

/// Text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text.
    pub text: String,
}

impl TextContent {
    /// Create a text block.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Inline image, base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// Base64-encoded image data.
    pub data: String,
    /// MIME type of the decoded data.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl ImageContent {
    /// Create from already-encoded data.
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encode raw image bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(Base64Standard.encode(bytes), mime_type)
    }

    /// `data:` URI for embedding in markup.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let image = ImageContent::from_bytes(&[0x89, b'P', b'N', b'G'], PNG_MIME_TYPE);
        assert_eq!(image.data, "iVBORw==");
        assert_eq!(image.data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_content_block_accessors() {
        let text = ContentBlock::text("hi");
        assert_eq!(text.as_text(), Some("hi"));
        assert!(!text.is_image());

        let image = ContentBlock::Image(ImageContent::new("cG5n", PNG_MIME_TYPE));
        assert_eq!(image.as_text(), None);
        assert!(image.is_image());
    }
}
