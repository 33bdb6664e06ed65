//! Rich-content tree persisted next to the plain article text.
//!
//! The tree is a fixed JSON schema:
//! `{"root": {"type": "root", "children": [paragraph | heading | quote | list]}}`
//! where block nodes hold `text` and `linebreak` leaves. Text leaves carry a
//! [`TextFormat`] bitmask and an optional inline `style` such as
//! `color:darkblue`.

use serde::{Deserialize, Deserializer, Serialize};

/// Inline format bitmask shared by every producer and consumer of the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TextFormat(pub u32);

impl TextFormat {
    pub const PLAIN: TextFormat = TextFormat(0);
    pub const BOLD: TextFormat = TextFormat(1);
    pub const ITALIC: TextFormat = TextFormat(1 << 1);
    pub const STRIKETHROUGH: TextFormat = TextFormat(1 << 2);
    pub const UNDERLINE: TextFormat = TextFormat(1 << 3);

    pub fn contains(self, other: TextFormat) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn with(self, other: TextFormat) -> TextFormat {
        TextFormat(self.0 | other.0)
    }

    pub fn is_plain(&self) -> bool {
        self.0 == 0
    }

    pub fn is_bold(self) -> bool {
        self.contains(Self::BOLD)
    }

    pub fn is_italic(self) -> bool {
        self.contains(Self::ITALIC)
    }

    pub fn is_strikethrough(self) -> bool {
        self.contains(Self::STRIKETHROUGH)
    }

    pub fn is_underline(self) -> bool {
        self.contains(Self::UNDERLINE)
    }
}

// Block nodes written by some editors carry an alignment string in `format`;
// only numeric masks are meaningful here.
impl<'de> Deserialize<'de> for TextFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawFormat {
            Bits(u32),
            Other(serde_json::Value),
        }

        Ok(match RawFormat::deserialize(deserializer)? {
            RawFormat::Bits(bits) => TextFormat(bits),
            RawFormat::Other(_) => TextFormat::PLAIN,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Paragraph,
    Heading,
    Quote,
    List,
    Listitem,
    Text,
    Linebreak,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Bullet,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RichNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "TextFormat::is_plain")]
    pub format: TextFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Heading level tag, `h1`..`h6`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, rename = "listType", skip_serializing_if = "Option::is_none")]
    pub list_type: Option<ListType>,
}

impl RichNode {
    fn block(kind: NodeKind, children: Vec<RichNode>) -> Self {
        Self {
            kind,
            children,
            text: None,
            format: TextFormat::PLAIN,
            style: None,
            tag: None,
            list_type: None,
        }
    }

    pub fn paragraph(children: Vec<RichNode>) -> Self {
        Self::block(NodeKind::Paragraph, children)
    }

    pub fn heading(tag: impl Into<String>, children: Vec<RichNode>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::block(NodeKind::Heading, children)
        }
    }

    pub fn quote(children: Vec<RichNode>) -> Self {
        Self::block(NodeKind::Quote, children)
    }

    pub fn list(list_type: ListType, items: Vec<RichNode>) -> Self {
        Self {
            list_type: Some(list_type),
            ..Self::block(NodeKind::List, items)
        }
    }

    pub fn listitem(children: Vec<RichNode>) -> Self {
        Self::block(NodeKind::Listitem, children)
    }

    pub fn linebreak() -> Self {
        Self::block(NodeKind::Linebreak, Vec::new())
    }

    pub fn text(text: impl Into<String>, format: TextFormat, color: Option<&str>) -> Self {
        Self {
            text: Some(text.into()),
            format,
            style: color.map(|c| format!("color:{}", c)),
            ..Self::block(NodeKind::Text, Vec::new())
        }
    }

    /// Color named by the inline style, if any.
    pub fn color(&self) -> Option<&str> {
        self.style.as_deref().and_then(style_color)
    }

    /// Concatenated text of this node and its descendants.
    pub fn plain_text(&self) -> String {
        match self.kind {
            NodeKind::Text => self.text.clone().unwrap_or_default(),
            NodeKind::Linebreak => "\n".to_string(),
            _ => self.children.iter().map(RichNode::plain_text).collect(),
        }
    }
}

/// Extracts the value of `color` from an inline style string.
pub fn style_color(style: &str) -> Option<&str> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("color") {
            let value = value.trim();
            (!value.is_empty()).then_some(value)
        } else {
            None
        }
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichContent {
    pub root: RichNode,
}

impl Default for RichContent {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RichContent {
    pub fn new(children: Vec<RichNode>) -> Self {
        Self {
            root: RichNode::block(NodeKind::Root, children),
        }
    }

    pub fn blocks(&self) -> &[RichNode] {
        &self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Plain text with blocks separated by blank lines.
    pub fn plain_text(&self) -> String {
        self.root
            .children
            .iter()
            .map(RichNode::plain_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bits() {
        let format = TextFormat::BOLD.with(TextFormat::UNDERLINE);
        assert_eq!(format.0, 9);
        assert!(format.is_bold());
        assert!(format.is_underline());
        assert!(!format.is_italic());
        assert!(!format.is_strikethrough());
    }

    #[test]
    fn test_style_color() {
        assert_eq!(style_color("color:darkblue"), Some("darkblue"));
        assert_eq!(style_color("font-weight: bold; color: #00ff00;"), Some("#00ff00"));
        assert_eq!(style_color("font-weight: bold"), None);
    }

    #[test]
    fn test_lenient_block_format() {
        let json = r#"{"root":{"type":"root","format":"","children":[
            {"type":"paragraph","format":"left","children":[
                {"type":"text","text":"Hi","format":3,"style":"color:green","mode":"normal"}
            ]},
            {"type":"horizontalrule"}
        ]}}"#;
        let content: RichContent = serde_json::from_str(json).unwrap();
        let paragraph = &content.blocks()[0];
        assert!(paragraph.format.is_plain());
        let text = &paragraph.children[0];
        assert!(text.format.is_bold() && text.format.is_italic());
        assert_eq!(text.color(), Some("green"));
        assert_eq!(content.blocks()[1].kind, NodeKind::Unknown);
    }

    #[test]
    fn test_serialized_shape() {
        let content = RichContent::new(vec![RichNode::paragraph(vec![RichNode::text(
            "Hello",
            TextFormat::PLAIN,
            Some("darkred"),
        )])]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["root"]["type"], "root");
        assert_eq!(value["root"]["children"][0]["type"], "paragraph");
        assert_eq!(value["root"]["children"][0]["children"][0]["style"], "color:darkred");
        assert_eq!(content.plain_text(), "Hello");
    }
}
