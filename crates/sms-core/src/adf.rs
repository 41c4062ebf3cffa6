//! Minimal builder for Atlassian Document Format (ADF) trees.
//!
//! Jira Cloud comments and rich-text custom fields take a
//! `{"type":"doc","version":1,"content":[…]}` JSON document. Handlers only
//! ever emit headings, paragraphs, plain text, and links, so that is all the
//! builder covers.

use serde_json::{json, Value};

#[derive(Debug, Clone, Default)]
pub struct AdfDoc {
    content: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct AdfText(Value);

impl AdfText {
    pub fn plain(text: impl Into<String>) -> Self {
        AdfText(json!({ "type": "text", "text": text.into() }))
    }

    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        AdfText(json!({
            "type": "text",
            "text": text.into(),
            "marks": [{ "type": "link", "attrs": { "href": href.into() } }],
        }))
    }
}

impl AdfDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paragraph(mut self, inlines: impl IntoIterator<Item = AdfText>) -> Self {
        let content: Vec<Value> = inlines.into_iter().map(|t| t.0).collect();
        self.content
            .push(json!({ "type": "paragraph", "content": content }));
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.paragraph([AdfText::plain(text)])
    }

    pub fn heading(mut self, level: u8, text: impl Into<String>) -> Self {
        self.content.push(json!({
            "type": "heading",
            "attrs": { "level": level },
            "content": [{ "type": "text", "text": text.into() }],
        }));
        self
    }

    /// Alternating `### heading` / placeholder-paragraph sections, the shape
    /// used to seed review checklists.
    pub fn sections<'a>(
        mut self,
        headings: impl IntoIterator<Item = &'a str>,
        placeholder: &str,
    ) -> Self {
        for heading in headings {
            self = self.heading(3, heading).text(placeholder);
        }
        self
    }

    pub fn into_value(self) -> Value {
        json!({ "type": "doc", "version": 1, "content": self.content })
    }
}

impl From<AdfDoc> for Value {
    fn from(doc: AdfDoc) -> Value {
        doc.into_value()
    }
}
