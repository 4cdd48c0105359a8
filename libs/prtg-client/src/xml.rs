//! XML response decoding
//!
//! Every XML target answers with one envelope element whose tag names the
//! content (`groups`, `devices`, `sensors`, `status`, `prtg`). Table pages
//! wrap each record in an `<item>` child and carry a `listend` attribute.

use prtg_model::{Entity, EntityKind};

use crate::error::{ClientError, Result};

/// Decoded response envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub tag: String,
    /// Raw `listend` attribute of the envelope element
    pub listend: Option<String>,
    /// Non-item children as (tag, text)
    pub root_fields: Vec<(String, String)>,
    /// `<item>` children, each as its (tag, text) children
    pub items: Vec<Vec<(String, String)>>,
}

impl Envelope {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| ClientError::UnknownResponse(format!("payload is not UTF-8: {}", e)))?;
        let document = roxmltree::Document::parse(text)
            .map_err(|e| ClientError::UnknownResponse(e.to_string()))?;

        let root = document.root_element();
        let mut envelope = Envelope {
            tag: root.tag_name().name().to_string(),
            listend: root.attribute("listend").map(str::to_string),
            ..Default::default()
        };

        for child in root.children().filter(roxmltree::Node::is_element) {
            if child.tag_name().name() == "item" {
                envelope.items.push(element_fields(child));
            } else {
                envelope.root_fields.push(field(child));
            }
        }
        Ok(envelope)
    }

    /// Whether this is the last page
    ///
    /// A missing `listend` means the response is not paginated.
    pub fn ended(&self) -> Result<bool> {
        match self.listend.as_deref() {
            None => Ok(true),
            Some(raw) => raw.trim().parse::<i64>().map(|n| n != 0).map_err(|_| {
                ClientError::UnknownResponse(format!("invalid listend attribute '{}'", raw))
            }),
        }
    }

    /// Records of the page, chosen by envelope tag
    pub fn entities(&self) -> Vec<Entity> {
        match EntityKind::from_content_type(&self.tag) {
            Some(kind) if kind.is_table_content() => self
                .items
                .iter()
                .map(|item| Entity::from_fields(kind, item.iter().map(|(k, v)| (k, v.as_str()))))
                .collect(),
            Some(kind) => vec![Entity::from_fields(
                kind,
                self.root_fields.iter().map(|(k, v)| (k, v.as_str())),
            )],
            None => Vec::new(),
        }
    }
}

fn field(node: roxmltree::Node<'_, '_>) -> (String, String) {
    (
        node.tag_name().name().to_string(),
        node.text().unwrap_or_default().to_string(),
    )
}

fn element_fields(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    node.children()
        .filter(roxmltree::Node::is_element)
        .map(field)
        .collect()
}
