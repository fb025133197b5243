use serde::{Deserialize, Serialize};

/// Attachment metadata exposed on full-detail reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub id: String,
    pub name: String,
}

/// Stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    /// Uid of the event the attachment hangs off.
    pub event_uid: String,
    /// Calendar owner folder the attachment was filed under.
    pub folder: String,
    pub name: String,
    pub mimetype: Option<String>,
    pub data: Vec<u8>,
}

impl Attachment {
    #[must_use]
    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Attachment upload carried by an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub name: String,
    pub mimetype: Option<String>,
    #[serde(default)]
    pub data: Vec<u8>,
}
