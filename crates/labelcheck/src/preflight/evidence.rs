//! Per-request evidence assembly.
//!
//! The bundle collects everything one preflight request knows about the
//! label: caller fields, at most one image, and an ordered list of text
//! blocks. Document decode failures drop the offending source and continue.

use tracing::warn;

use super::documents::{self, LabelEvidence};
use super::domain::{ProductFields, UploadedFile};
use crate::knowledge::KnowledgeBase;

/// Priority classes for evidence text; earlier kinds carry larger budgets
/// and survive prompt truncation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockKind {
    LabelText,
    TdsText,
    ExtraRules,
    Knowledge,
}

impl BlockKind {
    /// Character budget applied before the block reaches the model prompt.
    pub const fn budget(self) -> usize {
        match self {
            BlockKind::LabelText => 16_000,
            BlockKind::TdsText => 12_000,
            BlockKind::ExtraRules => 4_000,
            BlockKind::Knowledge => 8_000,
        }
    }

    pub const fn heading(self) -> &'static str {
        match self {
            BlockKind::LabelText => "Label text (extracted)",
            BlockKind::TdsText => "Technical data sheet",
            BlockKind::ExtraRules => "Additional rules from the requester",
            BlockKind::Knowledge => "Reference document",
        }
    }
}

/// One contiguous piece of evidence text with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceBlock {
    pub kind: BlockKind,
    pub label: String,
    pub text: String,
}

/// Raw evidence sources accepted by [`EvidenceBundle::assemble`].
#[derive(Debug, Clone, Default)]
pub struct BundleSources {
    pub label_image_data_url: Option<String>,
    pub label_pdf: Option<UploadedFile>,
    pub tds: Option<UploadedFile>,
    pub extra_rules: String,
}

/// Everything one request knows about the label under review.
#[derive(Debug, Clone)]
pub struct EvidenceBundle {
    pub fields: ProductFields,
    image_data_url: Option<String>,
    blocks: Vec<EvidenceBlock>,
    blank: bool,
}

impl EvidenceBundle {
    pub fn assemble(
        fields: ProductFields,
        sources: BundleSources,
        knowledge: &KnowledgeBase,
    ) -> Self {
        let mut image_data_url = None;
        let mut blocks = Vec::new();

        if let Some(url) = sources.label_image_data_url {
            if !url.trim().is_empty() {
                match documents::validate_image_data_url(&url) {
                    Ok(()) => image_data_url = Some(url),
                    Err(err) => warn!(%err, "dropping label image"),
                }
            }
        }

        if let Some(file) = sources.label_pdf {
            let decoded = documents::decode_base64(&file.base64)
                .and_then(|bytes| documents::label_evidence_from_pdf(&bytes));
            match decoded {
                Ok(LabelEvidence::Text(text)) => {
                    blocks.push(block(BlockKind::LabelText, file.name, &text));
                }
                Ok(LabelEvidence::Image { data_url }) => {
                    if image_data_url.is_none() {
                        image_data_url = Some(data_url);
                    } else {
                        warn!(file = %file.name, "label image already present, ignoring scanned pdf raster");
                    }
                }
                Err(err) => warn!(file = %file.name, %err, "dropping label pdf"),
            }
        }

        if let Some(file) = sources.tds {
            let decoded =
                documents::decode_base64(&file.base64).and_then(documents::text_from_upload);
            match decoded {
                Ok(text) => blocks.push(block(BlockKind::TdsText, file.name, &text)),
                Err(err) => warn!(file = %file.name, %err, "dropping tds upload"),
            }
        }

        if !sources.extra_rules.trim().is_empty() {
            blocks.push(block(
                BlockKind::ExtraRules,
                "reference_docs_text".to_string(),
                &sources.extra_rules,
            ));
        }

        for doc in knowledge.docs() {
            blocks.push(block(BlockKind::Knowledge, doc.name.clone(), &doc.body));
        }

        let has_label_material = image_data_url.is_some()
            || blocks
                .iter()
                .any(|entry| entry.kind != BlockKind::Knowledge);
        let blank = !has_label_material && fields.product_name.trim().is_empty();

        Self {
            fields,
            image_data_url,
            blocks,
            blank,
        }
    }

    /// A blank bundle has no image, no request-supplied text, and no
    /// product name; the bundled reference corpus alone does not count.
    /// The model is never consulted for such requests.
    pub fn is_blank(&self) -> bool {
        self.blank
    }

    pub fn image_data_url(&self) -> Option<&str> {
        self.image_data_url.as_deref()
    }

    /// All text blocks in prompt order.
    pub fn blocks(&self) -> &[EvidenceBlock] {
        &self.blocks
    }

    /// Blocks that describe the label itself. The requester's free-text
    /// rules and the reference corpus are prompt material, not label
    /// evidence, and are excluded so reference wording can never satisfy a
    /// label requirement.
    pub fn label_blocks(&self) -> impl Iterator<Item = &EvidenceBlock> {
        self.blocks
            .iter()
            .filter(|entry| matches!(entry.kind, BlockKind::LabelText | BlockKind::TdsText))
    }
}

fn block(kind: BlockKind, label: String, text: &str) -> EvidenceBlock {
    EvidenceBlock {
        kind,
        label,
        text: truncate_to_budget(text, kind.budget()),
    }
}

/// Trims `text` to at most `budget` characters, cutting at the last newline
/// inside the window so a block never ends mid-line. Single-line blocks are
/// cut at the character boundary.
pub(crate) fn truncate_to_budget(text: &str, budget: usize) -> String {
    let mut end = text.len();
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count == budget {
            end = idx;
            break;
        }
    }
    if end == text.len() {
        return text.to_string();
    }

    let cut = match text[..end].rfind('\n') {
        Some(newline) if newline > 0 => newline,
        _ => end,
    };
    text[..cut].trim_end().to_string()
}
