//! Serde models for FrameNet 1.7 frame files (`frame/<Name>.xml`).
//!
//! Only the parts of the schema used by the frame graph are modelled; unknown elements
//! and attributes (colours, annotation counts, semantic types, ...) are skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

// --- Frame ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "@ID")]
    pub id: u32,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "definition", default)]
    pub definition: Option<String>,
    #[serde(rename = "FE", default)]
    pub frame_elements: Vec<FrameElement>,
    #[serde(rename = "frameRelation", default)]
    pub relations: Vec<FrameRelationGroup>,
    #[serde(rename = "lexUnit", default)]
    pub lexical_units: Vec<LexUnit>,
}

impl Frame {
    /// Names of the core frame elements, in document order.
    pub fn core_element_names(&self) -> Vec<String> {
        self.frame_elements
            .iter()
            .filter(|fe| fe.core_type == CoreType::Core)
            .map(|fe| fe.name.clone())
            .collect()
    }

    /// Iterates `(related frame name, relation type)` pairs in document order.
    pub fn related_frames(&self) -> impl Iterator<Item = (&str, FrameRelType)> {
        self.relations.iter().flat_map(|group| {
            group
                .related
                .iter()
                .map(move |related| (related.name.as_str(), group.rel_type))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameElement {
    #[serde(rename = "@ID")]
    pub id: u32,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@coreType")]
    pub core_type: CoreType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreType {
    #[serde(rename = "Core")]
    Core,
    #[serde(rename = "Core-Unexpressed")]
    CoreUnexpressed,
    #[serde(rename = "Peripheral")]
    Peripheral,
    #[serde(rename = "Extra-Thematic")]
    ExtraThematic,
    #[serde(other)]
    Other,
}

// --- Frame relations ---

/// One `<frameRelation type="...">` element; a group may list zero or more related frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRelationGroup {
    #[serde(rename = "@type")]
    pub rel_type: FrameRelType,
    #[serde(rename = "relatedFrame", default)]
    pub related: Vec<RelatedFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedFrame {
    #[serde(rename = "$text")]
    pub name: String,
}

/// Directed frame-to-frame relation as labelled in the frame files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameRelType {
    #[serde(rename = "Inherits from")]
    InheritsFrom,
    #[serde(rename = "Is Inherited by")]
    IsInheritedBy,
    #[serde(rename = "Perspective on")]
    PerspectiveOn,
    #[serde(rename = "Is Perspectivized in")]
    IsPerspectivizedIn,
    #[serde(rename = "Uses")]
    Uses,
    #[serde(rename = "Is Used by")]
    IsUsedBy,
    #[serde(rename = "Subframe of")]
    SubframeOf,
    #[serde(rename = "Has Subframe(s)")]
    HasSubframes,
    #[serde(rename = "Precedes")]
    Precedes,
    #[serde(rename = "Is Preceded by")]
    IsPrecededBy,
    #[serde(rename = "Is Inchoative of")]
    IsInchoativeOf,
    #[serde(rename = "Is Causative of")]
    IsCausativeOf,
    #[serde(rename = "See also")]
    SeeAlso,
    // Catch-all for relation labels added in later releases
    #[serde(other)]
    Other,
}

impl FrameRelType {
    /// The label used in the frame files, also used as the stored form in the database.
    pub fn label(self) -> &'static str {
        match self {
            FrameRelType::InheritsFrom => "Inherits from",
            FrameRelType::IsInheritedBy => "Is Inherited by",
            FrameRelType::PerspectiveOn => "Perspective on",
            FrameRelType::IsPerspectivizedIn => "Is Perspectivized in",
            FrameRelType::Uses => "Uses",
            FrameRelType::IsUsedBy => "Is Used by",
            FrameRelType::SubframeOf => "Subframe of",
            FrameRelType::HasSubframes => "Has Subframe(s)",
            FrameRelType::Precedes => "Precedes",
            FrameRelType::IsPrecededBy => "Is Preceded by",
            FrameRelType::IsInchoativeOf => "Is Inchoative of",
            FrameRelType::IsCausativeOf => "Is Causative of",
            FrameRelType::SeeAlso => "See also",
            FrameRelType::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "Inherits from" => FrameRelType::InheritsFrom,
            "Is Inherited by" => FrameRelType::IsInheritedBy,
            "Perspective on" => FrameRelType::PerspectiveOn,
            "Is Perspectivized in" => FrameRelType::IsPerspectivizedIn,
            "Uses" => FrameRelType::Uses,
            "Is Used by" => FrameRelType::IsUsedBy,
            "Subframe of" => FrameRelType::SubframeOf,
            "Has Subframe(s)" => FrameRelType::HasSubframes,
            "Precedes" => FrameRelType::Precedes,
            "Is Preceded by" => FrameRelType::IsPrecededBy,
            "Is Inchoative of" => FrameRelType::IsInchoativeOf,
            "Is Causative of" => FrameRelType::IsCausativeOf,
            "See also" => FrameRelType::SeeAlso,
            _ => FrameRelType::Other,
        }
    }
}

impl fmt::Display for FrameRelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// --- Lexical units ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexUnit {
    #[serde(rename = "@ID")]
    pub id: u32,
    #[serde(rename = "@name")]
    pub name: String, // e.g. "abandon.v"
}
