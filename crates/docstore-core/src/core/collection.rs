// crates/docstore-core/src/core/collection.rs
// ============================================================================
// Module: Docstore Schema Registry
// Description: Closed collection identifiers and their record schemas.
// Purpose: Resolve collection tags to schemas and decode stored documents.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every logical collection sharing the partitioned container is named by a
//! [`Collection`] variant. The mapping from variant to schema is an exhaustive
//! `match`, so a new collection cannot be added without a schema. Untrusted
//! names are resolved through [`resolve`], which never falls back to a default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::records::AccessRight;
use crate::core::records::AiModel;
use crate::core::records::ChatHistory;
use crate::core::records::Comment;
use crate::core::records::Document;
use crate::core::records::GroupTarget;
use crate::core::records::Log;
use crate::core::records::LoginStat;
use crate::core::records::MeetingMinutes;
use crate::core::records::Message;
use crate::core::records::Record;
use crate::core::records::Schema;
use crate::core::records::SchemaError;
use crate::core::records::SpeakerIdentification;
use crate::core::records::Summary;
use crate::core::records::Target;
use crate::core::records::Team;
use crate::core::records::UsageStat;
use crate::core::records::User;
use crate::core::records::WhitePaper;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Document field holding the collection tag.
pub const COLLECTION_FIELD: &str = "collection_name";
/// Placeholder bound to the collection tag in every query.
pub const COLLECTION_PARAM: &str = "@collection_name";
/// Business identifier field for identity-keyed collections.
const ID_FIELD: &str = "id";
/// Business identifier field for target-scoped collections.
const TARGET_ID_FIELD: &str = "target_id";

// ============================================================================
// SECTION: Collection Identifier
// ============================================================================

/// Closed set of logical collections.
///
/// # Invariants
/// - Each variant maps to exactly one schema type and no schema serves two variants.
/// - Wire names are stable; they are persisted in every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Application users.
    User,
    /// Teams of users.
    Team,
    /// Summarization targets.
    Target,
    /// Generated summaries.
    Summary,
    /// Speaker labels for a target.
    SpeakerIdentification,
    /// Generated white papers.
    WhitePaper,
    /// Generated meeting minutes.
    MeetingMinutes,
    /// Targets shared with a team.
    GroupTarget,
    /// Comments on a target.
    Comment,
    /// Chat transcripts for a target.
    ChatHistory,
    /// Per-user model usage counters.
    UsageStat,
    /// Per-user login counters.
    LoginStat,
    /// Per-target access grants.
    AccessRight,
    /// Available AI models.
    AiModel,
    /// Localized message catalog entries.
    Message,
    /// Application log entries.
    Log,
}

impl Collection {
    /// Every collection, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::User,
        Self::Team,
        Self::Target,
        Self::Summary,
        Self::SpeakerIdentification,
        Self::WhitePaper,
        Self::MeetingMinutes,
        Self::GroupTarget,
        Self::Comment,
        Self::ChatHistory,
        Self::UsageStat,
        Self::LoginStat,
        Self::AccessRight,
        Self::AiModel,
        Self::Message,
        Self::Log,
    ];

    /// Returns the stable wire name stored in `collection_name`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Team => "team",
            Self::Target => "target",
            Self::Summary => "summary",
            Self::SpeakerIdentification => "speaker_identification",
            Self::WhitePaper => "white_paper",
            Self::MeetingMinutes => "meeting_minutes",
            Self::GroupTarget => "group_target",
            Self::Comment => "comment",
            Self::ChatHistory => "chat_history",
            Self::UsageStat => "usage_stat",
            Self::LoginStat => "login_stat",
            Self::AccessRight => "access_right",
            Self::AiModel => "ai_model",
            Self::Message => "message",
            Self::Log => "log",
        }
    }

    /// Returns the schema this collection stores.
    #[must_use]
    pub const fn schema(self) -> SchemaDescriptor {
        match self {
            Self::User => SchemaDescriptor::new(self, "User", ID_FIELD),
            Self::Team => SchemaDescriptor::new(self, "Team", ID_FIELD),
            Self::Target => SchemaDescriptor::new(self, "Target", TARGET_ID_FIELD),
            Self::Summary => SchemaDescriptor::new(self, "Summary", TARGET_ID_FIELD),
            Self::SpeakerIdentification => {
                SchemaDescriptor::new(self, "SpeakerIdentification", TARGET_ID_FIELD)
            }
            Self::WhitePaper => SchemaDescriptor::new(self, "WhitePaper", TARGET_ID_FIELD),
            Self::MeetingMinutes => SchemaDescriptor::new(self, "MeetingMinutes", TARGET_ID_FIELD),
            Self::GroupTarget => SchemaDescriptor::new(self, "GroupTarget", TARGET_ID_FIELD),
            Self::Comment => SchemaDescriptor::new(self, "Comment", ID_FIELD),
            Self::ChatHistory => SchemaDescriptor::new(self, "ChatHistory", ID_FIELD),
            Self::UsageStat => SchemaDescriptor::new(self, "UsageStat", ID_FIELD),
            Self::LoginStat => SchemaDescriptor::new(self, "LoginStat", ID_FIELD),
            Self::AccessRight => SchemaDescriptor::new(self, "AccessRight", ID_FIELD),
            Self::AiModel => SchemaDescriptor::new(self, "AiModel", ID_FIELD),
            Self::Message => SchemaDescriptor::new(self, "Message", ID_FIELD),
            Self::Log => SchemaDescriptor::new(self, "Log", ID_FIELD),
        }
    }

    /// Decodes a stored document into this collection's schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the collection tag does not match or the
    /// document does not conform to the schema.
    pub fn decode(self, document: Document) -> Result<Record, SchemaError> {
        check_collection_tag(self, &document)?;
        let value = Value::Object(document);
        match self {
            Self::User => decode_as::<User>(value),
            Self::Team => decode_as::<Team>(value),
            Self::Target => decode_as::<Target>(value),
            Self::Summary => decode_as::<Summary>(value),
            Self::SpeakerIdentification => decode_as::<SpeakerIdentification>(value),
            Self::WhitePaper => decode_as::<WhitePaper>(value),
            Self::MeetingMinutes => decode_as::<MeetingMinutes>(value),
            Self::GroupTarget => decode_as::<GroupTarget>(value),
            Self::Comment => decode_as::<Comment>(value),
            Self::ChatHistory => decode_as::<ChatHistory>(value),
            Self::UsageStat => decode_as::<UsageStat>(value),
            Self::LoginStat => decode_as::<LoginStat>(value),
            Self::AccessRight => decode_as::<AccessRight>(value),
            Self::AiModel => decode_as::<AiModel>(value),
            Self::Message => decode_as::<Message>(value),
            Self::Log => decode_as::<Log>(value),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|collection| collection.as_str() == value).ok_or_else(|| {
            UnknownCollection {
                name: value.to_string(),
            }
        })
    }
}

// ============================================================================
// SECTION: Schema Descriptor
// ============================================================================

/// Static description of the schema backing a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    /// Collection served by the schema.
    pub collection: Collection,
    /// Rust type name of the schema.
    pub type_name: &'static str,
    /// Document field matched by `find_by_id`.
    pub business_id_field: &'static str,
}

impl SchemaDescriptor {
    /// Creates a descriptor.
    const fn new(
        collection: Collection,
        type_name: &'static str,
        business_id_field: &'static str,
    ) -> Self {
        Self {
            collection,
            type_name,
            business_id_field,
        }
    }

    /// Returns the collection wire name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.collection.as_str()
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Collection name outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection: {name}")]
pub struct UnknownCollection {
    /// Rejected collection name.
    pub name: String,
}

/// Resolves an untrusted collection name.
///
/// # Errors
///
/// Returns [`UnknownCollection`] when the name is not a known collection.
pub fn resolve(name: &str) -> Result<Collection, UnknownCollection> {
    name.parse()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Verifies the stored collection tag matches the expected collection.
fn check_collection_tag(collection: Collection, document: &Document) -> Result<(), SchemaError> {
    match document.get(COLLECTION_FIELD) {
        Some(Value::String(found)) if found == collection.as_str() => Ok(()),
        Some(Value::String(found)) => Err(SchemaError::CollectionTag {
            expected: collection,
            found: Some(found.clone()),
        }),
        _ => Err(SchemaError::CollectionTag {
            expected: collection,
            found: None,
        }),
    }
}

/// Deserializes a document value into a concrete schema.
fn decode_as<T: Schema>(value: Value) -> Result<Record, SchemaError> {
    let record: T =
        serde_json::from_value(value).map_err(|err| SchemaError::Decode(err.to_string()))?;
    Ok(record.into_record())
}
