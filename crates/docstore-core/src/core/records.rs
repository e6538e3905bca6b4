// crates/docstore-core/src/core/records.rs
// ============================================================================
// Module: Docstore Record Schemas
// Description: Typed record schemas stored in the partitioned container.
// Purpose: Define identity, partitioning, and normalization per collection.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Each collection stores one schema type implementing [`Schema`]. All
//! schemas share a flattened [`RecordMeta`] envelope (identity, partition key,
//! lifecycle timestamps). [`Record`] is the closed union returned by untyped
//! queries. Partition keys are derived by the schema, never by callers:
//! writers reject a record whose stored key disagrees with its derivation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::collection::COLLECTION_FIELD;
use crate::core::collection::Collection;

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Raw JSON document as exchanged with the store.
pub type Document = Map<String, Value>;

/// Schema encode/decode errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Document does not conform to the schema.
    #[error("record does not match schema: {0}")]
    Decode(String),
    /// Stored collection tag is missing or names another collection.
    #[error(
        "collection tag mismatch: expected {expected}, found {}",
        found.as_deref().unwrap_or("no tag")
    )]
    CollectionTag {
        /// Collection the document was decoded as.
        expected: Collection,
        /// Tag found on the document, if any.
        found: Option<String>,
    },
    /// Record could not be encoded as a JSON object.
    #[error("record encode failed: {0}")]
    Encode(String),
}

// ============================================================================
// SECTION: Record Envelope
// ============================================================================

/// Identity and lifecycle fields shared by every schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Identifier, unique within the collection.
    pub id: String,
    /// Partition key used for point reads, writes, and deletes.
    pub partition_key: String,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last full replacement time.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Soft-delete marker; `None` while the record is live.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

impl RecordMeta {
    /// Creates a live envelope with `created_at == updated_at == now`.
    #[must_use]
    pub fn new(id: impl Into<String>, partition_key: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true when the record is soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ============================================================================
// SECTION: Schema Trait
// ============================================================================

/// Contract implemented by every collection schema.
pub trait Schema:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Collection storing this schema.
    const COLLECTION: Collection;

    /// Returns the shared envelope.
    fn meta(&self) -> &RecordMeta;

    /// Returns the shared envelope for mutation.
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Derives the partition key from the record's own fields.
    fn derive_partition_key(&self) -> String;

    /// Returns the value matched by `find_by_id` for this collection.
    fn business_id(&self) -> &str;

    /// Applies write-time normalization.
    fn normalize(&mut self) {}

    /// Wraps the record in the closed union.
    fn into_record(self) -> Record;

    /// Extracts this schema from the closed union.
    fn from_record(record: Record) -> Option<Self>;

    /// Returns the record identifier.
    fn id(&self) -> &str {
        &self.meta().id
    }

    /// Returns the stored partition key.
    fn partition_key(&self) -> &str {
        &self.meta().partition_key
    }
}

/// Implements [`Schema`] for a record type with default normalization.
macro_rules! impl_schema {
    ($ty:ident, $variant:ident, partition: $($pk:ident).+, business: $($bid:ident).+) => {
        impl Schema for $ty {
            const COLLECTION: Collection = Collection::$variant;

            fn meta(&self) -> &RecordMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut RecordMeta {
                &mut self.meta
            }

            fn derive_partition_key(&self) -> String {
                self.$($pk).+.clone()
            }

            fn business_id(&self) -> &str {
                &self.$($bid).+
            }

            fn into_record(self) -> Record {
                Record::$variant(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

// ============================================================================
// SECTION: User
// ============================================================================

/// Application user.
///
/// # Invariants
/// - `email` is stored lowercase.
/// - Partition key is the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Display name.
    pub username: String,
    /// Login email, lowercase.
    pub email: String,
    /// Assigned AI model identifier.
    pub ai_model_id: String,
    /// Assigned AI model display name.
    pub ai_model_display_name: Option<String>,
    /// Target ids of the user's personal projects.
    pub personal_projects: Vec<String>,
}

impl User {
    /// Creates a live user record; the email is lowercased.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        email: &str,
        ai_model_id: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        let id = id.into();
        Self {
            meta: RecordMeta::new(id.clone(), id, now),
            username: username.into(),
            email: email.to_lowercase(),
            ai_model_id: ai_model_id.into(),
            ai_model_display_name: None,
            personal_projects: Vec::new(),
        }
    }
}

impl Schema for User {
    const COLLECTION: Collection = Collection::User;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn derive_partition_key(&self) -> String {
        self.meta.id.clone()
    }

    fn business_id(&self) -> &str {
        &self.meta.id
    }

    fn normalize(&mut self) {
        self.email = self.email.to_lowercase();
    }

    fn into_record(self) -> Record {
        Record::User(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::User(inner) => Some(inner),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Target-Scoped Schemas
// ============================================================================

/// Summarization target (uploaded recording or document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Business identifier of the target.
    pub target_id: String,
    /// Display title.
    pub title: String,
    /// Owning user id.
    pub owner_id: String,
    /// Whether the target is visible to other users.
    pub is_shared: bool,
    /// Users who marked the target as a favorite.
    pub favorite_user_ids: Vec<String>,
}

impl Target {
    /// Creates a live target record partitioned by `target_id`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        target_id: impl Into<String>,
        title: impl Into<String>,
        owner_id: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        let target_id = target_id.into();
        Self {
            meta: RecordMeta::new(id, target_id.clone(), now),
            target_id,
            title: title.into(),
            owner_id: owner_id.into(),
            is_shared: false,
            favorite_user_ids: Vec::new(),
        }
    }
}

impl_schema!(Target, Target, partition: target_id, business: target_id);

/// Generated summary for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Summarized target.
    pub target_id: String,
    /// Summary text.
    pub content: String,
    /// Model that produced the summary.
    pub ai_model_id: String,
}

impl_schema!(Summary, Summary, partition: target_id, business: target_id);

/// Speaker labels resolved for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerIdentification {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Target the labels belong to.
    pub target_id: String,
    /// Speaker label to display name.
    pub speakers: BTreeMap<String, String>,
}

impl_schema!(SpeakerIdentification, SpeakerIdentification, partition: target_id, business: target_id);

/// Generated white paper for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitePaper {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Source target.
    pub target_id: String,
    /// White paper body.
    pub content: String,
}

impl_schema!(WhitePaper, WhitePaper, partition: target_id, business: target_id);

/// Generated meeting minutes for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingMinutes {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Source target.
    pub target_id: String,
    /// Minutes body.
    pub content: String,
}

impl_schema!(MeetingMinutes, MeetingMinutes, partition: target_id, business: target_id);

/// Target shared with a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTarget {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Shared target.
    pub target_id: String,
    /// Receiving team.
    pub team_id: String,
}

impl_schema!(GroupTarget, GroupTarget, partition: target_id, business: target_id);

/// Comment left on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Commented target.
    pub target_id: String,
    /// Author user id.
    pub user_id: String,
    /// Comment text.
    pub body: String,
}

impl_schema!(Comment, Comment, partition: target_id, business: meta.id);

/// One turn of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker role (`user` or `assistant`).
    pub role: String,
    /// Turn content.
    pub content: String,
}

/// Chat transcript about a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Discussed target.
    pub target_id: String,
    /// Participating user id.
    pub user_id: String,
    /// Ordered transcript turns.
    pub turns: Vec<ChatTurn>,
}

impl_schema!(ChatHistory, ChatHistory, partition: target_id, business: meta.id);

/// Access level granted on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Read-only access.
    Read,
    /// Read and write access.
    Write,
}

/// Access grant for one user on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRight {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Protected target.
    pub target_id: String,
    /// Grantee user id.
    pub user_id: String,
    /// Granted level.
    pub permission: AccessLevel,
}

impl_schema!(AccessRight, AccessRight, partition: target_id, business: meta.id);

// ============================================================================
// SECTION: User-Scoped Schemas
// ============================================================================

/// Team of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Team name.
    pub name: String,
    /// Owning user id.
    pub owner_id: String,
    /// Member user ids.
    pub member_ids: Vec<String>,
}

impl_schema!(Team, Team, partition: meta.id, business: meta.id);

/// Token usage counters for one user and model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStat {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Counted user.
    pub user_id: String,
    /// Counted model.
    pub ai_model_id: String,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
}

impl_schema!(UsageStat, UsageStat, partition: user_id, business: meta.id);

/// Login counter for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStat {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Counted user.
    pub user_id: String,
    /// Number of recorded logins.
    pub login_count: u64,
    /// Most recent login.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

impl_schema!(LoginStat, LoginStat, partition: user_id, business: meta.id);

// ============================================================================
// SECTION: Catalog Schemas
// ============================================================================

/// Selectable AI model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModel {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Display name.
    pub display_name: String,
    /// Hosting provider label.
    pub provider: String,
    /// Whether new users are assigned this model.
    pub is_default: bool,
}

impl_schema!(AiModel, AiModel, partition: meta.id, business: meta.id);

/// Localized message catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Message code (for example `E01008`).
    pub code: String,
    /// Language tag.
    pub lang: String,
    /// Message text.
    pub text: String,
}

impl_schema!(Message, Message, partition: meta.id, business: meta.id);

/// Application log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Shared envelope.
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Severity label.
    pub level: String,
    /// Log message.
    pub message: String,
    /// Acting user, when known.
    pub user_id: Option<String>,
}

impl_schema!(Log, Log, partition: meta.id, business: meta.id);

// ============================================================================
// SECTION: Record Union
// ============================================================================

/// Closed union of every schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// User record.
    User(User),
    /// Team record.
    Team(Team),
    /// Target record.
    Target(Target),
    /// Summary record.
    Summary(Summary),
    /// Speaker identification record.
    SpeakerIdentification(SpeakerIdentification),
    /// White paper record.
    WhitePaper(WhitePaper),
    /// Meeting minutes record.
    MeetingMinutes(MeetingMinutes),
    /// Group target record.
    GroupTarget(GroupTarget),
    /// Comment record.
    Comment(Comment),
    /// Chat history record.
    ChatHistory(ChatHistory),
    /// Usage stat record.
    UsageStat(UsageStat),
    /// Login stat record.
    LoginStat(LoginStat),
    /// Access right record.
    AccessRight(AccessRight),
    /// AI model record.
    AiModel(AiModel),
    /// Message record.
    Message(Message),
    /// Log record.
    Log(Log),
}

/// Applies `$body` to the schema value inside a [`Record`].
macro_rules! with_schema {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            Record::User($inner) => $body,
            Record::Team($inner) => $body,
            Record::Target($inner) => $body,
            Record::Summary($inner) => $body,
            Record::SpeakerIdentification($inner) => $body,
            Record::WhitePaper($inner) => $body,
            Record::MeetingMinutes($inner) => $body,
            Record::GroupTarget($inner) => $body,
            Record::Comment($inner) => $body,
            Record::ChatHistory($inner) => $body,
            Record::UsageStat($inner) => $body,
            Record::LoginStat($inner) => $body,
            Record::AccessRight($inner) => $body,
            Record::AiModel($inner) => $body,
            Record::Message($inner) => $body,
            Record::Log($inner) => $body,
        }
    };
}

impl Record {
    /// Returns the collection storing this record.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        match self {
            Self::User(_) => Collection::User,
            Self::Team(_) => Collection::Team,
            Self::Target(_) => Collection::Target,
            Self::Summary(_) => Collection::Summary,
            Self::SpeakerIdentification(_) => Collection::SpeakerIdentification,
            Self::WhitePaper(_) => Collection::WhitePaper,
            Self::MeetingMinutes(_) => Collection::MeetingMinutes,
            Self::GroupTarget(_) => Collection::GroupTarget,
            Self::Comment(_) => Collection::Comment,
            Self::ChatHistory(_) => Collection::ChatHistory,
            Self::UsageStat(_) => Collection::UsageStat,
            Self::LoginStat(_) => Collection::LoginStat,
            Self::AccessRight(_) => Collection::AccessRight,
            Self::AiModel(_) => Collection::AiModel,
            Self::Message(_) => Collection::Message,
            Self::Log(_) => Collection::Log,
        }
    }

    /// Returns the shared envelope.
    #[must_use]
    pub fn meta(&self) -> &RecordMeta {
        with_schema!(self, inner => inner.meta())
    }

    /// Returns the shared envelope for mutation.
    pub fn meta_mut(&mut self) -> &mut RecordMeta {
        with_schema!(self, inner => inner.meta_mut())
    }

    /// Returns the record identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.meta().id
    }

    /// Returns the stored partition key.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.meta().partition_key
    }

    /// Derives the partition key from the record's fields.
    #[must_use]
    pub fn derive_partition_key(&self) -> String {
        with_schema!(self, inner => inner.derive_partition_key())
    }

    /// Returns the value matched by `find_by_id`.
    #[must_use]
    pub fn business_id(&self) -> &str {
        with_schema!(self, inner => inner.business_id())
    }

    /// Applies schema write-time normalization.
    pub fn normalize(&mut self) {
        with_schema!(self, inner => inner.normalize());
    }

    /// Encodes the record as a store document tagged with its collection.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Encode`] when serialization does not yield an object.
    pub fn to_document(&self) -> Result<Document, SchemaError> {
        let value = with_schema!(self, inner => serde_json::to_value(inner))
            .map_err(|err| SchemaError::Encode(err.to_string()))?;
        let Value::Object(mut document) = value else {
            return Err(SchemaError::Encode("record did not encode as an object".to_string()));
        };
        document
            .insert(COLLECTION_FIELD.to_string(), Value::String(self.collection().as_str().to_string()));
        Ok(document)
    }

    /// Extracts a concrete schema from the union.
    #[must_use]
    pub fn into_schema<T: Schema>(self) -> Option<T> {
        T::from_record(self)
    }
}
