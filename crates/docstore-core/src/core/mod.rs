// crates/docstore-core/src/core/mod.rs
// ============================================================================
// Module: Docstore Core Types
// Description: Collection registry, record schemas, query model, and clock.
// Purpose: Provide stable, serializable types shared by every backend.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Core types define the closed collection registry, the typed record schemas
//! stored in the shared container, and the parameterized query dialect. These
//! types are the canonical source of truth for both storage backends and the
//! CLI surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod collection;
pub mod query;
pub mod records;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::Clock;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use collection::COLLECTION_FIELD;
pub use collection::COLLECTION_PARAM;
pub use collection::Collection;
pub use collection::SchemaDescriptor;
pub use collection::UnknownCollection;
pub use collection::resolve;
pub use query::CompareOp;
pub use query::Condition;
pub use query::FieldPath;
pub use query::OrderBy;
pub use query::ParamValue;
pub use query::ParsedQuery;
pub use query::QueryBuilder;
pub use query::QueryError;
pub use query::QueryParameters;
pub use query::SortDirection;
pub use records::AccessLevel;
pub use records::AccessRight;
pub use records::AiModel;
pub use records::ChatHistory;
pub use records::ChatTurn;
pub use records::Comment;
pub use records::Document;
pub use records::GroupTarget;
pub use records::Log;
pub use records::LoginStat;
pub use records::MeetingMinutes;
pub use records::Message;
pub use records::Record;
pub use records::RecordMeta;
pub use records::Schema;
pub use records::SchemaError;
pub use records::SpeakerIdentification;
pub use records::Summary;
pub use records::Target;
pub use records::Team;
pub use records::UsageStat;
pub use records::User;
pub use records::WhitePaper;
