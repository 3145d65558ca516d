//! Statement model - a (subject, predicate, object) triple with vote counters.

use crate::error::{Error, Result};
use crate::models::{OperationKind, ResourceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned statement identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementId(pub u64);

/// Relation between a subject and an object.
///
/// Codes are part of the signed wire format and must never be renumbered.
/// 1-15 follow the Dublin Core element set; 101+ are tagging relations.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum Predicate {
    HasContributor = 1,
    HasCoverage = 2,
    HasCreator = 3,
    HasDate = 4,
    HasDescription = 5,
    HasFormat = 6,
    HasIdentifier = 7,
    HasLanguage = 8,
    HasPublisher = 9,
    HasRelation = 10,
    HasRights = 11,
    HasSource = 12,
    HasSubject = 13,
    HasTitle = 14,
    HasType = 15,

    #[default]
    HasTag = 101,
    HasTorrent = 102,
}

impl Predicate {
    /// Every known predicate, in code order.
    pub const ALL: [Predicate; 17] = [
        Predicate::HasContributor,
        Predicate::HasCoverage,
        Predicate::HasCreator,
        Predicate::HasDate,
        Predicate::HasDescription,
        Predicate::HasFormat,
        Predicate::HasIdentifier,
        Predicate::HasLanguage,
        Predicate::HasPublisher,
        Predicate::HasRelation,
        Predicate::HasRights,
        Predicate::HasSource,
        Predicate::HasSubject,
        Predicate::HasTitle,
        Predicate::HasType,
        Predicate::HasTag,
        Predicate::HasTorrent,
    ];

    /// Stable wire code.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Snake-case name, as accepted by [`FromStr`].
    pub const fn name(self) -> &'static str {
        match self {
            Predicate::HasContributor => "has_contributor",
            Predicate::HasCoverage => "has_coverage",
            Predicate::HasCreator => "has_creator",
            Predicate::HasDate => "has_date",
            Predicate::HasDescription => "has_description",
            Predicate::HasFormat => "has_format",
            Predicate::HasIdentifier => "has_identifier",
            Predicate::HasLanguage => "has_language",
            Predicate::HasPublisher => "has_publisher",
            Predicate::HasRelation => "has_relation",
            Predicate::HasRights => "has_rights",
            Predicate::HasSource => "has_source",
            Predicate::HasSubject => "has_subject",
            Predicate::HasTitle => "has_title",
            Predicate::HasType => "has_type",
            Predicate::HasTag => "has_tag",
            Predicate::HasTorrent => "has_torrent",
        }
    }
}

impl From<Predicate> for u16 {
    fn from(p: Predicate) -> Self {
        p.code()
    }
}

impl TryFrom<u16> for Predicate {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        Predicate::ALL
            .into_iter()
            .find(|p| p.code() == code)
            .ok_or(Error::UnknownCode {
                kind: "predicate",
                code,
            })
    }
}

impl FromStr for Predicate {
    type Err = Error;

    /// Accepts the snake-case name or the numeric code.
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<u16>() {
            return Predicate::try_from(code);
        }
        Predicate::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown predicate: {}", s)))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Natural key of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: ResourceId,
    pub predicate: Predicate,
    pub object: ResourceId,
}

impl Triple {
    pub fn new(subject: ResourceId, predicate: Predicate, object: ResourceId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// One row per distinct triple, aggregating every peer's vote on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Store-assigned identifier
    pub id: StatementId,

    /// Subject, predicate and object (unique)
    pub triple: Triple,

    /// Sum of weights of live ADD entries
    pub added_count: u64,

    /// Sum of weights of live REMOVE entries
    pub removed_count: u64,

    /// What the local user last asserted, overriding the aggregate score
    pub local_operation: Option<OperationKind>,
}

impl Statement {
    /// Create a statement with zeroed counters.
    pub fn new(id: StatementId, triple: Triple) -> Self {
        Self {
            id,
            triple,
            added_count: 0,
            removed_count: 0,
            local_operation: None,
        }
    }

    /// `added_count - removed_count`, clamped to the `i64` range.
    pub fn score(&self) -> i64 {
        let score = i128::from(self.added_count) - i128::from(self.removed_count);
        i64::try_from(score).unwrap_or(if score > 0 { i64::MAX } else { i64::MIN })
    }

    /// Add `weight` to the counter matching `kind`.
    pub(crate) fn increment(&mut self, kind: OperationKind, weight: u32) {
        let counter = self.counter_mut(kind);
        *counter = counter.saturating_add(u64::from(weight));
    }

    /// Take back a contribution previously added with [`Statement::increment`].
    pub(crate) fn decrement(&mut self, kind: OperationKind, weight: u32) -> Result<()> {
        let id = self.id;
        let counter = self.counter_mut(kind);
        *counter = counter.checked_sub(u64::from(weight)).ok_or_else(|| {
            Error::Corrupt(format!(
                "statement {} {:?} counter below its live contributions",
                id.0, kind
            ))
        })?;
        Ok(())
    }

    fn counter_mut(&mut self, kind: OperationKind) -> &mut u64 {
        match kind {
            OperationKind::Add => &mut self.added_count,
            OperationKind::Remove => &mut self.removed_count,
        }
    }
}
