//! Shared domain enumerations and query vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

pub use pressroom_api_types::PostStatus;

/// Kinds of entity that carry an analytics aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    Category,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Post, EntityKind::Category];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Post => "post",
            EntityKind::Category => "category",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    RecordView,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RecordView => "record_view",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "record_view" => Ok(JobType::RecordView),
            _ => Err(()),
        }
    }
}

/// Primary sort applied to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Newest,
    RecentlyUpdated,
    MostViewed,
}

impl FromStr for SortKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" | "created_at" => Ok(SortKey::Newest),
            "recently_updated" | "updated" | "updated_at" => Ok(SortKey::RecentlyUpdated),
            "most_viewed" => Ok(SortKey::MostViewed),
            other => Err(DomainError::validation(
                "sorting",
                format!("unsupported sort key `{other}`"),
            )),
        }
    }
}

/// Alphabetical ordering by title (posts) or name (categories).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameOrdering {
    Az,
    Za,
}

impl FromStr for NameOrdering {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "az" => Ok(NameOrdering::Az),
            "za" => Ok(NameOrdering::Za),
            other => Err(DomainError::validation(
                "ordering",
                format!("unsupported ordering `{other}`"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_accepts_column_aliases() {
        assert_eq!("created_at".parse::<SortKey>().unwrap(), SortKey::Newest);
        assert_eq!(
            "updated_at".parse::<SortKey>().unwrap(),
            SortKey::RecentlyUpdated
        );
        assert_eq!(
            " Most_Viewed ".parse::<SortKey>().unwrap(),
            SortKey::MostViewed
        );
    }

    #[test]
    fn unknown_sort_key_is_a_validation_error() {
        let err = "popular".parse::<SortKey>().unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "sorting",
                ..
            }
        ));
    }

    #[test]
    fn ordering_parses_both_directions() {
        assert_eq!("az".parse::<NameOrdering>().unwrap(), NameOrdering::Az);
        assert_eq!("ZA".parse::<NameOrdering>().unwrap(), NameOrdering::Za);
        assert!("up".parse::<NameOrdering>().is_err());
    }

    #[test]
    fn job_type_round_trips_through_queue_name() {
        let name = JobType::RecordView.as_str();
        assert_eq!(JobType::try_from(name), Ok(JobType::RecordView));
    }
}
