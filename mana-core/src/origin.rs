//! Origins - the evidence channels attached to an entity
//!
//! Three kinds share a common base:
//! - Twitter accounts (matched on screen name and declared profile URL)
//! - Web sites (matched on expanded and base URLs)
//! - RSS feeds (never matched; may be derived from a tracked Web origin)

use serde::{Deserialize, Serialize};

use crate::{EntityId, OriginId};

/// Discriminant of an origin, used for dispatch and storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    Twitter,
    Web,
    Rss,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginType::Twitter => "twitter",
            OriginType::Web => "web",
            OriginType::Rss => "rss",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "twitter" => Some(OriginType::Twitter),
            "web" => Some(OriginType::Web),
            "rss" => Some(OriginType::Rss),
            _ => None,
        }
    }
}

/// Fields shared by every origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginBase {
    pub id: OriginId,
    /// Owning entity
    #[serde(default)]
    pub entity_id: EntityId,
    /// Times this evidence was independently observed
    #[serde(default)]
    pub occurrences: u32,
    /// Ingestion sync cursor
    #[serde(default)]
    pub last_synced_id: Option<i64>,
}

/// Profile declared by a Twitter account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterProfile {
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterOrigin {
    pub screen_name: String,
    #[serde(default)]
    pub profile: Option<TwitterProfile>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebOrigin {
    pub raw_url: String,
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssOrigin {
    /// Feed URL
    pub rss: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Web origin this feed was discovered from, if any
    #[serde(default)]
    pub origin_web: Option<OriginId>,
}

/// Type-specific payload of an origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OriginKind {
    Twitter(TwitterOrigin),
    Web(WebOrigin),
    Rss(RssOrigin),
}

/// A single piece of evidence owned by exactly one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(flatten)]
    pub base: OriginBase,
    #[serde(flatten)]
    pub kind: OriginKind,
}

impl Origin {
    fn with_kind(id: OriginId, entity_id: EntityId, kind: OriginKind) -> Self {
        Self {
            base: OriginBase {
                id,
                entity_id,
                occurrences: 0,
                last_synced_id: None,
            },
            kind,
        }
    }

    pub fn twitter(id: OriginId, entity_id: EntityId, screen_name: &str) -> Self {
        Self::with_kind(
            id,
            entity_id,
            OriginKind::Twitter(TwitterOrigin {
                screen_name: screen_name.to_string(),
                profile: None,
                location: None,
            }),
        )
    }

    /// Web origin whose raw, expanded and base URLs all start out identical
    pub fn web(id: OriginId, entity_id: EntityId, url: &str) -> Self {
        Self::with_kind(
            id,
            entity_id,
            OriginKind::Web(WebOrigin {
                raw_url: url.to_string(),
                expanded_url: Some(url.to_string()),
                base_url: Some(url.to_string()),
            }),
        )
    }

    pub fn rss(id: OriginId, entity_id: EntityId, feed: &str, origin_web: Option<OriginId>) -> Self {
        Self::with_kind(
            id,
            entity_id,
            OriginKind::Rss(RssOrigin {
                rss: feed.to_string(),
                base_url: None,
                origin_web,
            }),
        )
    }

    pub fn with_occurrences(mut self, occurrences: u32) -> Self {
        self.base.occurrences = occurrences;
        self
    }

    /// Set the declared profile URL (Twitter origins only)
    pub fn with_profile_url(mut self, url: &str) -> Self {
        if let OriginKind::Twitter(twitter) = &mut self.kind {
            twitter.profile.get_or_insert_with(TwitterProfile::default).url = Some(url.to_string());
        }
        self
    }

    /// Set the base URL (Web and RSS origins only)
    pub fn with_base_url(mut self, url: &str) -> Self {
        match &mut self.kind {
            OriginKind::Web(web) => web.base_url = Some(url.to_string()),
            OriginKind::Rss(rss) => rss.base_url = Some(url.to_string()),
            OriginKind::Twitter(_) => {}
        }
        self
    }

    pub fn id(&self) -> OriginId {
        self.base.id
    }

    pub fn origin_type(&self) -> OriginType {
        match self.kind {
            OriginKind::Twitter(_) => OriginType::Twitter,
            OriginKind::Web(_) => OriginType::Web,
            OriginKind::Rss(_) => OriginType::Rss,
        }
    }

    /// RSS feed discovered from a tracked Web origin
    pub fn is_derived(&self) -> bool {
        matches!(&self.kind, OriginKind::Rss(rss) if rss.origin_web.is_some())
    }
}

impl TwitterOrigin {
    pub fn profile_url(&self) -> Option<&str> {
        self.profile.as_ref().and_then(|p| p.url.as_deref())
    }
}
