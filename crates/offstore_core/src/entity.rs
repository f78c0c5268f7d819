//! Entity trait and system metadata.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix used for client-generated temporary entity IDs.
///
/// A temporary ID is assigned when an entity is created without an ID and
/// the network cannot issue one (offline creation). It is replaced by the
/// server-issued ID when the pending create is eventually pushed.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Generates a fresh client-side temporary entity ID.
#[must_use]
pub fn temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

/// Returns true if the ID was generated client-side and has not yet been
/// reconciled with a server-issued ID.
#[must_use]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Access-control descriptor attached to an entity by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    /// Identity of the user that created the entity.
    pub creator: Option<String>,
    /// Whether any authenticated user may read the entity.
    pub globally_readable: bool,
    /// Whether any authenticated user may write the entity.
    pub globally_writable: bool,
    /// Users explicitly granted read access.
    pub readers: Vec<String>,
    /// Users explicitly granted write access.
    pub writers: Vec<String>,
}

impl Acl {
    /// Creates an ACL owned by the given creator.
    pub fn for_creator(creator: impl Into<String>) -> Self {
        Self {
            creator: Some(creator.into()),
            ..Self::default()
        }
    }
}

/// System metadata attached to an entity by the backend.
///
/// Populated only by a successful network round-trip. Cache-only entities
/// (queued, unpushed) carry no metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kmd {
    /// Entity creation time, as recorded by the backend.
    pub ect: DateTime<Utc>,
    /// Last modification time, as recorded by the backend.
    pub lmt: DateTime<Utc>,
    /// Optional expiry time after which the entity may be evicted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Kmd {
    /// Creates metadata for an entity created at the given instant.
    #[must_use]
    pub fn created_at(at: DateTime<Utc>) -> Self {
        Self {
            ect: at,
            lmt: at,
            expires_at: None,
        }
    }

    /// Returns metadata with the modification time advanced.
    #[must_use]
    pub fn touched(mut self, at: DateTime<Utc>) -> Self {
        self.lmt = at;
        self
    }
}

/// A user-defined record that can be stored, cached and synchronized.
///
/// Implementors own an ID slot (empty string when not yet assigned) and
/// two optional system-metadata slots that only the backend populates.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct ToDo {
///     #[serde(rename = "_id")]
///     id: String,
///     name: String,
///     acl: Option<Acl>,
///     kmd: Option<Kmd>,
/// }
///
/// impl Entity for ToDo {
///     fn id(&self) -> &str { &self.id }
///     fn set_id(&mut self, id: String) { self.id = id; }
///     fn acl(&self) -> Option<&Acl> { self.acl.as_ref() }
///     fn set_acl(&mut self, acl: Option<Acl>) { self.acl = acl; }
///     fn kmd(&self) -> Option<&Kmd> { self.kmd.as_ref() }
///     fn set_kmd(&mut self, kmd: Option<Kmd>) { self.kmd = kmd; }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Returns the entity ID, or an empty string if none is assigned.
    fn id(&self) -> &str;

    /// Assigns the entity ID.
    fn set_id(&mut self, id: String);

    /// Returns the access-control descriptor, if populated by the backend.
    fn acl(&self) -> Option<&Acl>;

    /// Sets the access-control descriptor.
    fn set_acl(&mut self, acl: Option<Acl>);

    /// Returns the backend metadata, if populated.
    fn kmd(&self) -> Option<&Kmd>;

    /// Sets the backend metadata.
    fn set_kmd(&mut self, kmd: Option<Kmd>);

    /// Returns true if the entity has never completed a network round-trip.
    ///
    /// Holds for entities with a temporary ID and for entities saved only
    /// through the cache path (no metadata assigned yet).
    fn is_local_only(&self) -> bool {
        is_temp_id(self.id()) || self.kmd().is_none()
    }
}
