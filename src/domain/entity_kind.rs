//! Entity kinds synced from IncidentIQ
//!
//! Every synced resource type is identified by an [`EntityKind`]. The kind decides
//! which endpoint is paged, which field list maps its items, where its rows land
//! and whether a tenant-defined custom field catalog exists for it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resource types the sync engine knows how to pull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Asset,
    User,
    Location,
    Ticket,
    Room,
    Team,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown entity kind '{0}' (expected one of: asset, user, location, ticket, room, team)")]
pub struct UnknownEntityKind(pub String);

impl EntityKind {
    /// All kinds in the order a full run syncs them
    pub const ALL: [Self; 6] = [
        Self::Location,
        Self::Room,
        Self::Team,
        Self::User,
        Self::Asset,
        Self::Ticket,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::User => "user",
            Self::Location => "location",
            Self::Ticket => "ticket",
            Self::Room => "room",
            Self::Team => "team",
        }
    }

    /// Primary key column, named exactly like the identifier field in the API payload
    pub const fn primary_key(self) -> &'static str {
        match self {
            Self::Asset => "AssetId",
            Self::User => "UserId",
            Self::Location => "LocationId",
            Self::Ticket => "TicketId",
            Self::Room => "LocationRoomId",
            Self::Team => "TeamId",
        }
    }

    pub const fn default_table_name(self) -> &'static str {
        match self {
            Self::Asset => "Assets",
            Self::User => "Users",
            Self::Location => "Locations",
            Self::Ticket => "Tickets",
            Self::Room => "Rooms",
            Self::Team => "Teams",
        }
    }

    pub const fn default_custom_table_name(self) -> Option<&'static str> {
        match self {
            Self::Asset => Some("AssetCustomFields"),
            Self::User => Some("UserCustomFields"),
            Self::Ticket => Some("TicketCustomFields"),
            Self::Location | Self::Room | Self::Team => None,
        }
    }

    /// Strategy token sent to the custom field catalog endpoint
    pub const fn custom_field_strategy(self) -> Option<&'static str> {
        match self {
            Self::Asset => Some("AggregateAsset"),
            Self::User => Some("AggregateUser"),
            Self::Ticket => Some("AggregateTicket"),
            Self::Location | Self::Room | Self::Team => None,
        }
    }

    pub const fn carries_custom_fields(self) -> bool {
        self.custom_field_strategy().is_some()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let singular = normalized.strip_suffix('s').unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == singular)
            .ok_or_else(|| UnknownEntityKind(s.to_string()))
    }
}
