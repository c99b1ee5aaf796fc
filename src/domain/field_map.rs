//! Static field lists and the record mapper
//!
//! Columns are named exactly like the top-level keys of the API payload, so most
//! fields are read directly. A handful of display names live one object deeper
//! (`Model.Name`, `WorkflowStep.StepName`, ...) and are listed as nested fields.

use serde_json::Value;

use super::entity_kind::EntityKind;
use super::record::{ColumnType, ColumnValue, MappingError, Record, RecordTarget, ValueSanitizer};
use super::value_path::lookup;

/// Where a column's value is read from within one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Top-level key with the same name as the column
    Direct,
    /// Explicit path through nested objects
    Nested(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub source: FieldSource,
    pub column_type: ColumnType,
}

impl FieldSpec {
    const fn direct(column: &'static str, column_type: ColumnType) -> Self {
        Self {
            column,
            source: FieldSource::Direct,
            column_type,
        }
    }

    const fn nested(column: &'static str, path: &'static [&'static str], column_type: ColumnType) -> Self {
        Self {
            column,
            source: FieldSource::Nested(path),
            column_type,
        }
    }

    pub fn read<'a>(&self, item: &'a Value) -> Option<&'a Value> {
        match self.source {
            FieldSource::Direct => lookup(item, &[self.column]),
            FieldSource::Nested(path) => lookup(item, path),
        }
    }
}

use ColumnType::{Boolean, Integer, Real, Text};

// Identifiers and dates are stored as text: the API returns GUID and ISO-8601 strings
// and keeping them verbatim works for every supported destination dialect.
const ASSET_FIELDS: &[FieldSpec] = &[
    FieldSpec::direct("AssetId", Text),
    FieldSpec::direct("SiteId", Text),
    FieldSpec::direct("ProductId", Text),
    FieldSpec::direct("CreatedDate", Text),
    FieldSpec::direct("ModifiedDate", Text),
    FieldSpec::direct("AssetTypeId", Text),
    FieldSpec::direct("AssetTypeName", Text),
    FieldSpec::direct("IsDeleted", Boolean),
    FieldSpec::direct("IsTraining", Boolean),
    FieldSpec::direct("StatusTypeId", Text),
    FieldSpec::direct("AssetTag", Text),
    FieldSpec::direct("SerialNumber", Text),
    FieldSpec::direct("ExternalId", Text),
    FieldSpec::direct("Name", Text),
    FieldSpec::direct("CanOwnerManage", Boolean),
    FieldSpec::direct("CanSubmitTicket", Boolean),
    FieldSpec::direct("IsFavorite", Boolean),
    FieldSpec::direct("ModelId", Text),
    FieldSpec::nested("ModelName", &["Model", "Name"], Text),
    FieldSpec::direct("LocationId", Text),
    FieldSpec::nested("LocationName", &["Location", "Name"], Text),
    FieldSpec::direct("LocationDetails", Text),
    FieldSpec::direct("LocationRoomId", Text),
    FieldSpec::nested("LocationRoomName", &["LocationRoom", "Name"], Text),
    FieldSpec::direct("Notes", Text),
    FieldSpec::direct("HasOpenTicket", Boolean),
    FieldSpec::direct("OpenTicket", Integer),
    FieldSpec::direct("PurchasedDate", Text),
    FieldSpec::direct("DeployedDate", Text),
    FieldSpec::direct("RetiredDate", Text),
    FieldSpec::direct("PurchasePrice", Real),
    FieldSpec::direct("PurchasePoNumber", Text),
    FieldSpec::direct("WarrantyExpirationDate", Text),
    FieldSpec::direct("WarrantyInfo", Text),
    FieldSpec::direct("LastInventoryDate", Text),
    FieldSpec::direct("InvoiceNumber", Text),
    FieldSpec::direct("Vendor", Text),
    FieldSpec::direct("InsuranceExpirationDate", Text),
    FieldSpec::direct("InsuranceInfo", Text),
    FieldSpec::direct("FundingSourceId", Text),
    FieldSpec::direct("IsReadOnly", Boolean),
    FieldSpec::direct("StorageUnitNumber", Text),
    FieldSpec::direct("StorageSlotNumber", Integer),
    FieldSpec::direct("StorageLocationId", Text),
    FieldSpec::direct("StorageLocationName", Text),
];

const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::direct("UserId", Text),
    FieldSpec::direct("IsDeleted", Boolean),
    FieldSpec::direct("SiteId", Text),
    FieldSpec::direct("CreatedDate", Text),
    FieldSpec::direct("ModifiedDate", Text),
    FieldSpec::direct("LocationId", Text),
    FieldSpec::direct("LocationName", Text),
    FieldSpec::direct("IsActive", Boolean),
    FieldSpec::direct("IsOnline", Boolean),
    FieldSpec::direct("IsOnlineLastUpdated", Text),
    FieldSpec::direct("FirstName", Text),
    FieldSpec::direct("LastName", Text),
    FieldSpec::direct("Email", Text),
    FieldSpec::direct("Username", Text),
    FieldSpec::direct("Phone", Text),
    FieldSpec::direct("SchoolIdNumber", Text),
    FieldSpec::direct("Grade", Text),
    FieldSpec::direct("Homeroom", Text),
    FieldSpec::direct("ExternalId", Text),
    FieldSpec::direct("InternalComments", Text),
    FieldSpec::direct("RoleId", Text),
    FieldSpec::direct("AuthenticatedBy", Text),
    FieldSpec::direct("AccountSetupProgress", Integer),
    FieldSpec::direct("TrainingPercentComplete", Integer),
    FieldSpec::direct("IsEmailVerified", Boolean),
    FieldSpec::direct("IsWelcomeEmailSent", Boolean),
    FieldSpec::direct("PreventProviderUpdates", Boolean),
    FieldSpec::direct("IsOutOfOffice", Boolean),
    FieldSpec::direct("Portal", Integer),
];

const LOCATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::direct("LocationId", Text),
    FieldSpec::direct("SiteId", Text),
    FieldSpec::direct("Name", Text),
    FieldSpec::direct("Abbreviation", Text),
    FieldSpec::direct("CreatedDate", Text),
    FieldSpec::direct("ModifiedDate", Text),
    FieldSpec::direct("AddressId", Text),
    FieldSpec::nested("Street1", &["Address", "Street1"], Text),
    FieldSpec::nested("Street2", &["Address", "Street2"], Text),
    FieldSpec::nested("City", &["Address", "City"], Text),
    FieldSpec::nested("Zip", &["Address", "Zip"], Text),
    FieldSpec::nested("Country", &["Address", "Country"], Text),
    FieldSpec::nested("Latitude", &["Address", "Latitude"], Real),
    FieldSpec::nested("Longitude", &["Address", "Longitude"], Real),
    FieldSpec::direct("LocationTypeId", Text),
    FieldSpec::nested("LocationType", &["LocationType", "Name"], Text),
];

const TICKET_FIELDS: &[FieldSpec] = &[
    FieldSpec::direct("TicketId", Text),
    FieldSpec::direct("SiteId", Text),
    FieldSpec::direct("IsDeleted", Boolean),
    FieldSpec::direct("TicketNumber", Text),
    FieldSpec::direct("Subject", Text),
    FieldSpec::direct("CreatedDate", Text),
    FieldSpec::direct("ModifiedDate", Text),
    FieldSpec::direct("StartedDate", Text),
    FieldSpec::direct("ClosedDate", Text),
    FieldSpec::direct("IsPastDue", Boolean),
    FieldSpec::direct("OwnerId", Text),
    FieldSpec::nested("OwnerName", &["Owner", "Name"], Text),
    FieldSpec::direct("ForId", Text),
    FieldSpec::nested("ForName", &["For", "Name"], Text),
    FieldSpec::direct("Username", Text),
    FieldSpec::direct("LocationId", Text),
    FieldSpec::nested("LocationName", &["Location", "Name"], Text),
    FieldSpec::direct("IssueId", Text),
    FieldSpec::nested("IssueName", &["Issue", "Name"], Text),
    FieldSpec::direct("IsIssueConfirmed", Boolean),
    FieldSpec::nested("TeamId", &["AssignedToTeam", "TeamId"], Text),
    FieldSpec::nested("TeamName", &["AssignedToTeam", "TeamName"], Text),
    FieldSpec::direct("AssignedToUserId", Text),
    FieldSpec::nested("AssignedToUserName", &["AssignedToUser", "Name"], Text),
    FieldSpec::direct("IsClosed", Boolean),
    FieldSpec::direct("WorkflowStepId", Text),
    FieldSpec::direct("Priority", Text),
    FieldSpec::direct("IssueDescription", Text),
    FieldSpec::nested("Status", &["WorkflowStep", "StepName"], Text),
];

const ROOM_FIELDS: &[FieldSpec] = &[
    FieldSpec::direct("LocationRoomId", Text),
    FieldSpec::direct("SiteId", Text),
    FieldSpec::direct("Name", Text),
    FieldSpec::direct("LocationId", Text),
    FieldSpec::direct("LocationName", Text),
    FieldSpec::direct("LocationAbbreviation", Text),
    FieldSpec::direct("LocationRoomTypeId", Text),
    FieldSpec::direct("LocationRoomTypeName", Text),
    FieldSpec::direct("Description", Text),
    FieldSpec::direct("IsAvailable", Boolean),
    FieldSpec::direct("IsExternallyAvailable", Boolean),
    FieldSpec::direct("IsDeleted", Boolean),
];

const TEAM_FIELDS: &[FieldSpec] = &[
    FieldSpec::direct("TeamId", Text),
    FieldSpec::direct("SiteId", Text),
    FieldSpec::direct("TeamName", Text),
    FieldSpec::direct("MembersCount", Integer),
];

/// Fixed column list of `kind`'s entity table, primary key first
pub const fn fields_for(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Asset => ASSET_FIELDS,
        EntityKind::User => USER_FIELDS,
        EntityKind::Location => LOCATION_FIELDS,
        EntityKind::Ticket => TICKET_FIELDS,
        EntityKind::Room => ROOM_FIELDS,
        EntityKind::Team => TEAM_FIELDS,
    }
}

/// Maps raw items of one entity kind onto its fixed entity table
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper {
    kind: EntityKind,
    fields: &'static [FieldSpec],
    sanitizer: ValueSanitizer,
}

impl RecordMapper {
    pub const fn new(kind: EntityKind, sanitizer: ValueSanitizer) -> Self {
        Self {
            kind,
            fields: fields_for(kind),
            sanitizer,
        }
    }

    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn map(&self, item: &Value) -> Result<Record, MappingError> {
        if !item.is_object() {
            return Err(MappingError::NotAnObject);
        }

        let primary_key = self.kind.primary_key();
        let mut record = Record::with_capacity(RecordTarget::Entity(self.kind), self.fields.len());

        for field in self.fields {
            let value = ColumnValue::from_json(field.read(item), field.column_type).map_err(|source| {
                MappingError::Conversion {
                    column: field.column.to_string(),
                    source,
                }
            })?;
            let value = self.sanitizer.sanitize(value);

            if field.column == primary_key && value.is_null() {
                return Err(MappingError::MissingPrimaryKey { column: primary_key });
            }
            record.push(field.column, value);
        }

        Ok(record)
    }
}
