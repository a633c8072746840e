//! Endpoints of the Mirth Migrator web service
//!
//! Every call is a POST with a JSON body, answered with a JSON body.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GetEnvironments,
    GetSystems,
    GetVersion,
    GetComponentMetaData,
    GetComponentDetails,
    GetReferencedCodeTemplates,
    GetConflictingComponents,
    GetConflicts,
    MigrateComponents,
    CompareComponent,
    GetConfiguration,
    SetConfiguration,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::GetEnvironments => "/getEnvironments",
            Self::GetSystems => "/getSystems",
            Self::GetVersion => "/getVersion",
            Self::GetComponentMetaData => "/getComponentMetaData",
            Self::GetComponentDetails => "/getComponentDetails",
            Self::GetReferencedCodeTemplates => "/getReferencedCodeTemplates",
            Self::GetConflictingComponents => "/getConflictingComponents",
            Self::GetConflicts => "/getConflicts",
            Self::MigrateComponents => "/migrateComponents",
            Self::CompareComponent => "/compareComponent",
            Self::GetConfiguration => "/getConfiguration",
            Self::SetConfiguration => "/setConfiguration",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
