//! Intake Graph

use super::assignment::Assignment;
use super::ids::LocalId;
use super::owner::Owner;
use super::property::Property;
use serde::{Deserialize, Serialize};

/// Everything the wizard collected, ready to be validated and submitted
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeGraph {
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl IntakeGraph {
    pub fn owner(&self, id: &LocalId) -> Option<&Owner> {
        self.owners.iter().find(|o| &o.local_id == id)
    }

    pub fn property(&self, id: &LocalId) -> Option<&Property> {
        self.properties.iter().find(|p| &p.local_id == id)
    }

    /// Assignments attached to a property, in graph order
    pub fn assignments_for<'a>(
        &'a self,
        property_id: &'a LocalId,
    ) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.assignments
            .iter()
            .filter(move |a| &a.property_id == property_id)
    }

    /// Whether any property asks for the document-retrieval service
    pub fn uses_document_retrieval(&self) -> bool {
        self.properties.iter().any(|p| p.use_document_retrieval)
    }
}

/// Contact details stored on the user profile
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}
