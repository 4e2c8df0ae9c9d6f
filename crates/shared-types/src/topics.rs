//! # Topic Names
//!
//! Bus topic names are configuration, not constants, so that several
//! deployments can share one broker.

use crate::envelope::CommandKind;
use serde::{Deserialize, Serialize};

/// Default topic for create commands.
pub const DEFAULT_CREATE_TOPIC: &str = "createPatient";
/// Default topic for lookup commands.
pub const DEFAULT_GET_TOPIC: &str = "getPatientId";
/// Default topic for responses to both commands.
pub const DEFAULT_RESPONSE_TOPIC: &str = "patientInfo";

/// The three topics the relay uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Create commands.
    pub create_patient: String,
    /// Lookup commands.
    pub get_patient: String,
    /// Responses, keyed by correlation id.
    pub patient_info: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            create_patient: DEFAULT_CREATE_TOPIC.to_string(),
            get_patient: DEFAULT_GET_TOPIC.to_string(),
            patient_info: DEFAULT_RESPONSE_TOPIC.to_string(),
        }
    }
}

impl TopicConfig {
    /// Topic a command of this kind is published to.
    pub fn command_topic(&self, kind: CommandKind) -> &str {
        match kind {
            CommandKind::Create => &self.create_patient,
            CommandKind::Get => &self.get_patient,
        }
    }

    /// True when all three names are non-empty and pairwise distinct.
    pub fn is_valid(&self) -> bool {
        let names = [&self.create_patient, &self.get_patient, &self.patient_info];
        names.iter().all(|n| !n.is_empty())
            && self.create_patient != self.get_patient
            && self.create_patient != self.patient_info
            && self.get_patient != self.patient_info
    }
}
