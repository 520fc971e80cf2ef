//! Intake tool manifest

use call_intake_core::TransferTarget;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tools offered to the model on every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeTool {
    TransferToMainLine,
    TransferToAttorney,
    SaveIntakeData,
}

impl IntakeTool {
    pub const ALL: [IntakeTool; 3] = [
        IntakeTool::TransferToMainLine,
        IntakeTool::TransferToAttorney,
        IntakeTool::SaveIntakeData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IntakeTool::TransferToMainLine => "transferToMainLine",
            IntakeTool::TransferToAttorney => "transferToAttorney",
            IntakeTool::SaveIntakeData => "saveIntakeData",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Line spoken to the caller when the tool is invoked
    pub fn say(&self) -> &'static str {
        match self {
            IntakeTool::TransferToMainLine => "Let me transfer you to our main line.",
            IntakeTool::TransferToAttorney => {
                "Ok, I think we can help you. Please hold for a moment while I transfer you \
                 to the attorney who will help you from here forward."
            }
            IntakeTool::SaveIntakeData => "I'm saving your information to our system.",
        }
    }

    /// Human line this tool hands the call to, if any
    pub fn transfer_target(&self) -> Option<TransferTarget> {
        match self {
            IntakeTool::TransferToMainLine => Some(TransferTarget::MainLine),
            IntakeTool::TransferToAttorney => Some(TransferTarget::Attorney),
            IntakeTool::SaveIntakeData => None,
        }
    }

    /// Function definition in the chat-completions `tools` format
    pub fn definition(&self) -> Value {
        let (description, parameters) = match self {
            IntakeTool::TransferToMainLine => (
                "Transfer the caller to the main office line when they are not calling about a new case.",
                json!({
                    "type": "object",
                    "properties": {
                        "callSid": {"type": "string", "description": "The unique identifier for the active phone call."}
                    },
                    "required": ["callSid"]
                }),
            ),
            IntakeTool::TransferToAttorney => (
                "Transfer the caller to an attorney after completing the preliminary intake process.",
                json!({
                    "type": "object",
                    "properties": {
                        "callSid": {"type": "string", "description": "The unique identifier for the active phone call."},
                        "intakeData": {"type": "object", "description": "The collected intake information."}
                    },
                    "required": ["callSid", "intakeData"]
                }),
            ),
            IntakeTool::SaveIntakeData => (
                "Save the collected intake information to the law firm's database.",
                intake_schema(),
            ),
        };

        json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": description,
                "parameters": parameters,
            }
        })
    }

    pub fn manifest() -> Vec<Value> {
        Self::ALL.iter().map(IntakeTool::definition).collect()
    }
}

const INTAKE_FIELDS: [(&str, &str); 10] = [
    ("name", "The caller's full name"),
    ("phoneNumber", "The caller's phone number"),
    ("emailAddress", "The caller's email address"),
    ("accidentDate", "The date of the accident"),
    ("injuryDescription", "Description of injuries and accident details"),
    ("medicalTreatment", "Information about hospital visits and medical treatment"),
    ("atFaultParty", "Information about who was at fault"),
    ("policeReport", "Information about police report and whether caller has a copy"),
    ("otherPartyInsurance", "Information about the other party's insurance"),
    ("signedDocuments", "Any documents signed with insurance companies or other lawyers"),
];

fn intake_schema() -> Value {
    let properties: serde_json::Map<String, Value> = INTAKE_FIELDS
        .iter()
        .map(|(field, description)| {
            (
                field.to_string(),
                json!({"type": "string", "description": description}),
            )
        })
        .collect();
    let required: Vec<&str> = INTAKE_FIELDS.iter().map(|(field, _)| *field).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Intake answers collected by the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntakeRecord {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email_address: Option<String>,
    pub accident_date: Option<String>,
    pub injury_description: Option<String>,
    pub medical_treatment: Option<String>,
    pub at_fault_party: Option<String>,
    pub police_report: Option<String>,
    pub other_party_insurance: Option<String>,
    pub signed_documents: Option<String>,
}

impl IntakeRecord {
    /// Parse tool arguments. Malformed arguments yield an empty record.
    pub fn from_arguments(arguments: &str) -> Self {
        serde_json::from_str(arguments).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Malformed intake arguments");
            Self::default()
        })
    }

    /// Record the intake and return the tool result for the model
    pub fn save(&self, call_sid: &str) -> Value {
        let case_number = case_number();
        tracing::info!(
            call_sid = %call_sid,
            case_number = %case_number,
            caller = self.name.as_deref().unwrap_or("unknown"),
            "Intake recorded"
        );

        json!({
            "caseNumber": case_number,
            "status": "success",
            "message": "Intake data saved successfully",
        })
    }
}

/// `ILH-<unix millis>-<5 uppercase alphanumerics>`
pub fn case_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("ILH-{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}
