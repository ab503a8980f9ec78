//! Tools the model may call while composing a reply.
//!
//! The reception tools answer with canned data; a real deployment swaps in
//! an executor backed by the business's calendar and CRM.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::base::ToolDefinition;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Runs tool calls on behalf of the reply generator
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError>;
}

/// Executor that offers nothing; the model answers from its prompt alone
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

#[async_trait::async_trait]
impl ToolExecutor for NoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn invoke(&self, name: &str, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::UnknownTool(name.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityArgs {
    start: String,
    end: String,
    service_type: String,
    #[serde(default)]
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingArgs {
    date: String,
    time: String,
    customer_name: String,
    customer_phone: String,
    service_type: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupArgs {
    phone: String,
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Scheduling and customer lookup with canned responses
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceptionTools;

impl ReceptionTools {
    fn check_availability(args: AvailabilityArgs) -> Value {
        info!(
            service = %args.service_type,
            start = %args.start,
            end = %args.end,
            tz = args.time_zone.as_deref().unwrap_or("UTC"),
            "checking availability"
        );
        json!({
            "status": "success",
            "availableSlots": [
                { "time": "09:00", "available": true },
                { "time": "11:00", "available": true },
                { "time": "14:00", "available": true },
                { "time": "16:00", "available": true },
            ],
        })
    }

    fn book_appointment(args: BookingArgs) -> Value {
        let simple = Uuid::new_v4().simple().to_string();
        let confirmation = format!("APT-{}", simple[..8].to_uppercase());
        info!(confirmation = %confirmation, service = %args.service_type, "appointment booked");
        json!({
            "confirmationNumber": confirmation,
            "appointment": {
                "date": args.date,
                "time": args.time,
                "customerName": args.customer_name,
                "customerPhone": args.customer_phone,
                "serviceType": args.service_type,
                "notes": args.notes,
            },
            "message": "Appointment booked successfully",
        })
    }

    fn lookup_customer(args: LookupArgs) -> Value {
        info!(phone = %args.phone, "customer lookup");
        json!({
            "found": false,
            "message": "No customer record for this phone number",
        })
    }
}

#[async_trait::async_trait]
impl ToolExecutor for ReceptionTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "checkAvailability".to_string(),
                description: "Check available appointment slots for a given date and service type"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "start": { "type": "string", "description": "Start date/time in ISO 8601 UTC format" },
                        "end": { "type": "string", "description": "End date/time in ISO 8601 UTC format" },
                        "serviceType": { "type": "string", "description": "Service type (e.g., oil change, brake repair)" },
                        "timeZone": { "type": "string", "description": "IANA timezone" },
                    },
                    "required": ["start", "end", "serviceType"],
                }),
            },
            ToolDefinition {
                name: "bookAppointment".to_string(),
                description: "Book an appointment for a customer".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "date": { "type": "string" },
                        "time": { "type": "string" },
                        "customerName": { "type": "string" },
                        "customerPhone": { "type": "string" },
                        "serviceType": { "type": "string" },
                        "notes": { "type": "string" },
                    },
                    "required": ["date", "time", "customerName", "customerPhone", "serviceType"],
                }),
            },
            ToolDefinition {
                name: "lookupCustomer".to_string(),
                description: "Look up customer information by phone number".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "phone": { "type": "string", "description": "Customer phone number" },
                    },
                    "required": ["phone"],
                }),
            },
        ]
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        match name {
            "checkAvailability" => Ok(Self::check_availability(parse_args(arguments)?)),
            "bookAppointment" => Ok(Self::book_appointment(parse_args(arguments)?)),
            "lookupCustomer" => Ok(Self::lookup_customer(parse_args(arguments)?)),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reception_tool_definitions() {
        let names: Vec<String> = ReceptionTools
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["checkAvailability", "bookAppointment", "lookupCustomer"]
        );
        assert!(NoTools.definitions().is_empty());
    }

    #[tokio::test]
    async fn test_check_availability_returns_slots() {
        let result = ReceptionTools
            .invoke(
                "checkAvailability",
                json!({"start": "2026-10-19T09:00:00Z", "end": "2026-10-19T17:00:00Z", "serviceType": "oil change"}),
            )
            .await
            .unwrap();
        assert_eq!(result["availableSlots"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_book_appointment_confirms() {
        let result = ReceptionTools
            .invoke(
                "bookAppointment",
                json!({
                    "date": "2026-10-20",
                    "time": "11:00",
                    "customerName": "Sam",
                    "customerPhone": "555-0100",
                    "serviceType": "brakes"
                }),
            )
            .await
            .unwrap();
        assert!(
            result["confirmationNumber"]
                .as_str()
                .unwrap()
                .starts_with("APT-")
        );
        assert_eq!(result["appointment"]["customerName"], "Sam");
    }

    #[tokio::test]
    async fn test_bad_arguments_and_unknown_tool() {
        assert!(matches!(
            ReceptionTools.invoke("lookupCustomer", json!({})).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            ReceptionTools.invoke("transferCall", json!({})).await,
            Err(ToolError::UnknownTool(_))
        ));
    }
}
