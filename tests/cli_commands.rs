//! CLI Command Tests
//!
//! `run` and `explain` over model, data, query and config files on disk.

use std::fs;
use std::path::PathBuf;

use aeroquery::cli::{execute, explain, load_session, run_command, CliErrorCode, Command, QueryArgs};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

// =============================================================================
// Helper Functions
// =============================================================================

const MODEL: &str = r#"{
    "namespace": "Sales",
    "entity_types": [
        {"name": "Customer", "key": ["Id"], "fields": {
            "Id": {"type": "int", "required": true},
            "Status": {"type": "string", "required": true},
            "owner_id": {"type": "string"}
        }}
    ],
    "collections": [{"name": "Customers", "entity_type": "Customer"}],
    "singletons": [{"name": "Me", "entity_type": "Customer"}]
}"#;

const OWNER: &str = "00000000-0000-0000-0000-0000000000aa";

fn data() -> String {
    json!({
        "Customers": [
            {"Id": 1, "Status": "active", "owner_id": OWNER},
            {"Id": 2, "Status": "closed", "owner_id": OWNER},
            {"Id": 3, "Status": "active", "owner_id": "someone-else"}
        ]
    })
    .to_string()
}

struct Inputs {
    dir: TempDir,
}

impl Inputs {
    fn new(query: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("model.json"), MODEL).unwrap();
        fs::write(dir.path().join("data.json"), data()).unwrap();
        fs::write(dir.path().join("query.json"), query).unwrap();
        Self { dir }
    }

    fn with_config(self, config: &str) -> Self {
        fs::write(self.dir.path().join("config.json"), config).unwrap();
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn args(&self) -> QueryArgs {
        let config = self.path("config.json");
        QueryArgs {
            model: self.path("model.json"),
            data: self.path("data.json"),
            query: self.path("query.json"),
            config: if config.exists() { Some(config) } else { None },
            user: None,
            service_role: false,
        }
    }
}

// =============================================================================
// Run
// =============================================================================

#[tokio::test]
async fn test_run_returns_result_json() {
    let inputs = Inputs::new(
        r#"{"from": "Customers",
            "filter": [{"field": "Status", "op": "eq", "value": "active"}],
            "take": 1,
            "total_count": true}"#,
    );

    let response = execute(&inputs.args()).await.unwrap();

    assert_eq!(response["shape"], "sequence");
    assert_eq!(response["results"][0]["Id"], 1);
    assert_eq!(response["results"].as_array().map(|r| r.len()), Some(1));
    assert_eq!(response["total_count"], 2);
    assert_eq!(response["collection"], "Customers");
}

#[tokio::test]
async fn test_run_scalar_through_command_dispatch() {
    let inputs = Inputs::new(r#"{"from": "Customers", "count": true}"#);

    let response = run_command(Command::Run(inputs.args())).await.unwrap();

    assert_eq!(response["shape"], "scalar");
    assert_eq!(response["results"], json!([3]));
}

#[tokio::test]
async fn test_run_applies_row_security_for_user() {
    let inputs = Inputs::new(r#"{"from": "Customers"}"#)
        .with_config(r#"{"row_security": {"collections": ["Customers"]}}"#);
    let mut args = inputs.args();
    args.user = Some(Uuid::parse_str(OWNER).unwrap());

    let response = execute(&args).await.unwrap();

    assert_eq!(response["results"].as_array().map(|r| r.len()), Some(2));
}

#[tokio::test]
async fn test_run_denied_by_policy() {
    let inputs = Inputs::new(r#"{"from": "Customers"}"#)
        .with_config(r#"{"default_policy": "authenticated"}"#);

    let err = execute(&inputs.args()).await.unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::QueryFailed);
    assert!(err.message().starts_with("AERO_REWRITE_INSPECTION_FAILED"));
}

#[tokio::test]
async fn test_run_service_role_passes_policy() {
    let inputs = Inputs::new(r#"{"from": "Customers"}"#)
        .with_config(r#"{"default_policy": "deny"}"#);
    let mut args = inputs.args();
    args.service_role = true;

    let response = execute(&args).await.unwrap();

    assert_eq!(response["results"].as_array().map(|r| r.len()), Some(3));
}

#[tokio::test]
async fn test_singleton_without_rows_unsupported() {
    let inputs = Inputs::new(r#"{"from": "Me"}"#);

    let err = execute(&inputs.args()).await.unwrap_err();

    assert_eq!(err.code(), &CliErrorCode::QueryFailed);
    assert!(err.message().starts_with("AERO_REWRITE_UNSUPPORTED_QUERY"));
}

// =============================================================================
// Explain
// =============================================================================

#[test]
fn test_explain_reports_rewritten_tree() {
    let inputs = Inputs::new(
        r#"{"from": "Customers",
            "filter": [{"field": "Status", "op": "eq", "value": "active"}],
            "take": 1}"#,
    );

    let response = explain(&inputs.args()).unwrap();

    assert_eq!(
        response["query"],
        r#"api.Customers.where(it => (it.Status == "active")).take(1)"#
    );
    assert_eq!(
        response["rewritten"],
        r#"native(Customers).where(it => (it.Status == "active")).take(1)"#
    );
    assert_eq!(response["collection"], "Customers");
    assert_eq!(response["sourcing_calls"], 1);
    assert_eq!(response["total_count"], false);
}

// =============================================================================
// Input Errors
// =============================================================================

#[test]
fn test_missing_model_file() {
    let inputs = Inputs::new(r#"{"from": "Customers"}"#);
    let mut args = inputs.args();
    args.model = inputs.path("absent.json");

    let err = load_session(&args).err().unwrap();
    assert_eq!(err.code(), &CliErrorCode::ModelError);
}

#[test]
fn test_invalid_config_file() {
    let inputs = Inputs::new(r#"{"from": "Customers"}"#).with_config(r#"{"max_depth": 0}"#);

    let err = load_session(&inputs.args()).err().unwrap();
    assert_eq!(err.code(), &CliErrorCode::ConfigError);
    assert!(err.message().starts_with("AERO_CONFIG_INVALID"));
}

#[test]
fn test_malformed_query_file() {
    let inputs = Inputs::new(r#"{"filter": []}"#);

    let err = load_session(&inputs.args()).err().unwrap();
    assert_eq!(err.code(), &CliErrorCode::InputError);
}

#[tokio::test]
async fn test_unknown_source_is_input_error() {
    let inputs = Inputs::new(r#"{"from": "Suppliers"}"#);

    let err = execute(&inputs.args()).await.unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::InputError);
}
