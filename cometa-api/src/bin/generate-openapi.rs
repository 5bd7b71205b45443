//! OpenAPI Specification Generator Binary
//!
//! Writes the COMETA OpenAPI specification as JSON to stdout.
//!
//! Usage:
//!   cargo run -p cometa-api --bin generate-openapi > openapi.json

use cometa_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
