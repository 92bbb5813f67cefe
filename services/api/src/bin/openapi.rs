//! services/api/src/bin/openapi.rs
//!
//! Dumps the OpenAPI 3.0 specification of the SparkLog API (the chat and
//! summary routes) to `openapi.json`, for front-end codegen.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = "openapi.json";
    std::fs::write(path, ApiDoc::openapi().to_pretty_json()?)?;
    println!("SparkLog API specification written to {}", path);
    Ok(())
}
