//! Generates the OpenAPI JSON spec without starting the daemon or touching
//! the network, so it can be frozen in the repository for CI and client
//! generation.

fn main() {
    let openapi = armd::api::routes::api_doc();

    let json = serde_json::to_string_pretty(&openapi).expect("failed to serialize OpenAPI spec");

    let output_path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());

    std::fs::write(&output_path, json)
        .unwrap_or_else(|e| panic!("failed to write OpenAPI spec to {output_path}: {e}"));

    eprintln!("OpenAPI spec written to {output_path}");
}
