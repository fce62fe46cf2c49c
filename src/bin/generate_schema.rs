//! Generate JSON Schemas for the configuration file and the theme format
//!
//! Usage:
//!   cargo run --features dev-bins --bin generate_schema config > config-schema.json
//!   cargo run --features dev-bins --bin generate_schema theme > theme-schema.json

use linetint::config::ThemingConfig;
use linetint::view::theme::ThemeFile;
use schemars::schema_for;

fn main() {
    let which = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let schema = match which.as_str() {
        "config" => schema_for!(ThemingConfig),
        "theme" => schema_for!(ThemeFile),
        other => {
            eprintln!("unknown schema {other:?}; expected \"config\" or \"theme\"");
            std::process::exit(2);
        }
    };
    let json = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema");
    println!("{}", json);
}
