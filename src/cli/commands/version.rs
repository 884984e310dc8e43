//! Version command.

use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
}

/// Execute the version command.
pub fn execute(json: bool) -> Result<()> {
    if json {
        let output = VersionOutput {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
    Ok(())
}
