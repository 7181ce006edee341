//! Version information display.

use mankind_core::protocol::SERVER_MESSAGE_TYPES;
use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};

fn render(format: OutputFormat) -> String {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    match format {
        OutputFormat::Human => format!("{name} {version}"),
        OutputFormat::Json => json!({
            "name": name,
            "version": version,
            "protocol": SERVER_MESSAGE_TYPES,
        })
        .to_string(),
    }
}

/// Print version information.
pub fn run(args: &VersionArgs) {
    println!("{}", render(args.format));
}
