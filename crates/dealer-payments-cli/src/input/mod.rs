pub mod file;
pub mod settings;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Deserialize command input from `--input <file>` when given, else from
/// piped stdin. `what` names the command in the error when neither is present.
pub fn read_input<T: DeserializeOwned>(path: Option<&str>, what: &str) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_json(path)
    } else if let Some(text) = stdin::read_piped()? {
        serde_json::from_str(&text).map_err(|e| format!("Failed to parse stdin: {e}").into())
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}
