use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

use pwkeep_core::Metadata;

/// Printed once at startup, before bootstrap or the unlock prompt.
pub const WELCOME: &str = r"
  +-----------------------------------+
  |   pwkeep    password manager      |
  |   local, encrypted, single-user   |
  +-----------------------------------+
";

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// Summary of what bootstrap recorded in `meta.json`.
pub fn metadata_table(metadata: &Metadata) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["Encryption method".to_string(), metadata.encryption_method.clone()]);
    table.add_row(vec![
        "Key location".to_string(),
        metadata.key_location.display().to_string(),
    ]);
    table.add_row(vec![
        "Data location".to_string(),
        metadata.data_location.display().to_string(),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_metadata_table_lists_paths() {
        let metadata = Metadata {
            encryption_method: "AES-256-GCM".to_string(),
            key_location: PathBuf::from("/tmp/pwkeep/keys/store.key"),
            data_location: PathBuf::from("/tmp/pwkeep/data.bin"),
        };
        let rendered = metadata_table(&metadata).to_string();
        assert!(rendered.contains("AES-256-GCM"));
        assert!(rendered.contains("/tmp/pwkeep/keys/store.key"));
        assert!(rendered.contains("/tmp/pwkeep/data.bin"));
    }
}
