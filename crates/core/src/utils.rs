use uuid::Uuid;

pub fn generate_schema_name() -> String {
    let uuid_str = Uuid::new_v4().to_string().replace('-', "_");
    format!("tenant_{}", &uuid_str[..8])
}

/// Strips anything but alphanumerics, whitespace, and a small allowlist of
/// punctuation out of values pulled from external feeds (EDI segments, SFTP
/// filenames, broker payloads) before they're logged or used in a key.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "-_.@".contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_name_has_tenant_prefix() {
        let name = generate_schema_name();
        assert!(name.starts_with("tenant_"));
        assert_eq!(name.len(), "tenant_".len() + 8);
    }

    #[test]
    fn sanitize_string_drops_control_characters() {
        assert_eq!(sanitize_string("ACME*Corp~001"), "ACMECorp001");
        assert_eq!(sanitize_string("store_42.csv"), "store_42.csv");
    }
}
