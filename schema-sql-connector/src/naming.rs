//! Index naming (§4.6.2): a deterministic base name, hashed and truncated
//! to fit SQL Server's 128-character identifier limit when necessary.

use sha2::{Digest, Sha256};

const MAX_NAME_LEN: usize = 128;
const HASH_HEX_LEN: usize = 8;

/// Computes the name for an index, given its owning table, its (already
/// `resolveIndexFieldNames`-resolved) column list, and whether it's an
/// alternate key (`key(...)`) versus a plain index (`index(...)`).
pub fn index_name(table: &str, fields: &[String], is_alternate_key: bool) -> String {
    let prefix = if is_alternate_key { "AK" } else { "IX" };
    let base = format!("{prefix}_{table}_{}", fields.join("_"));
    if base.len() <= MAX_NAME_LEN {
        return base;
    }
    let digest = Sha256::digest(base.as_bytes());
    let hash_hex: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    debug_assert_eq!(hash_hex.len(), HASH_HEX_LEN);
    let keep = MAX_NAME_LEN - 1 - HASH_HEX_LEN;
    let truncated: String = base.chars().take(keep).collect();
    format!("{truncated}_{hash_hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_used_verbatim() {
        let name = index_name("Client", &["Email".to_string(), "ClientStatusID".to_string()], false);
        assert_eq!(name, "IX_Client_Email_ClientStatusID");
    }

    #[test]
    fn alternate_key_uses_ak_prefix() {
        let name = index_name("Client", &["Email".to_string()], true);
        assert_eq!(name, "AK_Client_Email");
    }

    #[test]
    fn long_base_name_is_hashed_and_exactly_128_chars() {
        let fields: Vec<String> = (0..30).map(|i| format!("LongColumnNameNumber{i:02}")).collect();
        let name = index_name("SomeLongishTableName", &fields, false);
        assert_eq!(name.len(), MAX_NAME_LEN);
        let (_, suffix) = name.split_at(name.len() - HASH_HEX_LEN - 1);
        assert!(suffix.starts_with('_'));
        assert!(suffix[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_base_names_sharing_a_prefix_hash_differently() {
        let mut fields_a: Vec<String> = (0..30).map(|i| format!("LongColumnNameNumber{i:02}")).collect();
        let mut fields_b = fields_a.clone();
        fields_a[4] = "DifferingColumnVariantA".to_string();
        fields_b[4] = "DifferingColumnVariantB".to_string();
        let name_a = index_name("SomeLongishTableName", &fields_a, false);
        let name_b = index_name("SomeLongishTableName", &fields_b, false);
        assert_ne!(name_a, name_b);
        assert_eq!(name_a.len(), MAX_NAME_LEN);
        assert_eq!(name_b.len(), MAX_NAME_LEN);
    }
}
