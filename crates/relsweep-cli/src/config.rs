//! Group metadata loading.

use std::path::Path;

use anyhow::{Context, Result};
use relsweep_core::GroupMetadata;

/// Load and validate a group metadata file.
pub fn load_group_metadata(path: &Path) -> Result<GroupMetadata> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading group metadata {}", path.display()))?;
    let group: GroupMetadata = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing group metadata {}", path.display()))?;

    if group.arches.is_empty() {
        anyhow::bail!("group {} declares no architectures", group.name);
    }
    if !group.os_tags.is_empty() && group.primary_os_tag.is_empty() {
        anyhow::bail!(
            "group {} declares os_tags but no primary_os_tag",
            group.name
        );
    }
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_group(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write group yaml");
        file
    }

    #[test]
    fn test_load_valid_group() {
        let file = write_group(
            r#"
name: openshift-4.12
major: 4
minor: 12
arches: [x86_64]
"#,
        );
        let group = load_group_metadata(file.path()).expect("load failed");
        assert_eq!(group.name, "openshift-4.12");
        assert_eq!(group.major_minor(), "4.12");
    }

    #[test]
    fn test_missing_arches_rejected() {
        let file = write_group(
            r#"
name: openshift-4.12
major: 4
minor: 12
arches: []
"#,
        );
        let err = load_group_metadata(file.path()).unwrap_err();
        assert!(err.to_string().contains("no architectures"));
    }

    #[test]
    fn test_os_tags_require_primary() {
        let file = write_group(
            r#"
name: openshift-4.12
major: 4
minor: 12
arches: [x86_64]
os_tags: [rhel-coreos]
"#,
        );
        let err = load_group_metadata(file.path()).unwrap_err();
        assert!(err.to_string().contains("primary_os_tag"));
    }
}
