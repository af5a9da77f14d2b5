//! Architecture name mapping.
//!
//! The build system names architectures one way (`x86_64`, `aarch64`), the
//! Go-based release tooling another (`amd64`, `arm64`). Release controller
//! streams additionally suffix their repository names for every
//! architecture except the primary one.

/// Map a build-system architecture name to its Go toolchain name.
pub fn go_arch_for_brew_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Map a Go toolchain architecture name back to the build-system name.
pub fn brew_arch_for_go_arch(arch: &str) -> &str {
    match arch {
        "amd64" => "x86_64",
        "arm64" => "aarch64",
        other => other,
    }
}

/// Suffix used by release-controller repositories for an architecture.
///
/// The primary architecture carries no suffix; private streams append
/// `-priv` after any architecture suffix.
pub fn release_suffix(brew_arch: &str, private: bool) -> String {
    let mut suffix = match brew_arch {
        "x86_64" => String::new(),
        other => format!("-{}", go_arch_for_brew_arch(other)),
    };
    if private {
        suffix.push_str("-priv");
    }
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_arch_mapping_roundtrips() {
        for brew in ["x86_64", "aarch64", "s390x", "ppc64le"] {
            assert_eq!(brew_arch_for_go_arch(go_arch_for_brew_arch(brew)), brew);
        }
    }

    #[test]
    fn test_release_suffix() {
        assert_eq!(release_suffix("x86_64", false), "");
        assert_eq!(release_suffix("aarch64", false), "-arm64");
        assert_eq!(release_suffix("s390x", false), "-s390x");
        assert_eq!(release_suffix("x86_64", true), "-priv");
        assert_eq!(release_suffix("ppc64le", true), "-ppc64le-priv");
    }
}
