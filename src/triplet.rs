//! Platform triplet inference from free-form release file names.
//!
//! Release archives are named like `memos-v0.22.0-linux-x86_64.tar.gz`, with
//! OS and arch hints in no fixed order. Each component is looked up on its
//! own by substring containment; the first table entry that matches wins.

use std::fmt;

const OS_NAMES: [&str; 3] = ["darwin", "linux", "windows"];

const ARCH_ALIASES: [(&str, &str); 7] = [
    ("x86_64", "x86_64"),
    ("x64", "x86_64"),
    ("x86", "i686"),
    ("386", "i686"),
    ("arm64", "aarch64"),
    ("aarch64", "aarch64"),
    ("riscv64", "riscv64gc"),
];

const VENDORS: [(&str, &str); 3] = [("windows", "pc"), ("linux", "unknown"), ("darwin", "apple")];

const VARIANTS: [(&str, &str); 2] = [("windows", "msvc"), ("linux", "gnu")];

const UNKNOWN: &str = "unknown";

/// A Rust-style `arch-vendor-os[-variant]` target identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Triplet {
    pub arch: &'static str,
    pub vendor: &'static str,
    pub os: &'static str,
    pub variant: Option<&'static str>,
}

impl Triplet {
    /// Infer the triplet from a file name. Never fails; unmatched segments
    /// become `unknown` and an unmatched variant is dropped.
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Self {
        Self {
            arch: lookup(file_name, &ARCH_ALIASES).unwrap_or(UNKNOWN),
            vendor: lookup(file_name, &VENDORS).unwrap_or(UNKNOWN),
            os: OS_NAMES
                .into_iter()
                .find(|os| file_name.contains(os))
                .unwrap_or(UNKNOWN),
            variant: lookup(file_name, &VARIANTS),
        }
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    #[must_use]
    pub fn exe_suffix(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }

    /// File name of the canonical binary for this platform, e.g.
    /// `memos-x86_64-pc-windows-msvc.exe`.
    #[must_use]
    pub fn binary_file_name(&self, binary_name: &str) -> String {
        format!("{binary_name}-{self}{}", self.exe_suffix())
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.vendor, self.os)?;
        match self.variant {
            Some(variant) if !variant.is_empty() => write!(f, "-{variant}"),
            _ => Ok(()),
        }
    }
}

fn lookup(file_name: &str, table: &[(&str, &'static str)]) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| file_name.contains(key))
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triplet(name: &str) -> String {
        Triplet::from_file_name(name).to_string()
    }

    #[test]
    fn maps_release_archives_to_rust_targets() {
        assert_eq!(triplet("memos-windows-x86_64.zip"), "x86_64-pc-windows-msvc");
        assert_eq!(
            triplet("memos-linux-x86_64.tar.gz"),
            "x86_64-unknown-linux-gnu"
        );
        assert_eq!(triplet("memos-darwin-x86_64.tar.gz"), "x86_64-apple-darwin");
        assert_eq!(
            triplet("memos-v0.22.0-darwin-arm64.tar.gz"),
            "aarch64-apple-darwin"
        );
    }

    #[test]
    fn ignores_token_order() {
        assert_eq!(
            triplet("memos-darwin-arm64.tar.gz"),
            triplet("memos-arm64-darwin.tar.gz")
        );
        assert_eq!(
            triplet("memos-x64-windows.zip"),
            triplet("memos-windows-x64.zip")
        );
    }

    #[test]
    fn resolves_arch_aliases() {
        assert_eq!(triplet("memos-linux-386.tar.gz"), "i686-unknown-linux-gnu");
        assert_eq!(triplet("memos-linux-x86.tar.gz"), "i686-unknown-linux-gnu");
        assert_eq!(
            triplet("memos-linux-aarch64.tar.gz"),
            "aarch64-unknown-linux-gnu"
        );
        assert_eq!(
            triplet("memos-linux-riscv64.tar.gz"),
            "riscv64gc-unknown-linux-gnu"
        );
    }

    #[test]
    fn unmatched_segments_become_unknown() {
        assert_eq!(triplet("memos-freebsd-mips.tar.gz"), "unknown-unknown-unknown");
        assert_eq!(triplet("memos-plan9-arm64"), "aarch64-unknown-unknown");
    }

    #[test]
    fn builds_canonical_binary_names() {
        let windows = Triplet::from_file_name("memos-windows-x86_64.zip");
        assert!(windows.is_windows());
        assert_eq!(
            windows.binary_file_name("memos"),
            "memos-x86_64-pc-windows-msvc.exe"
        );

        let linux = Triplet::from_file_name("memos-linux-x86_64.tar.gz");
        assert!(!linux.is_windows());
        assert_eq!(
            linux.binary_file_name("memos"),
            "memos-x86_64-unknown-linux-gnu"
        );
    }

    #[test]
    fn inference_is_idempotent() {
        let first = Triplet::from_file_name("memos-0.1-linux-arm64.tar.gz");
        let second = Triplet::from_file_name("memos-0.1-linux-arm64.tar.gz");
        assert_eq!(first, second);
    }
}
