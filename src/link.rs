//! Folder link parsing.
//!
//! Accepts any `http(s)` URL whose path contains `/folders/<id>`, which
//! covers the common Drive shapes:
//!
//! ```text
//! https://drive.google.com/drive/folders/1AbC-d_e
//! https://drive.google.com/drive/u/0/folders/1AbC-d_e?usp=sharing
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Identifier of a folder, as extracted from its link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(String);

impl FolderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn folder_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://[^\s/]+(?:/[^\s?#]*)?/folders/([A-Za-z0-9_-]+)/?(?:[?#]\S*)?$")
            .expect("folder link regex is valid")
    })
}

/// Extract the folder id from a link, or fail with `invalid link`.
pub fn parse_folder_link(link: &str) -> Result<FolderId> {
    folder_link_regex()
        .captures(link.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| FolderId(m.as_str().to_string()))
        .ok_or_else(Error::invalid_link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_folder_link() {
        let id = parse_folder_link("https://drive.google.com/drive/folders/1AbC-d_e9").unwrap();
        assert_eq!(id.as_str(), "1AbC-d_e9");
    }

    #[test]
    fn drive_link_with_account_and_query() {
        let id =
            parse_folder_link("  https://drive.google.com/drive/u/0/folders/xyz_123?usp=sharing \n")
                .unwrap();
        assert_eq!(id.as_str(), "xyz_123");
    }

    #[test]
    fn trailing_slash_accepted() {
        let id = parse_folder_link("https://drive.google.com/drive/folders/abc/").unwrap();
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn non_folder_link_rejected() {
        let err = parse_folder_link("https://notdrive.example.com/x").unwrap_err();
        assert_eq!(err.to_string(), "invalid link");
    }

    #[test]
    fn plain_text_rejected() {
        assert!(parse_folder_link("what is photosynthesis?").is_err());
        assert!(parse_folder_link("").is_err());
        assert!(parse_folder_link("drive.google.com/drive/folders/abc").is_err());
    }

    #[test]
    fn file_link_rejected() {
        assert!(parse_folder_link("https://drive.google.com/file/d/abc/view").is_err());
        assert!(parse_folder_link("https://drive.google.com/drive/folders/").is_err());
    }
}
