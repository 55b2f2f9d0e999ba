//! Client-side file intake checks: size limit first, then the accept rules.

use std::fmt;

use crate::models::{Format, UploadCandidate};

/// Accepted types when no configuration overrides them.
pub const DEFAULT_ACCEPTED_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/tiff",
    "application/pdf",
    ".png",
    ".jpg",
    ".jpeg",
    ".webp",
    ".gif",
    ".tif",
    ".tiff",
    ".pdf",
];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Why a file was turned away. The `Display` text is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("File is too large. Maximum size is {}.", format_megabytes(.max))]
    TooLarge { size: u64, max: u64 },

    #[error("Unsupported file type. Allowed: {allowed}")]
    WrongType { allowed: String },
}

fn format_megabytes(bytes: &u64) -> String {
    format!("{:.1} MB", *bytes as f64 / BYTES_PER_MB)
}

/// One entry of an accept list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AcceptRule {
    /// `.pdf`, stored with the leading dot.
    Extension(String),
    /// `image/png`
    MimeExact(String),
    /// `image/*`, stored as the type part (`image`).
    MimeWildcard(String),
}

impl AcceptRule {
    /// Parse one rule. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let rule = raw.trim().to_lowercase();
        if rule.is_empty() {
            return None;
        }
        if rule.starts_with('.') {
            Some(AcceptRule::Extension(rule))
        } else if let Some(prefix) = rule.strip_suffix("/*") {
            Some(AcceptRule::MimeWildcard(prefix.to_string()))
        } else {
            Some(AcceptRule::MimeExact(rule))
        }
    }

    /// `extension` includes the dot and both inputs are already lower-cased.
    pub fn matches(&self, extension: &str, mime: &str) -> bool {
        match self {
            AcceptRule::Extension(ext) => !extension.is_empty() && extension == ext,
            AcceptRule::MimeWildcard(prefix) => mime
                .split_once('/')
                .is_some_and(|(kind, _)| kind == prefix),
            AcceptRule::MimeExact(exact) => !mime.is_empty() && mime == exact,
        }
    }
}

impl fmt::Display for AcceptRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptRule::Extension(ext) => f.write_str(ext),
            AcceptRule::MimeExact(mime) => f.write_str(mime),
            AcceptRule::MimeWildcard(prefix) => write!(f, "{}/*", prefix),
        }
    }
}

/// Ordered, de-duplicated accept list. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptRules(Vec<AcceptRule>);

impl AcceptRules {
    pub fn unrestricted() -> Self {
        Self(Vec::new())
    }

    pub fn parse<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        for rule in raw.into_iter().filter_map(|r| AcceptRule::parse(r.as_ref())) {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
        Self(rules)
    }

    /// Comma-separated form used in configuration.
    pub fn parse_list(list: &str) -> Self {
        Self::parse(list.split(','))
    }

    pub fn default_accepted() -> Self {
        Self::parse(DEFAULT_ACCEPTED_TYPES.iter().copied())
    }

    /// Rules derived from the backend format registry: one MIME rule and one
    /// extension rule per format. The format's short name stands in for a
    /// missing extension.
    pub fn from_formats(formats: &[Format]) -> Self {
        let mut raw = Vec::new();
        for format in formats {
            if let Some(mime) = &format.mime_type {
                raw.push(mime.clone());
            }
            let ext = format
                .extension
                .as_deref()
                .unwrap_or(format.name.as_str())
                .trim()
                .trim_start_matches('.');
            if !ext.is_empty() {
                raw.push(format!(".{}", ext));
            }
        }
        Self::parse(raw)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcceptRule> {
        self.0.iter()
    }

    /// First matching rule wins; an empty set accepts everything.
    pub fn accepts(&self, file_name: &str, mime: &str) -> bool {
        if self.0.is_empty() {
            return true;
        }
        let extension = file_extension(file_name);
        let mime = mime.trim().to_lowercase();
        self.0.iter().any(|rule| rule.matches(&extension, &mime))
    }

    /// Rules joined for display and for an HTML-style `accept` attribute.
    pub fn describe(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Extension from the last `.` on, lower-cased; empty when there is none.
fn file_extension(name: &str) -> String {
    name.rfind('.')
        .map(|idx| name[idx..].to_lowercase())
        .unwrap_or_default()
}

/// Validate one file against a rule set and a size limit.
///
/// The size check runs first, so an oversized file is reported as too large
/// even when its type is also wrong.
pub fn validate(
    file_name: &str,
    declared_type: &str,
    size: u64,
    rules: &AcceptRules,
    max_size_bytes: u64,
) -> Result<(), RejectReason> {
    if size > max_size_bytes {
        return Err(RejectReason::TooLarge {
            size,
            max: max_size_bytes,
        });
    }

    if !rules.accepts(file_name, declared_type) {
        tracing::debug!(
            file_name = %file_name,
            declared_type = %declared_type,
            "File type not in accept list"
        );
        return Err(RejectReason::WrongType {
            allowed: rules.describe(),
        });
    }

    Ok(())
}

/// Validator bound to one rule set and size limit.
#[derive(Debug, Clone)]
pub struct FileValidator {
    rules: AcceptRules,
    max_size_bytes: u64,
}

impl FileValidator {
    pub fn new(rules: AcceptRules, max_size_bytes: u64) -> Self {
        Self {
            rules,
            max_size_bytes,
        }
    }

    pub fn rules(&self) -> &AcceptRules {
        &self.rules
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> Result<(), RejectReason> {
        validate(
            &candidate.name,
            &candidate.mime(),
            candidate.size,
            &self.rules,
            self.max_size_bytes,
        )
    }

    /// Hint line shown next to a file picker.
    pub fn describe_limits(&self) -> String {
        let mut parts = Vec::new();
        if !self.rules.is_empty() {
            parts.push(format!("Allowed: {}", self.rules.describe()));
        }
        if self.max_size_bytes > 0 {
            parts.push(format!("Max. size: {}", format_megabytes(&self.max_size_bytes)));
        }
        parts.join(" | ")
    }
}

/// MIME type a browser would declare for a file name, by extension.
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let extension = file_extension(file_name);
    let content_type = match extension.trim_start_matches('.') {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1_000_000;

    fn rules(list: &[&str]) -> AcceptRules {
        AcceptRules::parse(list.iter().copied())
    }

    #[test]
    fn test_oversized_file_rejected_regardless_of_type() {
        let r = rules(&[".pdf", "image/*"]);
        for (name, mime) in [("a.pdf", "application/pdf"), ("a.exe", ""), ("x", "")] {
            let err = validate(name, mime, MB + 1, &r, MB).unwrap_err();
            assert!(matches!(err, RejectReason::TooLarge { .. }));
            assert!(err.to_string().contains("MB"));
        }
    }

    #[test]
    fn test_too_large_message_uses_one_decimal_megabytes() {
        let err = validate("a.png", "image/png", 2_000_000, &AcceptRules::unrestricted(), MB)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "File is too large. Maximum size is 1.0 MB."
        );
    }

    #[test]
    fn test_wrong_type_lists_allowed_rules() {
        let err = validate("a.txt", "", 1000, &rules(&[".pdf", "image/*"]), MB).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported file type. Allowed: .pdf, image/*"
        );
    }

    #[test]
    fn test_any_matching_rule_accepts() {
        let r = rules(&[".pdf", "image/*", "text/csv"]);
        assert!(validate("scan.PDF", "", 10, &r, MB).is_ok());
        assert!(validate("photo", "image/heic", 10, &r, MB).is_ok());
        assert!(validate("table.bin", "TEXT/CSV", 10, &r, MB).is_ok());
    }

    #[test]
    fn test_empty_rules_accept_any_size_eligible_file() {
        let r = AcceptRules::unrestricted();
        assert!(validate("whatever.xyz", "application/x-thing", MB, &r, MB).is_ok());
        assert!(validate("noext", "", 0, &r, MB).is_ok());
    }

    #[test]
    fn test_zero_byte_file_accepted() {
        assert!(validate("empty.pdf", "application/pdf", 0, &rules(&[".pdf"]), MB).is_ok());
    }

    #[test]
    fn test_no_extension_no_mime_rejected_by_nonempty_rules() {
        let err = validate("README", "", 10, &rules(&[".pdf", "image/*"]), MB).unwrap_err();
        assert!(matches!(err, RejectReason::WrongType { .. }));
    }

    #[test]
    fn test_wildcard_compares_type_part_only() {
        let rule = AcceptRule::parse("image/*").unwrap();
        assert!(rule.matches("", "image/png"));
        assert!(!rule.matches("", "imagex/png"));
        assert!(!rule.matches("", "application/image"));
    }

    #[test]
    fn test_parse_drops_blanks_and_duplicates() {
        let r = rules(&[" .PDF ", "", ".pdf", "image/*", "  "]);
        assert_eq!(r.len(), 2);
        assert_eq!(r.describe(), ".pdf, image/*");
    }

    #[test]
    fn test_from_formats_builds_mime_and_extension_rules() {
        let formats = vec![
            Format {
                id: 1,
                name: "pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                extension: None,
            },
            Format {
                id: 2,
                name: "docx".to_string(),
                mime_type: None,
                extension: Some(".docx".to_string()),
            },
        ];
        let r = AcceptRules::from_formats(&formats);
        assert_eq!(r.describe(), "application/pdf, .pdf, .docx");
    }

    #[test]
    fn test_validator_checks_candidate() {
        let validator = FileValidator::new(AcceptRules::default_accepted(), 25 * 1024 * 1024);
        let ok = UploadCandidate::from_bytes("p.jpg", Some("image/jpeg".to_string()), vec![1u8; 4]);
        let bad =
            UploadCandidate::from_bytes("notes.txt", Some("text/plain".to_string()), vec![1u8; 4]);
        assert!(validator.validate(&ok).is_ok());
        assert!(validator.validate(&bad).is_err());
        assert_eq!(
            validator.describe_limits().split(" | ").last(),
            Some("Max. size: 25.0 MB")
        );
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a.JPEG"), Some("image/jpeg"));
        assert_eq!(guess_content_type("a.tif"), Some("image/tiff"));
        assert_eq!(guess_content_type("a"), None);
    }
}
