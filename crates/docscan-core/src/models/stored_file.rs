use serde::{Deserialize, Serialize};

/// Backend-tracked document record.
///
/// `content` is the base64 payload; list endpoints usually omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: i64,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub format_id: Option<i64>,
    #[serde(default)]
    pub resource_path: Option<String>,
    #[serde(default)]
    pub generation: Option<i32>,
    #[serde(default)]
    pub primary_file_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub processing_model_id: Option<i64>,
}

impl StoredFile {
    /// Display name: last segment of the resource path, or `file-<id>`.
    pub fn display_name(&self) -> String {
        self.resource_path
            .as_deref()
            .and_then(|p| p.rsplit(['/', '\\']).next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("file-{}", self.id))
    }

    /// Derived documents (OCR output, conversions) point back at their source.
    pub fn is_derived(&self) -> bool {
        self.primary_file_id.is_some()
    }
}

/// Body for `POST /stored_files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStoredFile {
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_model_id: Option<i64>,
    pub generation: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_file_id: Option<i64>,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_resource_path() {
        let file: StoredFile = serde_json::from_value(serde_json::json!({
            "id": 7,
            "resourcePath": "users/3/scans/letter.pdf",
            "generation": 1
        }))
        .unwrap();
        assert_eq!(file.display_name(), "letter.pdf");
        assert!(!file.is_derived());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let file: StoredFile = serde_json::from_value(serde_json::json!({ "id": 12 })).unwrap();
        assert_eq!(file.display_name(), "file-12");
    }

    #[test]
    fn test_new_stored_file_omits_unset_links() {
        let body = NewStoredFile {
            owner_id: 3,
            format_id: Some(1),
            processing_model_id: None,
            generation: 0,
            primary_file_id: None,
            content: "AAEC".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ownerId"], 3);
        assert_eq!(json["formatId"], 1);
        assert!(json.get("processingModelId").is_none());
        assert!(json.get("primaryFileId").is_none());
    }
}
