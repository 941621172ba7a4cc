//! Document resource URLs.

use url::Url;

use crate::error::{FirestoreError, FirestoreResult};

/// Split caller segments into single path components.
///
/// A segment may carry slashes (`"users/alice/posts"`); it is split and each
/// part becomes its own component. Empty segments are rejected rather than
/// silently collapsed.
pub fn path_components<'a>(segments: &[&'a str]) -> FirestoreResult<Vec<&'a str>> {
    if segments.is_empty() {
        return Err(FirestoreError::invalid_path("at least one path segment is required"));
    }

    let mut components = Vec::with_capacity(segments.len());
    for segment in segments {
        let trimmed = segment.trim_matches('/');
        if trimmed.is_empty() {
            return Err(FirestoreError::invalid_path(format!("empty segment in {:?}", segments)));
        }
        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(FirestoreError::invalid_path(format!("empty segment in {:?}", segments)));
            }
            components.push(part);
        }
    }
    Ok(components)
}

/// Components of a collection path. Collections sit at odd depths:
/// `users`, `users/alice/posts`, ...
pub fn collection_components<'a>(segments: &[&'a str]) -> FirestoreResult<Vec<&'a str>> {
    let components = path_components(segments)?;
    if components.len() % 2 == 0 {
        return Err(FirestoreError::invalid_path(format!(
            "{} names a document, not a collection",
            components.join("/")
        )));
    }
    Ok(components)
}

/// Build `{base}/projects/{project}/databases/{database}/documents/{components...}`.
///
/// Each component is percent-encoded as a single path segment. The returned
/// URL has an empty query that callers fill in.
pub fn documents_url(
    base_url: &str,
    project_id: &str,
    database_id: &str,
    components: &[&str],
) -> FirestoreResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| FirestoreError::config(format!("invalid base URL {:?}: {}", base_url, e)))?;

    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| FirestoreError::config(format!("base URL {:?} cannot have a path", base_url)))?;
        path.pop_if_empty()
            .extend(["projects", project_id, "databases", database_id, "documents"])
            .extend(components);
    }

    url.set_query(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://firestore.googleapis.com/v1";

    #[test]
    fn test_documents_url_for_top_level_collection() {
        let url = documents_url(BASE, "demo", "(default)", &["users"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents/users"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_documents_url_tolerates_trailing_slash() {
        let url = documents_url("http://localhost:8080/v1/", "demo", "(default)", &["users"]).unwrap();
        assert_eq!(url.path(), "/v1/projects/demo/databases/(default)/documents/users");
    }

    #[test]
    fn test_documents_url_encodes_segments() {
        let url = documents_url(BASE, "demo", "(default)", &["my coll"]).unwrap();
        assert!(url.path().ends_with("/documents/my%20coll"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = documents_url("not a url", "demo", "(default)", &["users"]).unwrap_err();
        assert!(matches!(err, FirestoreError::Config(_)));
    }

    #[test]
    fn test_path_components_split_slashes() {
        let parts = path_components(&["users/alice", "posts"]).unwrap();
        assert_eq!(parts, vec!["users", "alice", "posts"]);
    }

    #[test]
    fn test_path_components_reject_empty() {
        assert!(path_components(&[]).is_err());
        assert!(path_components(&["users", ""]).is_err());
        assert!(path_components(&["users//posts"]).is_err());
    }

    #[test]
    fn test_collection_components_reject_document_paths() {
        assert!(collection_components(&["users", "alice", "posts"]).is_ok());
        let err = collection_components(&["users", "alice"]).unwrap_err();
        assert!(matches!(err, FirestoreError::InvalidPath(_)));
    }
}
