//! Listing every document of a collection.
//!
//! Pages are fetched one after another, each request carrying the
//! continuation token returned by the previous page, until the server stops
//! returning one. The whole result is collected before it is handed back; an
//! error on any page discards everything fetched so far.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::client::FirestoreClient;
use crate::endpoint::collection_components;
use crate::error::{FirestoreError, FirestoreResult};
use crate::fields::{extract_fields, TypedDocument};
use crate::metrics::record_list_page;
use crate::types::{Document, ListDocumentsResponse};

// =============================================================================
// Options
// =============================================================================

/// Optional listing parameters. Unset or empty fields are left out of the
/// request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Sort order, e.g. `"name"` or `"priority desc, name"`.
    pub order_by: Option<String>,
    /// Read documents as they were at this RFC 3339 timestamp.
    pub read_time: Option<String>,
    /// Include missing documents. Only `Some(true)` is sent; `Some(false)`
    /// behaves like `None`.
    pub show_missing: Option<bool>,
    /// Maximum documents per page; the server picks when unset.
    pub page_size: Option<u32>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn read_time(mut self, read_time: impl Into<String>) -> Self {
        self.read_time = Some(read_time.into());
        self
    }

    pub fn read_time_at(self, at: DateTime<Utc>) -> Self {
        self.read_time(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn show_missing(mut self, show_missing: bool) -> Self {
        self.show_missing = Some(show_missing);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Query pairs for one page request.
    pub fn query_pairs(&self, page_token: Option<&str>) -> Vec<(&'static str, String)> {
        let non_empty = |s: &&str| !s.is_empty();

        let mut pairs = Vec::new();
        if let Some(token) = page_token.filter(non_empty) {
            pairs.push(("pageToken", token.to_string()));
        }
        if let Some(order_by) = self.order_by.as_deref().filter(non_empty) {
            pairs.push(("orderBy", order_by.to_string()));
        }
        if let Some(read_time) = self.read_time.as_deref().filter(non_empty) {
            pairs.push(("readTime", read_time.to_string()));
        }
        if self.show_missing == Some(true) {
            pairs.push(("showMissing", "true".to_string()));
        }
        if let Some(page_size) = self.page_size {
            pairs.push(("pageSize", page_size.to_string()));
        }
        pairs
    }

    fn apply(&self, url: &mut Url, page_token: Option<&str>) {
        let pairs = self.query_pairs(page_token);
        // query_pairs_mut() leaves a bare '?' behind even when nothing is added.
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
    }
}

// =============================================================================
// Positional arguments
// =============================================================================

/// One loosely typed positional argument: a path segment or the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListArg {
    Segment(String),
    Options(ListOptions),
}

impl From<&str> for ListArg {
    fn from(segment: &str) -> Self {
        ListArg::Segment(segment.to_string())
    }
}

impl From<String> for ListArg {
    fn from(segment: String) -> Self {
        ListArg::Segment(segment)
    }
}

impl From<ListOptions> for ListArg {
    fn from(options: ListOptions) -> Self {
        ListArg::Options(options)
    }
}

/// Path segments and options split out of a positional argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    pub segments: Vec<String>,
    pub options: ListOptions,
}

impl ListArgs {
    /// The last argument is the options iff it is `ListArg::Options`; every
    /// other argument must be a segment.
    pub fn from_positional<I, A>(args: I) -> FirestoreResult<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<ListArg>,
    {
        let mut args: Vec<ListArg> = args.into_iter().map(Into::into).collect();

        let options = match args.pop() {
            Some(ListArg::Options(options)) => options,
            Some(segment) => {
                args.push(segment);
                ListOptions::default()
            }
            None => ListOptions::default(),
        };

        let segments = args
            .into_iter()
            .map(|arg| match arg {
                ListArg::Segment(segment) => Ok(segment),
                ListArg::Options(_) => Err(FirestoreError::invalid_path(
                    "list options must be the last argument",
                )),
            })
            .collect::<FirestoreResult<Vec<_>>>()?;

        Ok(Self { segments, options })
    }

    pub fn segment_refs(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }
}

// =============================================================================
// Listing
// =============================================================================

impl FirestoreClient {
    /// List every document of the collection at `segments`, decoding fields
    /// into `T`.
    ///
    /// `segments` name a collection: `["users"]`, `["users", "alice", "posts"]`
    /// or `["users/alice/posts"]`.
    pub async fn list_all<T>(
        &self,
        segments: &[&str],
        options: &ListOptions,
    ) -> FirestoreResult<Vec<TypedDocument<T>>>
    where
        T: DeserializeOwned,
    {
        self.list_all_with(segments, options, extract_fields::<T>).await
    }

    /// [`list_all`](Self::list_all) for positional arguments.
    pub async fn list_all_args<T>(&self, args: &ListArgs) -> FirestoreResult<Vec<TypedDocument<T>>>
    where
        T: DeserializeOwned,
    {
        self.list_all(&args.segment_refs(), &args.options).await
    }

    /// List every document of the collection at `segments`, decoding each
    /// one with `decode`.
    pub async fn list_all_with<T, F>(
        &self,
        segments: &[&str],
        options: &ListOptions,
        decode: F,
    ) -> FirestoreResult<Vec<T>>
    where
        F: Fn(&Document) -> FirestoreResult<T>,
    {
        let components = collection_components(segments)?;
        let collection = components.join("/");

        self.execute_request("list_all", &collection, async {
            let mut all_documents = Vec::new();
            let mut page_token: Option<String> = None;
            let mut pages = 0usize;

            loop {
                let page = self
                    .fetch_page(&components, options, page_token.as_deref())
                    .await?;
                pages += 1;

                let documents = page.documents.as_deref().unwrap_or_default();

                record_list_page(&collection, documents.len());
                debug!(
                    page = pages,
                    documents = documents.len(),
                    has_more = page.continuation().is_some(),
                    "Fetched list page"
                );

                for document in documents {
                    all_documents.push(decode(document)?);
                }

                page_token = page.continuation().map(str::to_string);
                if page_token.is_none() {
                    break;
                }
            }

            debug!(pages, total = all_documents.len(), "Listed collection {}", collection);
            Ok(all_documents)
        })
        .await
    }

    /// Fetch a single page of the collection at `segments`.
    pub async fn list_page(
        &self,
        segments: &[&str],
        options: &ListOptions,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let components = collection_components(segments)?;
        let collection = components.join("/");

        self.execute_request(
            "list_page",
            &collection,
            self.fetch_page(&components, options, page_token),
        )
        .await
    }

    async fn fetch_page(
        &self,
        components: &[&str],
        options: &ListOptions,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let mut url = self.documents_url(components)?;
        options.apply(&mut url, page_token);

        let token = self.credentials.token().await?;
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let mut page: ListDocumentsResponse = match serde_json::from_str(&body) {
            Ok(page) => page,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(FirestoreError::from_http_status(
                    status.as_u16(),
                    format!("{} failed: {}", url, body),
                ))
            }
        };

        if let Some(error) = page.error.take() {
            let status = if status.is_success() {
                error.code.and_then(|code| u16::try_from(code).ok())
            } else {
                Some(status.as_u16())
            };
            return Err(FirestoreError::remote(error.message, status));
        }
        if !status.is_success() {
            return Err(FirestoreError::from_http_status(
                status.as_u16(),
                format!("{} failed: {}", url, body),
            ));
        }

        Ok(page)
    }
}
