//! Blocking Confluence Cloud client.
//!
//! Used by the policy/procedure page flows: find a template page by title,
//! rewrite its storage-format body, and copy it under a destination page.
//! Page lookups that find nothing are `Ok(None)`, not errors; the callers
//! decide whether a missing page means "create it" or "give up".

use crate::error::{Result, SmsError};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub parent_id: String,
    pub space_id: String,
    #[serde(default)]
    pub body: PageBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageBody {
    #[serde(default)]
    pub storage: Option<StorageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageBody {
    pub value: String,
    pub representation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopiedPage {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PageResults {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    http: Client,
    base_url: String,
    user: String,
    token: String,
}

impl ConfluenceClient {
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.user, Some(&self.token))
    }

    fn check(response: Response, context: &str) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(SmsError::UnexpectedStatus {
                status: response.status().as_u16(),
                context: context.to_string(),
            })
        }
    }

    /// Find a page by exact title with its storage-format body. Only results
    /// that carry an id, a parent and a space count; stubs without a parent
    /// (space homepages mid-move, drafts) are skipped.
    pub fn find_page(&self, title: &str) -> Result<Option<Page>> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let response = self
            .authed(self.http.get(format!("{}/wiki/api/v2/pages", self.base_url)))
            .query(&[("body-format", "storage"), ("title", title)])
            .send()?;
        let response = Self::check(response, &format!("GET pages title={title}"))?;
        let results: PageResults = response.json()?;
        for value in results.results {
            if let Ok(page) = serde_json::from_value::<Page>(value) {
                return Ok(Some(page));
            }
        }
        Ok(None)
    }

    /// Copy `source` under `parent_id` with a new title. The body is taken
    /// from `source` as passed in, so callers can rewrite template
    /// placeholders first. Attachments, permissions and labels are not
    /// copied; properties and custom contents are.
    pub fn copy_page(&self, source: &Page, parent_id: &str, title: &str) -> Result<CopiedPage> {
        let storage = source
            .body
            .storage
            .as_ref()
            .ok_or(SmsError::PageNotFound(format!("page {} has no body", source.id)))?;
        let response = self
            .authed(self.http.post(format!(
                "{}/wiki/rest/api/content/{}/copy",
                self.base_url, source.id
            )))
            .json(&json!({
                "destination": { "type": "parent_page", "value": parent_id },
                "pageTitle": title,
                "copyAttachments": false,
                "copyPermissions": false,
                "copyProperties": true,
                "copyLabels": false,
                "copyCustomContents": true,
                "body": {
                    "storage": {
                        "value": storage.value,
                        "representation": storage.representation,
                    }
                }
            }))
            .send()?;
        let response = Self::check(response, &format!("POST content/{}/copy", source.id))?;
        Ok(response.json()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
