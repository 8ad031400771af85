//! Blocking HTTP implementation of the remote façade.

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::VtError;
use crate::item::ItemType;

use super::{Branch, Item, ItemUpdate, NewItem, NewVal, Remote, User, Val};

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.val.town";

/// Page size used when draining paginated listings.
const PAGE_LIMIT: usize = 100;

/// Paginated response envelope.
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

/// The Val Town HTTP client.
///
/// Listings are memoized per `(val, branch, version)`: the triple names an
/// immutable snapshot, so a cached answer stays correct for the lifetime
/// of the process.
pub struct Api {
    http: Client,
    base_url: String,
    token: String,
    listings: Mutex<HashMap<(String, String, u64), Vec<Item>>>,
}

impl Api {
    /// Build a client for the production endpoint.
    pub fn new(token: impl Into<String>) -> Result<Self, VtError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Build a client against a custom endpoint (used by tests and
    /// self-hosted deployments).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, VtError> {
        let token = token.into();
        if token.is_empty() {
            return Err(VtError::Auth);
        }
        let http = Client::builder()
            .user_agent(concat!("vt/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            listings: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Normalize an HTTP status into the structured error taxonomy.
    ///
    /// `what` names the addressed thing for NotFound/AlreadyExists
    /// messages ("Val 'x/y'", "Branch 'main'", an item path).
    fn check(&self, resp: Response, what: &str) -> Result<Response, VtError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        log::debug!("remote call failed: {status} on {what}: {body}");
        match status {
            StatusCode::NOT_FOUND => Err(VtError::not_found(what)),
            StatusCode::CONFLICT => Err(VtError::already_exists(what)),
            StatusCode::UNAUTHORIZED => Err(VtError::Auth),
            _ => Err(VtError::Transport {
                status: Some(status.as_u16()),
                msg: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            }),
        }
    }

    fn get(&self, path: &str, query: &[(&str, String)], what: &str) -> Result<Response, VtError> {
        log::debug!("GET {path}");
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .send()?;
        self.check(resp, what)
    }

    fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: &Value,
        what: &str,
    ) -> Result<Response, VtError> {
        log::debug!("{method} {path}");
        let resp = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .query(query)
            .json(body)
            .send()?;
        self.check(resp, what)
    }

    /// Drain every page of a listing endpoint.
    fn get_all<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        what: &str,
    ) -> Result<Vec<T>, VtError> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            query.retain(|(k, _)| *k != "limit" && *k != "offset");
            query.push(("limit", PAGE_LIMIT.to_string()));
            query.push(("offset", offset.to_string()));
            let page: Page<T> = self.get(path, &query, what)?.json()?;
            let n = page.data.len();
            out.extend(page.data);
            if n < PAGE_LIMIT {
                return Ok(out);
            }
            offset += n;
        }
    }
}

impl Remote for Api {
    fn list_items(
        &self,
        val_id: &str,
        branch_id: &str,
        version: u64,
    ) -> Result<Vec<Item>, VtError> {
        let key = (val_id.to_string(), branch_id.to_string(), version);
        if let Some(cached) = self.listings.lock().expect("listing cache").get(&key) {
            return Ok(cached.clone());
        }

        let items: Vec<Item> = self.get_all(
            &format!("/v2/vals/{val_id}/branches/{branch_id}/files"),
            vec![
                ("path", String::new()),
                ("recursive", "true".to_string()),
                ("version", version.to_string()),
            ],
            &format!("Version {version}"),
        )?;

        self.listings
            .lock()
            .expect("listing cache")
            .insert(key, items.clone());
        Ok(items)
    }

    fn fetch_content(
        &self,
        val_id: &str,
        path: &str,
        branch_id: &str,
        version: u64,
    ) -> Result<Vec<u8>, VtError> {
        let resp = self.get(
            &format!("/v2/vals/{val_id}/branches/{branch_id}/files/content"),
            &[
                ("path", path.to_string()),
                ("version", version.to_string()),
            ],
            path,
        )?;
        Ok(resp.bytes()?.to_vec())
    }

    fn create_item(&self, val_id: &str, new: &NewItem) -> Result<Item, VtError> {
        let mut body = Map::new();
        body.insert("type".to_string(), json!(new.kind));
        if new.kind != ItemType::Directory {
            body.insert("content".to_string(), json!(new.content.as_deref().unwrap_or("")));
        }
        let resp = self.send_json(
            reqwest::Method::POST,
            &format!("/v2/vals/{val_id}/branches/{}/files", new.branch_id),
            &[("path", new.path.clone())],
            &Value::Object(body),
            &new.path,
        )?;
        Ok(resp.json()?)
    }

    fn update_item(&self, val_id: &str, update: &ItemUpdate) -> Result<Item, VtError> {
        let mut body = Map::new();
        if let Some(content) = &update.content {
            body.insert("content".to_string(), json!(content));
        }
        if let Some(name) = &update.new_name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(parent) = &update.new_parent_id {
            // Explicit null moves the item to the val root
            body.insert("parentId".to_string(), json!(parent));
        }
        let resp = self.send_json(
            reqwest::Method::PATCH,
            &format!("/v2/vals/{val_id}/branches/{}/files", update.branch_id),
            &[("path", update.path.clone())],
            &Value::Object(body),
            &update.path,
        )?;
        Ok(resp.json()?)
    }

    fn delete_item(
        &self,
        val_id: &str,
        path: &str,
        branch_id: &str,
        recursive: bool,
    ) -> Result<(), VtError> {
        log::debug!("DELETE {path}");
        let resp = self
            .http
            .delete(self.url(&format!("/v2/vals/{val_id}/branches/{branch_id}/files")))
            .bearer_auth(&self.token)
            .query(&[
                ("path", path.to_string()),
                ("recursive", recursive.to_string()),
            ])
            .send()?;
        self.check(resp, path)?;
        Ok(())
    }

    fn list_branches(&self, val_id: &str) -> Result<Vec<Branch>, VtError> {
        self.get_all(
            &format!("/v2/vals/{val_id}/branches"),
            Vec::new(),
            &format!("Val {val_id}"),
        )
    }

    fn create_branch(
        &self,
        val_id: &str,
        from_branch_id: &str,
        name: &str,
    ) -> Result<Branch, VtError> {
        let resp = self.send_json(
            reqwest::Method::POST,
            &format!("/v2/vals/{val_id}/branches"),
            &[],
            &json!({ "name": name, "branchId": from_branch_id }),
            &format!("Branch '{name}'"),
        )?;
        Ok(resp.json()?)
    }

    fn latest_version(&self, val_id: &str, branch_id: &str) -> Result<u64, VtError> {
        let branch: Branch = self
            .get(
                &format!("/v2/vals/{val_id}/branches/{branch_id}"),
                &[],
                &format!("Branch {branch_id}"),
            )?
            .json()?;
        Ok(branch.version)
    }

    fn create_val(&self, new: &NewVal) -> Result<Val, VtError> {
        let mut body = Map::new();
        body.insert("name".to_string(), json!(new.name));
        body.insert("privacy".to_string(), json!(new.privacy));
        if let Some(description) = &new.description {
            body.insert("description".to_string(), json!(description));
        }
        if let Some(org_id) = &new.org_id {
            body.insert("orgId".to_string(), json!(org_id));
        }
        let resp = self.send_json(
            reqwest::Method::POST,
            "/v2/vals",
            &[],
            &Value::Object(body),
            &format!("Val '{}'", new.name),
        )?;
        Ok(resp.json()?)
    }

    fn delete_val(&self, val_id: &str) -> Result<(), VtError> {
        log::debug!("DELETE /v2/vals/{val_id}");
        let resp = self
            .http
            .delete(self.url(&format!("/v2/vals/{val_id}")))
            .bearer_auth(&self.token)
            .send()?;
        self.check(resp, &format!("Val {val_id}"))?;
        Ok(())
    }

    fn get_val(&self, val_id: &str) -> Result<Val, VtError> {
        Ok(self
            .get(&format!("/v2/vals/{val_id}"), &[], &format!("Val {val_id}"))?
            .json()?)
    }

    fn resolve_val(&self, owner: &str, name: &str) -> Result<Val, VtError> {
        Ok(self
            .get(
                &format!("/v2/alias/vals/{owner}/{name}"),
                &[],
                &format!("Val '{owner}/{name}'"),
            )?
            .json()?)
    }

    fn current_user(&self) -> Result<User, VtError> {
        Ok(self.get("/v2/me", &[], "Current user")?.json()?)
    }
}
