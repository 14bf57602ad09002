//! In-memory stand-in for a KV v2 mount, speaking the same logical paths and
//! response shapes as a Vault server. Suitable for embedded usage and tests.

use keymanager_spec::Tags;
use keymanager_spec::vendor::{HttpError, KvClient};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Default)]
pub struct MemoryKvClient {
    state: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryKvClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct Entry {
    versions: Vec<Version>,
    custom_metadata: Tags,
    created: Option<OffsetDateTime>,
    updated: Option<OffsetDateTime>,
}

struct Version {
    data: Option<Value>,
    created: OffsetDateTime,
    deleted: Option<OffsetDateTime>,
    destroyed: bool,
}

enum Section {
    Data,
    Metadata,
    Undelete,
    Destroy,
}

/// Splits `<mount>/<section>/<id>[?version=n]` into its parts.
fn parse(path: &str) -> Result<(Section, String, Option<u64>), HttpError> {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };
    let mut parts = path.trim_matches('/').splitn(3, '/');
    let mount = parts.next().unwrap_or_default();
    let section = match parts.next() {
        Some("data") => Section::Data,
        Some("metadata") => Section::Metadata,
        Some("undelete") => Section::Undelete,
        Some("destroy") => Section::Destroy,
        _ => return Err(HttpError::new(404, format!("no handler for route '{path}'"))),
    };
    let id = parts.next().unwrap_or_default();
    let version = query
        .and_then(|q| q.strip_prefix("version="))
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| HttpError::new(400, format!("invalid version '{v}'")))
        })
        .transpose()?;
    Ok((section, format!("{mount}/{id}"), version))
}

fn timestamp(at: Option<OffsetDateTime>) -> String {
    at.and_then(|at| at.format(&Rfc3339).ok()).unwrap_or_default()
}

fn version_metadata(number: usize, version: &Version, tags: &Tags) -> Value {
    json!({
        "version": number,
        "created_time": timestamp(Some(version.created)),
        "deletion_time": timestamp(version.deleted),
        "destroyed": version.destroyed,
        "custom_metadata": tags,
    })
}

fn requested_versions(data: &Value) -> Vec<usize> {
    data.get("versions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .map(|v| v as usize)
                .collect()
        })
        .unwrap_or_default()
}

impl KvClient for MemoryKvClient {
    fn read(&self, path: &str) -> Result<Option<Value>, HttpError> {
        let (section, key, version) = parse(path)?;
        let state = self.state.lock();
        let Some(entry) = state.get(&key) else {
            return Ok(None);
        };
        match section {
            Section::Data => {
                let number = version.map(|v| v as usize).unwrap_or(entry.versions.len());
                let Some(found) = number.checked_sub(1).and_then(|i| entry.versions.get(i)) else {
                    return Ok(None);
                };
                let data = match (&found.data, found.deleted, found.destroyed) {
                    (Some(data), None, false) => data.clone(),
                    _ => Value::Null,
                };
                Ok(Some(json!({
                    "data": data,
                    "metadata": version_metadata(number, found, &entry.custom_metadata),
                })))
            }
            Section::Metadata => {
                let versions: Map<String, Value> = entry
                    .versions
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        (
                            (i + 1).to_string(),
                            json!({
                                "created_time": timestamp(Some(v.created)),
                                "deletion_time": timestamp(v.deleted),
                                "destroyed": v.destroyed,
                            }),
                        )
                    })
                    .collect();
                Ok(Some(json!({
                    "current_version": entry.versions.len(),
                    "created_time": timestamp(entry.created),
                    "updated_time": timestamp(entry.updated),
                    "custom_metadata": entry.custom_metadata,
                    "versions": versions,
                })))
            }
            Section::Undelete | Section::Destroy => Err(HttpError::new(405, "unsupported operation")),
        }
    }

    fn write(&self, path: &str, data: Value) -> Result<Option<Value>, HttpError> {
        let (section, key, _) = parse(path)?;
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.lock();
        match section {
            Section::Data => {
                let payload = data
                    .get("data")
                    .cloned()
                    .ok_or_else(|| HttpError::new(400, "no data provided"))?;
                let entry = state.entry(key).or_default();
                entry.created.get_or_insert(now);
                entry.updated = Some(now);
                entry.versions.push(Version {
                    data: Some(payload),
                    created: now,
                    deleted: None,
                    destroyed: false,
                });
                Ok(Some(json!({
                    "version": entry.versions.len(),
                    "created_time": timestamp(Some(now)),
                    "deletion_time": "",
                    "destroyed": false,
                })))
            }
            Section::Metadata => {
                let entry = state.entry(key).or_default();
                if let Some(custom) = data.get("custom_metadata") {
                    entry.custom_metadata = serde_json::from_value(custom.clone())
                        .map_err(|err| HttpError::new(400, err.to_string()))?;
                }
                entry.updated = Some(now);
                Ok(None)
            }
            Section::Undelete | Section::Destroy => {
                let entry = state
                    .get_mut(&key)
                    .ok_or_else(|| HttpError::new(404, format!("no secret at '{key}'")))?;
                for number in requested_versions(&data) {
                    let Some(version) = number.checked_sub(1).and_then(|i| entry.versions.get_mut(i)) else {
                        continue;
                    };
                    if matches!(section, Section::Undelete) {
                        version.deleted = None;
                    } else {
                        version.destroyed = true;
                        version.data = None;
                    }
                }
                entry.updated = Some(now);
                Ok(None)
            }
        }
    }

    fn list(&self, path: &str) -> Result<Vec<String>, HttpError> {
        let (_, prefix, _) = parse(path)?;
        let state = self.state.lock();
        Ok(state
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    fn delete(&self, path: &str) -> Result<(), HttpError> {
        let (section, key, _) = parse(path)?;
        let mut state = self.state.lock();
        match section {
            Section::Data => {
                if let Some(latest) = state.get_mut(&key).and_then(|e| e.versions.last_mut()) {
                    latest.deleted.get_or_insert_with(OffsetDateTime::now_utc);
                }
                Ok(())
            }
            Section::Metadata => {
                state.remove(&key);
                Ok(())
            }
            Section::Undelete | Section::Destroy => Err(HttpError::new(405, "unsupported operation")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_reports_deleted_version_without_data() {
        let kv = MemoryKvClient::new();
        kv.write("secret/data/a", json!({"data": {"value": "x"}})).unwrap();
        kv.delete("secret/data/a").unwrap();
        let read = kv.read("secret/data/a").unwrap().unwrap();
        assert!(read["data"].is_null());
        assert_ne!(read["metadata"]["deletion_time"], "");
    }

    #[test]
    fn list_is_scoped_to_mount() {
        let kv = MemoryKvClient::new();
        kv.write("secret/data/a", json!({"data": {}})).unwrap();
        kv.write("other/data/b", json!({"data": {}})).unwrap();
        assert_eq!(kv.list("secret/metadata/").unwrap(), vec!["a"]);
    }

    #[test]
    fn unknown_route_is_not_found() {
        let kv = MemoryKvClient::new();
        assert_eq!(kv.read("secret/config").unwrap_err().status, 404);
    }
}
