//! Multifactor trusted-device registry.
//!
//! Records never expire on their own; they disappear only when deleted.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parking_lot::RwLock;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sso_engine_sdk::TrustedDeviceRecord;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::info;

use crate::domain::clock::Clock;
use crate::domain::error::DomainError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Device fingerprint: SHA-256 over the device cookie and the user agent.
#[must_use]
pub fn fingerprint(device_id: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(device_id.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.as_bytes());
    hex::encode(hasher.finalize())
}

const NAME_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// `"<Browser> on <OS> <YYYY-MM-DD HH:MM> UTC #<6 hex>"`, where the hex
/// suffix is taken from the SHA-256 of the fingerprint.
pub fn auto_name(
    user_agent: Option<&str>,
    fingerprint: &str,
    at: OffsetDateTime,
) -> Result<String, DomainError> {
    let ua = user_agent.unwrap_or_default();
    let stamp = at
        .to_offset(UtcOffset::UTC)
        .format(NAME_TIMESTAMP)
        .map_err(|e| DomainError::internal(format!("format device name: {e}")))?;
    let digest = hex::encode(Sha256::digest(fingerprint.as_bytes()));
    Ok(format!(
        "{} on {} {stamp} UTC #{}",
        browser_of(ua),
        os_of(ua),
        &digest[..6]
    ))
}

fn browser_of(ua: &str) -> &'static str {
    if ua.contains("Edg/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") || ua.contains("HeadlessChrome") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Unknown browser"
    }
}

fn os_of(ua: &str) -> &'static str {
    if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        "iOS"
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        "macOS"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        "Unknown OS"
    }
}

/// Import shape: the exported record, with `recordDate` optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedRecord {
    id: u64,
    name: String,
    principal: String,
    fingerprint: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    record_date: Option<OffsetDateTime>,
}

pub struct TrustRegistry {
    records: RwLock<HashMap<u64, TrustedDeviceRecord>>,
    clock: Arc<dyn Clock>,
}

impl TrustRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Trust a device for a principal. Recording an already trusted
    /// device returns the existing record.
    ///
    /// Fails when the id space above the highest stored id is exhausted.
    #[tracing::instrument(skip_all, fields(principal = %principal))]
    pub fn record_trusted_device(
        &self,
        principal: &str,
        fingerprint: &str,
        requested_name: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<TrustedDeviceRecord, DomainError> {
        let now = self.clock.now();
        let mut records = self.records.write();

        if let Some(existing) = records
            .values()
            .find(|r| r.principal == principal && r.fingerprint == fingerprint)
        {
            return Ok(existing.clone());
        }

        let name = match requested_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_owned(),
            None => auto_name(user_agent, fingerprint, now)?,
        };
        let id = match records.keys().max() {
            None => 1,
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| DomainError::internal("trusted device ids exhausted"))?,
        };
        let record = TrustedDeviceRecord {
            id,
            name,
            principal: principal.to_owned(),
            fingerprint: fingerprint.to_owned(),
            record_date: now,
        };
        records.insert(id, record.clone());
        info!(id, name = %record.name, "Recorded trusted device");
        Ok(record)
    }

    #[must_use]
    pub fn is_trusted(&self, principal: &str, fingerprint: &str) -> bool {
        self.records
            .read()
            .values()
            .any(|r| r.principal == principal && r.fingerprint == fingerprint)
    }

    /// Records of one principal, oldest first.
    #[must_use]
    pub fn list_by_principal(&self, principal: &str) -> Vec<TrustedDeviceRecord> {
        let mut list: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.principal == principal)
            .cloned()
            .collect();
        sort(&mut list);
        list
    }

    #[must_use]
    pub fn list_all(&self) -> Vec<TrustedDeviceRecord> {
        let mut list: Vec<_> = self.records.read().values().cloned().collect();
        sort(&mut list);
        list
    }

    pub fn delete(&self, id: u64) -> Option<TrustedDeviceRecord> {
        let removed = self.records.write().remove(&id);
        if removed.is_some() {
            info!(id, "Deleted trusted device");
        }
        removed
    }

    /// Gzip-compressed JSON array of all records.
    pub fn export_all(&self) -> Result<Vec<u8>, DomainError> {
        let json = serde_json::to_vec(&self.list_all())
            .map_err(|e| DomainError::internal(format!("serialize trusted devices: {e}")))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| DomainError::internal(format!("compress trusted devices: {e}")))?;
        encoder
            .finish()
            .map_err(|e| DomainError::internal(format!("compress trusted devices: {e}")))
    }

    /// Import a JSON record or array, plain or gzip-compressed.
    ///
    /// The whole batch is validated before anything is stored; on any
    /// error the registry is left unchanged.
    #[tracing::instrument(skip_all, fields(bytes = payload.len()))]
    pub fn import_all(&self, payload: &[u8]) -> Result<Vec<TrustedDeviceRecord>, DomainError> {
        let batch = parse_import(payload)?;
        let now = self.clock.now();

        let mut seen = HashSet::new();
        let mut imported = Vec::with_capacity(batch.len());
        for rec in batch {
            if rec.name.trim().is_empty()
                || rec.principal.trim().is_empty()
                || rec.fingerprint.trim().is_empty()
            {
                return Err(DomainError::validation(format!(
                    "record {} has an empty name, principal or fingerprint",
                    rec.id
                )));
            }
            if !seen.insert(rec.id) {
                return Err(DomainError::validation(format!(
                    "duplicate record id {} in import",
                    rec.id
                )));
            }
            imported.push(TrustedDeviceRecord {
                id: rec.id,
                name: rec.name,
                principal: rec.principal,
                fingerprint: rec.fingerprint,
                record_date: rec.record_date.unwrap_or(now),
            });
        }

        let mut records = self.records.write();
        if let Some(clash) = imported.iter().find(|r| records.contains_key(&r.id)) {
            return Err(DomainError::validation(format!(
                "record id {} already exists",
                clash.id
            )));
        }
        for rec in &imported {
            records.insert(rec.id, rec.clone());
        }
        drop(records);

        info!(count = imported.len(), "Imported trusted devices");
        Ok(imported)
    }
}

fn sort(list: &mut [TrustedDeviceRecord]) {
    list.sort_by(|a, b| a.record_date.cmp(&b.record_date).then(a.id.cmp(&b.id)));
}

fn parse_import(payload: &[u8]) -> Result<Vec<ImportedRecord>, DomainError> {
    let decompressed;
    let json = if payload.starts_with(&GZIP_MAGIC) {
        let mut buf = Vec::new();
        GzDecoder::new(payload)
            .read_to_end(&mut buf)
            .map_err(|e| DomainError::validation(format!("invalid gzip payload: {e}")))?;
        decompressed = buf;
        decompressed.as_slice()
    } else {
        payload
    };

    let value: serde_json::Value = serde_json::from_slice(json)
        .map_err(|e| DomainError::validation(format!("invalid JSON payload: {e}")))?;
    let records: Vec<ImportedRecord> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        serde_json::Value::Object(_) => serde_json::from_value(value).map(|r| vec![r]),
        _ => {
            return Err(DomainError::validation(
                "expected a trusted device record or an array of records",
            ));
        }
    }
    .map_err(|e| DomainError::validation(format!("malformed trusted device record: {e}")))?;

    if records.is_empty() {
        return Err(DomainError::validation("import payload contains no records"));
    }
    Ok(records)
}
