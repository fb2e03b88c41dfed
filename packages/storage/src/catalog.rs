//! Domain and fact catalog, including JSON domain files.
//!
//! A domain file looks like:
//!
//! ```json
//! {
//!   "domain_name": "Greek Muses",
//!   "fields": ["name", "domain", "symbol"],
//!   "facts": [{ "name": "Calliope", "domain": "Epic poetry", "symbol": "Writing tablet" }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rememberizer_engine::{Domain, DomainId, Fact};

use crate::models::{domain_from_row, fact_from_row, format_datetime};
use crate::{lock, StorageError, StorageResult};

/// Parsed and validated domain file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainFile {
    pub domain_name: String,
    pub fields: Vec<String>,
    pub facts: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct RawDomainFile {
    domain_name: Option<String>,
    fields: Option<Vec<String>>,
    facts: Option<Vec<Value>>,
}

impl DomainFile {
    pub fn from_json_str(raw: &str) -> StorageResult<Self> {
        let parsed: RawDomainFile = serde_json::from_str(raw)
            .map_err(|e| StorageError::InvalidDomain(format!("invalid JSON: {e}")))?;

        let missing: Vec<&str> = [
            ("domain_name", parsed.domain_name.is_none()),
            ("fields", parsed.fields.is_none()),
            ("facts", parsed.facts.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| key)
        .collect();
        if !missing.is_empty() {
            return Err(StorageError::InvalidDomain(format!(
                "missing required keys: {}",
                missing.join(", ")
            )));
        }

        let domain_name = parsed.domain_name.unwrap_or_default().trim().to_string();
        let fields = parsed.fields.unwrap_or_default();
        let raw_facts = parsed.facts.unwrap_or_default();

        if domain_name.is_empty() {
            return Err(StorageError::InvalidDomain("domain_name is empty".to_string()));
        }
        if fields.is_empty() {
            return Err(StorageError::InvalidDomain("'fields' must be a non-empty list".to_string()));
        }
        let mut seen = Vec::with_capacity(fields.len());
        for field in &fields {
            if field.trim().is_empty() || seen.contains(&field) {
                return Err(StorageError::InvalidDomain(format!(
                    "field names must be unique and non-empty, got '{field}'"
                )));
            }
            seen.push(field);
        }

        let mut facts = Vec::with_capacity(raw_facts.len());
        for (index, raw_fact) in raw_facts.into_iter().enumerate() {
            let Value::Object(object) = raw_fact else {
                return Err(StorageError::InvalidDomain(format!("fact {index} must be an object")));
            };
            let missing: Vec<&str> = fields
                .iter()
                .filter(|f| !object.contains_key(f.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(StorageError::InvalidDomain(format!(
                    "fact {index} is missing fields: {}",
                    missing.join(", ")
                )));
            }

            let mut values = BTreeMap::new();
            for field in &fields {
                let value = match &object[field.as_str()] {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(StorageError::InvalidDomain(format!(
                            "fact {index} field '{field}' has unsupported value {other}"
                        )))
                    }
                };
                values.insert(field.clone(), value);
            }
            facts.push(values);
        }

        Ok(Self {
            domain_name,
            fields,
            facts,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidDomain(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub id: DomainId,
    pub name: String,
    pub fields: Vec<String>,
    pub fact_count: usize,
}

pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    // ========== Queries ==========

    pub fn get_domain(&self, domain_id: DomainId) -> StorageResult<Option<Domain>> {
        let conn = lock(&self.conn)?;
        let domain = conn
            .query_row(
                "SELECT id, name, fields FROM domain WHERE id = ?1",
                params![domain_id],
                domain_from_row,
            )
            .optional()?;
        Ok(domain)
    }

    pub fn find_domain_by_name(&self, name: &str) -> StorageResult<Option<Domain>> {
        let conn = lock(&self.conn)?;
        let domain = conn
            .query_row(
                "SELECT id, name, fields FROM domain WHERE name = ?1",
                params![name],
                domain_from_row,
            )
            .optional()?;
        Ok(domain)
    }

    pub fn list_domains(&self) -> StorageResult<Vec<DomainSummary>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT d.id, d.name, d.fields, COUNT(f.id) AS fact_count
            FROM domain d
            LEFT JOIN fact f ON f.domain_id = d.id
            GROUP BY d.id
            ORDER BY d.name
            "#,
        )?;
        let summaries = stmt
            .query_map([], |row| {
                let domain = domain_from_row(row)?;
                Ok(DomainSummary {
                    id: domain.id,
                    name: domain.name,
                    fields: domain.fields,
                    fact_count: row.get::<_, i64>("fact_count")? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    /// Facts of a domain, ordered by id.
    pub fn facts(&self, domain_id: DomainId) -> StorageResult<Vec<Fact>> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT id, domain_id, data FROM fact WHERE domain_id = ?1 ORDER BY id")?;
        let facts = stmt
            .query_map(params![domain_id], fact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    // ========== Writes ==========

    /// Inserts a domain and its facts in one transaction.
    pub fn create_domain(
        &self,
        name: &str,
        fields: &[String],
        facts: &[BTreeMap<String, String>],
    ) -> StorageResult<DomainId> {
        self.insert_domain(name, fields, facts, None)
    }

    pub fn import(&self, file: &DomainFile, source_file: Option<&str>) -> StorageResult<DomainId> {
        let domain_id = self.insert_domain(&file.domain_name, &file.fields, &file.facts, source_file)?;
        tracing::info!(
            domain_id,
            name = %file.domain_name,
            facts = file.facts.len(),
            "domain imported"
        );
        Ok(domain_id)
    }

    pub fn import_file<P: AsRef<Path>>(&self, path: P) -> StorageResult<DomainId> {
        let path = path.as_ref();
        let file = DomainFile::load(path)?;
        let source = path.file_name().map(|n| n.to_string_lossy().to_string());
        self.import(&file, source.as_deref())
    }

    fn insert_domain(
        &self,
        name: &str,
        fields: &[String],
        facts: &[BTreeMap<String, String>],
        source_file: Option<&str>,
    ) -> StorageResult<DomainId> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM domain WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_some() {
            return Err(StorageError::DuplicateDomain(name.to_string()));
        }

        tx.execute(
            "INSERT INTO domain (name, fields, source_file, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                name,
                serde_json::to_string(fields)?,
                source_file,
                format_datetime(Utc::now())
            ],
        )?;
        let domain_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare("INSERT INTO fact (domain_id, data) VALUES (?1, ?2)")?;
            for values in facts {
                stmt.execute(params![domain_id, serde_json::to_string(values)?])?;
            }
        }
        tx.commit()?;
        Ok(domain_id)
    }
}
