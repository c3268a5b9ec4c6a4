//! Core domain types for the nlq pipeline.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use ulid::Ulid;

/// Knowledge collection a document belongs to.
///
/// The three collections are retrieved independently and fused per
/// collection, so the tag travels with every document and result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionTag {
    /// Business terminology: term -> database field mappings.
    Terminology,
    /// Prior question -> SQL statement pairs.
    SqlExample,
    /// Free-form domain knowledge.
    Knowledge,
}

impl CollectionTag {
    /// All collections, in retrieval order.
    pub const ALL: [CollectionTag; 3] = [
        CollectionTag::Terminology,
        CollectionTag::SqlExample,
        CollectionTag::Knowledge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminology => "terminology",
            Self::SqlExample => "sql_example",
            Self::Knowledge => "knowledge",
        }
    }
}

impl std::fmt::Display for CollectionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of retrievable knowledge.
///
/// Immutable once indexed; collections are replaced wholesale on re-sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Collection this document belongs to.
    pub collection: CollectionTag,

    /// Text content fed to indexing and prompts.
    pub content: String,

    /// Structured metadata (e.g. business_term -> db_field mapping,
    /// or question -> sql_statement pair).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Blake3 hash of content, used for cross-collection deduplication.
    #[serde(with = "serde_bytes_opt")]
    pub content_hash: Option<[u8; 32]>,

    /// Embedding vector (computed at sync time, absent when the
    /// embedder is unavailable).
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a new document with a fresh id and content hash.
    pub fn new(collection: CollectionTag, content: &str) -> Self {
        let content_hash = blake3::hash(content.as_bytes());
        Self {
            id: Ulid::new(),
            collection,
            content: content.to_string(),
            metadata: HashMap::new(),
            content_hash: Some(*content_hash.as_bytes()),
            embedding: None,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Hash used by the context merger for near-duplicate elimination.
    pub fn dedup_hash(&self) -> [u8; 32] {
        self.content_hash
            .unwrap_or_else(|| *blake3::hash(self.content.as_bytes()).as_bytes())
    }
}

/// A document with its fused relevance score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// Fused score in [0, 1].
    pub score: f32,
}

/// Ranked retrieval output for one collection. Ephemeral, recomputed
/// per query.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub collection: CollectionTag,
    pub hits: Vec<ScoredDocument>,
}

impl RetrievalResult {
    /// The degraded-empty result used when a retrieval task fails or
    /// times out.
    pub fn empty(collection: CollectionTag) -> Self {
        Self {
            collection,
            hits: Vec::new(),
        }
    }
}

/// A column in an introspected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
}

/// A foreign-key edge. `ref_table` always names a table present in the
/// same SchemaInfo snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// An introspected table with bounded sample rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub sample_rows: Vec<Vec<serde_json::Value>>,
}

/// Relational metadata snapshot for one (data source, table filter)
/// request. Built on demand, cached with a TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub tables: Vec<Table>,
}

impl SchemaInfo {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Whether any table in the snapshot has the given column.
    pub fn contains_column(&self, name: &str) -> bool {
        self.tables
            .iter()
            .any(|t| t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Lowercased set of every table and column name, used by the
    /// safety validator's identifier check.
    pub fn identifier_set(&self) -> HashSet<String> {
        let mut set = HashSet::new();
        for table in &self.tables {
            set.insert(table.name.to_lowercase());
            for column in &table.columns {
                set.insert(column.name.to_lowercase());
            }
        }
        set
    }

    /// Drop foreign keys pointing at tables outside this snapshot.
    ///
    /// Invariant: after this call, every `ref_table` resolves.
    pub fn prune_dangling_foreign_keys(&mut self) {
        let names: HashSet<String> = self.tables.iter().map(|t| t.name.to_lowercase()).collect();
        for table in &mut self.tables {
            table
                .foreign_keys
                .retain(|fk| names.contains(&fk.ref_table.to_lowercase()));
        }
    }

    /// Cap sample rows per table.
    pub fn truncate_samples(&mut self, cap: usize) {
        for table in &mut self.tables {
            table.sample_rows.truncate(cap);
        }
    }

    /// Render the snapshot as prompt text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let _ = writeln!(out, "TABLE {}", table.name);
            for column in &table.columns {
                let mut line = format!("  {} {}", column.name, column.data_type);
                if !column.nullable {
                    line.push_str(" NOT NULL");
                }
                if table.primary_key.iter().any(|pk| pk == &column.name) {
                    line.push_str(" PRIMARY KEY");
                }
                if let Some(comment) = &column.comment {
                    let _ = write!(line, " -- {}", comment);
                }
                let _ = writeln!(out, "{}", line);
            }
            for fk in &table.foreign_keys {
                let _ = writeln!(
                    out,
                    "  FOREIGN KEY {} REFERENCES {}({})",
                    fk.column, fk.ref_table, fk.ref_column
                );
            }
            if !table.sample_rows.is_empty() {
                let _ = writeln!(out, "  SAMPLE ROWS:");
                for row in &table.sample_rows {
                    let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                    let _ = writeln!(out, "    ({})", cells.join(", "));
                }
            }
        }
        out
    }
}

/// A SQL statement extracted from a model response, with the named
/// parameters it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSql {
    pub sql: String,
    /// Named parameters (`:name`) in order of first appearance.
    pub params: Vec<String>,
}

/// Result of executing validated SQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Set when the row cap cut the result short.
    pub truncated: bool,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Visualization type chosen for a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    SingleValue,
    Bar,
    Line,
    Scatter,
    Table,
}

/// Chart specification emitted alongside the result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Column plotted on the x axis (category or time).
    pub x: Option<String>,
    /// Column plotted on the y axis (value).
    pub y: Option<String>,
}

impl ChartSpec {
    /// The universal fallback: render as a table.
    pub fn table() -> Self {
        Self {
            kind: ChartKind::Table,
            x: None,
            y: None,
        }
    }
}

/// Helper module for optional byte array serialization.
mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => {
                let hex = hex::encode(bytes);
                hex.serialize(serializer)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(hex) => {
                let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("invalid hash length"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> SchemaInfo {
        SchemaInfo {
            tables: vec![Table {
                name: "orders".to_string(),
                columns: vec![
                    Column {
                        name: "order_date".to_string(),
                        data_type: "date".to_string(),
                        nullable: false,
                        default: None,
                        comment: None,
                    },
                    Column {
                        name: "amount".to_string(),
                        data_type: "numeric".to_string(),
                        nullable: false,
                        default: None,
                        comment: Some("order total".to_string()),
                    },
                ],
                primary_key: vec![],
                indexes: vec![],
                foreign_keys: vec![ForeignKey {
                    column: "customer_id".to_string(),
                    ref_table: "customers".to_string(),
                    ref_column: "id".to_string(),
                }],
                sample_rows: vec![vec![json!("2024-01-03"), json!(19.99)]],
            }],
        }
    }

    #[test]
    fn test_document_hash() {
        let a = Document::new(CollectionTag::Terminology, "revenue maps to orders.amount");
        let b = Document::new(CollectionTag::Knowledge, "revenue maps to orders.amount");
        // Same content, different collection: same dedup hash, different id.
        assert_eq!(a.dedup_hash(), b.dedup_hash());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_identifier_set_is_case_insensitive() {
        let schema = sample_schema();
        let ids = schema.identifier_set();
        assert!(ids.contains("orders"));
        assert!(ids.contains("amount"));
        assert!(schema.contains_table("ORDERS"));
        assert!(schema.contains_column("Amount"));
        assert!(!schema.contains_column("cust_name"));
    }

    #[test]
    fn test_prune_dangling_foreign_keys() {
        let mut schema = sample_schema();
        // customers is not in the snapshot, so the FK must go.
        schema.prune_dangling_foreign_keys();
        assert!(schema.tables[0].foreign_keys.is_empty());
    }

    #[test]
    fn test_render_includes_samples() {
        let schema = sample_schema();
        let text = schema.render();
        assert!(text.contains("TABLE orders"));
        assert!(text.contains("amount numeric"));
        assert!(text.contains("19.99"));
    }

    #[test]
    fn test_collection_tag_roundtrip() {
        let tag: CollectionTag = serde_json::from_str("\"sql_example\"").unwrap();
        assert_eq!(tag, CollectionTag::SqlExample);
        assert_eq!(tag.to_string(), "sql_example");
    }
}
