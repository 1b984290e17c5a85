use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

/// A single row returned by a category endpoint.
pub type Record = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(usize);

impl CategoryId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub icon: String,
    pub label: String,
}

impl Category {
    pub fn new(icon: &str, label: &str) -> Self {
        Self {
            icon: icon.to_string(),
            label: label.to_string(),
        }
    }

    pub fn title(&self) -> String {
        if self.icon.is_empty() {
            self.label.clone()
        } else {
            format!("{} {}", self.icon, self.label)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extractor {
    Field(String),
}

impl Extractor {
    /// Best-effort projection of a record to a cell; absent fields are empty.
    pub fn extract(&self, record: &Record) -> String {
        match self {
            Extractor::Field(name) => record.get(name).map(display_value).unwrap_or_default(),
        }
    }
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub header: String,
    pub extractor: Extractor,
}

impl Column {
    pub fn field(header: &str, field: &str) -> Self {
        Self {
            header: header.to_string(),
            extractor: Extractor::Field(field.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowKey {
    Identity(String),
    Position(usize),
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Identity(v) => write!(f, "id:{v}"),
            RowKey::Position(i) => write!(f, "row:{i}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub columns: Vec<Column>,
    pub identity_field: Option<String>,
}

impl ColumnSchema {
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.header.as_str())
    }

    pub fn cells(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.extractor.extract(record))
            .collect()
    }

    pub fn row_key(&self, record: &Record, position: usize) -> RowKey {
        let identity = self
            .identity_field
            .as_deref()
            .and_then(|field| record.get(field))
            .filter(|v| !v.is_null())
            .map(display_value);
        match identity {
            Some(v) => RowKey::Identity(v),
            None => RowKey::Position(position),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryEntry {
    pub category: Category,
    pub endpoint: String,
    pub schema: ColumnSchema,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no categories configured")]
    Empty,

    #[error("category #{position} has an empty label")]
    EmptyLabel { position: usize },

    #[error("duplicate category label: {label}")]
    DuplicateLabel { label: String },

    #[error("category '{label}' has an empty endpoint")]
    EmptyEndpoint { label: String },

    #[error("category '{label}' has no columns")]
    NoColumns { label: String },
}

/// Ordered, immutable set of categories. The first entry is the default tab.
#[derive(Clone, Debug)]
pub struct Registry {
    entries: Vec<CategoryEntry>,
}

impl Registry {
    pub fn new(entries: Vec<CategoryEntry>) -> Result<Self, RegistryError> {
        if entries.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for (i, e) in entries.iter().enumerate() {
            let label = normalize_label(&e.category.label);
            if label.is_empty() {
                return Err(RegistryError::EmptyLabel { position: i + 1 });
            }
            if !seen.insert(label) {
                return Err(RegistryError::DuplicateLabel {
                    label: e.category.label.clone(),
                });
            }
            if e.endpoint.trim().is_empty() {
                return Err(RegistryError::EmptyEndpoint {
                    label: e.category.label.clone(),
                });
            }
            if e.schema.columns.is_empty() {
                return Err(RegistryError::NoColumns {
                    label: e.category.label.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn default_id(&self) -> CategoryId {
        CategoryId(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CategoryId> {
        (0..self.entries.len()).map(CategoryId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &CategoryEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (CategoryId(i), e))
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        id.0 < self.entries.len()
    }

    /// Panics on an id that was not issued by this registry.
    pub fn entry(&self, id: CategoryId) -> &CategoryEntry {
        match self.entries.get(id.0) {
            Some(entry) => entry,
            None => panic!(
                "category {:?} is not registered ({} categories)",
                id,
                self.entries.len()
            ),
        }
    }

    pub fn endpoint(&self, id: CategoryId) -> &str {
        &self.entry(id).endpoint
    }

    pub fn schema(&self, id: CategoryId) -> &ColumnSchema {
        &self.entry(id).schema
    }

    pub fn category(&self, id: CategoryId) -> &Category {
        &self.entry(id).category
    }

    pub fn find(&self, label: &str) -> Option<CategoryId> {
        let wanted = normalize_label(label);
        self.entries
            .iter()
            .position(|e| normalize_label(&e.category.label) == wanted)
            .map(CategoryId)
    }

    /// Accepts either a label or a 1-based position. A label wins over a
    /// position when both could match.
    pub fn resolve(&self, token: &str) -> Option<CategoryId> {
        if let Some(id) = self.find(token) {
            return Some(id);
        }
        if let Ok(n) = token.trim().parse::<usize>() {
            if n >= 1 && n <= self.entries.len() {
                return Some(CategoryId(n - 1));
            }
        }
        None
    }
}

/// Labels are unique and matched ignoring case and surrounding whitespace.
fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            entries: default_entries(),
        }
    }
}

fn default_entries() -> Vec<CategoryEntry> {
    vec![
        CategoryEntry {
            category: Category::new("🍅", "Transactions"),
            endpoint: "/data-api/rest/Transaction".to_string(),
            schema: ColumnSchema {
                columns: vec![
                    Column::field("ID", "Transaction_ID"),
                    Column::field("ProductID", "Product_ID"),
                    Column::field("CustomerID", "Customer_ID"),
                    Column::field("CategoryName", "Product_Category"),
                    Column::field("Quantity", "Quantity"),
                    Column::field("UnitPrice", "Sales_Amount"),
                    Column::field("TotalPrice", "Total_price"),
                    Column::field("Date", "Transaction_Date"),
                    Column::field("GrandTotal", "Unit_Price"),
                ],
                identity_field: Some("Transaction_ID".to_string()),
            },
        },
        CategoryEntry {
            category: Category::new("🥬", "Employees"),
            endpoint: "/data-api/rest/Employees".to_string(),
            schema: ColumnSchema {
                columns: vec![
                    Column::field("EmployeeID", "employee_id"),
                    Column::field("FirstName", "first_name"),
                    Column::field("LastName", "last_name"),
                    Column::field("JobTitle", "job_title"),
                    Column::field("HireDate", "hire_date"),
                    Column::field("Salary", "salary"),
                ],
                identity_field: Some("employee_id".to_string()),
            },
        },
    ]
}
