//! Statement-to-privilege mapping.
//!
//! Each statement kind is an [`Operation`] variant carrying the objects it
//! touches. [`required_privileges`] turns an operation into an ordered
//! [`PrivilegeRequest`]; the match is exhaustive, so a new statement kind
//! cannot be added without deciding what it requires.
//!
//! # Example
//!
//! ```
//! use strata_authz::operation::{required_privileges, CatalogObject, MapperConfig, Operation};
//!
//! let op = Operation::Insert {
//!     target: CatalogObject::table("db1", "t2"),
//!     inputs: vec![CatalogObject::table("db1", "t1")],
//!     overwrite: true,
//! };
//! let request = required_privileges(&op, &MapperConfig::default());
//! assert_eq!(request.requirements.len(), 2);
//! assert_eq!(request.requirements[0].object, "db1.t2");
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{Action, Privilege, ScopePath, UriError, UriScope};
use crate::policy::engine::{PrivilegeRequest, RequiredPrivilege};

// =============================================================================
// Catalog Objects
// =============================================================================

/// Errors that can occur while parsing a catalog object name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid catalog object '{0}', expected db[.table[.column]]")]
pub struct InvalidCatalogObject(pub String);

/// A database, table (or view) or column named by a statement.
///
/// Written as `db`, `db.table` or `db.table.column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogObject {
    database: String,
    table: Option<String>,
    column: Option<String>,
}

impl CatalogObject {
    /// A database.
    #[must_use]
    pub fn database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: None,
            column: None,
        }
    }

    /// A table or view.
    #[must_use]
    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: Some(table.into()),
            column: None,
        }
    }

    /// A column.
    #[must_use]
    pub fn column(
        database: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: Some(table.into()),
            column: Some(column.into()),
        }
    }

    /// Parse `db[.table[.column]]`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCatalogObject`] for empty parts or more than three
    /// parts.
    pub fn parse(value: &str) -> Result<Self, InvalidCatalogObject> {
        let invalid = || InvalidCatalogObject(value.to_string());
        let parts: Vec<&str> = value.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [db] => Ok(Self::database(*db)),
            [db, table] => Ok(Self::table(*db, *table)),
            [db, table, column] => Ok(Self::column(*db, *table, *column)),
            _ => Err(invalid()),
        }
    }

    /// Name of the database the object lives in (or is).
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// The object's scope on `server`.
    #[must_use]
    pub fn scope(&self, server: &str) -> ScopePath {
        let mut path = self.database_scope(server);
        if let Some(table) = &self.table {
            path = path.table(table.as_str());
        }
        if let Some(column) = &self.column {
            path = path.column(column.as_str());
        }
        path
    }

    /// The scope of the owning database on `server`.
    #[must_use]
    pub fn database_scope(&self, server: &str) -> ScopePath {
        ScopePath::server(server).database(self.database.as_str())
    }
}

impl fmt::Display for CatalogObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.database)?;
        if let Some(table) = &self.table {
            write!(f, ".{table}")?;
        }
        if let Some(column) = &self.column {
            write!(f, ".{column}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for CatalogObject {
    type Err = InvalidCatalogObject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CatalogObject {
    type Error = InvalidCatalogObject;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CatalogObject> for String {
    fn from(value: CatalogObject) -> Self {
        value.to_string()
    }
}

/// Locations in operations accept absolute local paths as `file://`.
mod location {
    use super::*;

    pub fn parse(value: &str) -> Result<UriScope, UriError> {
        if value.trim_start().starts_with('/') {
            UriScope::local(value)
        } else {
            UriScope::parse(value)
        }
    }

    pub fn serialize<S: Serializer>(uri: &UriScope, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(uri.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UriScope, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse(&value).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            uri: &Option<UriScope>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match uri {
                Some(uri) => serializer.serialize_some(uri.as_str()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<UriScope>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|value| super::parse(&value).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

pub use location::parse as parse_location;

// =============================================================================
// Operations
// =============================================================================

/// Changes made by `ALTER TABLE` / `ALTER VIEW`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlterTableChange {
    /// `ADD COLUMNS`.
    AddColumns,
    /// `REPLACE COLUMNS`.
    ReplaceColumns,
    /// `CHANGE COLUMN`.
    ChangeColumn,
    /// `ADD PARTITION`, optionally at an explicit location.
    AddPartition {
        /// Explicit partition location.
        #[serde(default, with = "location::option", skip_serializing_if = "Option::is_none")]
        location: Option<UriScope>,
    },
    /// `DROP PARTITION`.
    DropPartition,
    /// `RENAME TO`.
    Rename {
        /// The new name.
        to: CatalogObject,
    },
    /// `SET TBLPROPERTIES` / `SET SERDEPROPERTIES`.
    SetProperties,
    /// `[PARTITION (...)] SET LOCATION`.
    SetLocation {
        /// The new location.
        #[serde(with = "location")]
        location: UriScope,
    },
}

/// Changes made by `ALTER DATABASE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlterDatabaseChange {
    /// `SET DBPROPERTIES`.
    SetProperties,
    /// `SET LOCATION`.
    SetLocation {
        /// The new location.
        #[serde(with = "location")]
        location: UriScope,
    },
}

/// A statement kind and the objects it touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// `SELECT`, including joins: reads every input.
    Query {
        /// Objects read.
        inputs: Vec<CatalogObject>,
    },
    /// `DESCRIBE`.
    Describe {
        /// The described object.
        object: CatalogObject,
    },
    /// `SHOW INDEXES ON`.
    ShowIndexes {
        /// The indexed table.
        table: CatalogObject,
    },
    /// `ANALYZE TABLE`.
    AnalyzeTable {
        /// The analyzed table.
        table: CatalogObject,
    },
    /// `EXPLAIN`: requires what the explained statement requires.
    Explain {
        /// The explained statement.
        operation: Box<Operation>,
    },
    /// `USE`.
    UseDatabase {
        /// The database switched to.
        database: String,
    },
    /// `SHOW TABLES`.
    ShowTables {
        /// The listed database.
        database: String,
    },
    /// `SHOW DATABASES`; results are filtered instead.
    ShowDatabases,
    /// `CREATE DATABASE`.
    CreateDatabase {
        /// The new database.
        database: String,
    },
    /// `DROP DATABASE`.
    DropDatabase {
        /// The dropped database.
        database: String,
    },
    /// `CREATE TABLE`.
    CreateTable {
        /// The new table.
        table: CatalogObject,
    },
    /// `CREATE VIEW ... AS SELECT`.
    CreateView {
        /// The new view.
        view: CatalogObject,
        /// Objects the view reads.
        inputs: Vec<CatalogObject>,
    },
    /// `CREATE INDEX`.
    CreateIndex {
        /// The indexed table.
        table: CatalogObject,
        /// Index handler class, if given.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        handler: Option<String>,
    },
    /// `DROP TABLE`.
    DropTable {
        /// The dropped table.
        table: CatalogObject,
    },
    /// `DROP VIEW`.
    DropView {
        /// The dropped view.
        view: CatalogObject,
    },
    /// `DROP INDEX`.
    DropIndex {
        /// The indexed table.
        table: CatalogObject,
    },
    /// `CREATE TABLE ... AS SELECT`.
    CreateTableAsSelect {
        /// The new table.
        table: CatalogObject,
        /// Objects the select reads.
        inputs: Vec<CatalogObject>,
    },
    /// `INSERT INTO` / `INSERT OVERWRITE TABLE`.
    Insert {
        /// The written table.
        target: CatalogObject,
        /// Objects the select reads.
        inputs: Vec<CatalogObject>,
        /// Whether existing data is replaced.
        #[serde(default)]
        overwrite: bool,
    },
    /// `LOAD DATA [LOCAL] INPATH`.
    LoadData {
        /// Location the data is read from.
        #[serde(with = "location")]
        source: UriScope,
        /// The written table.
        target: CatalogObject,
    },
    /// `INSERT OVERWRITE [LOCAL] DIRECTORY`.
    ExportDirectory {
        /// Objects the select reads.
        inputs: Vec<CatalogObject>,
        /// Location written to.
        #[serde(with = "location")]
        destination: UriScope,
    },
    /// `EXPORT TABLE ... TO`.
    ExportTable {
        /// The exported table.
        table: CatalogObject,
        /// Location written to.
        #[serde(with = "location")]
        destination: UriScope,
    },
    /// `IMPORT TABLE ... FROM`.
    ImportTable {
        /// The created table.
        target: CatalogObject,
        /// Location read from.
        #[serde(with = "location")]
        source: UriScope,
    },
    /// `ALTER TABLE` / `ALTER VIEW`.
    AlterTable {
        /// The altered table.
        table: CatalogObject,
        /// What changes.
        change: AlterTableChange,
    },
    /// `ALTER DATABASE`.
    AlterDatabase {
        /// The altered database.
        database: String,
        /// What changes.
        change: AlterDatabaseChange,
    },
    /// `CREATE EXTERNAL TABLE ... LOCATION`.
    CreateExternalTable {
        /// The new table.
        table: CatalogObject,
        /// Data location, if given.
        #[serde(default, with = "location::option", skip_serializing_if = "Option::is_none")]
        location: Option<UriScope>,
    },
    /// `ADD JAR` / `ADD FILE`.
    AddResource {
        /// The added resource.
        path: String,
    },
    /// `CREATE [TEMPORARY] FUNCTION`.
    CreateFunction {
        /// Function name.
        name: String,
        /// Implementing class.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
    },
    /// `TRANSFORM ... USING` script execution.
    Transform {
        /// Objects the select reads.
        inputs: Vec<CatalogObject>,
        /// The executed script.
        script: String,
    },
    /// `SHOW LOCKS`.
    ShowLocks,
    /// `LOCK TABLE`.
    LockTable {
        /// The locked table.
        table: CatalogObject,
    },
    /// `UNLOCK TABLE`.
    UnlockTable {
        /// The unlocked table.
        table: CatalogObject,
    },
}

impl Operation {
    /// Short name of the statement kind, for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query { .. } => "query",
            Self::Describe { .. } => "describe",
            Self::ShowIndexes { .. } => "show_indexes",
            Self::AnalyzeTable { .. } => "analyze_table",
            Self::Explain { .. } => "explain",
            Self::UseDatabase { .. } => "use_database",
            Self::ShowTables { .. } => "show_tables",
            Self::ShowDatabases => "show_databases",
            Self::CreateDatabase { .. } => "create_database",
            Self::DropDatabase { .. } => "drop_database",
            Self::CreateTable { .. } => "create_table",
            Self::CreateView { .. } => "create_view",
            Self::CreateIndex { .. } => "create_index",
            Self::DropTable { .. } => "drop_table",
            Self::DropView { .. } => "drop_view",
            Self::DropIndex { .. } => "drop_index",
            Self::CreateTableAsSelect { .. } => "create_table_as_select",
            Self::Insert { .. } => "insert",
            Self::LoadData { .. } => "load_data",
            Self::ExportDirectory { .. } => "export_directory",
            Self::ExportTable { .. } => "export_table",
            Self::ImportTable { .. } => "import_table",
            Self::AlterTable { .. } => "alter_table",
            Self::AlterDatabase { .. } => "alter_database",
            Self::CreateExternalTable { .. } => "create_external_table",
            Self::AddResource { .. } => "add_resource",
            Self::CreateFunction { .. } => "create_function",
            Self::Transform { .. } => "transform",
            Self::ShowLocks => "show_locks",
            Self::LockTable { .. } => "lock_table",
            Self::UnlockTable { .. } => "unlock_table",
        }
    }
}

// =============================================================================
// Mapper Configuration
// =============================================================================

/// Privilege required for administrative DDL: renames, property changes and
/// location changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DdlPolicy {
    /// ALL at server scope. No database grant satisfies it.
    #[default]
    ServerOnly,
    /// ALL on the owning database, plus ALL on any new location.
    OwningDatabase,
}

/// Settings of the operation mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Server every catalog object lives on.
    pub server: String,
    /// Administrative DDL rule.
    pub ddl_policy: DdlPolicy,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            server: "server1".to_string(),
            ddl_policy: DdlPolicy::default(),
        }
    }
}

// =============================================================================
// Mapping
// =============================================================================

/// Index handlers shipped with the engine. Any other handler runs
/// arbitrary code and needs server scope.
const BUILTIN_INDEX_HANDLERS: [&str; 4] = [
    "compact",
    "bitmap",
    "org.apache.hadoop.hive.ql.index.compact.compactindexhandler",
    "org.apache.hadoop.hive.ql.index.bitmap.bitmapindexhandler",
];

/// The ordered requirements of an operation. All of them must hold.
#[must_use]
pub fn required_privileges(operation: &Operation, config: &MapperConfig) -> PrivilegeRequest {
    let mut mapper = Mapper::new(config);
    mapper.map(operation);
    PrivilegeRequest::all(mapper.requirements)
}

struct Mapper<'a> {
    config: &'a MapperConfig,
    requirements: Vec<RequiredPrivilege>,
}

impl<'a> Mapper<'a> {
    fn new(config: &'a MapperConfig) -> Self {
        Self {
            config,
            requirements: Vec::new(),
        }
    }

    fn map(&mut self, operation: &Operation) {
        match operation {
            Operation::Query { inputs } => self.read_all(inputs),
            Operation::Describe { object } => self.on_object(object, Action::Select),
            Operation::ShowIndexes { table } | Operation::AnalyzeTable { table } => {
                self.on_object(table, Action::Select)
            }
            Operation::Explain { operation } => self.map(operation),
            Operation::UseDatabase { database } | Operation::ShowTables { database } => {
                let scope = ScopePath::server(self.server()).database(database.as_str());
                self.push(RequiredPrivilege::visibility(database.as_str(), scope));
            }
            Operation::ShowDatabases => {}
            Operation::CreateDatabase { database } => {
                self.on_server(database, Action::Create);
            }
            Operation::DropDatabase { database } => {
                self.on_server(database, Action::Drop);
            }
            Operation::CreateTable { table } => self.on_database_of(table, Action::Create),
            Operation::CreateView { view, inputs } => {
                self.read_all(inputs);
                self.on_database_of(view, Action::Create);
            }
            Operation::CreateIndex { table, handler } => {
                if is_builtin_handler(handler.as_deref()) {
                    self.on_object(table, Action::Create);
                } else {
                    let object = handler.as_deref().unwrap_or("index handler");
                    self.on_server(object, Action::All);
                }
            }
            Operation::DropTable { table } => self.on_object(table, Action::Drop),
            Operation::DropView { view } => self.on_object(view, Action::Drop),
            Operation::DropIndex { table } => self.on_object(table, Action::Drop),
            Operation::CreateTableAsSelect { table, inputs } => {
                self.read_all(inputs);
                self.on_database_of(table, Action::Create);
            }
            Operation::Insert { target, inputs, .. } => {
                self.on_object(target, Action::Insert);
                self.read_all(inputs);
            }
            Operation::LoadData { source, target } => {
                self.on_uri(source, Action::Select);
                self.on_object(target, Action::Insert);
            }
            Operation::ExportDirectory {
                inputs,
                destination,
            } => {
                self.read_all(inputs);
                self.on_uri(destination, Action::Insert);
            }
            Operation::ExportTable { table, destination } => {
                self.on_object(table, Action::Select);
                self.on_uri(destination, Action::Insert);
            }
            Operation::ImportTable { target, source } => {
                self.on_uri(source, Action::Select);
                self.on_database_of(target, Action::Create);
            }
            Operation::AlterTable { table, change } => self.alter_table(table, change),
            Operation::AlterDatabase { database, change } => {
                let location = match change {
                    AlterDatabaseChange::SetProperties => None,
                    AlterDatabaseChange::SetLocation { location } => Some(location),
                };
                self.ddl(&CatalogObject::database(database.as_str()), location);
            }
            Operation::CreateExternalTable { table, location } => {
                self.ddl(table, location.as_ref());
            }
            Operation::AddResource { path } => self.on_server(path, Action::All),
            Operation::CreateFunction { name, .. } => self.on_server(name, Action::All),
            Operation::Transform { inputs, script } => {
                self.read_all(inputs);
                self.on_server(script, Action::All);
            }
            Operation::ShowLocks => {
                let server = self.server().to_string();
                self.on_server(&server, Action::All);
            }
            Operation::LockTable { table } | Operation::UnlockTable { table } => {
                self.on_object(table, Action::Lock)
            }
        }
    }

    fn alter_table(&mut self, table: &CatalogObject, change: &AlterTableChange) {
        match change {
            AlterTableChange::AddColumns
            | AlterTableChange::ReplaceColumns
            | AlterTableChange::ChangeColumn
            | AlterTableChange::DropPartition
            | AlterTableChange::AddPartition { location: None } => {
                self.on_object(table, Action::Alter);
            }
            AlterTableChange::AddPartition {
                location: Some(location),
            }
            | AlterTableChange::SetLocation { location } => self.ddl(table, Some(location)),
            AlterTableChange::SetProperties => self.ddl(table, None),
            AlterTableChange::Rename { to } => {
                self.ddl(table, None);
                if to.database_name() != table.database_name() {
                    self.ddl(to, None);
                }
            }
        }
    }

    /// Administrative DDL on `object`, optionally moving data to `location`.
    fn ddl(&mut self, object: &CatalogObject, location: Option<&UriScope>) {
        match self.config.ddl_policy {
            DdlPolicy::ServerOnly => {
                let description = object.to_string();
                self.on_server(&description, Action::All);
            }
            DdlPolicy::OwningDatabase => {
                self.on_database_of(object, Action::All);
                if let Some(location) = location {
                    self.on_uri(location, Action::All);
                }
            }
        }
    }

    fn server(&self) -> &str {
        &self.config.server
    }

    fn read_all(&mut self, inputs: &[CatalogObject]) {
        for input in inputs {
            self.on_object(input, Action::Select);
        }
    }

    fn on_object(&mut self, object: &CatalogObject, action: Action) {
        let privilege = Privilege::scope(object.scope(self.server()), action);
        self.push(RequiredPrivilege::new(object.to_string(), privilege));
    }

    fn on_database_of(&mut self, object: &CatalogObject, action: Action) {
        let privilege = Privilege::scope(object.database_scope(self.server()), action);
        self.push(RequiredPrivilege::new(object.database_name(), privilege));
    }

    fn on_server(&mut self, object: &str, action: Action) {
        let privilege = Privilege::scope(ScopePath::server(self.server()), action);
        self.push(RequiredPrivilege::new(object, privilege));
    }

    fn on_uri(&mut self, uri: &UriScope, action: Action) {
        let privilege = Privilege::uri(self.server(), uri.clone(), action);
        self.push(RequiredPrivilege::new(uri.as_str(), privilege));
    }

    /// Add a requirement unless an equal one is already listed, whatever
    /// object it was described as.
    fn push(&mut self, requirement: RequiredPrivilege) {
        if !self
            .requirements
            .iter()
            .any(|existing| existing.requirement == requirement.requirement)
        {
            self.requirements.push(requirement);
        }
    }
}

fn is_builtin_handler(handler: Option<&str>) -> bool {
    match handler {
        None => true,
        Some(handler) => {
            let handler = handler.trim().to_lowercase();
            BUILTIN_INDEX_HANDLERS.contains(&handler.as_str())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
