//! core::catalog
//!
//! Schema catalog: directories, type tables and their columns.
//!
//! # Architecture
//!
//! The catalog is an arena of records indexed by id. Directory parent links
//! stay ids; the tree structure (paths, children) is derived once by
//! [`build_tree`] after a record set is loaded, never lazily.
//!
//! ```text
//! /                      synthetic root, not stored
//! ├── CDC                path "/CDC"
//! │   └── gains          type table, path "/CDC/gains"
//! └── FDC
//!     └── timing         directory, path "/FDC/timing"
//! ```
//!
//! # Invariants
//!
//! - Directory parent pointers are acyclic and never dangle
//! - Directory paths are unique; type-table paths are unique
//! - Columns are exposed sorted by `order`; `order` is unique per table
//! - A table's `column_count` equals its number of columns

use std::collections::{BTreeMap, HashMap};

use globset::GlobBuilder;

use super::codec::ColumnType;
use super::error::{CalibError, CalibResult, Entity};
use super::graph::{ChainError, ParentGraph};
use super::records::{ColumnRecord, DirectoryRecord, TypeTableRecord};
use super::types::{ColumnId, DirectoryId, Page, RecordName, TypeTableId, UtcTimestamp};

/// Path of the synthetic root directory.
pub const ROOT_PATH: &str = "/";

/// Join a child name onto a posix-style parent path.
fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// A directory with its derived path.
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub id: DirectoryId,
    pub name: String,
    pub parent_id: Option<DirectoryId>,
    /// Full path, derived during [`build_tree`]
    pub path: String,
    pub comment: String,
    pub created: Option<UtcTimestamp>,
    pub modified: Option<UtcTimestamp>,
}

impl Directory {
    fn root() -> Self {
        Self {
            id: DirectoryId::new(0),
            name: String::new(),
            parent_id: None,
            path: ROOT_PATH.to_string(),
            comment: String::new(),
            created: None,
            modified: None,
        }
    }

    /// Whether this is the synthetic root.
    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }
}

/// Directory hierarchy with derived paths.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: Directory,
    directories: BTreeMap<DirectoryId, Directory>,
    by_path: HashMap<String, DirectoryId>,
    graph: ParentGraph<DirectoryId>,
}

/// Build the directory tree from an unordered record set.
///
/// Each directory's path is the join of its ancestors' names below the
/// synthetic root (`"/"`).
///
/// # Errors
///
/// - `DanglingParent` if a parent id has no matching directory
/// - `CycleDetected` if a parent chain does not reach the root within
///   `directories.len()` steps
/// - `DuplicatePath` if two directories resolve to the same path
/// - `InvalidName` if `strict_names` is set and a name is not a valid
///   [`RecordName`]
pub fn build_tree(directories: &[DirectoryRecord], strict_names: bool) -> CalibResult<DirectoryTree> {
    let mut graph = ParentGraph::new();
    let mut by_id = BTreeMap::new();

    for record in directories {
        if strict_names {
            RecordName::validate(&record.name)?;
        }
        graph.add_node(record.id, record.parent_id);
        by_id.insert(record.id, record);
    }

    let mut built = BTreeMap::new();
    let mut by_path = HashMap::new();

    for (id, record) in &by_id {
        let chain = graph.chain_to_root(*id).map_err(|e| match e {
            ChainError::Cycle(start) => CalibError::CycleDetected {
                entity: Entity::Directory,
                id: start.get(),
            },
            ChainError::Dangling { node, parent } => CalibError::DanglingParent {
                entity: Entity::Directory,
                id: node.get(),
                parent_id: parent.get(),
            },
        })?;

        let path = chain
            .iter()
            .rev()
            .filter_map(|link| by_id.get(link))
            .fold(ROOT_PATH.to_string(), |acc, dir| join_path(&acc, &dir.name));

        if by_path.insert(path.clone(), *id).is_some() {
            return Err(CalibError::DuplicatePath { path });
        }

        built.insert(
            *id,
            Directory {
                id: record.id,
                name: record.name.clone(),
                parent_id: record.parent_id,
                path,
                comment: record.comment.clone(),
                created: record.created,
                modified: record.modified,
            },
        );
    }

    Ok(DirectoryTree {
        root: Directory::root(),
        directories: built,
        by_path,
        graph,
    })
}

/// Look up a directory by its exact path.
///
/// `"/"` resolves to the synthetic root.
///
/// # Errors
///
/// Returns `NotFound` if no directory has this path.
pub fn resolve_path<'a>(tree: &'a DirectoryTree, path: &str) -> CalibResult<&'a Directory> {
    tree.get_by_path(path)
        .ok_or_else(|| CalibError::not_found(Entity::Directory, path))
}

impl DirectoryTree {
    /// The synthetic root directory.
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Get a directory by id.
    pub fn get(&self, id: DirectoryId) -> Option<&Directory> {
        self.directories.get(&id)
    }

    /// Get a directory by exact path.
    pub fn get_by_path(&self, path: &str) -> Option<&Directory> {
        if path == ROOT_PATH {
            return Some(&self.root);
        }
        self.by_path.get(path).and_then(|id| self.directories.get(id))
    }

    /// Number of stored directories (the synthetic root excluded).
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Whether no directories are stored.
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    /// All stored directories, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Directory> {
        self.directories.values()
    }

    /// Direct subdirectories of `dir`, sorted by name.
    pub fn subdirectories(&self, dir: &Directory) -> Vec<&Directory> {
        let mut subs: Vec<&Directory> = if dir.is_root() {
            self.graph
                .roots()
                .filter_map(|id| self.directories.get(id))
                .collect()
        } else {
            self.graph
                .children(&dir.id)
                .filter_map(|id| self.directories.get(id))
                .collect()
        };
        subs.sort_by(|a, b| a.name.cmp(&b.name));
        subs
    }

    /// Search directories whose name matches a glob pattern.
    ///
    /// `*` matches any run of characters and `?` exactly one. With
    /// `parent_path`, only direct children of that directory are searched;
    /// otherwise every directory is. Results are sorted by path and paged.
    ///
    /// # Errors
    ///
    /// - `InvalidPattern` if the pattern does not compile
    /// - `NotFound` if `parent_path` names no directory
    pub fn search(
        &self,
        pattern: &str,
        parent_path: Option<&str>,
        page: Page,
    ) -> CalibResult<Vec<&Directory>> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| CalibError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?
            .compile_matcher();

        let mut candidates: Vec<&Directory> = match parent_path {
            Some(path) => {
                let parent = resolve_path(self, path)?;
                self.subdirectories(parent)
            }
            None => self.directories.values().collect(),
        };
        candidates.retain(|dir| matcher.is_match(&dir.name));
        candidates.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(page.apply(candidates))
    }
}

/// A typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub order: i64,
    pub column_type: ColumnType,
}

/// A type table with its ordered columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeTable {
    pub id: TypeTableId,
    pub name: String,
    pub directory_id: DirectoryId,
    /// Directory path joined with the table name
    pub path: String,
    pub row_count: usize,
    pub column_count: usize,
    pub comment: String,
    columns: Vec<Column>,
}

impl TypeTable {
    /// Columns sorted by `order`.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in `order`.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Directories plus the type tables they own.
#[derive(Debug, Clone)]
pub struct Catalog {
    tree: DirectoryTree,
    tables: BTreeMap<TypeTableId, TypeTable>,
    by_path: HashMap<String, TypeTableId>,
}

impl Catalog {
    /// Build the catalog from directory, table and column records.
    ///
    /// # Errors
    ///
    /// Everything [`build_tree`] reports, plus:
    /// - `DanglingParent` if a table's directory or a column's table is missing
    /// - `DuplicatePath` if two tables share a path
    /// - `DuplicateColumnOrder` if a table has two columns with one `order`
    /// - `ColumnCountMismatch` if `column_count` disagrees with the columns
    pub fn build(
        directories: &[DirectoryRecord],
        tables: &[TypeTableRecord],
        columns: &[ColumnRecord],
        strict_names: bool,
    ) -> CalibResult<Catalog> {
        let tree = build_tree(directories, strict_names)?;

        let mut columns_by_table: HashMap<TypeTableId, Vec<Column>> = HashMap::new();
        for record in columns {
            if strict_names {
                RecordName::validate(&record.name)?;
            }
            if !tables.iter().any(|t| t.id == record.type_table_id) {
                return Err(CalibError::DanglingParent {
                    entity: Entity::Column,
                    id: record.id.get(),
                    parent_id: record.type_table_id.get(),
                });
            }
            columns_by_table
                .entry(record.type_table_id)
                .or_default()
                .push(Column {
                    id: record.id,
                    name: record.name.clone(),
                    order: record.order,
                    column_type: record.column_type,
                });
        }

        let mut built = BTreeMap::new();
        let mut by_path = HashMap::new();

        for record in tables {
            if strict_names {
                RecordName::validate(&record.name)?;
            }
            let dir = tree
                .get(record.directory_id)
                .ok_or(CalibError::DanglingParent {
                    entity: Entity::TypeTable,
                    id: record.id.get(),
                    parent_id: record.directory_id.get(),
                })?;

            let mut cols = columns_by_table.remove(&record.id).unwrap_or_default();
            cols.sort_by_key(|c| c.order);
            if let Some(pair) = cols.windows(2).find(|w| w[0].order == w[1].order) {
                return Err(CalibError::DuplicateColumnOrder {
                    table_id: record.id,
                    order: pair[0].order,
                });
            }
            if cols.len() != record.column_count {
                return Err(CalibError::ColumnCountMismatch {
                    table_id: record.id,
                    declared: record.column_count,
                    actual: cols.len(),
                });
            }

            let path = join_path(&dir.path, &record.name);
            if by_path.insert(path.clone(), record.id).is_some() {
                return Err(CalibError::DuplicatePath { path });
            }

            built.insert(
                record.id,
                TypeTable {
                    id: record.id,
                    name: record.name.clone(),
                    directory_id: record.directory_id,
                    path,
                    row_count: record.row_count,
                    column_count: record.column_count,
                    comment: record.comment.clone(),
                    columns: cols,
                },
            );
        }

        tracing::debug!(
            directories = tree.len(),
            tables = built.len(),
            "built schema catalog"
        );

        Ok(Catalog {
            tree,
            tables: built,
            by_path,
        })
    }

    /// The directory tree.
    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    /// Look up a type table by its full path.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no table has this path.
    pub fn table_by_path(&self, path: &str) -> CalibResult<&TypeTable> {
        self.by_path
            .get(path)
            .and_then(|id| self.tables.get(id))
            .ok_or_else(|| CalibError::not_found(Entity::TypeTable, path))
    }

    /// Look up a type table by id.
    pub fn table(&self, id: TypeTableId) -> Option<&TypeTable> {
        self.tables.get(&id)
    }

    /// All tables, ordered by id.
    pub fn tables(&self) -> impl Iterator<Item = &TypeTable> {
        self.tables.values()
    }

    /// Tables directly inside the directory at `dir_path`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory does not exist.
    pub fn tables_in(&self, dir_path: &str) -> CalibResult<Vec<&TypeTable>> {
        let dir = resolve_path(&self.tree, dir_path)?;
        let mut found: Vec<&TypeTable> = self
            .tables
            .values()
            .filter(|t| !dir.is_root() && t.directory_id == dir.id)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs() -> Vec<DirectoryRecord> {
        vec![
            DirectoryRecord::new(2, "b", Some(1)),
            DirectoryRecord::new(1, "a", None),
            DirectoryRecord::new(3, "c", None),
        ]
    }

    mod tree {
        use super::*;

        #[test]
        fn paths_are_joined_from_root() {
            let tree = build_tree(&dirs(), true).unwrap();
            let b = resolve_path(&tree, "/a/b").unwrap();
            assert_eq!(b.id, DirectoryId::new(2));
            assert_eq!(b.path, "/a/b");
            assert_eq!(resolve_path(&tree, "/a").unwrap().path, "/a");
        }

        #[test]
        fn root_resolves() {
            let tree = build_tree(&dirs(), true).unwrap();
            assert!(resolve_path(&tree, "/").unwrap().is_root());
        }

        #[test]
        fn missing_path_not_found() {
            let tree = build_tree(&dirs(), true).unwrap();
            let err = resolve_path(&tree, "/a/x").unwrap_err();
            assert!(err.is_not_found());
            // Lookup is exact: no normalization of trailing separators.
            assert!(resolve_path(&tree, "/a/").is_err());
        }

        #[test]
        fn cycle_detected() {
            let records = vec![
                DirectoryRecord::new(1, "a", Some(2)),
                DirectoryRecord::new(2, "b", Some(1)),
            ];
            let err = build_tree(&records, true).unwrap_err();
            assert!(matches!(
                err,
                CalibError::CycleDetected {
                    entity: Entity::Directory,
                    ..
                }
            ));
        }

        #[test]
        fn dangling_parent_detected() {
            let records = vec![DirectoryRecord::new(1, "a", Some(42))];
            let err = build_tree(&records, true).unwrap_err();
            assert_eq!(
                err,
                CalibError::DanglingParent {
                    entity: Entity::Directory,
                    id: 1,
                    parent_id: 42
                }
            );
        }

        #[test]
        fn duplicate_sibling_names_rejected() {
            let records = vec![
                DirectoryRecord::new(1, "a", None),
                DirectoryRecord::new(2, "a", None),
            ];
            let err = build_tree(&records, true).unwrap_err();
            assert_eq!(err, CalibError::DuplicatePath { path: "/a".into() });
        }

        #[test]
        fn strict_names_reject_separator() {
            let records = vec![DirectoryRecord::new(1, "a/b", None)];
            assert!(matches!(
                build_tree(&records, true),
                Err(CalibError::InvalidName(_))
            ));
            assert!(build_tree(&records, false).is_ok());
        }

        #[test]
        fn subdirectories_of_root_and_node() {
            let tree = build_tree(&dirs(), true).unwrap();
            let top: Vec<_> = tree
                .subdirectories(tree.root())
                .iter()
                .map(|d| d.name.as_str())
                .collect();
            assert_eq!(top, vec!["a", "c"]);

            let a = resolve_path(&tree, "/a").unwrap();
            let subs: Vec<_> = tree.subdirectories(a).iter().map(|d| d.id).collect();
            assert_eq!(subs, vec![DirectoryId::new(2)]);
        }
    }

    mod search {
        use super::*;

        fn tree() -> DirectoryTree {
            let records = vec![
                DirectoryRecord::new(1, "CDC", None),
                DirectoryRecord::new(2, "FDC", None),
                DirectoryRecord::new(3, "CDC_pos", Some(1)),
                DirectoryRecord::new(4, "timing", Some(2)),
                DirectoryRecord::new(5, "BCAL", None),
            ];
            build_tree(&records, true).unwrap()
        }

        fn paths(found: Vec<&Directory>) -> Vec<String> {
            found.into_iter().map(|d| d.path.clone()).collect()
        }

        #[test]
        fn star_matches_everywhere() {
            let t = tree();
            let found = t.search("*DC*", None, Page::ALL).unwrap();
            assert_eq!(paths(found), vec!["/CDC", "/CDC/CDC_pos", "/FDC"]);
        }

        #[test]
        fn question_mark_matches_one_char() {
            let t = tree();
            let found = t.search("?DC", None, Page::ALL).unwrap();
            assert_eq!(paths(found), vec!["/CDC", "/FDC"]);
        }

        #[test]
        fn scoped_to_parent() {
            let t = tree();
            let found = t.search("*", Some("/FDC"), Page::ALL).unwrap();
            assert_eq!(paths(found), vec!["/FDC/timing"]);
        }

        #[test]
        fn paged() {
            let t = tree();
            let found = t.search("*", None, Page::new(2, 1)).unwrap();
            assert_eq!(paths(found), vec!["/CDC", "/CDC/CDC_pos"]);
        }

        #[test]
        fn unknown_parent_not_found() {
            let err = tree().search("*", Some("/nope"), Page::ALL).unwrap_err();
            assert!(err.is_not_found());
        }

        #[test]
        fn bad_pattern_rejected() {
            let err = tree().search("[", None, Page::ALL).unwrap_err();
            assert!(matches!(err, CalibError::InvalidPattern { .. }));
        }
    }

    mod tables {
        use super::*;

        fn catalog_with(columns: Vec<ColumnRecord>, column_count: usize) -> CalibResult<Catalog> {
            let tables = vec![TypeTableRecord::new(10, "gains", 2, 1, column_count)];
            Catalog::build(&dirs(), &tables, &columns, true)
        }

        #[test]
        fn table_path_and_sorted_columns() {
            let columns = vec![
                ColumnRecord::new(1, 10, "gain", 20, ColumnType::Double),
                ColumnRecord::new(2, 10, "channel", 5, ColumnType::Int),
            ];
            let catalog = catalog_with(columns, 2).unwrap();
            let table = catalog.table_by_path("/a/b/gains").unwrap();
            assert_eq!(table.path, "/a/b/gains");
            assert_eq!(table.column_names(), vec!["channel", "gain"]);
            assert_eq!(
                table.column("gain").map(|c| c.column_type),
                Some(ColumnType::Double)
            );
        }

        #[test]
        fn duplicate_column_order_rejected() {
            let columns = vec![
                ColumnRecord::new(1, 10, "x", 1, ColumnType::Int),
                ColumnRecord::new(2, 10, "y", 1, ColumnType::Int),
            ];
            let err = catalog_with(columns, 2).unwrap_err();
            assert_eq!(
                err,
                CalibError::DuplicateColumnOrder {
                    table_id: TypeTableId::new(10),
                    order: 1
                }
            );
        }

        #[test]
        fn column_count_mismatch_rejected() {
            let columns = vec![ColumnRecord::new(1, 10, "x", 1, ColumnType::Int)];
            let err = catalog_with(columns, 3).unwrap_err();
            assert!(matches!(
                err,
                CalibError::ColumnCountMismatch {
                    declared: 3,
                    actual: 1,
                    ..
                }
            ));
        }

        #[test]
        fn orphan_column_rejected() {
            let columns = vec![ColumnRecord::new(1, 99, "x", 1, ColumnType::Int)];
            let err = catalog_with(columns, 0).unwrap_err();
            assert!(matches!(
                err,
                CalibError::DanglingParent {
                    entity: Entity::Column,
                    ..
                }
            ));
        }

        #[test]
        fn table_in_missing_directory_rejected() {
            let tables = vec![TypeTableRecord::new(10, "gains", 77, 1, 0)];
            let err = Catalog::build(&dirs(), &tables, &[], true).unwrap_err();
            assert!(matches!(
                err,
                CalibError::DanglingParent {
                    entity: Entity::TypeTable,
                    parent_id: 77,
                    ..
                }
            ));
        }

        #[test]
        fn duplicate_table_path_rejected() {
            let tables = vec![
                TypeTableRecord::new(10, "gains", 1, 1, 0),
                TypeTableRecord::new(11, "gains", 1, 1, 0),
            ];
            let err = Catalog::build(&dirs(), &tables, &[], true).unwrap_err();
            assert_eq!(
                err,
                CalibError::DuplicatePath {
                    path: "/a/gains".into()
                }
            );
        }

        #[test]
        fn tables_in_directory() {
            let tables = vec![
                TypeTableRecord::new(10, "zeta", 1, 1, 0),
                TypeTableRecord::new(11, "alpha", 1, 1, 0),
                TypeTableRecord::new(12, "other", 3, 1, 0),
            ];
            let catalog = Catalog::build(&dirs(), &tables, &[], true).unwrap();
            let names: Vec<_> = catalog
                .tables_in("/a")
                .unwrap()
                .iter()
                .map(|t| t.name.as_str())
                .collect();
            assert_eq!(names, vec!["alpha", "zeta"]);
            assert!(catalog.tables_in("/").unwrap().is_empty());
            assert_eq!(catalog.tables().count(), 3);
        }

        #[test]
        fn missing_table_not_found() {
            let catalog = Catalog::build(&dirs(), &[], &[], true).unwrap();
            let err = catalog.table_by_path("/a/none").unwrap_err();
            assert_eq!(
                err,
                CalibError::NotFound {
                    entity: Entity::TypeTable,
                    key: "/a/none".into()
                }
            );
        }
    }
}
