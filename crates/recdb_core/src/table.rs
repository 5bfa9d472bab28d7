//! Tables and the relationships between them.
//!
//! A table is a schema section plus a `data/<table>/` directory. A
//! relationship is nothing more than a `<table>_id` field: either on the
//! child table (one-to-many) or on a `<a>_<b>` join table (many-to-many).

use crate::cache::QueryCache;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult, ObjectKind};
use crate::schema::{FieldDef, SchemaStore, FOREIGN_KEY_SUFFIX};
use std::fmt;
use tracing::{info, warn};

/// Kind of relationship created by [`TableManager::link_tables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The first table is the parent; the second gets a reference field.
    OneToMany,
    /// A join table holds a reference to each side.
    ManyToMany,
}

/// A relationship as it exists in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// `child.<parent>_id` references `parent.id`.
    ForeignKey {
        /// Referenced table.
        parent: String,
        /// Table carrying the reference field.
        child: String,
        /// The reference field.
        field: String,
    },
    /// A join table referencing both sides.
    JoinTable {
        /// Name of the join table.
        table: String,
    },
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignKey {
                parent,
                child,
                field,
            } => write!(f, "{child}.{field} -> {parent}.id"),
            Self::JoinTable { table } => write!(f, "join table {table}"),
        }
    }
}

/// Schema-level table operations of one database.
#[derive(Debug, Clone)]
pub struct TableManager {
    dir: DatabaseDir,
    schema: SchemaStore,
    cache: QueryCache,
}

impl TableManager {
    /// Creates a manager for the database directory.
    pub fn new(dir: DatabaseDir, cache: QueryCache) -> Self {
        Self {
            schema: SchemaStore::new(dir.clone()),
            dir,
            cache,
        }
    }

    /// Declares a table with only an `id` field and creates its record
    /// directory.
    ///
    /// A leftover `data/<name>` directory that the schema does not declare is
    /// cleared first, so a new table always starts empty.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` for a declared table, `Validation` for a bad name.
    pub fn add_table(&self, name: &str) -> CoreResult<()> {
        let mut schema = self.schema.load()?;
        schema.add_table(name)?;
        self.fresh_table_dir(name)?;
        self.schema.save(&schema)?;
        info!(db = self.dir.name(), table = name, "added table");
        Ok(())
    }

    /// Removes a table and all of its records.
    ///
    /// Records go first. If the section cannot be removed afterwards, the
    /// table stays declared with no records.
    ///
    /// Reference fields in other tables are left in place.
    ///
    /// # Errors
    ///
    /// `NotFound` if the table is not declared.
    pub fn remove_table(&self, name: &str) -> CoreResult<()> {
        let mut schema = self.schema.load()?;
        schema.remove_table(name)?;
        let table_dir = self.dir.table_dir(name);
        if self.dir.backend().is_dir(&table_dir)? {
            self.dir.backend().remove_dir_all(&table_dir)?;
        }
        self.schema.save(&schema)?;
        self.cache.on_write(name)?;
        info!(db = self.dir.name(), table = name, "removed table");
        Ok(())
    }

    /// Renames a table, keeping its position in the schema, and moves its
    /// records.
    ///
    /// The directory moves before the schema is saved. If the save fails the
    /// directory is moved back.
    ///
    /// Reference fields named after the old table are not renamed.
    ///
    /// # Errors
    ///
    /// `NotFound` for `old`, `AlreadyExists` for `new` or for an existing
    /// `data/<new>` directory, `Validation` for a bad new name.
    pub fn rename_table(&self, old: &str, new: &str) -> CoreResult<()> {
        let mut schema = self.schema.load()?;
        schema.rename_table(old, new)?;

        let backend = self.dir.backend();
        let old_dir = self.dir.table_dir(old);
        let new_dir = self.dir.table_dir(new);
        if backend.exists(&new_dir)? {
            return Err(CoreError::already_exists(ObjectKind::Table, new));
        }
        let moved = backend.is_dir(&old_dir)?;
        if moved {
            backend.rename(&old_dir, &new_dir)?;
        } else {
            backend.create_dir_all(&new_dir)?;
        }

        if let Err(err) = self.schema.save(&schema) {
            let undo = if moved {
                backend.rename(&new_dir, &old_dir)
            } else {
                backend.remove_dir_all(&new_dir)
            };
            if let Err(undo_err) = undo {
                warn!(
                    db = self.dir.name(),
                    old,
                    new,
                    error = %undo_err,
                    "could not restore table directory"
                );
            }
            return Err(err);
        }

        self.cache.on_write(old)?;
        info!(db = self.dir.name(), old, new, "renamed table");
        Ok(())
    }

    /// Returns the declared table names in schema order.
    pub fn list_tables(&self) -> CoreResult<Vec<String>> {
        Ok(self
            .schema
            .load()?
            .table_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Links two declared tables.
    ///
    /// For [`Relation::OneToMany`], `a` is the parent and `b` gains an
    /// `<a>_id` field. For [`Relation::ManyToMany`], a join table `<a>_<b>`
    /// is created with an `<a>_id` and a `<b>_id` field.
    ///
    /// # Errors
    ///
    /// `NotFound` if either table is missing. `AlreadyExists` if the
    /// reference field or join table already exists.
    pub fn link_tables(&self, a: &str, b: &str, relation: Relation) -> CoreResult<Link> {
        let link = match relation {
            Relation::OneToMany => {
                let field = FieldDef::reference_to(a);
                let field_name = field.name.clone();
                self.schema.modify(|schema| {
                    schema.require_table(a)?;
                    schema.require_table_mut(b)?.add_field(field)
                })?;
                Link::ForeignKey {
                    parent: a.to_string(),
                    child: b.to_string(),
                    field: field_name,
                }
            }
            Relation::ManyToMany => {
                let join = join_table_name(a, b);
                let mut schema = self.schema.load()?;
                schema.require_table(a)?;
                schema.require_table(b)?;
                let table = schema.add_table(&join)?;
                table.add_field(FieldDef::reference_to(a))?;
                table.add_field(FieldDef::reference_to(b))?;
                self.fresh_table_dir(&join)?;
                self.schema.save(&schema)?;
                Link::JoinTable { table: join }
            }
        };
        info!(db = self.dir.name(), link = %link, "linked tables");
        Ok(link)
    }

    /// Removes whatever links `a` and `b`.
    ///
    /// Join tables are checked first (`<a>_<b>`, then `<b>_<a>`), then an
    /// `<a>_id` field on `b`, then a `<b>_id` field on `a`. Only the first
    /// match is removed.
    ///
    /// # Errors
    ///
    /// `NotFound` if nothing links the two tables.
    pub fn unlink_tables(&self, a: &str, b: &str) -> CoreResult<Link> {
        let schema = self.schema.load()?;
        schema.require_table(a)?;
        schema.require_table(b)?;

        for join in [join_table_name(a, b), join_table_name(b, a)] {
            if schema.has_table(&join) {
                self.remove_table(&join)?;
                return Ok(Link::JoinTable { table: join });
            }
        }

        for (parent, child) in [(a, b), (b, a)] {
            let field = format!("{parent}{FOREIGN_KEY_SUFFIX}");
            let linked = schema
                .table(child)
                .is_some_and(|table| table.has_field(&field));
            if linked {
                self.schema.remove_field(child, &field)?;
                let link = Link::ForeignKey {
                    parent: parent.to_string(),
                    child: child.to_string(),
                    field,
                };
                info!(db = self.dir.name(), link = %link, "unlinked tables");
                return Ok(link);
            }
        }

        Err(CoreError::not_found(
            ObjectKind::Relationship,
            format!("{a} <-> {b}"),
        ))
    }
}

impl TableManager {
    /// Creates an empty `data/<name>` directory, dropping any undeclared
    /// leftover.
    fn fresh_table_dir(&self, name: &str) -> CoreResult<()> {
        let backend = self.dir.backend();
        let table_dir = self.dir.table_dir(name);
        if backend.exists(&table_dir)? {
            warn!(
                db = self.dir.name(),
                table = name,
                "clearing undeclared table directory"
            );
            backend.remove_dir_all(&table_dir)?;
        }
        backend.create_dir_all(&table_dir)?;
        Ok(())
    }
}

fn join_table_name(a: &str, b: &str) -> String {
    format!("{a}_{b}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheMode;
    use recdb_storage::InMemoryBackend;
    use std::path::Path;
    use std::sync::Arc;

    fn manager() -> TableManager {
        let dir = DatabaseDir::new("shop", Arc::new(InMemoryBackend::new()));
        dir.initialize().unwrap();
        TableManager::new(dir.clone(), QueryCache::new(dir, CacheMode::AppendOnly))
    }

    fn fields(manager: &TableManager, table: &str) -> Vec<String> {
        manager
            .schema
            .table(table)
            .unwrap()
            .fields
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn add_table_seeds_id_and_directory() {
        let m = manager();
        m.add_table("users").unwrap();

        assert_eq!(m.list_tables().unwrap(), vec!["users"]);
        assert_eq!(fields(&m, "users"), vec!["id:string:pk,unique"]);
        assert!(m.dir.backend().is_dir(Path::new("data/users")).unwrap());
        assert!(matches!(
            m.add_table("users"),
            Err(CoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn bad_table_names_rejected() {
        let m = manager();
        for bad in ["", "a b", "[x]", "a/b", "a:b"] {
            assert!(
                matches!(m.add_table(bad), Err(CoreError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(m.list_tables().unwrap().is_empty());
    }

    #[test]
    fn remove_table_deletes_records() {
        let m = manager();
        m.add_table("users").unwrap();
        m.dir
            .backend()
            .write(Path::new("data/users/a.json"), b"{}")
            .unwrap();

        m.remove_table("users").unwrap();

        assert!(m.list_tables().unwrap().is_empty());
        assert!(!m.dir.backend().exists(Path::new("data/users")).unwrap());
        assert!(m.remove_table("users").unwrap_err().is_not_found(ObjectKind::Table));
    }

    #[test]
    fn rename_table_moves_records() {
        let m = manager();
        m.add_table("users").unwrap();
        m.add_table("posts").unwrap();
        m.dir
            .backend()
            .write(Path::new("data/users/a.json"), b"{}")
            .unwrap();

        m.rename_table("users", "members").unwrap();

        assert_eq!(m.list_tables().unwrap(), vec!["members", "posts"]);
        let backend = m.dir.backend();
        assert!(backend.exists(Path::new("data/members/a.json")).unwrap());
        assert!(!backend.exists(Path::new("data/users")).unwrap());
    }

    #[test]
    fn rename_onto_existing_directory_leaves_schema_alone() {
        let m = manager();
        m.add_table("a").unwrap();
        m.dir
            .backend()
            .write(Path::new("data/a/r1.json"), b"{}")
            .unwrap();
        m.dir
            .backend()
            .create_dir_all(Path::new("data/b"))
            .unwrap();

        let err = m.rename_table("a", "b").unwrap_err();

        assert!(matches!(err, CoreError::AlreadyExists { .. }));
        assert_eq!(m.list_tables().unwrap(), vec!["a"]);
        assert!(m.dir.backend().exists(Path::new("data/a/r1.json")).unwrap());
    }

    #[test]
    fn add_table_clears_undeclared_directory() {
        let m = manager();
        m.dir
            .backend()
            .write(Path::new("data/users/old.json"), b"{}")
            .unwrap();

        m.add_table("users").unwrap();

        let backend = m.dir.backend();
        assert!(backend.is_dir(Path::new("data/users")).unwrap());
        assert!(backend.list(Path::new("data/users")).unwrap().is_empty());
    }

    #[test]
    fn one_to_many_link_and_unlink() {
        let m = manager();
        m.add_table("users").unwrap();
        m.add_table("posts").unwrap();

        let link = m.link_tables("users", "posts", Relation::OneToMany).unwrap();

        assert_eq!(
            link,
            Link::ForeignKey {
                parent: "users".into(),
                child: "posts".into(),
                field: "users_id".into(),
            }
        );
        assert_eq!(
            fields(&m, "posts"),
            vec!["id:string:pk,unique", "users_id:string:fk=users.id"]
        );
        assert!(matches!(
            m.link_tables("users", "posts", Relation::OneToMany),
            Err(CoreError::AlreadyExists { .. })
        ));

        assert_eq!(m.unlink_tables("posts", "users").unwrap(), link);
        assert_eq!(fields(&m, "posts"), vec!["id:string:pk,unique"]);
    }

    #[test]
    fn many_to_many_link_and_unlink() {
        let m = manager();
        m.add_table("students").unwrap();
        m.add_table("courses").unwrap();

        m.link_tables("students", "courses", Relation::ManyToMany).unwrap();

        assert_eq!(
            m.list_tables().unwrap(),
            vec!["students", "courses", "students_courses"]
        );
        assert_eq!(
            fields(&m, "students_courses"),
            vec![
                "id:string:pk,unique",
                "students_id:string:fk=students.id",
                "courses_id:string:fk=courses.id",
            ]
        );

        let removed = m.unlink_tables("courses", "students").unwrap();
        assert_eq!(
            removed,
            Link::JoinTable {
                table: "students_courses".into()
            }
        );
        assert_eq!(m.list_tables().unwrap(), vec!["students", "courses"]);
    }

    #[test]
    fn link_requires_both_tables() {
        let m = manager();
        m.add_table("users").unwrap();
        let before = m.list_tables().unwrap();

        assert!(m
            .link_tables("users", "ghost", Relation::ManyToMany)
            .unwrap_err()
            .is_not_found(ObjectKind::Table));
        assert!(m
            .link_tables("ghost", "users", Relation::OneToMany)
            .unwrap_err()
            .is_not_found(ObjectKind::Table));
        assert_eq!(m.list_tables().unwrap(), before);
    }

    #[test]
    fn unlink_without_link_is_not_found() {
        let m = manager();
        m.add_table("a").unwrap();
        m.add_table("b").unwrap();
        assert!(m
            .unlink_tables("a", "b")
            .unwrap_err()
            .is_not_found(ObjectKind::Relationship));
    }
}
