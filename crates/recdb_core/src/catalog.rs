//! The directory of databases.

use crate::config::Config;
use crate::database::Database;
use crate::dir::validate_name;
use crate::error::{CoreError, CoreResult, ObjectKind};
use recdb_storage::{FileBackend, ScopedBackend, StorageBackend, StorageError};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A root directory holding one sub-directory per database.
///
/// Entries whose name starts with `.` belong to other tools and are never
/// treated as databases.
pub struct Catalog {
    backend: Arc<dyn StorageBackend>,
    config: Config,
}

impl Catalog {
    /// Opens the catalog rooted at `root` on the local file system.
    ///
    /// The root directory is created when `config.create_if_missing` is set.
    ///
    /// # Errors
    ///
    /// `NotFound` if the root does not exist and may not be created.
    pub fn open(root: &Path, config: Config) -> CoreResult<Self> {
        let backend = if config.create_if_missing {
            FileBackend::open_with_create_dirs(root)?
        } else {
            FileBackend::open(root).map_err(|e| match e {
                StorageError::NotFound { .. } => {
                    CoreError::not_found(ObjectKind::Database, root.display().to_string())
                }
                other => other.into(),
            })?
        };
        let backend = backend.sync_writes(config.sync_writes);
        Ok(Self::with_backend(Arc::new(backend), config))
    }

    /// Uses an existing backend as the catalog root.
    pub fn with_backend(backend: Arc<dyn StorageBackend>, config: Config) -> Self {
        Self { backend, config }
    }

    /// Returns the configuration handed to every opened database.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn scoped(&self, name: &str) -> CoreResult<Arc<dyn StorageBackend>> {
        validate_name(name)?;
        let scoped = ScopedBackend::new(Arc::clone(&self.backend), Path::new(name))?;
        Ok(Arc::new(scoped))
    }

    /// Returns true if a database directory with this name exists.
    pub fn database_exists(&self, name: &str) -> CoreResult<bool> {
        validate_name(name)?;
        Ok(self.backend.is_dir(Path::new(name))?)
    }

    /// Creates a new, empty database.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the directory exists, `Validation` for a bad name.
    pub fn create_database(&self, name: &str) -> CoreResult<Database> {
        if self.database_exists(name)? {
            return Err(CoreError::already_exists(ObjectKind::Database, name));
        }
        Database::create_with_backend(name, self.scoped(name)?, self.config.clone())
    }

    /// Opens a database, creating it if missing and the configuration allows.
    ///
    /// # Errors
    ///
    /// `NotFound` if the database does not exist (or has no schema file)
    /// and may not be created.
    pub fn open_database(&self, name: &str) -> CoreResult<Database> {
        if !self.database_exists(name)? {
            if self.config.create_if_missing {
                return self.create_database(name);
            }
            return Err(CoreError::not_found(ObjectKind::Database, name));
        }
        Database::open_with_backend(name, self.scoped(name)?, self.config.clone())
    }

    /// Renames a database directory.
    ///
    /// # Errors
    ///
    /// `NotFound` for `old`, `AlreadyExists` for `new`.
    pub fn rename_database(&self, old: &str, new: &str) -> CoreResult<()> {
        if !self.database_exists(old)? {
            return Err(CoreError::not_found(ObjectKind::Database, old));
        }
        if self.database_exists(new)? {
            return Err(CoreError::already_exists(ObjectKind::Database, new));
        }
        self.backend.rename(Path::new(old), Path::new(new))?;
        info!(old, new, "renamed database");
        Ok(())
    }

    /// Deletes a database and everything in it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the database does not exist.
    pub fn delete_database(&self, name: &str) -> CoreResult<()> {
        if !self.database_exists(name)? {
            return Err(CoreError::not_found(ObjectKind::Database, name));
        }
        self.backend.remove_dir_all(Path::new(name))?;
        info!(db = name, "deleted database");
        Ok(())
    }

    /// Returns the database names in sorted order.
    pub fn list_databases(&self) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.backend.list(Path::new(""))? {
            if entry.starts_with('.') || validate_name(&entry).is_err() {
                continue;
            }
            if self.backend.is_dir(Path::new(&entry))? {
                names.push(entry);
            }
        }
        Ok(names)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recdb_storage::InMemoryBackend;
    use tempfile::tempdir;

    fn memory_catalog(config: Config) -> Catalog {
        Catalog::with_backend(Arc::new(InMemoryBackend::new()), config)
    }

    #[test]
    fn create_list_and_skip_dot_entries() {
        let catalog = memory_catalog(Config::default());
        catalog.create_database("shop").unwrap();
        catalog.create_database("blog").unwrap();
        catalog
            .backend
            .write(Path::new(".session"), b"user")
            .unwrap();
        catalog.backend.create_dir_all(Path::new(".hidden")).unwrap();

        assert_eq!(catalog.list_databases().unwrap(), vec!["blog", "shop"]);
        assert!(matches!(
            catalog.create_database("shop"),
            Err(CoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn open_respects_create_if_missing() {
        let strict = memory_catalog(Config::default().create_if_missing(false));
        assert!(strict
            .open_database("shop")
            .unwrap_err()
            .is_not_found(ObjectKind::Database));

        let lenient = memory_catalog(Config::default());
        let db = lenient.open_database("shop").unwrap();
        assert_eq!(db.name(), "shop");
        assert!(lenient.database_exists("shop").unwrap());
    }

    #[test]
    fn databases_are_isolated() {
        let catalog = memory_catalog(Config::default());
        let shop = catalog.create_database("shop").unwrap();
        let blog = catalog.create_database("blog").unwrap();
        shop.add_table("users").unwrap();

        assert_eq!(shop.list_tables().unwrap(), vec!["users"]);
        assert!(blog.list_tables().unwrap().is_empty());
        assert!(catalog
            .backend
            .exists(Path::new("shop/data/users"))
            .unwrap());
    }

    #[test]
    fn rename_and_delete() {
        let catalog = memory_catalog(Config::default());
        catalog.create_database("shop").unwrap().add_table("users").unwrap();

        catalog.rename_database("shop", "store").unwrap();
        assert_eq!(catalog.list_databases().unwrap(), vec!["store"]);
        let store = catalog.open_database("store").unwrap();
        assert_eq!(store.list_tables().unwrap(), vec!["users"]);

        catalog.delete_database("store").unwrap();
        assert!(catalog.list_databases().unwrap().is_empty());
        assert!(catalog
            .delete_database("store")
            .unwrap_err()
            .is_not_found(ObjectKind::Database));
    }

    #[test]
    fn bad_database_names_rejected() {
        let catalog = memory_catalog(Config::default());
        assert!(matches!(
            catalog.create_database("../escape"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn on_disk_catalog() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("dbs");

        assert!(Catalog::open(&root, Config::default().create_if_missing(false)).is_err());

        let catalog = Catalog::open(&root, Config::default().sync_writes(false)).unwrap();
        let db = catalog.create_database("shop").unwrap();
        db.add_table("users").unwrap();

        assert!(root.join("shop/schema.txt").is_file());
        assert!(root.join("shop/pending.txt").is_file());
        assert!(root.join("shop/cache.txt").is_file());
        assert!(root.join("shop/data/users").is_dir());
    }
}
