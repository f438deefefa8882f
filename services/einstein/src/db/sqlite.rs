//! SQLite-backed metadata store.
//!
//! Ids are `AUTOINCREMENT` so a deleted row's id is never handed out again:
//! derived storage names embed the id and must stay unique for the life of
//! the deployment.

use std::path::Path;

use bmi_id::{ImageId, ProjectId};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::error::constraint_code;
use super::store::{DiskSummary, ImageRecord, ImageSummary, MetadataStore, NewImage, ProjectRecord};
use super::StoreError;

const IMAGE_COLUMNS: &str = "id, name, project_id, parent_id, is_snapshot, public";

/// SQLite metadata store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS project (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS image (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                project_id INTEGER NOT NULL REFERENCES project(id),
                parent_id INTEGER REFERENCES image(id),
                is_snapshot INTEGER NOT NULL DEFAULT 0,
                public INTEGER NOT NULL DEFAULT 0,
                UNIQUE (name, project_id)
            );

            CREATE INDEX IF NOT EXISTS idx_image_project ON image(project_id);
            CREATE INDEX IF NOT EXISTS idx_image_parent ON image(parent_id);
            "#,
        )?;

        debug!("Metadata store schema initialized");
        Ok(())
    }

    /// Insert a project unless one with this name already exists.
    pub fn ensure_project(&self, name: &str) -> Result<ProjectId, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO project (name) VALUES (?1)",
            params![name],
        )?;
        if inserted > 0 {
            debug!(project = %name, "Seeded project");
        }

        self.find_project_id(name)?
            .ok_or_else(|| StoreError::ProjectNotFound(name.to_string()))
    }

    fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
        Ok(ImageRecord {
            id: ImageId::new(row.get(0)?),
            name: row.get(1)?,
            project_id: ProjectId::new(row.get(2)?),
            parent_id: row.get::<_, Option<i64>>(3)?.map(ImageId::new),
            is_snapshot: row.get(4)?,
            public: row.get(5)?,
        })
    }

    fn names(&self, sql: &str, project_id: ProjectId) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let names = stmt
            .query_map(params![project_id.value()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn map_image_write(e: rusqlite::Error, name: &str) -> StoreError {
        match constraint_code(&e) {
            Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
                StoreError::Conflict(format!("Image {name} already exists"))
            }
            Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                StoreError::Invalid(format!("image {name} references a missing row"))
            }
            _ => StoreError::Query(e),
        }
    }
}

impl MetadataStore for SqliteStore {
    fn find_project_id(&self, name: &str) -> Result<Option<ProjectId>, StoreError> {
        self.conn
            .query_row(
                "SELECT id FROM project WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map(|id| id.map(ProjectId::new))
            .map_err(Into::into)
    }

    fn insert_project(&self, name: &str, id: Option<ProjectId>) -> Result<ProjectId, StoreError> {
        self.conn
            .execute(
                "INSERT INTO project (id, name) VALUES (?1, ?2)",
                params![id.map(|id| id.value()), name],
            )
            .map_err(|e| match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
                    StoreError::Conflict(format!("Project {name} already exists"))
                }
                _ => StoreError::Query(e),
            })?;

        let id = ProjectId::new(self.conn.last_insert_rowid());
        debug!(project = %name, project_id = %id, "Inserted project");
        Ok(id)
    }

    fn delete_project(&self, name: &str) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM project WHERE name = ?1", params![name])
            .map_err(|e| match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    StoreError::Conflict(format!("Project {name} still owns images"))
                }
                _ => StoreError::Query(e),
            })?;

        if deleted == 0 {
            return Err(StoreError::ProjectNotFound(name.to_string()));
        }
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM project ORDER BY id")?;
        let projects = stmt
            .query_map([], |row| {
                Ok(ProjectRecord {
                    id: ProjectId::new(row.get(0)?),
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    fn insert_image(&self, image: &NewImage) -> Result<ImageId, StoreError> {
        self.conn
            .execute(
                r#"
                INSERT INTO image (id, name, project_id, parent_id, is_snapshot, public)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    image.explicit_id.map(|id| id.value()),
                    image.name,
                    image.project_id.value(),
                    image.parent_id.map(|id| id.value()),
                    image.is_snapshot,
                    image.public,
                ],
            )
            .map_err(|e| Self::map_image_write(e, &image.name))?;

        let id = ImageId::new(self.conn.last_insert_rowid());
        debug!(image = %image.name, image_id = %id, "Inserted image");
        Ok(id)
    }

    fn delete_image(&self, name: &str, project_id: ProjectId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM image WHERE name = ?1 AND project_id = ?2",
                params![name, project_id.value()],
            )
            .map_err(|e| match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    StoreError::Conflict(format!("Image {name} has dependent images"))
                }
                _ => StoreError::Query(e),
            })?;

        if deleted == 0 {
            return Err(StoreError::ImageNotFound(name.to_string()));
        }
        Ok(())
    }

    fn find_image_id(
        &self,
        name: &str,
        project_id: ProjectId,
    ) -> Result<Option<ImageId>, StoreError> {
        self.conn
            .query_row(
                "SELECT id FROM image WHERE name = ?1 AND project_id = ?2",
                params![name, project_id.value()],
                |row| row.get(0),
            )
            .optional()
            .map(|id| id.map(ImageId::new))
            .map_err(Into::into)
    }

    fn find_image(
        &self,
        name: &str,
        project_id: ProjectId,
    ) -> Result<Option<ImageRecord>, StoreError> {
        let sql = format!("SELECT {IMAGE_COLUMNS} FROM image WHERE name = ?1 AND project_id = ?2");
        self.conn
            .query_row(&sql, params![name, project_id.value()], Self::image_from_row)
            .optional()
            .map_err(Into::into)
    }

    fn find_parent_id(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> Result<Option<ImageId>, StoreError> {
        self.find_image(name, project_id)?
            .map(|image| image.parent_id)
            .ok_or_else(|| StoreError::ImageNotFound(name.to_string()))
    }

    fn find_project_of_image(&self, id: ImageId) -> Result<Option<ProjectId>, StoreError> {
        self.conn
            .query_row(
                "SELECT project_id FROM image WHERE id = ?1",
                params![id.value()],
                |row| row.get(0),
            )
            .optional()
            .map(|id| id.map(ProjectId::new))
            .map_err(Into::into)
    }

    fn find_name_of_image(&self, id: ImageId) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT name FROM image WHERE id = ?1",
                params![id.value()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn list_images(&self, project_id: ProjectId) -> Result<Vec<String>, StoreError> {
        self.names(
            "SELECT name FROM image
             WHERE project_id = ?1 AND (parent_id IS NULL OR is_snapshot)
             ORDER BY id",
            project_id,
        )
    }

    fn list_snapshots(&self, project_id: ProjectId) -> Result<Vec<String>, StoreError> {
        self.names(
            "SELECT name FROM image WHERE project_id = ?1 AND is_snapshot ORDER BY id",
            project_id,
        )
    }

    fn list_disks(&self, project_id: ProjectId) -> Result<Vec<DiskSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT i.name, p.name
             FROM image i LEFT JOIN image p ON p.id = i.parent_id
             WHERE i.project_id = ?1 AND i.parent_id IS NOT NULL AND NOT i.is_snapshot
             ORDER BY i.id",
        )?;
        let disks = stmt
            .query_map(params![project_id.value()], |row| {
                Ok(DiskSummary {
                    name: row.get(0)?,
                    parent: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(disks)
    }

    fn list_all_images(&self) -> Result<Vec<ImageSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.name, pr.name, pa.name, i.is_snapshot, i.public
             FROM image i
             JOIN project pr ON pr.id = i.project_id
             LEFT JOIN image pa ON pa.id = i.parent_id
             ORDER BY i.id",
        )?;
        let images = stmt
            .query_map([], |row| {
                Ok(ImageSummary {
                    id: ImageId::new(row.get(0)?),
                    name: row.get(1)?,
                    project: row.get(2)?,
                    parent: row.get(3)?,
                    is_snapshot: row.get(4)?,
                    public: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    fn copy_image(
        &self,
        src_project: ProjectId,
        name: &str,
        dest_project: ProjectId,
        new_name: Option<&str>,
    ) -> Result<ImageId, StoreError> {
        let source = self
            .find_image(name, src_project)?
            .ok_or_else(|| StoreError::ImageNotFound(name.to_string()))?;

        let copy = NewImage::child(new_name.unwrap_or(name), dest_project, source.parent_id)
            .snapshot(source.is_snapshot)
            .public(source.public);
        self.insert_image(&copy)
    }

    fn move_image(
        &self,
        src_project: ProjectId,
        name: &str,
        dest_project: ProjectId,
        new_name: Option<&str>,
    ) -> Result<(), StoreError> {
        let target_name = new_name.unwrap_or(name);
        let updated = self
            .conn
            .execute(
                "UPDATE image SET project_id = ?1, name = ?2 WHERE name = ?3 AND project_id = ?4",
                params![dest_project.value(), target_name, name, src_project.value()],
            )
            .map_err(|e| Self::map_image_write(e, target_name))?;

        if updated == 0 {
            return Err(StoreError::ImageNotFound(name.to_string()));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Query(e))
    }
}
