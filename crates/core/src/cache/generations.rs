//! Cache generation lifecycle: open-by-name, enumerate, delete.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to one named cache generation.
///
/// Obtained from [`CacheDb::open_generation`]. The handle stays usable after the
/// generation is deleted, but writes through it then fail with
/// [`Error::GenerationMissing`] instead of bringing the generation back.
#[derive(Clone, Debug)]
pub struct Generation {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheDb {
    /// Open a generation by name, creating it if it doesn't exist yet.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("cache generation name cannot be empty".into()));
        }

        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let created = self
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "INSERT OR IGNORE INTO cache_generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)?;

        if created {
            tracing::debug!(generation = name, "created cache generation");
        }

        Ok(Generation { db: self.clone(), name: name.to_string() })
    }

    /// Check whether a generation with this name exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All generation names, in creation order.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_generations ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry in it.
    ///
    /// Returns false if no generation had this name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl CacheDb {
    /// Make every later attempt to delete generation `name` fail.
    ///
    /// Installs an aborting trigger, so deletion fails inside SQLite the way a
    /// locked or corrupt store would.
    pub async fn lock_generation(&self, name: &str) -> Result<(), Error> {
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS lock_generation_{id}
             BEFORE DELETE ON cache_generations
             WHEN OLD.name = '{quoted}'
             BEGIN SELECT RAISE(ABORT, 'cache generation is locked'); END;",
            id = hex::encode(name),
            quoted = name.replace('\'', "''"),
        );
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
