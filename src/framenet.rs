//! SQLite-backed FrameNet frame graph.
//!
//! Frames, their core elements, lexical units and frame-to-frame relations are loaded
//! from the FrameNet 1.7 frame files into a local database on first use and queried from
//! there afterwards.

use crate::corpus::{Frame, FrameRelType};
use crate::data;
use crate::db;
use crate::error::{PieError, Result};
use crate::models::{FrameDescriptor, FrameOrigin};
use crate::parse::parse_frame_files;
use crate::progress::{ProgressCallback, reporter};
use log::{debug, error, info};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Options for loading FrameNet data.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Optional path to a specific database file to use or create.
    /// If None, the default location based on ProjectDirs will be used.
    pub db_path: Option<PathBuf>,
    /// Directory holding (or receiving) the corpus, e.g. an existing NLTK `corpora` dir.
    pub data_dir: Option<PathBuf>,
    /// Force reloading data from the frame files and repopulating the database,
    /// ignoring any existing database content.
    pub force_reload: bool,
}

/// Handle to a populated frame database.
#[derive(Clone)] // Clone is cheap due to Arc<Mutex<...>>
pub struct FrameNet {
    conn: Arc<Mutex<Connection>>,
    /// `None` for in-memory databases.
    db_file_path: Option<Arc<PathBuf>>,
    /// Frames already fetched by name. Only hits are stored.
    frame_cache: Arc<Mutex<HashMap<String, FrameDescriptor>>>,
}

fn open_db_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;

    // WAL so readers don't block the loader
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "cache_size", "-32000")?; // 32MB
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    Ok(conn)
}

impl FrameNet {
    /// Loads FrameNet using default options (automatic database and corpus paths).
    ///
    /// Downloads and extracts the corpus if needed, then opens or creates the database,
    /// initializes the schema and populates it when empty.
    pub async fn load() -> Result<Self> {
        Self::load_with_options(LoadOptions::default(), None).await
    }

    /// Loads FrameNet with specific options and an optional progress callback.
    pub async fn load_with_options(
        options: LoadOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<Self> {
        let db_path = match options.db_path {
            Some(path) => path,
            None => Self::get_default_db_path()?,
        };
        info!("Using database path: {:?}", db_path);

        let db_exists = db_path.exists();
        let mut needs_population = !db_exists || options.force_reload;

        let mut conn = open_db_connection(&db_path)?;
        db::initialize_database(&mut conn)?;

        if !needs_population {
            let frame_count: i64 =
                conn.query_row("SELECT COUNT(*) FROM frames", [], |row| row.get(0))?;
            if frame_count == 0 {
                info!("Database exists but appears empty. Triggering population.");
                needs_population = true;
            } else {
                info!("Database holds {} frames. Skipping population.", frame_count);
            }
        }

        if needs_population {
            if options.force_reload && db_exists {
                info!("Force reload requested. Clearing existing database data...");
                let tx = conn.transaction()?;
                db::clear_database_data(&tx)?;
                tx.commit()?;
            }

            let reporter = reporter(progress);
            let frame_dir = data::ensure_data(options.data_dir.as_deref(), &reporter).await?;
            info!("FrameNet frame files available at: {:?}", frame_dir);

            let paths = data::list_frame_files(&frame_dir)?;
            let frames = parse_frame_files(paths, reporter.clone()).await?;
            db::populate_database(&mut conn, &frames, &reporter)?;
        }

        Ok(FrameNet {
            conn: Arc::new(Mutex::new(conn)),
            db_file_path: Some(Arc::new(db_path)),
            frame_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Builds an in-memory database from already-parsed frames.
    pub fn from_frames(frames: &[Frame]) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        db::initialize_database(&mut conn)?;
        db::populate_database(&mut conn, frames, &reporter(None))?;
        Ok(FrameNet {
            conn: Arc::new(Mutex::new(conn)),
            db_file_path: None,
            frame_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Gets the default path for the SQLite database file.
    pub fn get_default_db_path() -> Result<PathBuf> {
        let data_dir = data::get_data_dir()?;
        Ok(data_dir.join(format!("framenet-{}.db", data::FRAMENET_VERSION)))
    }

    /// Path of the backing database file, `None` when in memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_file_path.as_deref().map(PathBuf::as_path)
    }

    /// Deletes the database file (and its WAL/SHM companions).
    ///
    /// If `db_path_override` is `None`, the default database path is cleared.
    /// A missing file is not an error.
    pub fn clear_database(db_path_override: Option<PathBuf>) -> Result<()> {
        let path_to_clear = match db_path_override {
            Some(path) => path,
            None => Self::get_default_db_path()?,
        };

        if !path_to_clear.exists() {
            info!("Database file not found, nothing to clear: {:?}", path_to_clear);
            return Ok(());
        }

        if let Err(e) = fs::remove_file(&path_to_clear) {
            error!("Failed to delete database file {:?}: {}", path_to_clear, e);
            return Err(PieError::Io(e));
        }
        info!("Deleted database file: {:?}", path_to_clear);
        for companion in ["db-wal", "db-shm"] {
            let path = path_to_clear.with_extension(companion);
            if path.exists() {
                let _ = fs::remove_file(path);
            }
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PieError::Internal("Mutex poisoned".to_string()))
    }

    // --- Query Methods ---

    /// Number of frames in the database.
    pub fn frame_count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM frames", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Frames evoked by `word`, one entry per matching lexical unit.
    ///
    /// Matches lexical units named `word.<pos>` ignoring case; `pos` restricts the suffix.
    pub fn lookup_frames(&self, word: &str, pos: Option<&str>) -> Result<Vec<FrameDescriptor>> {
        debug!("lookup_frames: word='{}', pos={:?}", word, pos);
        let prefix = format!("{}.", word.to_lowercase());
        // Every name starting with "word." sorts in ["word.", "word/").
        let upper = format!("{}/", word.to_lowercase());
        let pos_suffix = pos.map(|p| format!(".{}", p.to_lowercase()));

        let units: Vec<(String, String)> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT lu.name, f.name
                 FROM lexical_units lu JOIN frames f ON f.id = lu.frame_id
                 WHERE lu.name_lower >= ?1 AND lu.name_lower < ?2
                 ORDER BY lu.id",
            )?;
            let rows = stmt.query_map(params![prefix, upper], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let mut frames = Vec::new();
        for (lu_name, frame_name) in units {
            if let Some(suffix) = &pos_suffix {
                if !lu_name.to_lowercase().ends_with(suffix.as_str()) {
                    continue;
                }
            }
            if let Some(mut descriptor) = self.get_frame(&frame_name)? {
                descriptor.lexical_unit = lu_name;
                frames.push(descriptor);
            }
        }
        Ok(frames)
    }

    /// Retrieves a frame by its exact name.
    pub fn get_frame(&self, name: &str) -> Result<Option<FrameDescriptor>> {
        {
            let cache = self
                .frame_cache
                .lock()
                .map_err(|_| PieError::Internal("Mutex poisoned".to_string()))?;
            if let Some(hit) = cache.get(name) {
                return Ok(Some(hit.clone()));
            }
        }

        let fetched = {
            let conn = self.lock()?;
            fetch_descriptor(&conn, name)?
        };

        if let Some(descriptor) = &fetched {
            self.frame_cache
                .lock()
                .map_err(|_| PieError::Internal("Mutex poisoned".to_string()))?
                .entry(name.to_string())
                .or_insert_with(|| descriptor.clone());
        }
        Ok(fetched)
    }

    /// Outgoing relations of a frame, in corpus order.
    pub fn related_frames(&self, name: &str) -> Result<Vec<(String, FrameRelType)>> {
        let conn = self.lock()?;
        Ok(fetch_relations(&conn, name)?
            .into_iter()
            .map(|(target, label)| {
                let rel_type = db::string_to_rel_type(&label);
                (target, rel_type)
            })
            .collect())
    }

    /// Graph distance between two frames with a human-readable explanation.
    ///
    /// 0 for the same frame, 1 for a direct relation, 2 for a shared related frame and 5
    /// otherwise. A frame missing from the database yields `-1`.
    pub fn relation_distance(&self, frame1: &str, frame2: &str) -> Result<(f64, String)> {
        if frame1 == frame2 {
            return Ok((0.0, "Same frame".to_string()));
        }

        let conn = self.lock()?;
        for name in [frame1, frame2] {
            if !frame_exists(&conn, name)? {
                return Ok((-1.0, format!("Frame not found: {}", name)));
            }
        }

        let f1_relations = fetch_relations(&conn, frame1)?;
        let f2_relations = fetch_relations(&conn, frame2)?;

        if let Some((_, rel_type)) = f1_relations.iter().find(|(target, _)| target == frame2) {
            return Ok((
                1.0,
                format!("Direct relation: {} --[{}]--> {}", frame1, rel_type, frame2),
            ));
        }
        if let Some((_, rel_type)) = f2_relations.iter().find(|(target, _)| target == frame1) {
            return Ok((
                1.0,
                format!("Direct relation: {} --[{}]--> {}", frame2, rel_type, frame1),
            ));
        }

        let shared = f1_relations
            .iter()
            .map(|(target, _)| target)
            .find(|target| f2_relations.iter().any(|(other, _)| other == *target));
        if let Some(common) = shared {
            return Ok((2.0, format!("Share related frame: {}", common)));
        }

        Ok((
            5.0,
            format!(
                "No direct FrameNet relation found between {} and {}",
                frame1, frame2
            ),
        ))
    }
}

// --- Internal Helpers ---

fn frame_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM frames WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// `(target frame, relation label)` pairs for `source`, in corpus order.
fn fetch_relations(conn: &Connection, source: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT target_frame, rel_type FROM frame_relations
         WHERE source_frame = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![source], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(PieError::from)
}

fn fetch_descriptor(conn: &Connection, name: &str) -> Result<Option<FrameDescriptor>> {
    let row: Option<(i64, String, String)> = conn
        .query_row(
            "SELECT id, name, definition FROM frames WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((frame_id, frame_name, definition)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT name FROM frame_elements
         WHERE frame_id = ?1 AND core_type = ?2 ORDER BY position",
    )?;
    let core_elements = stmt
        .query_map(
            params![frame_id, db::core_type_to_string(crate::corpus::CoreType::Core)],
            |row| row.get::<_, String>(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(FrameDescriptor {
        name: frame_name,
        definition,
        lexical_unit: String::new(),
        core_elements,
        origin: FrameOrigin::Graph,
    }))
}
