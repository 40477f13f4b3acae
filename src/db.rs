use crate::corpus::{CoreType, Frame, FrameRelType};
use crate::error::{PieError, Result};
use crate::parse::strip_markup;
use crate::progress::{ProgressReporter, ProgressUpdate, report_progress};
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::time::Instant;

// --- Schema Definition ---

const SCHEMA_VERSION: u32 = 1;

const CREATE_METADATA_TABLE: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);";

const CREATE_FRAMES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS frames (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    definition TEXT NOT NULL -- Markup already stripped
);";

const CREATE_FRAME_ELEMENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS frame_elements (
    id INTEGER PRIMARY KEY,
    frame_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    core_type TEXT NOT NULL, -- e.g. 'Core', 'Peripheral'
    position INTEGER NOT NULL, -- Document order within the frame
    FOREIGN KEY (frame_id) REFERENCES frames(id)
);";

const CREATE_LEXICAL_UNITS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS lexical_units (
    id INTEGER PRIMARY KEY,
    frame_id INTEGER NOT NULL,
    name TEXT NOT NULL, -- word.pos, e.g. 'abandon.v'
    name_lower TEXT NOT NULL, -- For case-insensitive prefix search
    FOREIGN KEY (frame_id) REFERENCES frames(id)
);";

const CREATE_FRAME_RELATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS frame_relations (
    source_frame TEXT NOT NULL,
    target_frame TEXT NOT NULL,
    rel_type TEXT NOT NULL, -- Label from the frame file, e.g. 'Inherits from'
    position INTEGER NOT NULL, -- Document order within the source frame
    PRIMARY KEY (source_frame, target_frame, rel_type)
);";

// --- Indices ---

const CREATE_FRAME_NAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_frame_name ON frames (name);";
const CREATE_LU_NAME_LOWER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_lu_name_lower ON lexical_units (name_lower);";
const CREATE_FE_FRAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_fe_frame ON frame_elements (frame_id);";
const CREATE_REL_SOURCE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rel_source ON frame_relations (source_frame);";
const CREATE_REL_TARGET_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rel_target ON frame_relations (target_frame);";

// --- Initialization Function ---

/// Creates all necessary tables and indices in the database if they don't exist.
/// Also checks and sets the schema version.
pub fn initialize_database(conn: &mut Connection) -> Result<()> {
    info!(
        "Initializing database schema (version {})...",
        SCHEMA_VERSION
    );
    let tx = conn.transaction()?;

    tx.execute(CREATE_METADATA_TABLE, [])?;
    tx.execute(CREATE_FRAMES_TABLE, [])?;
    tx.execute(CREATE_FRAME_ELEMENTS_TABLE, [])?;
    tx.execute(CREATE_LEXICAL_UNITS_TABLE, [])?;
    tx.execute(CREATE_FRAME_RELATIONS_TABLE, [])?;

    tx.execute(CREATE_FRAME_NAME_INDEX, [])?;
    tx.execute(CREATE_LU_NAME_LOWER_INDEX, [])?;
    tx.execute(CREATE_FE_FRAME_INDEX, [])?;
    tx.execute(CREATE_REL_SOURCE_INDEX, [])?;
    tx.execute(CREATE_REL_TARGET_INDEX, [])?;

    let existing_version_str: Option<String> = tx
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match existing_version_str {
        Some(v_str) => {
            let existing_version: u32 = v_str.parse().map_err(|e| {
                PieError::ParseError(format!(
                    "Failed to parse existing schema version '{}': {}",
                    v_str, e
                ))
            })?;
            match existing_version.cmp(&SCHEMA_VERSION) {
                std::cmp::Ordering::Less => {
                    warn!(
                        "Database schema version ({}) is older than expected ({}). Migration needed.",
                        existing_version, SCHEMA_VERSION
                    );
                    tx.execute(
                        "UPDATE metadata SET value = ?1 WHERE key = 'schema_version'",
                        params![SCHEMA_VERSION.to_string()],
                    )?;
                }
                std::cmp::Ordering::Greater => {
                    warn!(
                        "Database schema version ({}) is newer than expected ({}). Using potentially incompatible schema.",
                        existing_version, SCHEMA_VERSION
                    );
                }
                std::cmp::Ordering::Equal => {
                    debug!(
                        "Database schema version ({}) matches expected version.",
                        existing_version
                    );
                }
            }
        }
        None => {
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            info!("Set initial schema version in metadata table.");
        }
    }

    tx.commit()?;
    info!("Database schema initialization complete.");
    Ok(())
}

// --- Data Population Function ---

/// Populates the database tables from parsed frames.
/// Assumes the database is empty or has been cleared.
pub fn populate_database(
    conn: &mut Connection,
    frames: &[Frame],
    reporter: &ProgressReporter,
) -> Result<()> {
    info!("Populating database from {} parsed frames...", frames.len());
    let start_time = Instant::now();

    let pass1_total = frames.len() as u64;
    let pass2_total = frames.iter().map(|f| f.related_frames().count()).sum::<usize>() as u64;

    let tx = conn.transaction()?;
    {
        let mut frame_stmt = tx.prepare(
            "INSERT INTO frames (id, name, definition) VALUES (?1, ?2, ?3)",
        )?;
        let mut fe_stmt = tx.prepare(
            "INSERT OR IGNORE INTO frame_elements (id, frame_id, name, core_type, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut lu_stmt = tx.prepare(
            "INSERT OR IGNORE INTO lexical_units (id, frame_id, name, name_lower)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut rel_stmt = tx.prepare(
            "INSERT OR IGNORE INTO frame_relations (source_frame, target_frame, rel_type, position)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        // --- Pass 1: Frames with their elements and lexical units ---
        let stage1 = "Pass 1/2: Inserting Frames".to_string();
        report_progress(reporter, ProgressUpdate::new_stage(stage1.clone(), Some(pass1_total)));
        for (idx, frame) in frames.iter().enumerate() {
            let definition = frame.definition.as_deref().map(strip_markup).unwrap_or_default();
            frame_stmt.execute(params![frame.id, frame.name, definition])?;

            for (position, fe) in frame.frame_elements.iter().enumerate() {
                fe_stmt.execute(params![
                    fe.id,
                    frame.id,
                    fe.name,
                    core_type_to_string(fe.core_type),
                    position as i64,
                ])?;
            }

            for lu in &frame.lexical_units {
                lu_stmt.execute(params![
                    lu.id,
                    frame.id,
                    lu.name,
                    lu.name.to_lowercase(),
                ])?;
            }

            report_progress(
                reporter,
                ProgressUpdate::new(
                    stage1.clone(),
                    idx as u64 + 1,
                    Some(pass1_total),
                    Some(format!("Frame: {}", frame.name)),
                ),
            );
        }
        info!("Pass 1 complete.");

        // --- Pass 2: Frame relations ---
        let stage2 = "Pass 2/2: Inserting Relations".to_string();
        report_progress(reporter, ProgressUpdate::new_stage(stage2.clone(), Some(pass2_total)));
        let mut pass2_current = 0;
        for frame in frames {
            for (position, (target, rel_type)) in frame.related_frames().enumerate() {
                rel_stmt.execute(params![frame.name, target, rel_type.label(), position as i64])?;
                pass2_current += 1;
                report_progress(
                    reporter,
                    ProgressUpdate::new(stage2.clone(), pass2_current, Some(pass2_total), None),
                );
            }
        }
        info!("Pass 2 complete.");
    }
    tx.commit()?;

    info!(
        "Database population complete. Took {:.2?}",
        start_time.elapsed()
    );
    Ok(())
}

/// Helper to clear all frame data before repopulating.
pub fn clear_database_data(tx: &Transaction) -> Result<()> {
    info!("Clearing existing data from database tables...");
    tx.execute("DELETE FROM frame_relations", [])?;
    tx.execute("DELETE FROM lexical_units", [])?;
    tx.execute("DELETE FROM frame_elements", [])?;
    tx.execute("DELETE FROM frames", [])?;
    // Don't delete from metadata table
    Ok(())
}

// --- Enum to String Conversion Helpers ---

pub(crate) fn core_type_to_string(core_type: CoreType) -> &'static str {
    match core_type {
        CoreType::Core => "Core",
        CoreType::CoreUnexpressed => "Core-Unexpressed",
        CoreType::Peripheral => "Peripheral",
        CoreType::ExtraThematic => "Extra-Thematic",
        CoreType::Other => "Other",
    }
}

pub fn string_to_rel_type(s: &str) -> FrameRelType {
    FrameRelType::from_label(s)
}
