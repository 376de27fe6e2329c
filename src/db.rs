use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::IsItOpenError;
use crate::models::{Coordinates, NewPlace, Place, PlaceCategory, StatusReport};
use crate::policy::Pagination;
use crate::query::{contains_folded, FilterSpec};

// ============================================================================
// STORE INTERFACE
// ============================================================================

/// What the core consumes from the place/report store
pub trait PlaceStore {
    /// Places matching the filter, newest first, one page at a time
    fn find_places(&self, filter: &FilterSpec, page: Pagination) -> Result<Vec<Place>>;

    /// Most recent reports for a place, newest first
    fn find_reports_for_place(&self, place_id: &str, limit: usize) -> Result<Vec<StatusReport>>;

    fn get_place(&self, place_id: &str) -> Result<Option<Place>>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Timestamps are stored as fixed-width RFC 3339 so TEXT ordering is time ordering
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = IsItOpenError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const PLACE_COLUMNS: &str =
    "place_uuid, name, category, city, area, lat, lng, image, maps_link, created_at, updated_at";

fn place_from_row(row: &Row<'_>) -> rusqlite::Result<Place> {
    let lat: Option<f64> = row.get(5)?;
    let lng: Option<f64> = row.get(6)?;

    Ok(Place {
        id: row.get(0)?,
        name: row.get(1)?,
        category: parse_column(row, 2)?,
        city: row.get(3)?,
        area: row.get(4)?,
        coordinates: lat.zip(lng).map(|(lat, lng)| Coordinates { lat, lng }),
        image: row.get(7)?,
        maps_link: row.get(8)?,
        created_at: parse_time(row, 9)?,
        updated_at: parse_time(row, 10)?,
    })
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<StatusReport> {
    Ok(StatusReport {
        id: row.get(0)?,
        place_id: row.get(1)?,
        status: parse_column(row, 2)?,
        updated_by: parse_column(row, 3)?,
        created_at: parse_time(row, 4)?,
    })
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases ignore it)
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Places
    // idempotency_hash is only set for bulk imports; API-created places may repeat
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS places (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            place_uuid TEXT UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            city TEXT NOT NULL,
            area TEXT NOT NULL,
            lat REAL,
            lng REAL,
            image TEXT,
            maps_link TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Status reports (append-only log)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS status_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_uuid TEXT UNIQUE NOT NULL,
            place_uuid TEXT NOT NULL REFERENCES places(place_uuid),
            status TEXT NOT NULL CHECK (status IN ('OPEN', 'CLOSED')),
            updated_by TEXT NOT NULL CHECK (updated_by IN ('staff', 'public')),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_places_created ON places(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_place_time ON status_reports(place_uuid, created_at)",
        [],
    )?;

    Ok(())
}

/// Register contains_folded(haystack, folded_needle) for this connection.
/// Callers bind the needle already lowercased, once per clause.
pub fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "contains_folded",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = |idx: usize| {
                ctx.get_raw(idx)
                    .as_str()
                    .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
            };
            Ok(contains_folded(text(0)?, text(1)?))
        },
    )?;

    Ok(())
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn).context("Failed to set up schema")?;
        register_functions(&conn).context("Failed to register SQL functions")?;
        Ok(SqliteStore { conn })
    }

    pub fn insert_place(&self, place: &Place) -> Result<()> {
        self.insert_place_row(place, None)?;
        debug!(place_id = %place.id, name = %place.name, "place created");
        Ok(())
    }

    fn insert_place_row(&self, place: &Place, hash: Option<&str>) -> rusqlite::Result<usize> {
        self.conn.execute(
            "INSERT INTO places (
                place_uuid, idempotency_hash, name, category, city, area,
                lat, lng, image, maps_link, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                place.id,
                hash,
                place.name,
                place.category.as_str(),
                place.city,
                place.area,
                place.coordinates.map(|c| c.lat),
                place.coordinates.map(|c| c.lng),
                place.image,
                place.maps_link,
                format_time(&place.created_at),
                format_time(&place.updated_at),
            ],
        )
    }

    /// Append a report. Fails with NotFound if the place does not exist.
    pub fn insert_report(&self, report: &StatusReport) -> Result<()> {
        if self.get_place(&report.place_id)?.is_none() {
            return Err(IsItOpenError::place_not_found(&report.place_id).into());
        }

        self.conn.execute(
            "INSERT INTO status_reports (report_uuid, place_uuid, status, updated_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report.id,
                report.place_id,
                report.status.as_str(),
                report.updated_by.as_str(),
                format_time(&report.created_at),
            ],
        )?;

        debug!(
            place_id = %report.place_id,
            status = report.status.as_str(),
            updated_by = report.updated_by.as_str(),
            "status reported"
        );
        Ok(())
    }

    /// Insert places, skipping ones already imported (same name/city/area)
    pub fn import_places(&self, places: &[Place]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for place in places {
            let hash = place.compute_idempotency_hash();

            match self.insert_place_row(place, Some(&hash)) {
                Ok(_) => summary.inserted += 1,
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    summary.duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "place import finished"
        );
        Ok(summary)
    }

    pub fn count_places(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl PlaceStore for SqliteStore {
    fn find_places(&self, filter: &FilterSpec, page: Pagination) -> Result<Vec<Place>> {
        let mut sql = format!("SELECT {} FROM places", PLACE_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if !filter.is_empty() {
            let terms: Vec<String> = filter
                .clauses
                .iter()
                .map(|clause| {
                    values.push(Value::Text(clause.folded_needle()));
                    let idx = values.len();
                    let any = clause
                        .fields
                        .iter()
                        .map(|field| format!("contains_folded({}, ?{})", field.column(), idx))
                        .collect::<Vec<_>>()
                        .join(" OR ");
                    format!("({})", any)
                })
                .collect();

            sql.push_str(" WHERE ");
            sql.push_str(&terms.join(" AND "));
        }

        sql.push_str(&format!(
            " ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Value::Integer(page.limit as i64));
        values.push(Value::Integer(page.offset() as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let places = stmt
            .query_map(params_from_iter(values.iter()), place_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(places)
    }

    fn find_reports_for_place(&self, place_id: &str, limit: usize) -> Result<Vec<StatusReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_uuid, place_uuid, status, updated_by, created_at
             FROM status_reports
             WHERE place_uuid = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let reports = stmt
            .query_map(params![place_id, limit as i64], report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reports)
    }

    fn get_place(&self, place_id: &str) -> Result<Option<Place>> {
        let place = self
            .conn
            .query_row(
                &format!("SELECT {} FROM places WHERE place_uuid = ?1", PLACE_COLUMNS),
                [place_id],
                place_from_row,
            )
            .optional()?;

        Ok(place)
    }
}

// ============================================================================
// CSV SEED IMPORT
// ============================================================================

/// One row of a seed file: name,category,city,area[,lat,lng,image,maps_link]
#[derive(Debug, Deserialize)]
struct PlaceCsvRow {
    name: String,
    category: String,
    city: String,
    area: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    maps_link: Option<String>,
}

pub fn load_places_csv(csv_path: &Path, now: DateTime<Utc>) -> Result<Vec<Place>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(csv_path)
        .context("Failed to open CSV file")?;

    let mut places = Vec::new();

    for (i, result) in rdr.deserialize().enumerate() {
        // +2: header line, 1-based
        let line = i + 2;
        let row: PlaceCsvRow =
            result.with_context(|| format!("Failed to deserialize place on line {}", line))?;

        let category: PlaceCategory = row
            .category
            .parse()
            .with_context(|| format!("Invalid category on line {}", line))?;

        let place = NewPlace {
            name: row.name,
            category,
            city: row.city,
            area: row.area,
            lat: row.lat,
            lng: row.lng,
            image: row.image,
            maps_link: row.maps_link,
        }
        .into_place(now)
        .with_context(|| format!("Invalid place on line {}", line))?;

        places.push(place);
    }

    Ok(places)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportStatus, Reporter};
    use crate::query::interpret_query;
    use chrono::Duration;
    use std::io::Write;

    fn create_test_place(name: &str, category: PlaceCategory, city: &str, area: &str) -> Place {
        NewPlace {
            name: name.to_string(),
            category,
            city: city.to_string(),
            area: area.to_string(),
            lat: None,
            lng: None,
            image: None,
            maps_link: None,
        }
        .into_place(Utc::now())
        .unwrap()
    }

    fn create_test_report(place_id: &str, status: ReportStatus, at: DateTime<Utc>) -> StatusReport {
        StatusReport {
            id: uuid::Uuid::new_v4().to_string(),
            place_id: place_id.to_string(),
            status,
            updated_by: Reporter::Public,
            created_at: at,
        }
    }

    #[test]
    fn test_place_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut place = create_test_place("Apollo Pharmacy", PlaceCategory::Medical, "Hyderabad", "Jubilee Hills");
        place.coordinates = Some(Coordinates { lat: 17.43, lng: 78.41 });
        place.maps_link = Some("https://maps.example/apollo".to_string());

        store.insert_place(&place).unwrap();

        let loaded = store.get_place(&place.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Apollo Pharmacy");
        assert_eq!(loaded.category, PlaceCategory::Medical);
        assert_eq!(loaded.coordinates, place.coordinates);
        assert_eq!(loaded.maps_link, place.maps_link);
        assert_eq!(loaded.created_at.timestamp_millis(), place.created_at.timestamp_millis());

        assert!(store.get_place("missing").unwrap().is_none());
    }

    #[test]
    fn test_reports_newest_first_with_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let place = create_test_place("SBI", PlaceCategory::Bank, "Bangalore", "Indiranagar");
        store.insert_place(&place).unwrap();

        let base = Utc::now();
        // Inserted out of order on purpose
        for (minutes, status) in [
            (20, ReportStatus::Open),
            (5, ReportStatus::Closed),
            (40, ReportStatus::Open),
            (10, ReportStatus::Open),
        ] {
            let report = create_test_report(&place.id, status, base - Duration::minutes(minutes));
            store.insert_report(&report).unwrap();
        }

        let reports = store.find_reports_for_place(&place.id, 3).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].status, ReportStatus::Closed);
        assert!(reports[0].created_at > reports[1].created_at);
        assert!(reports[1].created_at > reports[2].created_at);
    }

    #[test]
    fn test_same_instant_reports_keep_insertion_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let place = create_test_place("SBI", PlaceCategory::Bank, "Bangalore", "Indiranagar");
        store.insert_place(&place).unwrap();

        let at = Utc::now();
        store.insert_report(&create_test_report(&place.id, ReportStatus::Open, at)).unwrap();
        store.insert_report(&create_test_report(&place.id, ReportStatus::Closed, at)).unwrap();

        let reports = store.find_reports_for_place(&place.id, 3).unwrap();
        assert_eq!(reports[0].status, ReportStatus::Closed);
    }

    #[test]
    fn test_report_for_unknown_place_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = create_test_report("nope", ReportStatus::Open, Utc::now());

        let err = IsItOpenError::from(store.insert_report(&report).unwrap_err());
        assert!(matches!(err, IsItOpenError::NotFound(_)));
    }

    #[test]
    fn test_find_places_with_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let apollo = create_test_place("Apollo Pharmacy", PlaceCategory::Medical, "Hyderabad", "Jubilee Hills");
        let sbi = create_test_place("SBI", PlaceCategory::Bank, "Bangalore", "Indiranagar");
        let cafe = create_test_place("Café Müller", PlaceCategory::Food, "Köln", "Altstadt");
        for p in [&apollo, &sbi, &cafe] {
            store.insert_place(p).unwrap();
        }

        let all = store.find_places(&FilterSpec::default(), Pagination::default()).unwrap();
        assert_eq!(all.len(), 3);

        let hits = store
            .find_places(&interpret_query("apollo pharmacy at HYDERABAD", ""), Pagination::default())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, apollo.id);

        let hits = store
            .find_places(&interpret_query("bank", "indira"), Pagination::default())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, sbi.id);

        // Non-ASCII case folding matches the in-memory predicate
        let spec = interpret_query("CAFÉ", "KÖLN");
        let hits = store.find_places(&spec, Pagination::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(spec.matches(&cafe));

        let hits = store
            .find_places(&interpret_query("Indiranagar", "Hyderabad"), Pagination::default())
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_sql_contains_folded_takes_folded_needle() {
        let store = SqliteStore::open_in_memory().unwrap();
        let check = |haystack: &str, needle: &str| -> bool {
            store
                .conn
                .query_row("SELECT contains_folded(?1, ?2)", params![haystack, needle], |row| row.get(0))
                .unwrap()
        };

        assert!(check("Apollo PHARMACY", "pharmacy"));
        assert!(check("Café MÜLLER", "café müller"));
        assert!(!check("Berlin", "köln"));
    }

    #[test]
    fn test_find_places_newest_first_and_paged() {
        let store = SqliteStore::open_in_memory().unwrap();
        let base = Utc::now();

        for i in 0..5 {
            let mut place = create_test_place(&format!("Shop {}", i), PlaceCategory::Shop, "Pune", "Baner");
            place.created_at = base + Duration::minutes(i);
            store.insert_place(&place).unwrap();
        }

        let first = store.find_places(&FilterSpec::default(), Pagination::new(1, 2)).unwrap();
        assert_eq!(first.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["Shop 4", "Shop 3"]);

        let last = store.find_places(&FilterSpec::default(), Pagination::new(3, 2)).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].name, "Shop 0");

        let beyond = store.find_places(&FilterSpec::default(), Pagination::new(9, 2)).unwrap();
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let places = vec![
            create_test_place("Apollo Pharmacy", PlaceCategory::Medical, "Hyderabad", "Jubilee Hills"),
            create_test_place("SBI", PlaceCategory::Bank, "Bangalore", "Indiranagar"),
        ];

        let first = store.import_places(&places).unwrap();
        assert_eq!(first, ImportSummary { inserted: 2, duplicates: 0 });

        // Same content, fresh identities
        let again = vec![
            create_test_place("apollo pharmacy", PlaceCategory::Medical, "Hyderabad", "Jubilee Hills"),
            create_test_place("SBI", PlaceCategory::Bank, "Bangalore", "Indiranagar"),
        ];
        let second = store.import_places(&again).unwrap();
        assert_eq!(second, ImportSummary { inserted: 0, duplicates: 2 });
        assert_eq!(store.count_places().unwrap(), 2);
    }

    #[test]
    fn test_api_created_places_may_repeat() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_place(&create_test_place("SBI", PlaceCategory::Bank, "Pune", "Baner")).unwrap();
        store.insert_place(&create_test_place("SBI", PlaceCategory::Bank, "Pune", "Baner")).unwrap();

        assert_eq!(store.count_places().unwrap(), 2);
    }

    #[test]
    fn test_load_places_csv() {
        let dir = std::env::temp_dir().join(format!("isitopen-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("places.csv");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "name,category,city,area,lat,lng,image,maps_link").unwrap();
        writeln!(file, "Apollo Pharmacy,medical,Hyderabad,Jubilee Hills,17.43,78.41,,").unwrap();
        writeln!(file, "SBI, Bank ,Bangalore,Indiranagar,,,,").unwrap();
        drop(file);

        let places = load_places_csv(&path, Utc::now()).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].category, PlaceCategory::Medical);
        assert_eq!(places[0].coordinates, Some(Coordinates { lat: 17.43, lng: 78.41 }));
        assert_eq!(places[0].image, None);
        assert_eq!(places[1].category, PlaceCategory::Bank);
        assert_eq!(places[1].coordinates, None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_places_csv_rejects_bad_category() {
        let dir = std::env::temp_dir().join(format!("isitopen-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("places.csv");
        std::fs::write(&path, "name,category,city,area\nX,Spaceport,Pune,Baner\n").unwrap();

        let err = load_places_csv(&path, Utc::now()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
