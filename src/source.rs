use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::domain::TRError;
use crate::record::{FieldKind, FieldValue, Record};

pub const TICKET_FIELDS: &[(&str, FieldKind)] = &[
    ("ticketDate", FieldKind::Date),
    ("title", FieldKind::Text),
    ("description", FieldKind::Text),
    ("tech", FieldKind::Text),
    ("completed", FieldKind::Bool),
    ("customerId", FieldKind::Int),
    ("firstName", FieldKind::Text),
    ("lastName", FieldKind::Text),
    ("email", FieldKind::Text),
    ("phone", FieldKind::Text),
];

pub const CUSTOMER_FIELDS: &[(&str, FieldKind)] = &[
    ("firstName", FieldKind::Text),
    ("lastName", FieldKind::Text),
    ("email", FieldKind::Text),
    ("phone", FieldKind::Text),
    ("address1", FieldKind::Text),
    ("address2", FieldKind::Text),
    ("city", FieldKind::Text),
    ("state", FieldKind::Text),
    ("zip", FieldKind::Text),
    ("notes", FieldKind::Text),
    ("active", FieldKind::Bool),
];

const ID_FIELD: &str = "id";

/// Business-level record queries. Results are already filtered by the data
/// layer; the table never filters server side.
pub trait DataSource: Send + Sync {
    fn search(&self, query: &str) -> Result<Vec<Record>, TRError>;
    fn list_open(&self) -> Result<Vec<Record>, TRError>;

    fn fetch(&self, query: &str) -> Result<Vec<Record>, TRError> {
        match query.trim() {
            "" => self.list_open(),
            q => self.search(q),
        }
    }
}

fn check_file(path: &Path) -> Result<(), TRError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TRError::FileNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => TRError::PermissionDenied(path.to_path_buf()),
        _ => TRError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TRError::loading_failed(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(())
}

fn read_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>, PolarsError> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let col = column.cast(&DataType::String)?;
    let series = col.str()?;
    Ok(Some(series.into_iter().map(|v| v.map(str::to_string)).collect()))
}

/// Reads a CSV file into records typed by `fields`. Every column is read as
/// text first, so values like zip codes keep their leading zeros.
#[instrument(skip(fields))]
pub fn load_records(
    path: &Path,
    fields: &'static [(&'static str, FieldKind)],
) -> Result<Vec<Record>, TRError> {
    check_file(path)?;
    let start_time = Instant::now();

    let df = LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    let ids = read_column(&df, ID_FIELD)?
        .ok_or_else(|| TRError::loading_failed(format!("{} has no id column", path.display())))?;

    let columns: Result<Vec<_>, PolarsError> = fields
        .par_iter()
        .map(|&(name, kind)| read_column(&df, name).map(|data| (name, kind, data)))
        .collect();
    let columns = columns?;

    let mut records = Vec::with_capacity(ids.len());
    for (row, id) in ids.iter().enumerate() {
        let Some(id) = id.as_deref().and_then(|s| s.trim().parse::<i64>().ok()) else {
            warn!("Skipping row {row} of {} without a valid id", path.display());
            continue;
        };
        let mut record = Record::new(id);
        for (name, kind, data) in columns.iter() {
            let raw = data.as_ref().and_then(|d| d[row].as_deref());
            record = record.with(name, FieldValue::parse(*kind, raw));
        }
        records.push(record);
    }

    info!(
        "Loaded {} records from {} in {}ms",
        records.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

fn ilike(record: &Record, field: &str, needle: &str) -> bool {
    record
        .text(field)
        .is_some_and(|v| v.to_lowercase().contains(needle))
}

pub struct TicketSource {
    path: PathBuf,
}

impl TicketSource {
    pub fn new(data_dir: &Path) -> Self {
        TicketSource {
            path: data_dir.join("tickets.csv"),
        }
    }
}

const TICKET_SEARCH_FIELDS: [&str; 6] = ["title", "tech", "firstName", "lastName", "email", "phone"];

impl DataSource for TicketSource {
    fn search(&self, query: &str) -> Result<Vec<Record>, TRError> {
        let needle = query.to_lowercase();
        let records = load_records(&self.path, TICKET_FIELDS)?;
        let found: Vec<Record> = records
            .into_par_iter()
            .filter(|r| TICKET_SEARCH_FIELDS.iter().any(|f| ilike(r, f, &needle)))
            .collect();
        debug!("Ticket search {query:?} found {}", found.len());
        Ok(found)
    }

    fn list_open(&self) -> Result<Vec<Record>, TRError> {
        let mut open: Vec<Record> = load_records(&self.path, TICKET_FIELDS)?
            .into_par_iter()
            .filter(|r| !matches!(r.get("completed"), FieldValue::Bool(true)))
            .collect();
        open.sort_by_key(|r| match r.get("ticketDate") {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        });
        Ok(open)
    }
}

pub struct CustomerSource {
    path: PathBuf,
}

impl CustomerSource {
    pub fn new(data_dir: &Path) -> Self {
        CustomerSource {
            path: data_dir.join("customers.csv"),
        }
    }
}

const CUSTOMER_SEARCH_FIELDS: [&str; 6] = ["firstName", "lastName", "email", "phone", "city", "zip"];

/// "first last" match where the first space of the query is a wildcard.
fn full_name_matches(record: &Record, needle: &str) -> bool {
    let full = format!(
        "{} {}",
        record.text("firstName").unwrap_or_default(),
        record.text("lastName").unwrap_or_default()
    )
    .to_lowercase();
    match needle.split_once(' ') {
        Some((head, tail)) => full
            .find(head)
            .is_some_and(|at| full[at + head.len()..].contains(tail)),
        None => full.contains(needle),
    }
}

impl DataSource for CustomerSource {
    fn search(&self, query: &str) -> Result<Vec<Record>, TRError> {
        let needle = query.to_lowercase();
        let found: Vec<Record> = load_records(&self.path, CUSTOMER_FIELDS)?
            .into_par_iter()
            .filter(|r| {
                CUSTOMER_SEARCH_FIELDS.iter().any(|f| ilike(r, f, &needle))
                    || full_name_matches(r, &needle)
            })
            .collect();
        debug!("Customer search {query:?} found {}", found.len());
        Ok(found)
    }

    fn list_open(&self) -> Result<Vec<Record>, TRError> {
        Ok(load_records(&self.path, CUSTOMER_FIELDS)?
            .into_par_iter()
            .filter(|r| !matches!(r.get("active"), FieldValue::Bool(false)))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::PathBuf;

    pub const TICKETS_CSV: &str = "\
id,ticketDate,title,description,tech,completed,customerId,firstName,lastName,email,phone
1,2024-03-02 10:00:00,Broken screen,,Dave,false,1,Anna,Smith,anna@example.com,555-0101
2,2024-01-05 09:30:00,Battery swap,Replace battery,Maria,true,2,Bob,Jones,bob@example.com,555-0102
3,2024-02-11 15:45:00,Water damage,,Dave,false,1,Anna,Smith,anna@example.com,555-0101
x,2024-02-12 15:45:00,Broken row,,Dave,false,1,Anna,Smith,anna@example.com,555-0101
";

    pub const CUSTOMERS_CSV: &str = "\
id,firstName,lastName,email,phone,address1,address2,city,state,zip,notes,active
1,Anna,Smith,anna@example.com,555-0101,1 Main St,,Springfield,IL,02134,,true
2,Bob,Jones,bob@example.com,555-0102,2 Oak Ave,Apt 4,Shelbyville,IL,62565,VIP,false
";

    pub fn data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rtrack-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tickets.csv"), TICKETS_CSV).unwrap();
        std::fs::write(dir.join("customers.csv"), CUSTOMERS_CSV).unwrap();
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_typed_records_and_skips_bad_ids() {
        let dir = fixtures::data_dir("load");
        let records = load_records(&dir.join("tickets.csv"), TICKET_FIELDS).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].get("completed"), &FieldValue::Bool(true));
        assert_eq!(records[0].get("description"), &FieldValue::Missing);
        assert_eq!(records[0].get("customerId"), &FieldValue::Int(1));
    }

    #[test]
    fn keeps_leading_zeros() {
        let dir = fixtures::data_dir("zip");
        let records = load_records(&dir.join("customers.csv"), CUSTOMER_FIELDS).unwrap();
        assert_eq!(records[0].text("zip"), Some("02134"));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = fixtures::data_dir("missing");
        let err = load_records(&dir.join("nope.csv"), TICKET_FIELDS).unwrap_err();
        assert!(matches!(err, TRError::FileNotFound(_)));
    }

    #[test]
    fn open_tickets_are_ordered_by_date() {
        let dir = fixtures::data_dir("open");
        let open = TicketSource::new(&dir).fetch("  ").unwrap();
        let ids: Vec<i64> = open.iter().map(Record::id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn ticket_search_is_case_insensitive() {
        let dir = fixtures::data_dir("tsearch");
        let source = TicketSource::new(&dir);
        assert_eq!(source.search("dave").unwrap().len(), 2);
        assert_eq!(source.search("BATTERY").unwrap().len(), 1);
    }

    #[test]
    fn customer_search_matches_full_name() {
        let dir = fixtures::data_dir("csearch");
        let source = CustomerSource::new(&dir);
        assert_eq!(source.search("anna smith").unwrap().len(), 1);
        assert_eq!(source.search("shelby").unwrap().len(), 1);
        assert_eq!(source.search("nobody").unwrap().len(), 0);
        assert_eq!(source.list_open().unwrap().len(), 1);
    }
}
