use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use chrono::NaiveDateTime;

use crate::record::{FieldValue, Record};

pub const COMPLETED_LABEL: &str = "COMPLETED";
pub const OPEN_LABEL: &str = "OPEN";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formatter {
    Date,
    BoolStatus,
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub id: String,
    pub title: String,
    pub formatter: Formatter,
    pub width: Option<u16>,
    pub filterable: bool,
}

impl ColumnDef {
    pub fn new(id: &str, formatter: Formatter, width: Option<u16>) -> Self {
        ColumnDef {
            id: id.to_string(),
            title: title_case(id),
            formatter,
            width,
            filterable: true,
        }
    }

    pub fn value<'r>(&self, record: &'r Record) -> &'r FieldValue {
        record.get(&self.id)
    }
}

fn title_case(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Comparison key kept next to the display string so that sorting never
/// runs on formatted text.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Missing,
    Bool(bool),
    Date(NaiveDateTime),
    Int(i64),
    Text(String),
}

impl SortKey {
    /// Missing values always sort last, independent of direction.
    pub fn compare(&self, other: &SortKey, descending: bool) -> Ordering {
        let ord = match (self, other) {
            (SortKey::Missing, SortKey::Missing) => return Ordering::Equal,
            (SortKey::Missing, _) => return Ordering::Greater,
            (_, SortKey::Missing) => return Ordering::Less,
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Int(a), SortKey::Int(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => natural_cmp(a, b),
            (a, b) => a.rank().cmp(&b.rank()),
        };
        if descending { ord.reverse() } else { ord }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Bool(_) => 1,
            SortKey::Date(_) => 2,
            SortKey::Int(_) => 3,
            SortKey::Text(_) => 4,
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

/// Compares digit runs by their numeric value, without parsing so any
/// length works.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Case-insensitive order where runs of digits compare as numbers, so
/// "ticket 2" < "Ticket 10". Ties fall back to the raw strings.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut xs = a.chars().peekable();
    let mut ys = b.chars().peekable();
    loop {
        let ord = match (xs.peek().copied(), ys.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                compare_digits(&take_digits(&mut xs), &take_digits(&mut ys))
            }
            (Some(x), Some(y)) => {
                xs.next();
                ys.next();
                x.to_lowercase().cmp(y.to_lowercase())
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub display: String,
    pub key: SortKey,
}

pub fn project(record: &Record, column: &ColumnDef) -> Cell {
    let value = column.value(record);
    let display = match (column.formatter, value) {
        (_, FieldValue::Missing) => String::new(),
        (Formatter::Date, FieldValue::Date(d)) => d.format("%b %-d, %Y").to_string(),
        (Formatter::BoolStatus, FieldValue::Bool(true)) => COMPLETED_LABEL.to_string(),
        (Formatter::BoolStatus, FieldValue::Bool(false)) => OPEN_LABEL.to_string(),
        (_, FieldValue::Text(s)) => s.clone(),
        (_, FieldValue::Bool(b)) => b.to_string(),
        (_, FieldValue::Date(d)) => d.to_string(),
        (_, FieldValue::Int(i)) => i.to_string(),
    };
    let key = match value {
        FieldValue::Missing => SortKey::Missing,
        FieldValue::Bool(b) => SortKey::Bool(*b),
        FieldValue::Date(d) => SortKey::Date(*d),
        FieldValue::Int(i) => SortKey::Int(*i),
        FieldValue::Text(s) => SortKey::Text(s.clone()),
    };
    Cell { display, key }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> FieldValue {
        FieldValue::Date(
            NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|d| d.and_hms_opt(12, 0, 0))
                .unwrap(),
        )
    }

    #[test]
    fn formats_dates_as_short_dates() {
        let column = ColumnDef::new("ticketDate", Formatter::Date, Some(150));
        let record = Record::new(1).with("ticketDate", date(2024, 1, 5));
        assert_eq!(project(&record, &column).display, "Jan 5, 2024");
        assert_eq!(column.title, "TicketDate");
    }

    #[test]
    fn dates_sort_chronologically_not_lexically() {
        let column = ColumnDef::new("ticketDate", Formatter::Date, None);
        let apr = project(&Record::new(3).with("ticketDate", date(2024, 4, 1)), &column);
        let jan = project(&Record::new(4).with("ticketDate", date(2024, 1, 1)), &column);
        assert!(apr.display < jan.display);
        assert_eq!(jan.key.compare(&apr.key, false), Ordering::Less);
    }

    #[test]
    fn text_compares_ignoring_case_with_numeric_runs() {
        assert_eq!(natural_cmp("anna", "Bob"), Ordering::Less);
        assert_eq!(natural_cmp("Ticket 2", "Ticket 10"), Ordering::Less);
        assert_eq!(natural_cmp("item 007", "item 7"), Ordering::Less);
        assert_eq!(natural_cmp("Dave", "dave"), Ordering::Less);
        assert_eq!(natural_cmp("Dave", "Dave"), Ordering::Equal);
    }

    #[test]
    fn maps_completed_flag_to_status_labels() {
        let column = ColumnDef::new("completed", Formatter::BoolStatus, None);
        let done = Record::new(1).with("completed", FieldValue::Bool(true));
        let open = Record::new(2).with("completed", FieldValue::Bool(false));
        assert_eq!(project(&done, &column).display, COMPLETED_LABEL);
        assert_eq!(project(&open, &column).display, OPEN_LABEL);
    }

    #[test]
    fn missing_values_render_empty_and_sort_last() {
        let column = ColumnDef::new("notes", Formatter::Passthrough, None);
        let cell = project(&Record::new(1), &column);
        assert_eq!(cell.display, "");
        let other = SortKey::Text("a".into());
        assert_eq!(cell.key.compare(&other, false), Ordering::Greater);
        assert_eq!(cell.key.compare(&other, true), Ordering::Greater);
    }
}
