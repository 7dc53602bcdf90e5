use std::cmp::Ordering;

use tracing::{debug, trace, warn};

use crate::domain::TRError;
use crate::facets;
use crate::location::Navigator;
use crate::pager::{PageState, Pager};
use crate::projector::{Cell, ColumnDef, project};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortDescriptor {
    pub column: String,
    pub direction: SortDirection,
}

impl SortDescriptor {
    pub fn ascending(column: &str) -> Self {
        SortDescriptor {
            column: column.to_string(),
            direction: SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterDescriptor {
    pub column: String,
    pub value: String,
}

/// Where row activation leads: `path?param=<record id>`.
#[derive(Debug, Clone)]
pub struct DetailRoute {
    pub path: String,
    pub param: String,
}

/// Everything derived from (cells, sorting, filters). Thrown away and rebuilt
/// on every mutation.
#[derive(Debug, Default)]
struct Derived {
    rows: Vec<usize>,
    facets: Vec<Vec<String>>,
}

pub struct TableController {
    columns: Vec<ColumnDef>,
    records: Vec<Record>,
    cells: Vec<Vec<Cell>>,
    sorting: Vec<SortDescriptor>,
    filters: Vec<FilterDescriptor>,
    pager: Pager,
    detail: Option<DetailRoute>,
    derived: Derived,
}

impl TableController {
    pub fn new(columns: Vec<ColumnDef>, records: Vec<Record>, pager: Pager) -> Self {
        let mut table = TableController {
            columns,
            records: Vec::new(),
            cells: Vec::new(),
            sorting: Vec::new(),
            filters: Vec::new(),
            pager,
            detail: None,
            derived: Derived::default(),
        };
        table.load(records);
        table
    }

    pub fn with_sorting(mut self, sorting: Vec<SortDescriptor>) -> Self {
        self.sorting = sorting;
        self.recompute();
        self
    }

    pub fn with_detail_route(mut self, path: &str, param: &str) -> Self {
        self.detail = Some(DetailRoute {
            path: path.to_string(),
            param: param.to_string(),
        });
        self
    }

    fn load(&mut self, records: Vec<Record>) {
        self.cells = records
            .iter()
            .map(|r| self.columns.iter().map(|c| project(r, c)).collect())
            .collect();
        self.records = records;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.derived = derive(&self.columns, &self.cells, &self.sorting, &self.filters);
        self.pager.clamp(self.derived.rows.len());
        trace!(
            "Recomputed: {} of {} rows, page {:?}",
            self.derived.rows.len(),
            self.records.len(),
            self.pager.state()
        );
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn record(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == id)
    }

    // -------------------- Sorting ---------------------- //

    pub fn sorting(&self) -> &[SortDescriptor] {
        &self.sorting
    }

    pub fn sort_direction(&self, column: &str) -> Option<SortDirection> {
        self.sorting
            .iter()
            .find(|s| s.column == column)
            .map(|s| s.direction)
    }

    fn next_direction(current: Option<SortDirection>) -> Option<SortDirection> {
        match current {
            None => Some(SortDirection::Ascending),
            Some(SortDirection::Ascending) => Some(SortDirection::Descending),
            Some(SortDirection::Descending) => None,
        }
    }

    /// Cycles ascending, descending, unsorted on `column`, replacing any
    /// other sort.
    pub fn toggle_sort(&mut self, column: &str) {
        if self.column_index(column).is_none() {
            warn!("Cannot sort by unknown column {column}");
            return;
        }
        let next = Self::next_direction(self.sort_direction(column));
        self.sorting = next
            .map(|direction| SortDescriptor {
                column: column.to_string(),
                direction,
            })
            .into_iter()
            .collect();
        debug!("Sorting is now {:?}", self.sorting);
        self.recompute();
    }

    /// Same cycle as `toggle_sort`, but keeps the other sort keys. A newly
    /// sorted column becomes the last tie breaker.
    pub fn toggle_sort_chain(&mut self, column: &str) {
        if self.column_index(column).is_none() {
            warn!("Cannot sort by unknown column {column}");
            return;
        }
        let position = self.sorting.iter().position(|s| s.column == column);
        match (position, Self::next_direction(self.sort_direction(column))) {
            (Some(idx), Some(direction)) => self.sorting[idx].direction = direction,
            (Some(idx), None) => {
                self.sorting.remove(idx);
            }
            (None, _) => self.sorting.push(SortDescriptor::ascending(column)),
        }
        debug!("Sorting is now {:?}", self.sorting);
        self.recompute();
    }

    pub fn reset_sorting(&mut self) {
        self.sorting.clear();
        self.recompute();
    }

    // -------------------- Filtering ---------------------- //

    pub fn filters(&self) -> &[FilterDescriptor] {
        &self.filters
    }

    pub fn filter_value(&self, column: &str) -> &str {
        self.filters
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.value.as_str())
            .unwrap_or("")
    }

    /// Replaces the filter of `column`. An empty value clears it.
    pub fn set_filter(&mut self, column: &str, value: &str) {
        match self.column_index(column) {
            Some(idx) if self.columns[idx].filterable => {}
            _ => {
                warn!("Cannot filter by column {column}");
                return;
            }
        }
        let position = self.filters.iter().position(|f| f.column == column);
        match (position, value.is_empty()) {
            (Some(idx), true) => {
                self.filters.remove(idx);
            }
            (Some(idx), false) => self.filters[idx].value = value.to_string(),
            (None, false) => self.filters.push(FilterDescriptor {
                column: column.to_string(),
                value: value.to_string(),
            }),
            (None, true) => return,
        }
        debug!("Filters are now {:?}", self.filters);
        self.recompute();
    }

    pub fn reset_filters(&mut self) {
        self.filters.clear();
        self.recompute();
    }

    /// Filter suggestions for the column at `idx`, taken from the rows that
    /// pass every other column's filter.
    pub fn suggestions(&self, idx: usize) -> &[String] {
        self.derived
            .facets
            .get(idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // -------------------- Records ---------------------- //

    /// Swaps in a freshly fetched result set, keeping sort, filter and page
    /// state. Returns false if nothing changed.
    pub fn replace_records(&mut self, records: Vec<Record>) -> bool {
        if records == self.records {
            trace!("Refresh returned identical records");
            return false;
        }
        debug!("Replacing {} records with {}", self.records.len(), records.len());
        self.load(records);
        true
    }

    pub fn filtered_count(&self) -> usize {
        self.derived.rows.len()
    }

    /// Rows of the current page with their projected cells.
    pub fn visible_rows(&self) -> impl Iterator<Item = (&Record, &[Cell])> {
        let range = self.pager.state().range(self.derived.rows.len());
        self.derived.rows[range]
            .iter()
            .map(|&r| (&self.records[r], self.cells[r].as_slice()))
    }

    pub fn visible_row(&self, page_row: usize) -> Option<&Record> {
        self.visible_rows().nth(page_row).map(|(r, _)| r)
    }

    /// Opens the detail view for a row of the current page.
    pub fn activate(
        &self,
        page_row: usize,
        navigator: &mut dyn Navigator,
    ) -> Result<Option<i64>, TRError> {
        let (Some(record), Some(route)) = (self.visible_row(page_row), &self.detail) else {
            return Ok(None);
        };
        navigator.navigate_to(&route.path, &[(route.param.as_str(), record.id().to_string())])?;
        Ok(Some(record.id()))
    }

    // -------------------- Pagination ---------------------- //

    pub fn page(&self) -> PageState {
        self.pager.state()
    }

    pub fn page_count(&self) -> usize {
        self.pager.state().page_count(self.filtered_count())
    }

    pub fn can_previous(&self) -> bool {
        self.pager.state().can_previous()
    }

    pub fn can_next(&self) -> bool {
        self.pager.state().can_next(self.filtered_count())
    }

    pub fn next_page(&mut self) {
        self.pager.next(self.derived.rows.len());
    }

    pub fn previous_page(&mut self) {
        self.pager.previous(self.derived.rows.len());
    }

    pub fn first_page(&mut self) {
        self.pager.first(self.derived.rows.len());
    }

    pub fn last_page(&mut self) {
        self.pager.last(self.derived.rows.len());
    }

    pub fn sync_page_from_location(&mut self) {
        self.pager.sync_from_location(self.derived.rows.len());
    }
}

fn derive(
    columns: &[ColumnDef],
    cells: &[Vec<Cell>],
    sorting: &[SortDescriptor],
    filters: &[FilterDescriptor],
) -> Derived {
    let position = |id: &str| columns.iter().position(|c| c.id == id);
    let active: Vec<(usize, &str)> = filters
        .iter()
        .filter_map(|f| position(&f.column).map(|c| (c, f.value.as_str())))
        .collect();

    // Per row: the failing filter columns, stopping after two since facets
    // only care about "none" or "exactly this one".
    let mut rows = Vec::new();
    let mut facet_values: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
    for (r, row) in cells.iter().enumerate() {
        let mut failing = active
            .iter()
            .filter(|(c, value)| !facets::matches(&row[*c].display, value))
            .map(|(c, _)| *c);
        match (failing.next(), failing.next()) {
            (None, _) => {
                rows.push(r);
                for (c, cell) in row.iter().enumerate() {
                    facet_values[c].push(&cell.display);
                }
            }
            (Some(c), None) => facet_values[c].push(&row[c].display),
            (Some(_), Some(_)) => {}
        }
    }

    let keys: Vec<(usize, bool)> = sorting
        .iter()
        .filter_map(|s| position(&s.column).map(|c| (c, s.direction == SortDirection::Descending)))
        .collect();
    if !keys.is_empty() {
        // stable, so equal keys keep source order
        rows.sort_by(|&a, &b| {
            keys.iter()
                .map(|&(c, desc)| cells[a][c].key.compare(&cells[b][c].key, desc))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    let facets = facet_values
        .into_iter()
        .zip(columns)
        .map(|(values, column)| {
            if column.filterable {
                facets::unique_values(values)
            } else {
                Vec::new()
            }
        })
        .collect();

    Derived { rows, facets }
}
