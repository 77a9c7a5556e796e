use std::collections::HashSet;

// In-memory form of one loaded tabular file. Cells hold raw text; empty CSV
// cells are missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    columns: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    cells: Vec<Option<String>>,
}

impl Series {
    pub fn new(name: impl Into<String>, cells: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|c| c.as_deref())
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    pub fn present(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().filter_map(|c| c.as_deref())
    }

    pub fn unique_count(&self) -> usize {
        self.present().collect::<HashSet<_>>().len()
    }

    // Some only when every non-missing cell parses as a number and at least
    // one value is present.
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        let mut values = Vec::new();
        for cell in self.present() {
            match cell.trim().parse::<f64>() {
                Ok(v) => values.push(v),
                Err(_) => return None,
            }
        }

        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_values().is_some()
    }
}

impl DataFrame {
    pub fn new(columns: Vec<Series>) -> Self {
        Self { columns }
    }

    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let mut columns: Vec<Series> = headers
            .into_iter()
            .map(|h| Series::new(h, Vec::with_capacity(rows.len())))
            .collect();

        for row in rows {
            for (column, cell) in columns.iter_mut().zip(row) {
                column.cells.push(cell);
            }
        }

        Self { columns }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Series] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Series> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
