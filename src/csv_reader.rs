use crate::structs::{CountsTable, Result, TyperError};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;

impl CountsTable {
    /// Parse a CSV or TSV counts file with a header row and a leftmost gene column
    ///
    /// # Errors
    /// Returns error if the file cannot be read, has no data, has ragged rows,
    /// or repeats a gene or sample label
    pub fn from_file(path: &Path, is_tsv: bool) -> Result<Self> {
        let delimiter = if is_tsv { b'\t' } else { b',' };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let Some((_, samples)) = header.split_first() else {
            return Err(TyperError::InputShape("Counts file has no header row".into()));
        };
        if samples.is_empty() {
            return Err(TyperError::InputShape(
                "Counts file has no sample columns".into(),
            ));
        }
        ensure_unique("sample", samples)?;

        let mut genes = Vec::new();
        let mut cells = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let mut fields = record.iter();
            let gene = fields.next().unwrap_or_default().to_string();
            let row: Vec<String> = fields.map(str::to_string).collect();

            if row.len() != samples.len() {
                return Err(TyperError::InputShape(format!(
                    "Row {} ({gene}) has {} values, header has {} samples",
                    line + 2,
                    row.len(),
                    samples.len()
                )));
            }
            genes.push(gene);
            cells.push(row);
        }

        if genes.is_empty() {
            return Err(TyperError::InputShape("Counts file has no gene rows".into()));
        }
        ensure_unique("gene", &genes)?;

        Ok(Self {
            genes,
            samples: samples.to_vec(),
            cells,
        })
    }
}

fn ensure_unique(kind: &str, labels: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(TyperError::InputShape(format!(
                "Duplicate {kind} label: {label}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(content.as_bytes()).expect("write content");
        file
    }

    #[test]
    fn test_parse_counts() {
        let file = create_test_csv(",1_1.a,1_2.b,2_1.c\n1,0,3,4\ngene2,5,0,0\n");

        let table = CountsTable::from_file(file.path(), false).expect("parse");

        assert_eq!(table.samples, vec!["1_1.a", "1_2.b", "2_1.c"]);
        assert_eq!(table.genes, vec!["1", "gene2"]);
        assert_eq!(table.cells[1], vec!["5", "0", "0"]);
        assert_eq!(table.n_genes(), 2);
        assert_eq!(table.n_samples(), 3);
    }

    #[test]
    fn test_parse_tsv() {
        let file = create_test_csv("id\ts1\ts2\ng1\t1\t2\n");

        let table = CountsTable::from_file(file.path(), true).expect("parse");

        assert_eq!(table.samples, vec!["s1", "s2"]);
    }

    #[test]
    fn test_ragged_row_rejected() {
        let file = create_test_csv(",s1,s2\ng1,1,2\ng2,1\n");

        let err = CountsTable::from_file(file.path(), false).unwrap_err();
        assert!(matches!(err, TyperError::InputShape(_)));
        assert!(err.to_string().contains("g2"));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let genes = create_test_csv(",s1,s2\ng1,1,2\ng1,3,4\n");
        assert!(matches!(
            CountsTable::from_file(genes.path(), false),
            Err(TyperError::InputShape(_))
        ));

        let samples = create_test_csv(",s1,s1\ng1,1,2\n");
        assert!(matches!(
            CountsTable::from_file(samples.path(), false),
            Err(TyperError::InputShape(_))
        ));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let no_rows = create_test_csv(",s1,s2\n");
        assert!(CountsTable::from_file(no_rows.path(), false).is_err());

        let no_samples = create_test_csv("gene\ng1\n");
        assert!(CountsTable::from_file(no_samples.path(), false).is_err());
    }
}
