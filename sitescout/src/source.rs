//! Reading targets from a CSV file.
//!
//! The first row is a header and is skipped. Every data row must have the
//! same number of fields as the header; the target is taken from a fixed
//! column (the second one by default). Any malformed row ends the source
//! with a fatal [`ScoutError::InvalidInput`].
use csv::{ReaderBuilder, StringRecordsIntoIter};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::errors::{ScoutError, ScoutResult};
use crate::results::Target;

/// Lazily yields one target per CSV data row
pub struct CsvTargetSource<R> {
    records: StringRecordsIntoIter<R>,
    column: usize,
    done: bool,
}

impl CsvTargetSource<File> {
    /// Opens `path`; an unreadable file is a startup error
    pub fn open(path: &Path, column: usize) -> ScoutResult<Self> {
        let file = File::open(path).map_err(|e| ScoutError::input_open(path, e))?;
        debug!("Reading targets from {} (column {})", path.display(), column);
        Ok(Self::from_reader(file, column))
    }
}

impl<R: Read> CsvTargetSource<R> {
    pub fn from_reader(reader: R, column: usize) -> Self {
        let records = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader)
            .into_records();
        Self {
            records,
            column,
            done: false,
        }
    }
}

impl<R: Read> Iterator for CsvTargetSource<R> {
    type Item = ScoutResult<Target>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = match self.records.next()? {
            Ok(record) => match record.get(self.column) {
                Some(field) => return Some(Ok(Target::new(field))),
                None => {
                    let line = record.position().map_or(0, |p| p.line());
                    ScoutError::invalid_input(
                        line,
                        format!(
                            "row has {} fields, target column {} is missing",
                            record.len(),
                            self.column
                        ),
                    )
                }
            },
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                ScoutError::invalid_input(line, e.to_string())
            }
        };

        // Nothing after a malformed row is trusted
        self.done = true;
        Some(Err(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn collect(input: &str, column: usize) -> Vec<ScoutResult<Target>> {
        CsvTargetSource::from_reader(input.as_bytes(), column).collect()
    }

    #[test]
    fn test_skips_header_and_reads_second_column() {
        let input = "rank,host\n1,a.test\n2,b.test\n3,c.test\n";
        let targets: Vec<Target> = collect(input, 1)
            .into_iter()
            .collect::<ScoutResult<_>>()
            .unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new("a.test"),
                Target::new("b.test"),
                Target::new("c.test")
            ]
        );
    }

    #[test]
    fn test_header_only_yields_nothing() {
        assert!(collect("rank,host\n", 1).is_empty());
        assert!(collect("", 1).is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        let targets = collect("rank,url\n1,\"https://example.com/a,b\"\n", 1);
        assert_eq!(targets.len(), 1);
        assert_eq!(
            targets[0].as_ref().unwrap(),
            &Target::new("https://example.com/a,b")
        );
    }

    #[test]
    fn test_malformed_row_is_fatal_and_ends_source() {
        let results = collect("rank,host\n1,a.test\n2\n3,c.test\n", 1);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ScoutError::InvalidInput { line: 3, .. })
        ));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let results = collect("host\na.test\n", 1);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(ScoutError::InvalidInput { .. })));
    }

    #[test]
    fn test_open_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "rank,host").unwrap();
        writeln!(file, "1,example.com").unwrap();

        let targets: Vec<_> = CsvTargetSource::open(&path, 1).unwrap().collect();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].as_ref().unwrap(), &Target::new("example.com"));
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        let err = CsvTargetSource::open(Path::new("does/not/exist.csv"), 1)
            .err()
            .unwrap();
        assert!(matches!(err, ScoutError::InputOpen { .. }));
    }
}
