//! Classification of coverage tool output lines.
//!
//! The tool writes its tabular report, a header row, a `TOTAL` row and free
//! form diagnostics for files it could not analyze onto the same stream. Each
//! line is classified on its own, without context from earlier lines.

use crate::error::{CovtreeError, ErrorCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const HEADER_MARKER: &str = "Stmts";
const TOTAL_MARKER: &str = "TOTAL";

/// Statement counts reported for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRecord {
    pub path: PathBuf,
    pub statements: u64,
    pub missed: u64,
    pub missed_lines: String,
}

/// A file the tool could not analyze
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRecord {
    Coverage(CoverageRecord),
    Error(ErrorRecord),
    Ignored,
}

impl LineRecord {
    /// File the record is about, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            LineRecord::Coverage(record) => Some(&record.path),
            LineRecord::Error(record) => Some(&record.path),
            LineRecord::Ignored => None,
        }
    }
}

/// Answers whether a path names an existing regular file
pub trait FileProbe: Send + Sync {
    fn is_regular_file(&self, path: &Path) -> bool;
}

pub struct DiskProbe;

impl FileProbe for DiskProbe {
    fn is_regular_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[derive(Clone)]
pub struct RecordParser {
    probe: Arc<dyn FileProbe>,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser {
    pub fn new() -> Self {
        Self::with_probe(Arc::new(DiskProbe))
    }

    pub fn with_probe(probe: Arc<dyn FileProbe>) -> Self {
        Self { probe }
    }

    pub fn parse_line(&self, line: &str) -> LineRecord {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if is_report_row(&tokens) {
            return match parse_report_row(&tokens, line) {
                Ok(record) => LineRecord::Coverage(record),
                Err(err) => {
                    tracing::warn!("{}", err);
                    LineRecord::Ignored
                }
            };
        }

        self.parse_error_row(&tokens)
    }

    /// `<file> <error class>: <description>` for files that exist on disk
    fn parse_error_row(&self, tokens: &[&str]) -> LineRecord {
        let Some((first, rest)) = tokens.split_first() else {
            return LineRecord::Ignored;
        };

        let path = Path::new(first);
        if !self.probe.is_regular_file(path) {
            return LineRecord::Ignored;
        }

        // The tool's own formatting leaves a space after every word.
        let message: String = rest.iter().map(|token| format!("{} ", token)).collect();
        LineRecord::Error(ErrorRecord {
            path: path.to_path_buf(),
            message,
        })
    }
}

fn is_report_row(tokens: &[&str]) -> bool {
    matches!(tokens.len(), 4 | 5) && tokens[1] != HEADER_MARKER && tokens[0] != TOTAL_MARKER
}

/// `<file> <stmts> <miss> <cover%> [<missing>]`
fn parse_report_row(tokens: &[&str], line: &str) -> Result<CoverageRecord, CovtreeError> {
    let count = |token: &str, column: &str| {
        token.parse::<u64>().map_err(|e| {
            CovtreeError::parse(
                ErrorCode::PARSE_INVALID_COUNT,
                format!("{} column '{}' is not a count ({})", column, token, e),
                line,
            )
        })
    };

    Ok(CoverageRecord {
        path: PathBuf::from(tokens[0]),
        statements: count(tokens[1], "statements")?,
        missed: count(tokens[2], "missed")?,
        missed_lines: tokens.get(4).map(|s| s.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct FixedProbe(HashSet<PathBuf>);

    impl FileProbe for FixedProbe {
        fn is_regular_file(&self, path: &Path) -> bool {
            self.0.contains(path)
        }
    }

    fn parser_with(files: &[&str]) -> RecordParser {
        RecordParser::with_probe(Arc::new(FixedProbe(
            files.iter().map(PathBuf::from).collect(),
        )))
    }

    #[test]
    fn test_four_token_row() {
        let record = parser_with(&[]).parse_line("/a/b.py 11 0 0%");
        assert_eq!(
            record,
            LineRecord::Coverage(CoverageRecord {
                path: PathBuf::from("/a/b.py"),
                statements: 11,
                missed: 0,
                missed_lines: String::new(),
            })
        );
    }

    #[test]
    fn test_five_token_row() {
        let record = parser_with(&[]).parse_line("/a/b.py 11 0 0% 1,2,4-23");
        match record {
            LineRecord::Coverage(record) => {
                assert_eq!(record.statements, 11);
                assert_eq!(record.missed, 0);
                assert_eq!(record.missed_lines, "1,2,4-23");
            }
            other => panic!("expected coverage record, got {:?}", other),
        }
    }

    #[test]
    fn test_header_rows_are_ignored() {
        let parser = parser_with(&[]);
        assert_eq!(parser.parse_line("Stmts Miss Cover Missing"), LineRecord::Ignored);
        assert_eq!(parser.parse_line("Name Stmts Miss Cover"), LineRecord::Ignored);
        assert_eq!(parser.parse_line("Name Stmts Miss Cover Missing"), LineRecord::Ignored);
    }

    #[test]
    fn test_total_row_is_ignored() {
        let parser = parser_with(&[]);
        assert_eq!(parser.parse_line("TOTAL 120 30 75% 1,2,3"), LineRecord::Ignored);
        assert_eq!(parser.parse_line("TOTAL 120 30 75%"), LineRecord::Ignored);
    }

    #[test]
    fn test_separator_and_blank_lines_are_ignored() {
        let parser = parser_with(&[]);
        assert_eq!(parser.parse_line(""), LineRecord::Ignored);
        assert_eq!(parser.parse_line("   "), LineRecord::Ignored);
        assert_eq!(parser.parse_line("-------------------------"), LineRecord::Ignored);
    }

    #[test]
    fn test_non_numeric_counts_are_ignored() {
        let parser = parser_with(&[]);
        assert_eq!(parser.parse_line("/a/b.py eleven 0 0%"), LineRecord::Ignored);
        assert_eq!(parser.parse_line("/a/b.py 11 -1 0% 3"), LineRecord::Ignored);
    }

    #[test]
    fn test_four_token_diagnostic_is_ignored_even_for_existing_file() {
        let parser = parser_with(&["/a/c.py"]);
        assert_eq!(
            parser.parse_line("/a/c.py exceptions.SyntaxError: invalid syntax"),
            LineRecord::Ignored
        );
    }

    #[test]
    fn test_error_row_for_existing_file() {
        let parser = parser_with(&["/a/c.py"]);
        let record = parser.parse_line(
            "/a/c.py exceptions.IndentationError: unindent does not match any outer indentation level (line 97)",
        );
        assert_eq!(
            record,
            LineRecord::Error(ErrorRecord {
                path: PathBuf::from("/a/c.py"),
                message: "exceptions.IndentationError: unindent does not match any outer indentation level (line 97) "
                    .to_string(),
            })
        );
    }

    #[test]
    fn test_error_row_for_missing_file() {
        let parser = parser_with(&[]);
        let record = parser.parse_line(
            "/a/c.py exceptions.IndentationError: unindent does not match any outer indentation level (line 97)",
        );
        assert_eq!(record, LineRecord::Ignored);
    }

    #[test]
    fn test_error_row_collapses_whitespace() {
        let parser = parser_with(&["/x/y.py"]);
        match parser.parse_line("/x/y.py   exceptions.SyntaxError:\tinvalid syntax (line 95)") {
            LineRecord::Error(record) => {
                assert_eq!(record.message, "exceptions.SyntaxError: invalid syntax (line 95) ");
            }
            other => panic!("expected error record, got {:?}", other),
        }
    }

    #[test]
    fn test_disk_probe_checks_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("c.py");
        std::fs::write(&file, "x = 1\n").unwrap();

        let parser = RecordParser::new();
        let line = format!("{} exceptions.SyntaxError: invalid syntax (line 1)", file.display());
        assert!(matches!(parser.parse_line(&line), LineRecord::Error(_)));

        // Directories are not regular files
        let line = format!("{} exceptions.SyntaxError: invalid syntax (line 1)", dir.path().display());
        assert_eq!(parser.parse_line(&line), LineRecord::Ignored);

        std::fs::remove_file(&file).unwrap();
        let line = format!("{} exceptions.SyntaxError: invalid syntax (line 1)", file.display());
        assert_eq!(parser.parse_line(&line), LineRecord::Ignored);
    }

    #[test]
    fn test_record_path() {
        let parser = parser_with(&[]);
        assert_eq!(
            parser.parse_line("/a/b.py 1 0 100%").path(),
            Some(Path::new("/a/b.py"))
        );
        assert_eq!(parser.parse_line("TOTAL 1 0 100%").path(), None);
    }
}
