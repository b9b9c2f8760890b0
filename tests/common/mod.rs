//! Common test utilities and helpers
#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stand-in for the coverage tool.
///
/// Erase mode removes the data file and leaves a marker next to it. Analyze
/// mode reports every requested path as 4 statements with 1 missed, except
/// paths containing `broken`, which get a syntax error line.
pub const REPORT_TOOL: &str = r#"data=$(printf '%s' "$1" | tr -d '"')
if [ "$2" = "-e" ]; then
  rm -f "$data"
  echo erased > "$data.erased"
  exit 0
fi
echo "Name Stmts Miss Cover Missing"
echo "-------------------------------"
tr '|\015' '\n\n' | while IFS= read -r f; do
  [ -z "$f" ] && continue
  case "$f" in
    *broken*) echo "$f exceptions.SyntaxError: invalid syntax (line 1)" ;;
    *) echo "$f 4 1 75% 2" ;;
  esac
done
echo "TOTAL 0 0 0%"
touch "$data"
"#;

/// Reads its input, reports nothing useful and fails
pub const FAILING_TOOL: &str = r#"cat > /dev/null
echo "this is not a report line"
exit 3
"#;

pub struct TestProjectBuilder {
    temp_dir: TempDir,
    tool: String,
    sources: Vec<(PathBuf, String)>,
}

impl TestProjectBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            tool: REPORT_TOOL.to_string(),
            sources: Vec::new(),
        })
    }

    /// Replace the tool script body
    pub fn with_tool(mut self, body: &str) -> Self {
        self.tool = body.to_string();
        self
    }

    /// Add a file below the project root
    pub fn with_file(mut self, path: impl AsRef<Path>, content: &str) -> Self {
        self.sources
            .push((path.as_ref().to_path_buf(), content.to_string()));
        self
    }

    pub fn build(self) -> Result<TestProject> {
        let base = fs::canonicalize(self.temp_dir.path())?;

        let root = base.join("project");
        fs::create_dir_all(&root)?;
        for (path, content) in &self.sources {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full, content)?;
        }

        let tool_dir = base.join("tool");
        fs::create_dir_all(&tool_dir)?;
        let script = tool_dir.join("coverage.sh");
        fs::write(&script, &self.tool)?;

        Ok(TestProject {
            _temp_dir: self.temp_dir,
            home: base.join("home"),
            root,
            tool_dir,
            script,
        })
    }
}

pub struct TestProject {
    _temp_dir: TempDir,
    /// Empty directory used as HOME so no user configuration leaks in
    pub home: PathBuf,
    pub root: PathBuf,
    /// Holds the tool script and, by default, the `.coverage` data file
    pub tool_dir: PathBuf,
    pub script: PathBuf,
}

impl TestProject {
    pub fn data_file(&self) -> PathBuf {
        self.tool_dir.join(".coverage")
    }

    pub fn erased_marker(&self) -> PathBuf {
        self.tool_dir.join(".coverage.erased")
    }
}

/// Project with two analyzable files and one the tool fails on
pub fn sample_project() -> Result<TestProject> {
    TestProjectBuilder::new()?
        .with_file("a.py", "x = 1\n")
        .with_file("sub/b.py", "y = 2\n")
        .with_file("sub/broken.py", "def (\n")
        .with_file("notes.txt", "not a source file\n")
        .with_file(".venv/lib/site.py", "hidden\n")
        .build()
}
