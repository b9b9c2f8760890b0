//! Drives the external coverage tool.
//!
//! The tool is started as `<interpreter> <script> "<data_dir>/.coverage" <flag>`.
//! In analyze mode it reads `path1|path2|...|pathN\r` from stdin and prints its
//! report on stdout, one line per file plus headers and totals.

use super::parser::{LineRecord, RecordParser};
use super::progress::ProgressReporter;
use crate::config::ToolSettings;
use crate::error::{CovtreeError, Result};
use crate::subprocess::{ExitStatus, ProcessCommandBuilder, ProcessRunner, ProcessStream};
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const INPUT_SEPARATOR: char = '|';
const INPUT_TERMINATOR: char = '\r';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Analyze,
    Erase,
}

impl ToolMode {
    pub fn flag(&self) -> &'static str {
        match self {
            ToolMode::Analyze => "-waitfor",
            ToolMode::Erase => "-e",
        }
    }
}

/// Tally of one analysis pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub files_requested: usize,
    pub coverage_records: usize,
    pub error_records: usize,
    pub ignored_lines: usize,
    pub exit_status: Option<ExitStatus>,
}

/// How an analysis pass that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEnd {
    Finished,
    Cancelled,
}

/// Tool input: every path joined by `|`, terminated by a carriage return
pub fn format_input(files: &[PathBuf]) -> String {
    let mut input = files
        .iter()
        .map(|file| file.to_string_lossy())
        .collect::<Vec<_>>()
        .join(&INPUT_SEPARATOR.to_string());
    input.push(INPUT_TERMINATOR);
    input
}

pub struct CoverageOrchestrator {
    runner: Arc<dyn ProcessRunner>,
    settings: ToolSettings,
    parser: RecordParser,
}

impl CoverageOrchestrator {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: ToolSettings) -> Self {
        Self::with_parser(runner, settings, RecordParser::new())
    }

    pub fn with_parser(
        runner: Arc<dyn ProcessRunner>,
        settings: ToolSettings,
        parser: RecordParser,
    ) -> Self {
        Self {
            runner,
            settings,
            parser,
        }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn build_command(&self, mode: ToolMode) -> ProcessCommandBuilder {
        ProcessCommandBuilder::new(&self.settings.interpreter.to_string_lossy())
            .arg(&self.settings.script.to_string_lossy())
            .arg(&self.settings.quoted_coverage_file())
            .arg(mode.flag())
    }

    /// Run the tool over `files`, handing every classified output line to `sink` in order.
    ///
    /// The child is killed whenever this returns before the tool exits on its
    /// own: on a read error, a sink error or a cancellation.
    pub async fn analyze<F>(
        &self,
        files: &[PathBuf],
        progress: &dyn ProgressReporter,
        report: &mut CollectionReport,
        mut sink: F,
    ) -> Result<PassEnd>
    where
        F: FnMut(LineRecord) -> Result<()> + Send,
    {
        report.files_requested = files.len();

        progress.set_task("Starting shell to get info...");
        progress.worked(1);

        let command = self
            .build_command(ToolMode::Analyze)
            .stdin(format_input(files))
            .build();
        let command_line = command.display();

        let ProcessStream {
            mut stdout,
            stderr,
            status,
        } = self.runner.run_streaming(command).await.map_err(|e| {
            tracing::error!("Unable to start coverage tool: {}", e);
            CovtreeError::from(e)
        })?;
        progress.set_task("Writing to shell...");
        progress.worked(1);

        let stderr_task = tokio::spawn(async move {
            let mut stderr = stderr;
            while let Some(line) = stderr.next().await {
                match line {
                    Ok(line) => tracing::debug!("coverage tool stderr: {}", line),
                    Err(e) => {
                        tracing::debug!("Stopped reading coverage tool stderr: {}", e);
                        break;
                    }
                }
            }
        });

        progress.set_task("Getting coverage info...(please wait, this could take a while)");
        progress.worked(1);

        loop {
            if progress.is_cancelled() {
                tracing::info!("Coverage analysis cancelled, terminating {}", command_line);
                stderr_task.abort();
                drop(status);
                return Ok(PassEnd::Cancelled);
            }

            let Some(line) = stdout.next().await else {
                break;
            };

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("Failed reading coverage tool output: {}", e);
                    stderr_task.abort();
                    return Err(CovtreeError::from(e).with_context(&command_line));
                }
            };

            let record = self.parser.parse_line(&line);
            match &record {
                LineRecord::Coverage(coverage) => {
                    report.coverage_records += 1;
                    announce(progress, &coverage.path);
                }
                LineRecord::Error(error) => {
                    report.error_records += 1;
                    announce(progress, &error.path);
                }
                LineRecord::Ignored => {
                    report.ignored_lines += 1;
                    tracing::trace!("Ignoring coverage tool line: {}", line);
                }
            }

            if let Err(e) = sink(record) {
                stderr_task.abort();
                return Err(e);
            }
        }

        progress.set_task("Waiting for process to finish...");
        progress.worked(1);

        let exit_status = status.await.map_err(CovtreeError::from)?;
        if let Err(e) = stderr_task.await {
            tracing::debug!("stderr reader ended abnormally: {}", e);
        }

        if !exit_status.success() {
            tracing::warn!("Coverage tool finished with {}: {}", exit_status, command_line);
        }
        report.exit_status = Some(exit_status);

        Ok(PassEnd::Finished)
    }

    /// Ask the tool to discard the coverage data file
    pub async fn erase(&self) -> Result<ExitStatus> {
        let command = self
            .build_command(ToolMode::Erase)
            .maybe_timeout(self.settings.erase_timeout)
            .build();
        let command_line = command.display();

        let output = self.runner.run(command).await.map_err(|e| {
            tracing::error!("Unable to erase coverage data: {}", e);
            CovtreeError::from(e)
        })?;

        if !output.status.success() {
            tracing::warn!("Coverage erase finished with {}: {}", output.status, command_line);
            if !output.stderr.is_empty() {
                tracing::debug!("coverage tool stderr: {}", output.stderr.trim_end());
            }
        }
        Ok(output.status)
    }
}

fn announce(progress: &dyn ProgressReporter, path: &Path) {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    progress.set_task(&format!("Getting coverage info...{}", name));
    progress.worked(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::parser::FileProbe;
    use crate::coverage::progress::{NoopProgress, RecordingProgress};
    use crate::error::ErrorCode;
    use crate::subprocess::MockProcessRunner;

    struct NoFiles;

    impl FileProbe for NoFiles {
        fn is_regular_file(&self, _path: &Path) -> bool {
            false
        }
    }

    fn settings() -> ToolSettings {
        ToolSettings::new("python", "/opt/pysrc/coverage.py", "/data")
    }

    fn orchestrator(mock: &MockProcessRunner) -> CoverageOrchestrator {
        CoverageOrchestrator::with_parser(
            Arc::new(mock.clone()),
            settings(),
            RecordParser::with_probe(Arc::new(NoFiles)),
        )
    }

    #[test]
    fn test_format_input() {
        let files = vec![PathBuf::from("/a/b.py"), PathBuf::from("/a/c.py")];
        assert_eq!(format_input(&files), "/a/b.py|/a/c.py\r");
        assert_eq!(format_input(&files[..1]), "/a/b.py\r");
    }

    #[test]
    fn test_command_lines() {
        let mock = MockProcessRunner::new();
        let orchestrator = orchestrator(&mock);

        let analyze = orchestrator.build_command(ToolMode::Analyze).build();
        assert_eq!(analyze.program, "python");
        assert_eq!(
            analyze.args,
            vec!["/opt/pysrc/coverage.py", "\"/data/.coverage\"", "-waitfor"]
        );

        let erase = orchestrator.build_command(ToolMode::Erase).build();
        assert_eq!(erase.args.last().map(String::as_str), Some("-e"));
        assert!(erase.stdin.is_none());
    }

    #[tokio::test]
    async fn test_analyze_feeds_records_in_order() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python")
            .returns_lines(&[
                "Name Stmts Miss Cover Missing",
                "-----------------------------",
                "/r/a.py 10 2 80% 3,4",
                "/r/sub/b.py 5 0 100%",
                "TOTAL 15 2 87%",
            ])
            .returns_success()
            .finish();

        let files = vec![PathBuf::from("/r/a.py"), PathBuf::from("/r/sub/b.py")];
        let progress = RecordingProgress::new();
        let mut report = CollectionReport::default();
        let mut seen = Vec::new();

        let end = orchestrator(&mock)
            .analyze(&files, &progress, &mut report, |record| {
                seen.push(record);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(end, PassEnd::Finished);
        let paths: Vec<_> = seen.iter().filter_map(LineRecord::path).collect();
        assert_eq!(paths, vec![Path::new("/r/a.py"), Path::new("/r/sub/b.py")]);
        assert_eq!(
            report,
            CollectionReport {
                files_requested: 2,
                coverage_records: 2,
                error_records: 0,
                ignored_lines: 3,
                exit_status: Some(ExitStatus::Success),
            }
        );

        let history = mock.get_call_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].stdin.as_deref(), Some("/r/a.py|/r/sub/b.py\r"));

        assert_eq!(
            progress.tasks(),
            vec![
                "Starting shell to get info...",
                "Writing to shell...",
                "Getting coverage info...(please wait, this could take a while)",
                "Getting coverage info...a.py",
                "Getting coverage info...b.py",
                "Waiting for process to finish...",
            ]
        );
        assert_eq!(progress.units(), 6);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_recorded_not_fatal() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python")
            .returns_lines(&["/r/a.py 1 1 0% 1"])
            .returns_exit_code(3)
            .finish();

        let mut report = CollectionReport::default();
        let end = orchestrator(&mock)
            .analyze(&[PathBuf::from("/r/a.py")], &NoopProgress, &mut report, |_| Ok(()))
            .await
            .unwrap();

        assert_eq!(end, PassEnd::Finished);
        assert_eq!(report.exit_status, Some(ExitStatus::Error(3)));
        assert_eq!(report.coverage_records, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python").fails_to_spawn().finish();

        let progress = RecordingProgress::new();
        let mut report = CollectionReport::default();
        let err = orchestrator(&mock)
            .analyze(&[PathBuf::from("/r/a.py")], &progress, &mut report, |_| Ok(()))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::SPAWN_COMMAND_NOT_FOUND);
        assert_eq!(report.coverage_records, 0);
        assert_eq!(progress.tasks(), vec!["Starting shell to get info..."]);
    }

    #[tokio::test]
    async fn test_read_failure_keeps_earlier_records() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python")
            .returns_lines(&["/r/a.py 4 1 75% 2"])
            .fails_reading("pipe closed")
            .finish();

        let mut report = CollectionReport::default();
        let mut delivered = 0;
        let err = orchestrator(&mock)
            .analyze(&[PathBuf::from("/r/a.py")], &NoopProgress, &mut report, |_| {
                delivered += 1;
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PROCESS_IO_STDOUT);
        assert_eq!(delivered, 1);
        assert_eq!(report.exit_status, None);
    }

    #[tokio::test]
    async fn test_sink_error_aborts_pass() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python")
            .returns_lines(&["/r/a.py 4 1 75% 2", "/r/b.py 4 0 100%"])
            .finish();

        let mut report = CollectionReport::default();
        let mut delivered = 0;
        let err = orchestrator(&mock)
            .analyze(&[PathBuf::from("/r/a.py")], &NoopProgress, &mut report, |record| {
                delivered += 1;
                Err(CovtreeError::cache_state(
                    ErrorCode::CACHE_MISSING_PARENT,
                    "no parent",
                    record.path().unwrap_or(Path::new("")),
                ))
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::CACHE_MISSING_PARENT);
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn test_cancellation_between_lines() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python")
            .returns_lines(&["/r/a.py 4 1 75% 2", "/r/b.py 4 0 100%", "/r/c.py 1 0 100%"])
            .finish();

        // Three milestones before reading, then one unit per record
        let progress = RecordingProgress::cancelling_after(4);
        let mut report = CollectionReport::default();
        let mut delivered = 0;
        let end = orchestrator(&mock)
            .analyze(&[PathBuf::from("/r/a.py")], &progress, &mut report, |_| {
                delivered += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(end, PassEnd::Cancelled);
        assert_eq!(delivered, 1);
        assert_eq!(report.exit_status, None);
    }

    #[tokio::test]
    async fn test_erase_uses_erase_flag() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python")
            .with_args(|args| args.last().map(String::as_str) == Some("-e"))
            .returns_success()
            .finish();

        let status = orchestrator(&mock).erase().await.unwrap();
        assert!(status.success());
        assert!(mock.verify_called("python", 1));
    }

    #[tokio::test]
    async fn test_erase_spawn_failure_is_fatal() {
        let mut mock = MockProcessRunner::new();
        mock.expect_command("python").fails_to_spawn().finish();

        let err = orchestrator(&mock).erase().await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_erase_timeout_is_process_error() {
        use crate::subprocess::TokioProcessRunner;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.sh");
        std::fs::write(&script, "sleep 5\n").unwrap();

        let mut settings = ToolSettings::new("sh", &script, dir.path());
        settings.erase_timeout = Some(Duration::from_millis(100));
        let orchestrator = CoverageOrchestrator::new(Arc::new(TokioProcessRunner), settings);

        let err = orchestrator.erase().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PROCESS_IO_TIMEOUT);
        assert_eq!(err.exit_code(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_real_process_round_trip() {
        use crate::subprocess::TokioProcessRunner;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.sh");
        // Echo each requested path back as a fully covered report row.
        std::fs::write(
            &script,
            "IFS= read -r -d \"$(printf '\\r')\" input\n\
             echo 'Name Stmts Miss Cover'\n\
             printf '%s\\n' \"$input\" | tr '|' '\\n' | while read -r f; do echo \"$f 3 0 100%\"; done\n\
             echo oops >&2\n",
        )
        .unwrap();

        let settings = ToolSettings::new("bash", &script, dir.path());
        let orchestrator = CoverageOrchestrator::with_parser(
            Arc::new(TokioProcessRunner),
            settings,
            RecordParser::with_probe(Arc::new(NoFiles)),
        );

        let files = vec![PathBuf::from("/x/one.py"), PathBuf::from("/x/two.py")];
        let mut report = CollectionReport::default();
        let mut paths = Vec::new();
        let end = orchestrator
            .analyze(&files, &NoopProgress, &mut report, |record| {
                if let Some(path) = record.path() {
                    paths.push(path.to_path_buf());
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(end, PassEnd::Finished);
        assert_eq!(paths, files);
        assert_eq!(report.coverage_records, 2);
        assert_eq!(report.ignored_lines, 1);
        assert_eq!(report.exit_status, Some(ExitStatus::Success));
    }
}
