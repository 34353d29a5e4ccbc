//! Task execution: shared context, hooks, rsync rendering and the runner.
pub mod context;
pub mod hooks;
pub mod runner;
pub mod sync;

pub use context::{Context, RunOptions};
pub use runner::{RunSummary, TaskReport, run_document, run_task};

/// Shared test helpers for transport, session and runner tests.
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub mod test_helpers {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{NaiveDate, NaiveDateTime};

    use crate::config::data_store::DataStore;
    use crate::config::normalize::SshSettings;
    use crate::error::{ExecError, SessionError};
    use crate::exec::{ExecResult, Executor, OutputSink};
    use crate::logging::{Log, TaskEntry, TaskStatus};
    use crate::operations::MockFileSystemOps;
    use crate::session::Connector;
    use crate::transport::confirm::MockConfirm;
    use crate::transport::{CommandOutput, Transport, split_lines};

    use super::{Context, RunOptions};

    #[derive(Debug, Clone)]
    enum Reply {
        Exit { status: i32, stdout: String },
        Error,
    }

    /// Transport recording every command it receives.
    ///
    /// Replies are chosen by the first rule whose pattern the command
    /// contains; unmatched commands exit zero with no output.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        rules: Mutex<Vec<(String, Reply)>>,
        commands: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        /// Create a transport where every command succeeds silently.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Reply to commands containing `pattern` with `status` and `stdout`.
        #[must_use]
        pub fn respond(self, pattern: &str, status: i32, stdout: &str) -> Self {
            self.push_rule(pattern, status, stdout);
            self
        }

        /// Fail commands containing `pattern` with an execution error.
        #[must_use]
        pub fn fail(self, pattern: &str) -> Self {
            self.rules
                .lock()
                .unwrap()
                .push((pattern.to_string(), Reply::Error));
            self
        }

        /// Like [`respond`](Self::respond), for a transport already shared.
        pub fn push_rule(&self, pattern: &str, status: i32, stdout: &str) {
            self.rules.lock().unwrap().push((
                pattern.to_string(),
                Reply::Exit {
                    status,
                    stdout: stdout.to_string(),
                },
            ));
        }

        /// Commands received so far, in order.
        #[must_use]
        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn execute(&self, command: &str, _stream: bool) -> Result<CommandOutput, ExecError> {
            self.commands.lock().unwrap().push(command.to_string());
            let reply = self
                .rules
                .lock()
                .unwrap()
                .iter()
                .find(|(pattern, _)| command.contains(pattern.as_str()))
                .map(|(_, reply)| reply.clone());
            match reply {
                None => Ok(CommandOutput::default()),
                Some(Reply::Exit { status, stdout }) => Ok(CommandOutput {
                    status,
                    lines: split_lines(&stdout),
                }),
                Some(Reply::Error) => Err(ExecError::Terminated(command.to_string())),
            }
        }
    }

    /// Executor returning one canned result and recording each call as
    /// `program arg arg...`.
    #[derive(Debug)]
    pub struct RecordingExecutor {
        result: ExecResult,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        /// Every call exits zero with no output.
        #[must_use]
        pub fn new() -> Self {
            Self::with_result(ExecResult {
                success: true,
                code: Some(0),
                ..ExecResult::default()
            })
        }

        /// Every call exits with `code`, printing `stderr`.
        #[must_use]
        pub fn failing(code: i32, stderr: &str) -> Self {
            Self::with_result(ExecResult {
                stderr: stderr.to_string(),
                success: false,
                code: Some(code),
                ..ExecResult::default()
            })
        }

        /// Every call returns `result`.
        #[must_use]
        pub fn with_result(result: ExecResult) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Calls made so far.
        #[must_use]
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Executor for RecordingExecutor {
        fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult, ExecError> {
            let mut call = program.to_string();
            for arg in args {
                call.push(' ');
                call.push_str(arg);
            }
            self.calls.lock().unwrap().push(call);
            Ok(self.result.clone())
        }

        fn run_shell(
            &self,
            command: &str,
            sink: Option<OutputSink<'_>>,
        ) -> Result<ExecResult, ExecError> {
            self.calls.lock().unwrap().push(format!("sh -c {command}"));
            if let Some(sink) = sink {
                sink(&self.result.stdout);
            }
            Ok(self.result.clone())
        }

        fn which(&self, _: &str) -> bool {
            self.result.success
        }
    }

    /// [`Log`] keeping every line in memory, formatted the way the log file
    /// tags them.
    #[derive(Debug, Default)]
    pub struct CapturedLog {
        lines: Mutex<Vec<String>>,
        entries: Mutex<Vec<TaskEntry>>,
    }

    impl CapturedLog {
        fn push(&self, line: String) {
            self.lines.lock().unwrap().push(line);
        }

        /// Whether any captured line contains `needle`.
        #[must_use]
        pub fn contains(&self, needle: &str) -> bool {
            self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
        }

        /// Every captured line.
        #[must_use]
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        /// Recorded task results.
        #[must_use]
        pub fn entries(&self) -> Vec<TaskEntry> {
            self.entries.lock().unwrap().clone()
        }
    }

    impl Log for CapturedLog {
        fn stage(&self, msg: &str) {
            self.push(format!("==> {msg}"));
        }
        fn info(&self, msg: &str) {
            self.push(msg.to_string());
        }
        fn debug(&self, msg: &str) {
            self.push(format!("[debug] {msg}"));
        }
        fn warn(&self, msg: &str) {
            self.push(format!("[warn] {msg}"));
        }
        fn error(&self, msg: &str) {
            self.push(format!("[error] {msg}"));
        }
        fn output(&self, line: &str) {
            self.push(format!("| {line}"));
        }
        fn record_task(
            &self,
            name: &str,
            status: TaskStatus,
            message: Option<&str>,
            elapsed: Duration,
        ) {
            self.entries.lock().unwrap().push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
                elapsed,
            });
        }
    }

    /// A confirmation prompt that always answers `answer`.
    #[must_use]
    pub fn always(answer: bool) -> MockConfirm {
        let mut confirm = MockConfirm::new();
        confirm.expect_confirm().return_const(answer);
        confirm
    }

    /// Connector handing out one shared transport, or refusing every
    /// connection.
    #[derive(Debug)]
    pub struct FakeConnector {
        transport: Option<Arc<RecordingTransport>>,
        connects: Mutex<usize>,
    }

    impl FakeConnector {
        /// Every connection yields `transport`.
        #[must_use]
        pub fn with_transport(transport: Arc<RecordingTransport>) -> Self {
            Self {
                transport: Some(transport),
                connects: Mutex::new(0),
            }
        }

        /// Every connection fails authentication.
        #[must_use]
        pub fn refusing() -> Self {
            Self {
                transport: None,
                connects: Mutex::new(0),
            }
        }

        /// Number of connection attempts.
        #[must_use]
        pub fn connects(&self) -> usize {
            *self.connects.lock().unwrap()
        }
    }

    impl Connector for FakeConnector {
        fn connect(&self, ssh: &SshSettings) -> Result<Arc<dyn Transport>, SessionError> {
            *self.connects.lock().unwrap() += 1;
            self.transport.as_ref().map_or_else(
                || {
                    Err(SessionError::AuthenticationFailed {
                        destination: ssh.host.clone().unwrap_or_default(),
                        message: "Permission denied (publickey).".to_string(),
                    })
                },
                |t| Ok(Arc::clone(t) as Arc<dyn Transport>),
            )
        }

        fn close_all(&self) {}
    }

    /// 2025-06-01 12:00:00, the time every test run is taken at.
    pub fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    /// Build a [`Context`] with recording transports, an accepting prompt,
    /// home `/home/test` and a fixed clock.
    pub fn make_context(options: RunOptions) -> (Context, Arc<CapturedLog>) {
        let (ctx, _local, log) = make_context_with(options);
        (ctx, log)
    }

    /// Like [`make_context`], also returning the local transport.
    pub fn make_context_with(
        options: RunOptions,
    ) -> (Context, Arc<RecordingTransport>, Arc<CapturedLog>) {
        let log = Arc::new(CapturedLog::default());
        let local = Arc::new(RecordingTransport::new());
        let ctx = Context {
            log: log.clone(),
            local: local.clone(),
            connector: Arc::new(FakeConnector::with_transport(Arc::new(
                RecordingTransport::new(),
            ))),
            confirm: Arc::new(always(true)),
            data_store: DataStore::default(),
            options,
            home: PathBuf::from("/home/test"),
            fs_ops: Arc::new(MockFileSystemOps::new()),
            clock: fixed_clock,
        };
        (ctx, local, log)
    }
}
