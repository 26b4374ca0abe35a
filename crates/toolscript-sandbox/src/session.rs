//! Execution session: runs one compiled program on a worker thread with a
//! call-local output buffer, a fresh namespace and a wall-clock watchdog.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value as Json;
use toolscript_core::protocol::{FaultClass, ResultEnvelope};

use crate::compiler::CompiledProgram;
use crate::environment::ExecutionEnvironment;
use crate::interp::{to_json_lossy, ExcKind, Fault, Interpreter, Scope};
use crate::limits::WATCHDOG_GRACE;

const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Name of the root-namespace variable handed back to the caller.
pub const RESULT_VAR: &str = "result";

/// Output captured for one execution. Shared between the worker and the
/// watchdog so a timed-out run still reports what it printed.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    inner: Arc<Mutex<String>>,
    limit: usize,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(String::new())),
            limit,
        }
    }

    /// Append text; past the cap the fitting prefix is kept and a `MemoryError` raised.
    pub fn push(&self, text: &str) -> Result<(), Fault> {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let room = self.limit.saturating_sub(buf.len());
        if text.len() <= room {
            buf.push_str(text);
            return Ok(());
        }
        let mut cut = room;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        buf.push_str(&text[..cut]);
        Err(Fault::memory(format!(
            "output limit of {} bytes exceeded",
            self.limit
        )))
    }

    pub fn snapshot(&self) -> String {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Per-execution state the interpreter consults for output and budgets.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub output: OutputBuffer,
    pub deadline: Instant,
    pub timeout: Duration,
    /// Raised by the watchdog once the deadline plus grace has passed
    pub cancel: Arc<AtomicBool>,
}

impl ExecContext {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            output: OutputBuffer::new(max_output_bytes),
            deadline: Instant::now() + timeout,
            timeout,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

pub(crate) fn deadline_fault(timeout: Duration) -> Fault {
    Fault::timeout(format!(
        "execution exceeded the time limit of {} seconds",
        timeout.as_secs_f64()
    ))
}

/// Envelope class for a runtime fault.
pub fn fault_class(fault: &Fault) -> FaultClass {
    if fault.kind.is_budget() {
        FaultClass::Timeout
    } else {
        FaultClass::Runtime
    }
}

type WorkerOutcome = Result<Result<Option<Json>, Fault>, String>;

pub struct Session;

impl Session {
    /// Execute `program` in a fresh namespace and build the envelope.
    pub fn run(program: CompiledProgram, env: &ExecutionEnvironment) -> ResultEnvelope {
        let limits = env.limits().clone();
        let ctx = ExecContext::new(limits.timeout, limits.max_output_bytes);
        let output = ctx.output.clone();
        let cancel = Arc::clone(&ctx.cancel);
        let (tx, rx) = mpsc::channel::<WorkerOutcome>();
        let worker_env = env.clone();

        let spawned = thread::Builder::new()
            .name("toolscript-session".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    execute(&program, &worker_env, &ctx)
                }))
                .map_err(|payload| panic_message(payload.as_ref()));
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            return ResultEnvelope::failed(
                FaultClass::Runtime,
                format!("RuntimeError: failed to start execution worker: {}", e),
                String::new(),
            );
        }

        match rx.recv_timeout(limits.timeout + WATCHDOG_GRACE) {
            Ok(Ok(Ok(result))) => ResultEnvelope::completed(output.snapshot(), result),
            Ok(Ok(Err(fault))) => {
                ResultEnvelope::failed(fault_class(&fault), fault.to_string(), output.snapshot())
            }
            Ok(Err(message)) => ResultEnvelope::failed(
                FaultClass::Runtime,
                format!("RuntimeError: interpreter panicked: {}", message),
                output.snapshot(),
            ),
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                tracing::warn!("execution worker did not finish within its budget; abandoned");
                ResultEnvelope::failed(
                    FaultClass::Timeout,
                    deadline_fault(limits.timeout).to_string(),
                    output.snapshot(),
                )
            }
            Err(RecvTimeoutError::Disconnected) => ResultEnvelope::failed(
                FaultClass::Runtime,
                "RuntimeError: execution worker exited unexpectedly",
                output.snapshot(),
            ),
        }
    }
}

fn execute(
    program: &CompiledProgram,
    env: &ExecutionEnvironment,
    ctx: &ExecContext,
) -> Result<Option<Json>, Fault> {
    let root = Scope::root();
    let mut interp = Interpreter::new(env, ctx);
    let outcome = interp.run(&program.body, &root);
    tracing::debug!(steps = interp.steps(), ok = outcome.is_ok(), "program finished");
    let result = match &outcome {
        Ok(()) => root.get_local(RESULT_VAR).map(|v| to_json_lossy(&v)),
        Err(_) => None,
    };
    interp.release();
    root.clear();
    outcome.map(|()| result)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        ExcKind::RuntimeError.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::limits::ExecutionLimits;
    use serde_json::json;

    fn env() -> ExecutionEnvironment {
        ExecutionEnvironment::builder()
            .limits(ExecutionLimits::default())
            .build()
    }

    fn run(source: &str) -> ResultEnvelope {
        let program = compile(source).unwrap();
        Session::run(program, &env())
    }

    #[test]
    fn test_output_buffer_cap() {
        let buf = OutputBuffer::new(5);
        buf.push("abc").unwrap();
        let err = buf.push("def").unwrap_err();
        assert_eq!(err.kind, ExcKind::MemoryError);
        assert_eq!(buf.snapshot(), "abcde");
    }

    #[test]
    fn test_result_extraction() {
        let env = run("x = [1, 2]\nresult = {'sum': sum(x), 'items': x}");
        assert!(env.success);
        assert_eq!(env.result, Some(json!({"sum": 3, "items": [1, 2]})));
        assert_eq!(env.error, None);
    }

    #[test]
    fn test_no_result_is_not_a_fault() {
        let env = run("print('hello')");
        assert!(env.success);
        assert_eq!(env.output, "hello\n");
        assert_eq!(env.result, None);
    }

    #[test]
    fn test_runtime_fault_keeps_partial_output() {
        let env = run("print('before')\nx = 1 / 0\nprint('after')");
        assert!(!env.success);
        assert_eq!(env.output, "before\n");
        assert_eq!(env.error.as_deref(), Some("ZeroDivisionError: division by zero (line 2)"));
        assert_eq!(env.fault, Some(FaultClass::Runtime));
        assert_eq!(env.result, None);
    }

    #[test]
    fn test_separate_sessions_do_not_share_state() {
        let env = run("counter = 41\nresult = counter + 1");
        assert_eq!(env.result, Some(json!(42)));
        let env = run("result = counter");
        assert!(!env.success);
        assert_eq!(env.error.as_deref(), Some("NameError: name 'counter' is not defined (line 1)"));
    }

    #[test]
    fn test_step_budget_cannot_be_caught() {
        let limited = env().with_limits(ExecutionLimits::default().with_max_steps(10_000));
        let program = compile("try:\n    while True:\n        pass\nexcept Exception:\n    result = 'caught'\n").unwrap();
        let env = Session::run(program, &limited);
        assert!(!env.success);
        assert_eq!(env.fault, Some(FaultClass::Timeout));
        assert!(env.error.unwrap().starts_with("TimeoutError:"));
        assert_eq!(env.result, None);
    }

    #[test]
    fn test_deadline_timeout() {
        let limited = env().with_limits(ExecutionLimits::default().with_timeout(Duration::from_millis(200)));
        let program = compile("while True:\n    pass\n").unwrap();
        let started = Instant::now();
        let env = Session::run(program, &limited);
        assert_eq!(env.fault, Some(FaultClass::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_deeply_nested_values_are_released() {
        let roomy = env().with_limits(
            ExecutionLimits::default()
                .with_max_steps(5_000_000)
                .with_timeout(Duration::from_secs(60)),
        );
        let src = "a = []\nfor i in range(300000):\n    a = [a]\nd = {}\nfor i in range(300000):\n    d = {'k': d, 't': (d,)}\na = None\nresult = 'done'\n";
        let env = Session::run(compile(src).unwrap(), &roomy);
        assert!(env.success, "{:?}", env.error);
        assert_eq!(env.result, Some(json!("done")));

        // released at session teardown rather than by rebinding
        let src = "a = []\nfor i in range(300000):\n    a = [a]\n";
        let env = Session::run(compile(src).unwrap(), &roomy);
        assert!(env.success, "{:?}", env.error);
    }
}
