
use crate::native::NativeRef;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, error, trace, warn};
use once_cell::sync::OnceCell;
use shared::error::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};

/// A unit of work posted to the dispatcher.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

const DEFAULT_THREAD_NAME: &str = "rtc-dispatch";

/// DispatcherConfig configures the dispatch thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Name given to the dispatch thread.
    pub thread_name: String,
    /// Bound on pending notifications. `None` means unbounded. When the
    /// queue is full new notifications are dropped.
    pub queue_capacity: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            queue_capacity: None,
        }
    }
}

enum Command {
    Run { context: NativeRef, task: Task },
    Flush(Sender<()>),
}

/// Dispatcher runs posted tasks one at a time, in posting order, on a single
/// dedicated thread.
///
/// Native notifications are raised on engine threads. Posting them here makes
/// every listener run on the same thread, never concurrently with another
/// listener.
pub struct Dispatcher {
    tx: Option<Sender<Command>>,
    thread_id: Option<ThreadId>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let (tx, rx) = match config.queue_capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };

        match thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(rx))
        {
            Ok(handle) => {
                debug!("dispatcher {} started", config.thread_name);
                Dispatcher {
                    tx: Some(tx),
                    thread_id: Some(handle.thread().id()),
                }
            }
            Err(err) => {
                error!("dispatcher {} failed to start: {err}", config.thread_name);
                Dispatcher {
                    tx: None,
                    thread_id: None,
                }
            }
        }
    }

    /// Posts `task` for execution on the dispatch thread. `context` is the
    /// native reference the notification belongs to.
    ///
    /// Never blocks. If the task cannot be queued it is dropped.
    pub fn sync<F>(&self, context: NativeRef, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(tx) = &self.tx else {
            warn!("dispatch: no dispatch thread, dropped notification for {context}");
            return;
        };
        if let Err(err) = tx.try_send(Command::Run {
            context,
            task: Box::new(task),
        }) {
            warn!("dispatch: dropped notification for {context}: {err}");
        }
    }

    /// Blocks until every task posted before this call has run.
    ///
    /// Returns immediately when called from the dispatch thread itself.
    pub fn flush(&self) {
        if self.is_dispatch_thread() {
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = bounded(1);
        if tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    pub fn is_dispatch_thread(&self) -> bool {
        self.thread_id == Some(thread::current().id())
    }
}

fn run(rx: Receiver<Command>) {
    for command in rx.iter() {
        match command {
            Command::Run { context, task } => {
                trace!("dispatch: running notification for {context}");
                if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    error!(
                        "dispatch: listener for {context} panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    trace!("dispatch: queue closed");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

static DISPATCHER: OnceCell<Dispatcher> = OnceCell::new();

/// Starts the process-wide dispatcher with `config`.
///
/// Must run before the first notification is posted. Fails with
/// [`Error::ErrDispatcherAlreadyStarted`] once the dispatcher is running.
pub fn init(config: DispatcherConfig) -> Result<()> {
    let mut started = false;
    DISPATCHER.get_or_init(|| {
        started = true;
        Dispatcher::new(config)
    });
    if started {
        Ok(())
    } else {
        Err(Error::ErrDispatcherAlreadyStarted)
    }
}

/// The process-wide dispatcher, started with the default configuration on
/// first use.
pub fn dispatcher() -> &'static Dispatcher {
    DISPATCHER.get_or_init(|| Dispatcher::new(DispatcherConfig::default()))
}

pub fn sync<F>(context: NativeRef, task: F)
where
    F: FnOnce() + Send + 'static,
{
    dispatcher().sync(context, task)
}

pub fn flush() {
    dispatcher().flush()
}

pub fn is_dispatch_thread() -> bool {
    dispatcher().is_dispatch_thread()
}
