use super::Record;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

pub const LOG_TARGET: &str = "logfs";

/// Receives one [`Record`] per decorated filesystem call.
///
/// Implementations must be safe to call from several threads at once and
/// should not block for long: the caller waits on `log` before its own
/// filesystem call returns.
pub trait Logger: Send + Sync {
    fn log(&self, record: Record);
}

impl<L: Logger + ?Sized> Logger for &L {
    fn log(&self, record: Record) {
        (**self).log(record)
    }
}

impl<L: Logger + ?Sized> Logger for Box<L> {
    fn log(&self, record: Record) {
        (**self).log(record)
    }
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log(&self, record: Record) {
        (**self).log(record)
    }
}

/// Adapts a plain function or closure into a [`Logger`].
pub struct LoggerFn<F>(pub F);

impl<F> Logger for LoggerFn<F>
where
    F: Fn(Record) + Send + Sync,
{
    fn log(&self, record: Record) {
        (self.0)(record)
    }
}

impl<F> fmt::Debug for LoggerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoggerFn")
    }
}

/// Accumulates every record in memory.
#[derive(Debug, Default)]
pub struct Recorder {
    records: Mutex<Vec<Record>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while the lock was held leaves the vector intact.
    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the records seen so far, in emission order.
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Drains the accumulated records.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Logger for Recorder {
    fn log(&self, record: Record) {
        self.lock().push(record);
    }
}

/// Streams records through the `log` facade under the `logfs` target.
///
/// Successful calls go out at `level`; failed or unwound calls at `Warn`.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    level: log::Level,
}

impl LogSink {
    pub fn new(level: log::Level) -> Self {
        Self { level }
    }

    pub fn level(&self) -> log::Level {
        self.level
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(log::Level::Debug)
    }
}

impl Logger for LogSink {
    fn log(&self, record: Record) {
        let level = if record.is_ok() {
            self.level
        } else {
            log::Level::Warn
        };
        log::log!(target: LOG_TARGET, level, "{}", record);
    }
}

/// Writes each record as one line of JSON.
///
/// A sink has no way to report failure to the filesystem caller, so write
/// errors are logged and the record is dropped.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Logger for JsonLinesSink<W> {
    fn log(&self, record: Record) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                log::error!(target: LOG_TARGET, "failed to encode {} record: {}", record.op, e);
                return;
            }
        };
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            log::error!(target: LOG_TARGET, "failed to write {} record: {}", record.op, e);
        }
    }
}

/// Drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Logger for Discard {
    fn log(&self, _record: Record) {}
}
