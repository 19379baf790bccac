//! Filesystem decorator that records every operation.
//!
//! [`LogFs`] wraps any [`Fs`] and, for each call, hands a [`Record`]
//! (operation, arguments, error, elapsed time) to a [`Logger`]. Results and
//! errors reach the caller exactly as the wrapped filesystem produced them.
//!
//! ```
//! use logfs::{Fs, LogFs, MemFs, Recorder};
//! use std::path::Path;
//!
//! let fs = LogFs::new(MemFs::new(), Recorder::new());
//! fs.create(Path::new("foo")).unwrap();
//! assert_eq!(fs.logger().records()[0].op.as_str(), "create");
//! ```
pub mod config;
pub mod decorator;
pub mod io;
pub mod record;
pub mod util;

pub use config::SinkConfig;
pub use decorator::LogFs;
pub use io::fs::RealFs;
pub use io::memfs::MemFs;
pub use io::{File, Fs, FsError, FsResult, Metadata, OpenFlags};
pub use record::sink::{Discard, JsonLinesSink, LogSink, Logger, LoggerFn, Recorder};
pub use record::{Arg, Op, Record};
