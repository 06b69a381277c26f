//! # rowfs-types
//!
//! Plain data shared by the rowfs kernel: how a mode string is parsed, how
//! text is encoded, how a path becomes a row key, and what a row holds.
//! Nothing here touches storage or the filesystem.

pub mod encoding;
pub mod mode;
pub mod path;
pub mod record;

pub use encoding::{Direction, Encoding, EncodingError};
pub use mode::{Access, ModeError, OpenMode};
pub use path::{CanonicalKey, PathError, PathResolver};
pub use record::FileRecord;
