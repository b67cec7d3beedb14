/*!
 * Broker Limits and Constants
 *
 * Fixed paths, name fragments, and thresholds used by the broker.
 */

use std::time::Duration;

// =============================================================================
// LINK FILES
// =============================================================================

/// Restricted mount the DLP service materializes link files under
pub const DEFAULT_LINK_MOUNT_PREFIX: &str = "/mnt/data/fuse";

/// Suffix appended to every generated link file name
pub const LINK_FILE_SUFFIX: &str = ".dlp.link";

/// Position (from the end) of the secondary suffix in a DLP file name.
/// `report.docx.dlp` splits into three segments and yields `docx`.
pub const SECONDARY_SUFFIX_INDEX: usize = 2;

/// Owner write bit of a POSIX mode
pub const OWNER_WRITE_BIT: u32 = 0o200;

/// Authority used for shareable link URIs
pub const DEFAULT_URI_AUTHORITY: &str = "docmgr";

// =============================================================================
// TELEMETRY
// =============================================================================

/// Event domain for all broker telemetry
pub const TELEMETRY_DOMAIN: &str = "DLP";

/// Events kept by the in-memory event log
pub const MAX_TELEMETRY_EVENTS: usize = 1024;

// =============================================================================
// TRACING
// =============================================================================

/// Stages slower than this are logged as warnings
pub const DEFAULT_SLOW_STAGE: Duration = Duration::from_millis(500);
