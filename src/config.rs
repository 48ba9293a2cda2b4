//! Configuration for the tracking core, its runtime and the demo binary.
//!
//! Uses `heapless::String` for names and filters, so configs stay fixed-size
//! and can be embedded in a snapshot.
//!
//! # Example
//!
//! ```rust
//! use rs_interlock::config::{Config, RuntimeConfig, WorldConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.world.path_release_delay_ms, 5000);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_world(WorldConfig::default().with_name("club layout").with_simulation(true))
//!     .with_runtime(RuntimeConfig::default().with_tick_interval_ms(50));
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (layout names)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (log filter directives)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn fitting_prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let _ = hs.push_str(fitting_prefix(s, MAX_SHORT_STRING));
    hs
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    let mut hs = LongString::new();
    let _ = hs.push_str(fitting_prefix(s, MAX_LONG_STRING));
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Tracking core configuration
    pub world: WorldConfig,
    /// Async runtime configuration
    pub runtime: RuntimeConfig,
    /// Logging configuration
    pub log: LogConfig,
}

impl Config {
    /// Set world configuration
    pub fn with_world(mut self, world: WorldConfig) -> Self {
        self.world = world;
        self
    }

    /// Set runtime configuration
    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set logging configuration
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Parse a JSON config; missing sections and fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// World Config
// ============================================================================

/// Tracking core configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorldConfig {
    /// Layout name, used in log output
    pub name: ShortString,
    /// Delay between a train leaving a block and the release of the path it
    /// left through, in milliseconds
    pub path_release_delay_ms: u64,
    /// Drive sensor inputs from operator actions (no hardware attached)
    pub simulation: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: short_string("layout"),
            path_release_delay_ms: 5000,
            simulation: false,
        }
    }
}

impl WorldConfig {
    /// Set the layout name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the path release delay
    pub fn with_path_release_delay_ms(mut self, ms: u64) -> Self {
        self.path_release_delay_ms = ms;
        self
    }

    /// Enable or disable simulation mode
    pub fn with_simulation(mut self, simulation: bool) -> Self {
        self.simulation = simulation;
        self
    }
}

// ============================================================================
// Runtime Config
// ============================================================================

/// Async runtime configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeConfig {
    /// Clock tick interval in milliseconds
    pub tick_interval_ms: u32,
    /// Capacity of the inbound request channel
    pub channel_capacity: usize,
    /// Capacity of the outbound event broadcast
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 20,
            channel_capacity: 64,
            event_capacity: 256,
        }
    }
}

impl RuntimeConfig {
    /// Set the tick interval (at least 1 ms)
    pub fn with_tick_interval_ms(mut self, ms: u32) -> Self {
        self.tick_interval_ms = ms.max(1);
        self
    }

    /// Set the request channel capacity (at least 1)
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the event broadcast capacity (at least 1)
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

// ============================================================================
// Log Config
// ============================================================================

/// Logging configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub filter: LongString,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: long_string("info"),
        }
    }
}

impl LogConfig {
    /// Set the filter directive
    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = long_string(filter);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
