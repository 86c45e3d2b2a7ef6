//! Roles, aggregation modes, buffer ownership, and per-unit settings.
//!
//! An audio unit's aliasing behavior is selected by two small enums:
//! [`AggregateMode`] (how aliasing channels map onto source channels) and
//! [`Ownership`] (which role allocates buffer-chain ranges). They are combined
//! into [`TopologyFlags`], whose constructor rejects the combinations that have
//! no meaning, and resolved into an [`Aliasing`] variant that the resize engine
//! pattern-matches on.

use core::fmt;

use super::error::TopologyError;

/// Default sample rate stamped on newly allocated ranges.
pub const DEFAULT_SAMPLERATE: u32 = 44_100;

/// Default buffer size (frames per render tick) stamped on newly allocated ranges.
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Default upper bound on the parallel path count of one unit.
pub const DEFAULT_MAX_PARALLEL_PATHS: usize = 128;

/// Default upper bound on the pad count of one role.
pub const DEFAULT_MAX_PADS: usize = 1024;

/// One of the two channel matrices an audio unit owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Role {
    /// Signal leaving the unit.
    Output,
    /// Signal entering the unit.
    Input,
}

impl Role {
    /// Both roles, output first.
    pub const ALL: [Role; 2] = [Role::Output, Role::Input];

    /// Returns the opposite role.
    #[inline]
    pub fn other(self) -> Role {
        match self {
            Role::Output => Role::Input,
            Role::Input => Role::Output,
        }
    }

    /// Returns the lowercase name used in config files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Output => "output",
            Role::Input => "input",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an aliasing channel maps onto the owning role's ranges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum AggregateMode {
    /// One aliasing channel per source channel at the same pad and path.
    #[default]
    Sync,
    /// Each output channel spans every input pad at its parallel path (fan-in bus).
    Async,
}

impl fmt::Display for AggregateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateMode::Sync => "sync",
            AggregateMode::Async => "async",
        })
    }
}

/// Which role allocates its own buffer-chain ranges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Ownership {
    /// Input channels own ranges; output channels alias them.
    #[default]
    Input,
    /// Output channels own ranges; input channels alias them.
    Output,
    /// Both roles own independent ranges; nothing is aliased.
    Both,
}

impl Ownership {
    /// Returns true if channels of `role` allocate their own ranges.
    #[inline]
    pub fn owns(self, role: Role) -> bool {
        match self {
            Ownership::Input => role == Role::Input,
            Ownership::Output => role == Role::Output,
            Ownership::Both => true,
        }
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ownership::Input => "input",
            Ownership::Output => "output",
            Ownership::Both => "both",
        })
    }
}

/// Resolved aliasing rule of a unit, derived from its [`TopologyFlags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aliasing {
    /// Every role owns its ranges.
    Independent,
    /// Each channel of `source.other()` aliases the `source` channel at the same
    /// pad and path (same line index, since both roles share one width).
    OneToOne {
        /// Role that owns the aliased ranges.
        source: Role,
    },
    /// Each output channel spans the whole input pad column at its path.
    FanIn,
}

impl Aliasing {
    /// Returns the role whose channels hold aliases, if any.
    pub fn alias_role(self) -> Option<Role> {
        match self {
            Aliasing::Independent => None,
            Aliasing::OneToOne { source } => Some(source.other()),
            Aliasing::FanIn => Some(Role::Output),
        }
    }

    /// Returns the role whose ranges are aliased, if any.
    pub fn source_role(self) -> Option<Role> {
        self.alias_role().map(Role::other)
    }
}

/// Validated combination of aggregation mode and buffer ownership.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TopologyFlags {
    mode: AggregateMode,
    ownership: Ownership,
}

impl TopologyFlags {
    /// Combines a mode and an ownership.
    ///
    /// Async fan-in aggregates input ranges into output spans, so it requires
    /// the input role to be the only owner.
    pub fn new(mode: AggregateMode, ownership: Ownership) -> Result<Self, TopologyError> {
        match (mode, ownership) {
            (AggregateMode::Async, Ownership::Output | Ownership::Both) => {
                Err(TopologyError::InvalidFlags { mode, ownership })
            }
            _ => Ok(Self { mode, ownership }),
        }
    }

    /// Input-owned, one-to-one aliasing.
    pub const fn sync() -> Self {
        Self {
            mode: AggregateMode::Sync,
            ownership: Ownership::Input,
        }
    }

    /// Input-owned fan-in aliasing.
    pub const fn fan_in() -> Self {
        Self {
            mode: AggregateMode::Async,
            ownership: Ownership::Input,
        }
    }

    /// Both roles own independent ranges.
    pub const fn independent() -> Self {
        Self {
            mode: AggregateMode::Sync,
            ownership: Ownership::Both,
        }
    }

    /// Returns the aggregation mode.
    pub fn mode(self) -> AggregateMode {
        self.mode
    }

    /// Returns the buffer ownership.
    pub fn ownership(self) -> Ownership {
        self.ownership
    }

    /// Returns true if channels of `role` allocate their own ranges.
    #[inline]
    pub fn owns_buffers(self, role: Role) -> bool {
        self.ownership.owns(role)
    }

    /// Resolves the aliasing rule.
    pub fn aliasing(self) -> Aliasing {
        match (self.mode, self.ownership) {
            (_, Ownership::Both) => Aliasing::Independent,
            (AggregateMode::Sync, Ownership::Input) => Aliasing::OneToOne { source: Role::Input },
            (AggregateMode::Sync, Ownership::Output) => Aliasing::OneToOne {
                source: Role::Output,
            },
            (AggregateMode::Async, _) => Aliasing::FanIn,
        }
    }
}

impl fmt::Display for TopologyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-owned", self.mode, self.ownership)
    }
}

/// Sample format stamped on every buffer-chain range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferFormat {
    /// Samples per second.
    pub samplerate: u32,
    /// Frames per render tick.
    pub buffer_size: u32,
}

impl Default for BufferFormat {
    fn default() -> Self {
        Self {
            samplerate: DEFAULT_SAMPLERATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Upper bounds a resize request is checked against before any mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyLimits {
    /// Maximum parallel path count.
    pub max_parallel_paths: usize,
    /// Maximum pad count of either role.
    pub max_pads: usize,
}

impl Default for TopologyLimits {
    fn default() -> Self {
        Self {
            max_parallel_paths: DEFAULT_MAX_PARALLEL_PATHS,
            max_pads: DEFAULT_MAX_PADS,
        }
    }
}
