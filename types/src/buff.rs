//! Buff kinds, sources and definitions.
//!
//! A `BuffDefinition` is the "template" a gameplay system hands to the
//! timer service when applying a buff. The service copies it into each
//! instance, so definitions stay plain serde value types with no
//! behavior beyond tick derivation.

use serde::{Deserialize, Serialize};

/// Sentinel for "no expiry": an instance with this remaining-tick count
/// is never counted down and is only removed explicitly.
pub const INDEFINITE_TICKS: i64 = -1;

/// Opaque handle for the entity a buff is attached to.
///
/// The engine never inspects the entity itself; it only needs identity
/// for registry keying and save-record addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of buff slots.
///
/// An entity holds at most one active instance per kind; applying the
/// same kind again updates the existing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffKind {
    Poison,
    Venom,
    Antifire,
    SuperAntifire,
    Overload,
    Freeze,
    Stamina,
    PrayerRenewal,
    /// Escape hatch for scripted one-off effects.
    Custom,
}

impl BuffKind {
    /// Canonical name, used as the display and source-id fallback.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Poison => "Poison",
            Self::Venom => "Venom",
            Self::Antifire => "Antifire",
            Self::SuperAntifire => "Super Antifire",
            Self::Overload => "Overload",
            Self::Freeze => "Freeze",
            Self::Stamina => "Stamina",
            Self::PrayerRenewal => "Prayer Renewal",
            Self::Custom => "Custom",
        }
    }
}

/// Where a buff came from. Presentation/audit only; never affects
/// timer math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffSourceType {
    Combat,
    Potion,
    Equipment,
    Skill,
    Environment,
    #[default]
    Scripted,
}

/// Why a buff instance left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Countdown reached zero.
    Expired,
    /// Explicit `remove` call (cure, dispel, script).
    Manual,
}

/// Opt-in "about to expire" notification.
///
/// `threshold_ticks` of `None` means "use the engine default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpiryWarning {
    #[serde(default)]
    pub threshold_ticks: Option<i64>,
}

/// Definition of a buff to apply (copied into each instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffDefinition {
    /// Which slot this buff occupies.
    pub kind: BuffKind,

    /// Display name shown on HUD icons (falls back to the kind's name).
    #[serde(default)]
    pub display_name: Option<String>,

    /// Presentation-only icon identifier.
    #[serde(default)]
    pub icon_id: Option<String>,

    /// Fixed duration in seconds; 0 means no fixed duration.
    #[serde(default)]
    pub duration_seconds: f64,

    /// Interval for recurring buffs; 0 means reuse `duration_seconds`.
    #[serde(default)]
    pub recurring_interval_seconds: f64,

    /// Recurring buffs loop their countdown instead of ending at zero.
    #[serde(default)]
    pub is_recurring: bool,

    /// Optional expiry warning notification.
    #[serde(default)]
    pub expiry_warning: Option<ExpiryWarning>,
}

impl BuffDefinition {
    /// Minimal definition for a kind with the given duration.
    pub fn new(kind: BuffKind, duration_seconds: f64) -> Self {
        Self {
            kind,
            display_name: None,
            icon_id: None,
            duration_seconds,
            recurring_interval_seconds: 0.0,
            is_recurring: false,
            expiry_warning: None,
        }
    }

    /// Recurring definition ticking every `interval_seconds`.
    pub fn recurring(kind: BuffKind, interval_seconds: f64) -> Self {
        Self {
            kind,
            display_name: None,
            icon_id: None,
            duration_seconds: 0.0,
            recurring_interval_seconds: interval_seconds,
            is_recurring: true,
            expiry_warning: None,
        }
    }

    /// Indefinite definition: never counted down, removed only explicitly.
    pub fn indefinite(kind: BuffKind) -> Self {
        Self::new(kind, 0.0)
    }

    /// Display name with kind fallback.
    pub fn effective_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.kind.name())
    }

    /// Clamp malformed numeric input to safe values. Upstream callers are
    /// trusted game logic, so bad durations are normalized, not rejected.
    pub fn normalized(mut self) -> Self {
        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            self.duration_seconds = 0.0;
        }
        if !self.recurring_interval_seconds.is_finite() || self.recurring_interval_seconds < 0.0 {
            self.recurring_interval_seconds = 0.0;
        }
        self
    }

    /// Interval used by recurring buffs, falling back to the duration
    /// when no explicit interval is configured.
    pub fn effective_interval_seconds(&self) -> f64 {
        if self.recurring_interval_seconds > 0.0 {
            self.recurring_interval_seconds
        } else {
            self.duration_seconds
        }
    }

    /// Full countdown in ticks, or `INDEFINITE_TICKS` when the definition
    /// has no fixed duration and does not recur.
    pub fn duration_ticks(&self, tick_period_seconds: f64) -> i64 {
        if self.is_recurring {
            return self.interval_ticks(tick_period_seconds);
        }
        if self.duration_seconds <= 0.0 {
            return INDEFINITE_TICKS;
        }
        ceil_ticks(self.duration_seconds, tick_period_seconds)
    }

    /// Ticks per recurring cycle, always at least 1.
    pub fn interval_ticks(&self, tick_period_seconds: f64) -> i64 {
        ceil_ticks(self.effective_interval_seconds(), tick_period_seconds).max(1)
    }
}

fn ceil_ticks(seconds: f64, tick_period_seconds: f64) -> i64 {
    let period = if tick_period_seconds > 0.0 {
        tick_period_seconds
    } else {
        1.0
    };
    (seconds / period).ceil() as i64
}
