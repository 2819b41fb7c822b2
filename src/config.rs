// Configuration loading and parsing (config/rules.toml).
//
// Every rule constant the engine consumes — budget ceiling, club limit,
// positional quotas, the valid formation set, XP model weights, planning
// horizon — lives here so that a rule change (a different league's budget
// cap, say) never touches the optimization algorithms.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::stats::Position;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// rules.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire rules.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RulesFile {
    rules: RulesConfig,
    model: ModelConfig,
    feed: FeedConfig,
}

/// The assembled configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub rules: RulesConfig,
    pub model: ModelConfig,
    pub feed: FeedConfig,
}

/// Squad-building rules.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Budget ceiling in tenths of a million (1000 = 100.0m).
    pub budget: u32,
    /// Maximum players from any single club.
    pub club_limit: usize,
    pub squad: SquadQuota,
    /// Valid formations as [def, mid, fwd] triples (GK is always 1).
    pub formations: Vec<[usize; 3]>,
}

/// Positional quotas for the 15-player squad.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SquadQuota {
    pub gk: usize,
    pub def: usize,
    pub mid: usize,
    pub fwd: usize,
}

impl SquadQuota {
    pub fn for_position(&self, pos: Position) -> usize {
        match pos {
            Position::Goalkeeper => self.gk,
            Position::Defender => self.def,
            Position::Midfielder => self.mid,
            Position::Forward => self.fwd,
        }
    }

    pub fn total(&self) -> usize {
        self.gk + self.def + self.mid + self.fwd
    }
}

/// XP model weights. All tunable; the defaults in defaults/rules.toml carry
/// the coefficients the original tool shipped with.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub form_weight: f64,
    pub ppg_weight: f64,
    pub per90_weight: f64,
    /// Per-step fixture-difficulty adjustment: multiplier = 1 + (3 - fdr) * step.
    pub fdr_step: f64,
    pub home_multiplier: f64,
    pub away_multiplier: f64,
    /// Matchup swing: the per-fixture advantage/disadvantage applied when
    /// team strength ratings favor one side (multiplier 1 ± swing).
    pub strength_swing: f64,
    /// Assumed chance of playing (percent) for Doubtful players with no
    /// explicit flag from the feed.
    pub doubtful_default_chance: u8,
    /// Planning horizon in gameweeks for multi-week projections.
    pub horizon: u32,
    pub priors: PositionPriors,
}

/// Conservative per-position base rates for players with no recorded minutes,
/// so new signings are never starved of a score.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionPriors {
    pub gk: f64,
    pub def: f64,
    pub mid: f64,
    pub fwd: f64,
}

impl PositionPriors {
    pub fn for_position(&self, pos: Position) -> f64 {
        match pos {
            Position::Goalkeeper => self.gk,
            Position::Defender => self.def,
            Position::Midfielder => self.mid,
            Position::Forward => self.fwd,
        }
    }
}

/// Stat-feed collaborator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    /// Path of the persisted FDR override file.
    pub overrides_path: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/rules.toml` relative to the
/// given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy the
/// defaults. Prefer `load_config()` which handles initialization.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let rules_path = base_dir.join("config").join("rules.toml");
    let text = std::fs::read_to_string(&rules_path).map_err(|_| ConfigError::FileNotFound {
        path: rules_path.clone(),
    })?;
    let file: RulesFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: rules_path,
        source: e,
    })?;

    let config = Config {
        rules: file.rules,
        model: file.model,
        feed: file.feed,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure `config/rules.toml` exists by copying it from `defaults/` when
/// missing. Returns `true` if a copy was made.
pub fn ensure_config_files(base_dir: &Path) -> Result<bool, ConfigError> {
    let default_path = base_dir.join("defaults").join("rules.toml");
    let config_dir = base_dir.join("config");
    let target = config_dir.join("rules.toml");

    if target.exists() {
        return Ok(false);
    }
    if !default_path.exists() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither {} nor defaults/rules.toml found in {}; \
                 run from the project root or ensure defaults/ is present",
                target.display(),
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;
    std::fs::copy(&default_path, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {}: {e}", default_path.display()),
    })?;

    Ok(true)
}

/// Convenience wrapper: loads config relative to the current working
/// directory, copying the default rules file into place first if needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let rules = &config.rules;

    if rules.budget == 0 {
        return Err(ConfigError::ValidationError {
            field: "rules.budget".into(),
            message: "must be greater than 0".into(),
        });
    }

    if rules.club_limit == 0 {
        return Err(ConfigError::ValidationError {
            field: "rules.club_limit".into(),
            message: "must be at least 1".into(),
        });
    }

    let quota = &rules.squad;
    let quota_fields: &[(&str, usize)] = &[
        ("rules.squad.gk", quota.gk),
        ("rules.squad.def", quota.def),
        ("rules.squad.mid", quota.mid),
        ("rules.squad.fwd", quota.fwd),
    ];
    for (name, val) in quota_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if rules.formations.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "rules.formations".into(),
            message: "at least one formation is required".into(),
        });
    }
    for f in &rules.formations {
        let [def, mid, fwd] = *f;
        if def + mid + fwd != 10 {
            return Err(ConfigError::ValidationError {
                field: "rules.formations".into(),
                message: format!("{def}-{mid}-{fwd} plus the goalkeeper must total 11"),
            });
        }
        if def > quota.def || mid > quota.mid || fwd > quota.fwd {
            return Err(ConfigError::ValidationError {
                field: "rules.formations".into(),
                message: format!("{def}-{mid}-{fwd} exceeds a squad positional quota"),
            });
        }
        if fwd == 0 {
            return Err(ConfigError::ValidationError {
                field: "rules.formations".into(),
                message: format!("{def}-{mid}-{fwd} must field at least one forward"),
            });
        }
    }

    let model = &config.model;
    let weight_fields: &[(&str, f64)] = &[
        ("model.form_weight", model.form_weight),
        ("model.ppg_weight", model.ppg_weight),
        ("model.per90_weight", model.per90_weight),
    ];
    for (name, val) in weight_fields {
        if *val < 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be >= 0, got {val}"),
            });
        }
    }
    if model.form_weight + model.ppg_weight + model.per90_weight <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "model".into(),
            message: "at least one base-rate weight must be positive".into(),
        });
    }

    if model.fdr_step < 0.0 {
        return Err(ConfigError::ValidationError {
            field: "model.fdr_step".into(),
            message: format!("must be >= 0, got {}", model.fdr_step),
        });
    }
    if model.home_multiplier <= 0.0 || model.away_multiplier <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "model.home_multiplier/away_multiplier".into(),
            message: "venue multipliers must be > 0".into(),
        });
    }
    if model.strength_swing < 0.0 || model.strength_swing >= 1.0 {
        return Err(ConfigError::ValidationError {
            field: "model.strength_swing".into(),
            message: format!("must be in [0, 1), got {}", model.strength_swing),
        });
    }
    if model.doubtful_default_chance > 100 {
        return Err(ConfigError::ValidationError {
            field: "model.doubtful_default_chance".into(),
            message: format!("must be <= 100, got {}", model.doubtful_default_chance),
        });
    }
    if model.horizon == 0 {
        return Err(ConfigError::ValidationError {
            field: "model.horizon".into(),
            message: "must be at least 1 gameweek".into(),
        });
    }

    let priors = &model.priors;
    let prior_fields: &[(&str, f64)] = &[
        ("model.priors.gk", priors.gk),
        ("model.priors.def", priors.def),
        ("model.priors.mid", priors.mid),
        ("model.priors.fwd", priors.fwd),
    ];
    for (name, val) in prior_fields {
        if *val < 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be >= 0, got {val}"),
            });
        }
    }

    if config.feed.base_url.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "feed.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
