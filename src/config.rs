use std::time::Duration;

use crate::error::ConfigError;
use crate::sim::gpucompute::DEFAULT_WORKGROUP_SIZE;
use crate::sim::patterns::Pattern;
use crate::sim::{Generation, GridSize, StepScheduler};
use crate::util::Color;

/// Everything needed to bring up a simulation loop. Immutable once the loop
/// is running.
#[derive(Clone, Debug, PartialEq)]
pub struct LifeConfig {
    /// Side length of the square grid.
    pub grid_size: u32,
    /// Edge length of a compute workgroup tile.
    pub workgroup_size: u32,
    pub tick_interval: Duration,
    /// Chance that any given cell starts out alive.
    pub seed_probability: f32,
    /// Fixed RNG seed for a reproducible start; random when `None`.
    pub seed: Option<u64>,
    /// Named seed pattern, centered on the grid. Replaces the random start.
    pub pattern: Option<String>,
    pub clear_color: Color,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self::large()
    }
}

impl LifeConfig {
    /// Largest workgroup edge that fits the downlevel invocation limit of 256.
    pub const MAX_WORKGROUP_SIZE: u32 = 16;

    fn with_grid(grid_size: u32) -> Self {
        Self {
            grid_size,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
            tick_interval: StepScheduler::DEFAULT_INTERVAL,
            seed_probability: 0.4,
            seed: None,
            pattern: None,
            clear_color: Color::rgba(0.0, 0.5, 0.7, 1.0),
        }
    }

    pub fn tiny() -> Self {
        Self::with_grid(4)
    }
    pub fn classic() -> Self {
        Self::with_grid(32)
    }
    pub fn large() -> Self {
        Self::with_grid(128)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        GridSize::new(self.grid_size)?;
        if self.workgroup_size == 0 || self.workgroup_size > Self::MAX_WORKGROUP_SIZE {
            return Err(ConfigError::InvalidWorkgroupSize {
                got: self.workgroup_size,
                max: Self::MAX_WORKGROUP_SIZE,
            });
        }
        if !(0.0..=1.0).contains(&self.seed_probability) {
            return Err(ConfigError::InvalidProbability(self.seed_probability));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        self.seed_pattern()?;
        Ok(())
    }

    pub fn size(&self) -> Result<GridSize, ConfigError> {
        GridSize::new(self.grid_size)
    }

    fn seed_pattern(&self) -> Result<Option<&'static Pattern>, ConfigError> {
        match &self.pattern {
            Some(name) => match Pattern::by_name(name) {
                Some(pattern) => Ok(Some(pattern)),
                None => Err(ConfigError::InvalidValue {
                    key: "LIFE_PATTERN",
                    value: name.clone(),
                }),
            },
            None => Ok(None),
        }
    }

    /// Starting generation: the configured pattern if any, otherwise random
    /// according to `seed_probability` and `seed`.
    pub fn seed_generation(&self) -> Result<Generation, ConfigError> {
        let size = self.size()?;
        if let Some(pattern) = self.seed_pattern()? {
            return Ok(pattern.centered(size));
        }
        let mut rng = match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Ok(Generation::random(size, self.seed_probability, &mut rng))
    }

    /// Apply `LIFE_*` overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply `LIFE_*` overrides from `lookup` on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup("LIFE_GRID_SIZE") {
            config.grid_size = parse("LIFE_GRID_SIZE", &v)?;
        }
        if let Some(v) = lookup("LIFE_WORKGROUP_SIZE") {
            config.workgroup_size = parse("LIFE_WORKGROUP_SIZE", &v)?;
        }
        if let Some(v) = lookup("LIFE_TICK_INTERVAL") {
            config.tick_interval = humantime::parse_duration(v.trim()).map_err(|source| {
                ConfigError::InvalidInterval {
                    value: v.clone(),
                    source,
                }
            })?;
        }
        if let Some(v) = lookup("LIFE_SEED_PROBABILITY") {
            config.seed_probability = parse("LIFE_SEED_PROBABILITY", &v)?;
        }
        if let Some(v) = lookup("LIFE_SEED") {
            config.seed = Some(parse("LIFE_SEED", &v)?);
        }
        if let Some(v) = lookup("LIFE_PATTERN") {
            config.pattern = Some(v.trim().to_string());
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
