// THEORY:
// The `pipeline` module is the top-level API for the engine. It encapsulates
// the full stack (stream conditioning filters in front of the blob tracker)
// into a single, easy-to-use interface, and owns the configuration story:
// plain structs, loadable from TOML, validated up front so the numerical core
// never has to second-guess its parameters mid-stream.

use crate::core_modules::blob::Blob;
use crate::core_modules::event::Event;
use crate::core_modules::filters::{MaskIsolated, MirrorY, SelectRectangle};
use crate::core_modules::tracker::{BlobSink, BlobTracker};
use serde::Deserialize;
use std::fs;
use thiserror::Error;
use tracing::info;

/// Configuration failure raised while loading or validating a pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {parameter} {requirement}")]
    InvalidParameter {
        parameter: &'static str,
        requirement: &'static str,
    },
    #[error("at least one seed blob is required")]
    EmptySeeds,
    #[error("the selection region does not fit inside the sensor dimensions")]
    RegionOutOfBounds,
}

/// Tunable parameters of the blob tracking engine. All values are fixed for
/// the tracker's lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Time constant of the activity decay, in timestamp units.
    pub activity_decay: f64,
    /// Association acceptance floor: a winning density at or below this value
    /// leaves the population untouched for the event.
    pub minimum_probability: f64,
    /// Activity above which a hidden seed spawns a tracked object (and a
    /// demoted one is re-promoted).
    pub promotion_activity: f64,
    /// Activity at or below which a promoted or demoted object is deleted.
    /// Must stay below `promotion_activity`.
    pub deletion_activity: f64,
    /// EMA weight of the previous mean; higher means slower adaptation.
    pub mean_inertia: f64,
    /// EMA weight of the previous covariance; higher means slower adaptation.
    pub covariance_inertia: f64,
    /// Peak magnitude of the pairwise repulsion.
    pub repulsion_strength: f64,
    /// Decay length of the repulsion kernel, in pixels.
    pub repulsion_length: f64,
    /// Gain pulling a drifted entry back toward its seed position.
    pub attraction_strength: f64,
    /// Entries within this distance of the origin are hard-reset to their
    /// seed during the pairwise pass instead of being attracted.
    pub attraction_reset_distance: f64,
    /// Events between two pairwise correction passes; 0 runs the pass on
    /// every event.
    pub pairwise_calculations_to_skip: usize,
}

impl TrackerConfig {
    /// Checks every domain constraint the engine assumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(parameter: &'static str, requirement: &'static str) -> ConfigError {
            ConfigError::InvalidParameter {
                parameter,
                requirement,
            }
        }
        if !(self.activity_decay > 0.0) {
            return Err(invalid("activity_decay", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.minimum_probability) {
            return Err(invalid("minimum_probability", "must be in [0, 1)"));
        }
        if !(self.promotion_activity > 0.0) {
            return Err(invalid("promotion_activity", "must be positive"));
        }
        if !(self.deletion_activity >= 0.0 && self.deletion_activity < self.promotion_activity) {
            return Err(invalid(
                "deletion_activity",
                "must be in [0, promotion_activity)",
            ));
        }
        if !(0.0..1.0).contains(&self.mean_inertia) {
            return Err(invalid("mean_inertia", "must be in [0, 1)"));
        }
        if !(0.0..1.0).contains(&self.covariance_inertia) {
            return Err(invalid("covariance_inertia", "must be in [0, 1)"));
        }
        if !(self.repulsion_strength >= 0.0) {
            return Err(invalid("repulsion_strength", "must be non-negative"));
        }
        if !(self.repulsion_length > 0.0) {
            return Err(invalid("repulsion_length", "must be positive"));
        }
        if !(self.attraction_strength >= 0.0) {
            return Err(invalid("attraction_strength", "must be non-negative"));
        }
        if !(self.attraction_reset_distance >= 0.0) {
            return Err(invalid("attraction_reset_distance", "must be non-negative"));
        }
        Ok(())
    }
}

/// A rectangular selection window, in sensor coordinates.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RegionConfig {
    pub left: u16,
    pub bottom: u16,
    pub width: u16,
    pub height: u16,
}

/// Configuration for the full tracking pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub sensor_width: u16,
    pub sensor_height: u16,
    /// Invert the y coordinate before tracking (for sensors mounted upside
    /// down or with flipped row order).
    #[serde(default)]
    pub mirror_y: bool,
    /// Drop events with no recently active 4-neighbour. The value is the
    /// neighbour support lifespan in timestamp units; absent disables the
    /// mask.
    #[serde(default)]
    pub mask_decay: Option<i64>,
    /// Restrict tracking to a rectangular window; absent keeps the full
    /// sensor.
    #[serde(default)]
    pub region: Option<RegionConfig>,
    /// Timestamp the tracker's decay clock starts from.
    #[serde(default)]
    pub initial_timestamp: i64,
    /// The tracker's birth sites.
    pub seeds: Vec<Blob>,
    pub tracker: TrackerConfig,
}

impl PipelineConfig {
    /// Loads and validates a pipeline configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a pipeline configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        if self.seeds.is_empty() {
            return Err(ConfigError::EmptySeeds);
        }
        if let Some(region) = &self.region {
            let fits_x = u32::from(region.left) + u32::from(region.width)
                <= u32::from(self.sensor_width);
            let fits_y = u32::from(region.bottom) + u32::from(region.height)
                <= u32::from(self.sensor_height);
            if !(fits_x && fits_y && region.width > 0 && region.height > 0) {
                return Err(ConfigError::RegionOutOfBounds);
            }
        }
        if let Some(decay) = self.mask_decay {
            if decay <= 0 {
                return Err(ConfigError::InvalidParameter {
                    parameter: "mask_decay",
                    requirement: "must be positive",
                });
            }
        }
        Ok(())
    }
}

/// The main, top-level struct for the engine: an optional conditioning chain
/// (rectangular selection, isolation masking, y-mirroring) feeding the blob
/// tracker.
///
/// Events rejected by a filter never reach the tracker, so they neither decay
/// activities nor advance the tracker's clock.
pub struct TrackingPipeline<S: BlobSink> {
    select: Option<SelectRectangle>,
    mask: Option<MaskIsolated>,
    mirror: Option<MirrorY>,
    tracker: BlobTracker<S>,
}

impl<S: BlobSink> TrackingPipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let select = config
            .region
            .map(|r| SelectRectangle::new(r.left, r.bottom, r.width, r.height));
        let mask = config
            .mask_decay
            .map(|decay| MaskIsolated::new(config.sensor_width, config.sensor_height, decay));
        let mirror = config.mirror_y.then(|| MirrorY::new(config.sensor_height));
        info!(
            seeds = config.seeds.len(),
            region = select.is_some(),
            mask = mask.is_some(),
            mirror = mirror.is_some(),
            "tracking pipeline ready"
        );
        let tracker = BlobTracker::new(
            config.seeds,
            config.initial_timestamp,
            config.tracker,
            sink,
        );
        Ok(Self {
            select,
            mask,
            mirror,
            tracker,
        })
    }

    /// Drives one sensor event through the conditioning chain into the
    /// tracker. Returns whether the event survived the filters.
    pub fn process_event(&mut self, event: Event) -> bool {
        let mut event = event;
        if let Some(select) = &self.select {
            match select.process(event) {
                Some(kept) => event = kept,
                None => return false,
            }
        }
        if let Some(mask) = &mut self.mask {
            match mask.process(event) {
                Some(kept) => event = kept,
                None => return false,
            }
        }
        if let Some(mirror) = &self.mirror {
            event = mirror.process(event);
        }
        self.tracker.process(event);
        true
    }

    pub fn tracker(&self) -> &BlobTracker<S> {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;

    impl BlobSink for NullSink {
        fn on_promoted(&mut self, _id: u64, _blob: &Blob) {}
        fn on_updated(&mut self, _id: u64, _blob: &Blob) {}
        fn on_demoted(&mut self, _id: u64, _blob: &Blob) {}
        fn on_deleted(&mut self, _id: u64, _blob: &Blob) {}
    }

    fn tracker_config() -> TrackerConfig {
        TrackerConfig {
            activity_decay: 50.0,
            minimum_probability: 1e-4,
            promotion_activity: 3.0,
            deletion_activity: 1.0,
            mean_inertia: 0.8,
            covariance_inertia: 0.5,
            repulsion_strength: 0.0,
            repulsion_length: 10.0,
            attraction_strength: 0.0,
            attraction_reset_distance: 1000.0,
            pairwise_calculations_to_skip: 10_000,
        }
    }

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            sensor_width: 304,
            sensor_height: 240,
            mirror_y: false,
            mask_decay: None,
            region: None,
            initial_timestamp: 0,
            seeds: vec![Blob::isotropic(100.0, 100.0, 5.0)],
            tracker: tracker_config(),
        }
    }

    #[test]
    fn validation_rejects_out_of_range_parameters() {
        let mut config = pipeline_config();
        config.tracker.activity_decay = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { parameter: "activity_decay", .. })
        ));

        let mut config = pipeline_config();
        config.tracker.deletion_activity = 3.0;
        assert!(config.validate().is_err(), "deletion must stay below promotion");

        let mut config = pipeline_config();
        config.tracker.mean_inertia = 1.0;
        assert!(config.validate().is_err());

        let mut config = pipeline_config();
        config.tracker.minimum_probability = -0.1;
        assert!(config.validate().is_err());

        let mut config = pipeline_config();
        config.seeds.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptySeeds)));

        let mut config = pipeline_config();
        config.region = Some(RegionConfig {
            left: 300,
            bottom: 0,
            width: 10,
            height: 10,
        });
        assert!(matches!(config.validate(), Err(ConfigError::RegionOutOfBounds)));
    }

    #[test]
    fn config_parses_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            sensor_width = 304
            sensor_height = 240
            mirror_y = true
            mask_decay = 1000

            [region]
            left = 10
            bottom = 20
            width = 100
            height = 100

            [[seeds]]
            x = 50.0
            y = 60.0
            squared_sigma_x = 25.0
            sigma_xy = 0.0
            squared_sigma_y = 25.0

            [tracker]
            activity_decay = 50.0
            minimum_probability = 1e-4
            promotion_activity = 3.0
            deletion_activity = 1.0
            mean_inertia = 0.8
            covariance_inertia = 0.5
            repulsion_strength = 1.0
            repulsion_length = 10.0
            attraction_strength = 0.1
            attraction_reset_distance = 500.0
            pairwise_calculations_to_skip = 100
            "#,
        )
        .expect("config must parse");

        assert!(config.mirror_y);
        assert_eq!(config.mask_decay, Some(1000));
        assert_eq!(config.seeds.len(), 1);
        assert_eq!(config.seeds[0].x, 50.0);
        assert_eq!(config.tracker.pairwise_calculations_to_skip, 100);
    }

    #[test]
    fn rejected_events_never_reach_the_tracker() {
        let mut config = pipeline_config();
        config.region = Some(RegionConfig {
            left: 0,
            bottom: 0,
            width: 150,
            height: 150,
        });
        let mut pipeline = TrackingPipeline::new(config, NullSink).expect("valid config");

        // Outside the region: dropped before the tracker, so not even the
        // decay clock ticks.
        assert!(!pipeline.process_event(Event { x: 200, y: 100, timestamp: 10 }));
        assert_eq!(pipeline.tracker().tracked_entries()[0].activity, 0.0);

        // Inside the region and on the seed: absorbed.
        assert!(pipeline.process_event(Event { x: 100, y: 100, timestamp: 20 }));
        assert!(pipeline.tracker().tracked_entries()[0].activity > 0.0);
    }

    #[test]
    fn mirroring_happens_before_tracking() {
        let mut config = pipeline_config();
        config.mirror_y = true;
        let mut pipeline = TrackingPipeline::new(config, NullSink).expect("valid config");

        // Row 139 mirrors to 240 - 1 - 139 = 100, right on the seed.
        assert!(pipeline.process_event(Event { x: 100, y: 139, timestamp: 10 }));
        assert!(pipeline.tracker().tracked_entries()[0].activity > 0.0);
    }

    #[test]
    fn isolation_mask_is_wired_into_the_chain() {
        let mut config = pipeline_config();
        config.mask_decay = Some(100);
        let mut pipeline = TrackingPipeline::new(config, NullSink).expect("valid config");

        // A lone event is isolated and dropped.
        assert!(!pipeline.process_event(Event { x: 100, y: 100, timestamp: 10 }));
        // Its neighbour arrives in time and passes.
        assert!(pipeline.process_event(Event { x: 100, y: 101, timestamp: 20 }));
    }
}
