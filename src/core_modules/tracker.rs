// THEORY:
// The `tracker` module is the heart of the engine. Its responsibility is to add
// "object permanence" to a raw event stream: every incoming event is absorbed,
// one at a time, into a dynamic population of Gaussian blobs that is never
// revisited with a second pass.
//
// This module solves the data association problem probabilistically.
//
// Key architectural principles:
// 1.  **Nearest-in-probability association**: an event is claimed by the blob
//     under which it has the highest probability density, not the blob whose
//     mean is closest. A spread-out blob can legitimately win a distant event.
// 2.  **Activity as confidence**: every entry carries an exponentially decayed
//     activity score that is fed by won associations. All lifecycle decisions
//     (promotion, demotion, deletion) are made against this single scalar.
// 3.  **Perpetual birth sites**: the seed blobs supplied at construction never
//     leave the population. When a seed accumulates enough activity it spawns
//     a brand-new tracked entry as a copy of its current estimate and resets
//     itself to its construction-time parameters, ready to detect the next
//     object at the same location. Seeds are a fixed set of reused slots; the
//     spawned entries are an unbounded collection.
// 4.  **Physical-simulation correction**: an O(n²) pairwise pass runs every
//     (k+1)-th event, pushing overlapping blobs apart and pulling drifted ones
//     back toward their birth site. The cadence parameter amortizes its cost.
//
// The engine is single-threaded and purely reactive: one call to `process`
// fully handles one event (association, decay, update, lifecycle, optional
// pairwise correction, notifications) before the next is accepted.

use crate::core_modules::blob::Blob;
use crate::core_modules::event::Event;
use crate::pipeline::TrackerConfig;
use tracing::{debug, trace};

/// Receives the lifecycle notifications emitted by `BlobTracker`.
///
/// All four methods are invoked synchronously from within `process` and must
/// not re-enter the tracker; they receive the entry's id and a snapshot of its
/// blob, never a live reference into the population.
pub trait BlobSink {
    /// A new tracked object has been confirmed.
    fn on_promoted(&mut self, id: u64, blob: &Blob);
    /// An already-promoted object's estimate changed.
    fn on_updated(&mut self, id: u64, blob: &Blob);
    /// A promoted object's activity fell below the confirmation threshold.
    fn on_demoted(&mut self, id: u64, blob: &Blob);
    /// An object's activity fell to or below the deletion threshold; its id
    /// is retired and will never be seen again.
    fn on_deleted(&mut self, id: u64, blob: &Blob);
}

/// Lifecycle state of a tracked entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedState {
    /// A seed slot, invisible to the outside world, waiting for enough
    /// activity to spawn a tracked object.
    Hidden,
    /// A confirmed, externally visible object.
    Promoted,
    /// A previously confirmed object whose confidence has dropped, but not
    /// far enough to delete it (hysteresis band).
    Demoted,
}

/// One element of the tracker's working population.
#[derive(Debug, Clone)]
pub struct TrackedEntry {
    /// Unique, monotonically assigned id. Never reused within one tracker.
    pub id: u64,
    /// The current Gaussian estimate.
    pub blob: Blob,
    /// Exponentially decayed confidence accumulator, fed by won associations.
    pub activity: f64,
    /// Current lifecycle state.
    pub state: TrackedState,
    /// Index of the seed this entry descends from; the attraction correction
    /// pulls the entry back toward that seed's construction-time position.
    pub seed_index: usize,
}

/// The per-event blob tracking engine.
///
/// Owns the full population of seed slots and spawned entries, and emits
/// lifecycle notifications through the injected sink.
pub struct BlobTracker<S: BlobSink> {
    /// Construction-time seed blobs, kept verbatim for slot resets and for
    /// the attraction correction's anchor positions.
    seeds: Vec<Blob>,
    config: TrackerConfig,
    /// Precomputed from the configured reset distance.
    attraction_reset_distance_squared: f64,
    /// The working population: seed slots first (one per seed, permanent),
    /// then spawned entries in birth order.
    entries: Vec<TrackedEntry>,
    /// A counter to ensure each entry gets a unique id.
    next_id: u64,
    previous_timestamp: i64,
    /// Events seen since the last pairwise correction pass.
    skipped_events: usize,
    sink: S,
}

impl<S: BlobSink> BlobTracker<S> {
    /// Creates a tracker from its seed blobs. The configuration is assumed to
    /// have been validated (see `TrackerConfig::validate`); the engine itself
    /// never fails on numerical grounds.
    pub fn new(seeds: Vec<Blob>, initial_timestamp: i64, config: TrackerConfig, sink: S) -> Self {
        let entries = seeds
            .iter()
            .enumerate()
            .map(|(index, blob)| TrackedEntry {
                id: index as u64,
                blob: *blob,
                activity: 0.0,
                state: TrackedState::Hidden,
                seed_index: index,
            })
            .collect();
        let next_id = seeds.len() as u64;
        Self {
            attraction_reset_distance_squared: config.attraction_reset_distance.powi(2),
            seeds,
            config,
            entries,
            next_id,
            previous_timestamp: initial_timestamp,
            skipped_events: 0,
            sink,
        }
    }

    /// Handles one event.
    ///
    /// Timestamps are expected to be non-decreasing. This is not validated: a
    /// timestamp earlier than the previous one feeds a negative elapsed time
    /// into the exponential decay, which silently amplifies activity instead
    /// of decaying it.
    pub fn process(&mut self, event: Event) {
        let x = f64::from(event.x);
        let y = f64::from(event.y);

        // --- 1. Association ---
        // Highest density wins; ties keep the first encountered. The strict
        // comparison also makes NaN densities (degenerate covariance) lose.
        let mut best_density = 0.0;
        let mut winner: Option<usize> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let density = entry.blob.density_at(x, y);
            if density > best_density {
                best_density = density;
                winner = Some(index);
            }
        }

        // --- 2. Decay factor ---
        // Applied to every entry below, independent of association outcome.
        let elapsed = (event.timestamp - self.previous_timestamp) as f64;
        let decay_factor = (-elapsed / self.config.activity_decay).exp();

        // --- 3. Update & 4. Lifecycle ---
        // One pass over the population. Entries spawned here are appended only
        // after the pass completes, so they are not visited for this event.
        let mut spawned: Vec<TrackedEntry> = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            let entry = &mut self.entries[index];
            entry.activity *= decay_factor;

            if winner == Some(index) && best_density > self.config.minimum_probability {
                entry.activity += best_density;
                entry.blob.x =
                    self.config.mean_inertia * entry.blob.x + (1.0 - self.config.mean_inertia) * x;
                entry.blob.y =
                    self.config.mean_inertia * entry.blob.y + (1.0 - self.config.mean_inertia) * y;
                // The residual is taken against the freshly moved mean.
                let x_position = x - entry.blob.x;
                let y_position = y - entry.blob.y;
                entry.blob.squared_sigma_x = self.config.covariance_inertia
                    * entry.blob.squared_sigma_x
                    + (1.0 - self.config.covariance_inertia) * x_position.powi(2);
                entry.blob.sigma_xy = self.config.covariance_inertia * entry.blob.sigma_xy
                    + (1.0 - self.config.covariance_inertia) * x_position * y_position;
                entry.blob.squared_sigma_y = self.config.covariance_inertia
                    * entry.blob.squared_sigma_y
                    + (1.0 - self.config.covariance_inertia) * y_position.powi(2);
                if entry.state == TrackedState::Promoted {
                    let (id, blob) = (entry.id, entry.blob);
                    self.sink.on_updated(id, &blob);
                }
            }

            let entry = &self.entries[index];
            match entry.state {
                TrackedState::Hidden => {
                    if entry.activity > self.config.promotion_activity {
                        let id = self.next_id;
                        self.next_id += 1;
                        let blob = entry.blob;
                        let activity = entry.activity;
                        let seed_index = entry.seed_index;
                        debug!(id, x = blob.x, y = blob.y, "blob promoted from seed");
                        spawned.push(TrackedEntry {
                            id,
                            blob,
                            activity,
                            state: TrackedState::Promoted,
                            seed_index,
                        });
                        // The seed slot goes back to its birth configuration,
                        // ready to detect a new object at the same location.
                        self.entries[index].blob = self.seeds[seed_index];
                        self.entries[index].activity = 0.0;
                        self.sink.on_promoted(id, &blob);
                    }
                    index += 1;
                }
                TrackedState::Promoted => {
                    if entry.activity <= self.config.promotion_activity {
                        if entry.activity <= self.config.deletion_activity {
                            self.remove_entry(index, &mut winner);
                        } else {
                            let (id, blob) = (entry.id, entry.blob);
                            debug!(id, activity = entry.activity, "blob demoted");
                            self.entries[index].state = TrackedState::Demoted;
                            self.sink.on_demoted(id, &blob);
                            index += 1;
                        }
                    } else {
                        index += 1;
                    }
                }
                TrackedState::Demoted => {
                    if entry.activity <= self.config.deletion_activity {
                        self.remove_entry(index, &mut winner);
                    } else if entry.activity > self.config.promotion_activity {
                        let (id, blob) = (entry.id, entry.blob);
                        debug!(id, activity = entry.activity, "blob re-promoted");
                        self.entries[index].state = TrackedState::Promoted;
                        self.sink.on_promoted(id, &blob);
                        index += 1;
                    } else {
                        index += 1;
                    }
                }
            }
        }
        self.entries.append(&mut spawned);

        // --- 5. Periodic pairwise correction ---
        if self.skipped_events >= self.config.pairwise_calculations_to_skip {
            self.skipped_events = 0;
            self.apply_pairwise_correction();
        } else {
            self.skipped_events += 1;
        }

        self.previous_timestamp = event.timestamp;
    }

    /// The current working population, seed slots included. Exposed for
    /// inspection and debugging; the tracker remains the only mutator.
    pub fn tracked_entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    /// Deletes the entry at `index`, emitting its retirement notification and
    /// keeping a pending winner index consistent with the shifted population.
    fn remove_entry(&mut self, index: usize, winner: &mut Option<usize>) {
        let removed = self.entries.remove(index);
        match *winner {
            Some(w) if w == index => *winner = None,
            Some(w) if w > index => *winner = Some(w - 1),
            _ => {}
        }
        debug!(id = removed.id, activity = removed.activity, "blob deleted");
        self.sink.on_deleted(removed.id, &removed.blob);
    }

    /// The O(n²) repulsion/attraction pass.
    ///
    /// Repulsion is accumulated for every unordered pair into per-entry
    /// deltas; the split is proportional to the *other* entry's squared
    /// activity share, with an explicit zero-contribution fallback when both
    /// activities are zero. Attraction (or a hard reset back to the seed, for
    /// entries inside the reset radius around the origin) is folded into the
    /// same deltas, which are applied only after the full pass so that no
    /// delta influences a later pair.
    fn apply_pairwise_correction(&mut self) {
        trace!(population = self.entries.len(), "pairwise correction pass");
        let mut x_deltas = vec![0.0; self.entries.len()];
        let mut y_deltas = vec![0.0; self.entries.len()];

        for index in 0..self.entries.len() {
            for other_index in index + 1..self.entries.len() {
                let entry = &self.entries[index];
                let other = &self.entries[other_index];
                let squared_activity = entry.activity.powi(2);
                let other_squared_activity = other.activity.powi(2);
                let activity_sum = squared_activity + other_squared_activity;
                if activity_sum == 0.0 {
                    continue;
                }
                let distance_decay = self.config.repulsion_strength
                    * (-(entry.blob.x - other.blob.x).hypot(entry.blob.y - other.blob.y)
                        / self.config.repulsion_length)
                        .exp();
                let toward_other_x = other.blob.x - entry.blob.x;
                let toward_other_y = other.blob.y - entry.blob.y;
                x_deltas[index] -= distance_decay * (other_squared_activity / activity_sum) * toward_other_x;
                y_deltas[index] -= distance_decay * (other_squared_activity / activity_sum) * toward_other_y;
                x_deltas[other_index] += distance_decay * (squared_activity / activity_sum) * toward_other_x;
                y_deltas[other_index] += distance_decay * (squared_activity / activity_sum) * toward_other_y;
            }
        }

        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.blob.x.powi(2) + entry.blob.y.powi(2) > self.attraction_reset_distance_squared {
                let seed = &self.seeds[entry.seed_index];
                x_deltas[index] += self.config.attraction_strength * (seed.x - entry.blob.x);
                y_deltas[index] += self.config.attraction_strength * (seed.y - entry.blob.y);
            } else {
                // Close enough to the origin: snap back to the birth site.
                entry.blob = self.seeds[entry.seed_index];
                entry.activity = 0.0;
            }
        }

        for ((entry, x_delta), y_delta) in
            self.entries.iter_mut().zip(&x_deltas).zip(&y_deltas)
        {
            entry.blob.x += x_delta;
            entry.blob.y += y_delta;
        }
    }
}
