use crate::frame::{BoundingBox, HotObjectCandidate};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Association and lifetime parameters for the multi-object tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum centroid distance, in pixels, for a candidate to continue a track.
    pub gate_px: f32,
    /// Consecutive unmatched cycles a track survives before it is pruned.
    pub max_missed: u32,
    pub velocity_smoothing: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gate_px: 40.0,
            max_missed: 25,
            velocity_smoothing: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    centroid: (f32, f32),
    bbox: BoundingBox,
    velocity: (f32, f32),
    age: u32,
    misses: u32,
}

impl Track {
    fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            centroid: self.centroid,
            bbox: self.bbox,
            velocity: self.velocity,
            age: self.age,
        }
    }
}

/// By-value view of a track handed to downstream components.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub id: u64,
    pub centroid: (f32, f32),
    pub bbox: BoundingBox,
    /// Pixels per cycle.
    pub velocity: (f32, f32),
    pub age: u32,
}

/// Result of one association pass.
#[derive(Debug, Clone, Default)]
pub struct TrackUpdate {
    /// Tracks matched or spawned this cycle, ordered by id.
    pub active: Vec<TrackSnapshot>,
    pub spawned: Vec<u64>,
    pub pruned: Vec<u64>,
    /// Number of tracks ever created.
    pub events: u64,
}

pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
    created: u64,
    logger: LogManager,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
            created: 0,
            logger: LogManager::new("tracker"),
        }
    }

    pub fn events(&self) -> u64 {
        self.created
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Matches `candidates` to existing tracks, closest pairs first.
    pub fn update(&mut self, candidates: &[HotObjectCandidate]) -> TrackUpdate {
        let mut pairs: Vec<(f32, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (ci, candidate) in candidates.iter().enumerate() {
                let distance = candidate.distance_to(track.centroid);
                if distance <= self.config.gate_px {
                    pairs.push((distance, ti, ci));
                }
            }
        }
        pairs.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(self.tracks[a.1].id.cmp(&self.tracks[b.1].id))
                .then(a.2.cmp(&b.2))
        });

        let mut track_matched = vec![false; self.tracks.len()];
        let mut candidate_used = vec![false; candidates.len()];
        let smoothing = self.config.velocity_smoothing.clamp(0.0, 1.0);

        for (_, ti, ci) in pairs {
            if track_matched[ti] || candidate_used[ci] {
                continue;
            }
            track_matched[ti] = true;
            candidate_used[ci] = true;

            let track = &mut self.tracks[ti];
            let candidate = &candidates[ci];
            let steps = (track.misses + 1) as f32;
            let measured = (
                (candidate.centroid.0 - track.centroid.0) / steps,
                (candidate.centroid.1 - track.centroid.1) / steps,
            );
            track.velocity = (
                track.velocity.0 + smoothing * (measured.0 - track.velocity.0),
                track.velocity.1 + smoothing * (measured.1 - track.velocity.1),
            );
            track.centroid = candidate.centroid;
            track.bbox = candidate.bbox;
            track.age += 1;
            track.misses = 0;
        }

        let mut update = TrackUpdate::default();

        for (track, matched) in self.tracks.iter_mut().zip(&track_matched) {
            if !matched {
                track.misses += 1;
                track.age += 1;
            }
        }

        for (candidate, used) in candidates.iter().zip(&candidate_used) {
            if *used {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.created += 1;
            self.tracks.push(Track {
                id,
                centroid: candidate.centroid,
                bbox: candidate.bbox,
                velocity: (0.0, 0.0),
                age: 1,
                misses: 0,
            });
            update.spawned.push(id);
            self.logger.record(&format!(
                "new track ID{} at ({:.1},{:.1}) area {}",
                id, candidate.centroid.0, candidate.centroid.1, candidate.area
            ));
        }

        let max_missed = self.config.max_missed;
        let pruned = &mut update.pruned;
        self.tracks.retain(|track| {
            let keep = track.misses <= max_missed;
            if !keep {
                pruned.push(track.id);
            }
            keep
        });
        for id in &update.pruned {
            self.logger.detail(&format!("track ID{} pruned", id));
        }

        update.active = self
            .tracks
            .iter()
            .filter(|track| track.misses == 0)
            .map(Track::snapshot)
            .collect();
        update.active.sort_by_key(|snapshot| snapshot.id);
        update.events = self.created;
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f32, y: f32, area: usize) -> HotObjectCandidate {
        HotObjectCandidate::new(
            BoundingBox::new(x as u32, y as u32, 4, 4),
            (x, y),
            area,
            150.0,
        )
    }

    #[test]
    fn moving_candidate_keeps_its_track() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        for step in 0..20 {
            let update = tracker.update(&[candidate(10.0 + step as f32 * 3.0, 20.0, 50)]);
            assert_eq!(update.active.len(), 1);
            assert_eq!(update.active[0].id, 1);
        }
        assert_eq!(tracker.events(), 1);
    }

    #[test]
    fn velocity_converges_towards_motion() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let mut last = TrackUpdate::default();
        for step in 0..12 {
            last = tracker.update(&[candidate(10.0 + step as f32 * 2.0, 20.0, 50)]);
        }
        let velocity = last.active[0].velocity;
        assert!((velocity.0 - 2.0).abs() < 0.01);
        assert!(velocity.1.abs() < 1e-6);
    }

    #[test]
    fn candidate_outside_gate_spawns_new_track() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        tracker.update(&[candidate(10.0, 10.0, 50)]);
        let update = tracker.update(&[candidate(100.0, 100.0, 50)]);

        assert_eq!(update.spawned, vec![2]);
        assert_eq!(update.active.len(), 1);
        assert_eq!(update.active[0].id, 2);
        assert_eq!(update.events, 2);
    }

    #[test]
    fn closest_pairs_are_matched_first() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        tracker.update(&[candidate(10.0, 10.0, 60), candidate(40.0, 10.0, 50)]);

        // Candidate at 28 is nearer track 2 (at 40) than track 1 (at 10).
        let update = tracker.update(&[candidate(28.0, 10.0, 60), candidate(12.0, 10.0, 50)]);
        assert!(update.spawned.is_empty());
        let track1 = update.active.iter().find(|t| t.id == 1).unwrap();
        let track2 = update.active.iter().find(|t| t.id == 2).unwrap();
        assert_eq!(track1.centroid, (12.0, 10.0));
        assert_eq!(track2.centroid, (28.0, 10.0));
    }

    #[test]
    fn unmatched_tracks_are_pruned_after_limit() {
        let config = TrackerConfig {
            max_missed: 3,
            ..Default::default()
        };
        let mut tracker = Tracker::new(config);
        tracker.update(&[candidate(10.0, 10.0, 50)]);

        for _ in 0..3 {
            let update = tracker.update(&[]);
            assert!(update.active.is_empty());
            assert!(update.pruned.is_empty());
        }
        let update = tracker.update(&[]);
        assert_eq!(update.pruned, vec![1]);
        assert_eq!(tracker.track_count(), 0);
    }

    #[test]
    fn track_resumes_after_short_gap() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        tracker.update(&[candidate(10.0, 10.0, 50)]);
        tracker.update(&[]);
        tracker.update(&[]);
        let update = tracker.update(&[candidate(16.0, 10.0, 50)]);

        assert!(update.spawned.is_empty());
        assert_eq!(update.active[0].id, 1);
        assert_eq!(update.active[0].age, 4);
    }

    #[test]
    fn identifiers_strictly_increase_and_events_count_spawns() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_missed: 0,
            ..Default::default()
        });
        let mut seen = Vec::new();
        let mut events = 0;
        for step in 0..30 {
            let x = if step % 2 == 0 { 10.0 } else { 200.0 };
            let update = tracker.update(&[candidate(x, 10.0, 50)]);
            assert!(update.events >= events);
            assert_eq!(update.events - events, update.spawned.len() as u64);
            events = update.events;
            seen.extend(update.spawned);
        }
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(seen.len() as u64, tracker.events());
    }
}
