//! Per-field accumulation
//!
//! [`FieldAccumulator`] is the observation sink of an analysis pass. It keeps
//! one [`FieldState`] per distinct field path in a dense arena (a `Vec` plus
//! a path index), so finished states can be handed to workers one slot each.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::ProfilerConfig;
use crate::inference::TypeHistogram;
use crate::observation::{Observation, ObservationSink, ObservedValue, SampleValue, TypeTag};
use crate::path::{field_name, is_item_path, parent_path};

/// Capacity limits for per-field state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorLimits {
    /// Distinct sample values kept per field
    pub max_samples: usize,
    /// Numeric values kept for statistics
    pub max_numeric_samples: usize,
    /// Distinct value hashes tracked before the count saturates
    pub max_distinct_values: usize,
}

impl Default for AccumulatorLimits {
    fn default() -> Self {
        Self {
            max_samples: 10,
            max_numeric_samples: 1_000,
            max_distinct_values: 100_000,
        }
    }
}

impl From<&ProfilerConfig> for AccumulatorLimits {
    fn from(config: &ProfilerConfig) -> Self {
        Self {
            max_samples: config.analysis.max_sample_values_per_field,
            max_numeric_samples: config.analysis.max_numeric_samples,
            max_distinct_values: config.analysis.max_distinct_values_tracked,
        }
    }
}

/// Exact distinct counter over value hashes, bounded by a capacity
///
/// Once full, new values are no longer counted and the count becomes a lower
/// bound.
#[derive(Debug, Clone, Default)]
pub struct DistinctCounter {
    seen: HashSet<u64>,
    capacity: usize,
    saturated: bool,
}

impl DistinctCounter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity,
            saturated: false,
        }
    }

    pub fn insert(&mut self, hash: u64) {
        if self.seen.contains(&hash) {
            return;
        }
        if self.seen.len() >= self.capacity {
            self.saturated = true;
        } else {
            self.seen.insert(hash);
        }
    }

    pub fn count(&self) -> u64 {
        self.seen.len() as u64
    }

    /// Whether values went uncounted
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}

/// Running state of one field during a pass
#[derive(Debug, Clone)]
pub struct FieldState {
    pub field_path: String,
    pub field_name: String,
    pub parent_path: Option<String>,
    pub nesting_level: usize,
    pub type_histogram: TypeHistogram,
    /// Distinct non-null scalars in first-seen order
    pub sample_values: Vec<SampleValue>,
    pub null_count: u64,
    pub total_count: u64,
    /// Sticky once any array was seen at this path
    pub is_array: bool,
    pub array_item_type_tags: BTreeSet<TypeTag>,
    /// First numeric values seen, duplicates kept
    pub numeric_samples: Vec<f64>,
    pub distinct: DistinctCounter,
    /// First-seen order within the pass
    pub position: usize,
}

impl FieldState {
    fn new(path: &str, depth: usize, position: usize, limits: &AccumulatorLimits) -> Self {
        Self {
            field_path: path.to_string(),
            field_name: field_name(path),
            parent_path: parent_path(path).map(str::to_string),
            nesting_level: depth,
            type_histogram: TypeHistogram::new(),
            sample_values: Vec::new(),
            null_count: 0,
            total_count: 0,
            is_array: false,
            array_item_type_tags: BTreeSet::new(),
            numeric_samples: Vec::new(),
            distinct: DistinctCounter::with_capacity(limits.max_distinct_values),
            position,
        }
    }

    fn record(&mut self, value: &ObservedValue, limits: &AccumulatorLimits) {
        self.total_count += 1;
        self.type_histogram.record(value.type_tag());

        match value {
            ObservedValue::Null => self.null_count += 1,
            ObservedValue::ArrayMarker => self.is_array = true,
            ObservedValue::ObjectMarker => {}
            _ => {
                if let Some(sample) = value.to_sample() {
                    if self.sample_values.len() < limits.max_samples
                        && !self.sample_values.contains(&sample)
                    {
                        self.sample_values.push(sample);
                    }
                }
                if let Some(number) = value.as_f64() {
                    if self.numeric_samples.len() < limits.max_numeric_samples {
                        self.numeric_samples.push(number);
                    }
                }
                if let Some(hash) = value.value_hash() {
                    self.distinct.insert(hash);
                }
            }
        }
    }

    pub fn distinct_count(&self) -> u64 {
        self.distinct.count()
    }
}

/// Observation sink building the field arena
#[derive(Debug, Default)]
pub struct FieldAccumulator {
    limits: AccumulatorLimits,
    fields: Vec<FieldState>,
    index: HashMap<String, usize>,
}

impl FieldAccumulator {
    pub fn new(limits: AccumulatorLimits) -> Self {
        Self {
            limits,
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn slot(&mut self, path: &str, depth: usize) -> usize {
        if let Some(&slot) = self.index.get(path) {
            return slot;
        }
        let slot = self.fields.len();
        self.fields.push(FieldState::new(path, depth, slot, &self.limits));
        self.index.insert(path.to_string(), slot);
        slot
    }

    /// Fold one observation into the state for its path
    pub fn observe(&mut self, observation: &Observation) {
        let slot = self.slot(&observation.path, observation.depth);
        let tag = observation.value.type_tag();
        let limits = self.limits;

        let state = &mut self.fields[slot];
        state.record(&observation.value, &limits);
        if observation.is_array_item {
            state.is_array = true;
            state.array_item_type_tags.insert(tag);
        }

        // Items at `p[]` also describe the array at `p`
        if is_item_path(&observation.path) {
            if let Some(container) = parent_path(&observation.path) {
                if let Some(&container_slot) = self.index.get(container) {
                    let container = &mut self.fields[container_slot];
                    container.is_array = true;
                    container.array_item_type_tags.insert(tag);
                }
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&FieldState> {
        self.index.get(path).map(|&slot| &self.fields[slot])
    }

    /// States in first-seen order
    pub fn fields(&self) -> &[FieldState] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<FieldState> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl ObservationSink for FieldAccumulator {
    fn observe(&mut self, observation: Observation) {
        FieldAccumulator::observe(self, &observation);
    }
}
