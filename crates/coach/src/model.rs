//! Policy/value model interface and a lookup-table implementation
//!
//! `TabularNet` keeps one (policy, value) entry per encoded position and moves
//! it toward the training targets. It is small enough for tic-tac-toe-sized
//! games and serializes deterministically, which makes weight comparisons exact.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ModelError, TrainingExample};

/// Policy + value function used by search.
pub trait PolicyValueNet {
    /// Action probabilities (len == action space) and a value in [-1, 1],
    /// both from the perspective of the player to move in `state`.
    fn predict(&self, state: &[u8]) -> (Vec<f32>, f32);
}

/// Model that the training loop can fit, snapshot and persist.
///
/// `Clone` is the in-memory snapshot: a clone taken before `train` must restore
/// the exact pre-training weights when assigned back.
pub trait TrainableModel: PolicyValueNet + Clone + Send + Sync {
    /// Fit the model to `examples` (already shuffled by the caller).
    fn train(&mut self, examples: &[TrainingExample]) -> Result<TrainStats, ModelError>;

    /// Save weights to a file
    fn save(&self, path: &Path) -> std::io::Result<()>;

    /// Load weights from a file
    fn load(&mut self, path: &Path) -> std::io::Result<()>;
}

/// Summary of one `train` call, measured on the final epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TrainStats {
    pub examples: usize,
    pub policy_loss: f32,
    pub value_loss: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct TableEntry {
    policy: Vec<f32>,
    value: f32,
    updates: u32,
}

/// Lookup-table policy/value model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabularNet {
    action_size: usize,
    learning_rate: f32,
    epochs: usize,
    /// Keyed by hex-encoded state bytes; BTreeMap keeps serialization order stable.
    table: BTreeMap<String, TableEntry>,
}

impl TabularNet {
    pub fn new(action_size: usize, learning_rate: f32, epochs: usize) -> Self {
        assert!(action_size > 0, "action_size must be positive");
        assert!(
            learning_rate > 0.0 && learning_rate <= 1.0,
            "learning_rate must be in (0, 1]"
        );
        Self {
            action_size,
            learning_rate,
            epochs: epochs.max(1),
            table: BTreeMap::new(),
        }
    }

    pub fn action_size(&self) -> usize {
        self.action_size
    }

    /// Number of positions with a stored entry
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn uniform(&self) -> Vec<f32> {
        vec![1.0 / self.action_size as f32; self.action_size]
    }
}

fn state_key(state: &[u8]) -> String {
    state.iter().map(|b| format!("{b:02x}")).collect()
}

impl PolicyValueNet for TabularNet {
    fn predict(&self, state: &[u8]) -> (Vec<f32>, f32) {
        match self.table.get(&state_key(state)) {
            Some(entry) => (entry.policy.clone(), entry.value),
            None => (self.uniform(), 0.0),
        }
    }
}

impl TrainableModel for TabularNet {
    fn train(&mut self, examples: &[TrainingExample]) -> Result<TrainStats, ModelError> {
        if let Some(bad) = examples
            .iter()
            .find(|ex| ex.policy_target.len() != self.action_size)
        {
            return Err(ModelError::PolicySize {
                expected: self.action_size,
                found: bad.policy_target.len(),
            });
        }

        let lr = self.learning_rate;
        let mut stats = TrainStats::default();

        for _ in 0..self.epochs {
            let mut policy_loss = 0.0f32;
            let mut value_loss = 0.0f32;

            for ex in examples {
                let uniform = self.uniform();
                let entry = self
                    .table
                    .entry(state_key(&ex.state_encoding))
                    .or_insert_with(|| TableEntry {
                        policy: uniform,
                        value: 0.0,
                        updates: 0,
                    });

                // Losses are measured before the update
                policy_loss -= ex
                    .policy_target
                    .iter()
                    .zip(&entry.policy)
                    .map(|(t, p)| t * p.max(1e-8).ln())
                    .sum::<f32>();
                value_loss += (entry.value - ex.value_target).powi(2);

                for (p, t) in entry.policy.iter_mut().zip(&ex.policy_target) {
                    *p += lr * (t - *p);
                }
                entry.value += lr * (ex.value_target - entry.value);
                entry.updates += 1;
            }

            let n = examples.len().max(1) as f32;
            stats = TrainStats {
                examples: examples.len(),
                policy_loss: policy_loss / n,
                value_loss: value_loss / n,
            };
        }

        Ok(stats)
    }

    fn save(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()
    }

    fn load(&mut self, path: &Path) -> std::io::Result<()> {
        let reader = BufReader::new(File::open(path)?);
        let loaded: TabularNet = serde_json::from_reader(reader)?;
        if loaded.action_size != self.action_size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "snapshot has action size {}, model expects {}",
                    loaded.action_size, self.action_size
                ),
            ));
        }
        *self = loaded;
        Ok(())
    }
}
