//! In-process producer with fault injection
//!
//! The simulator keeps an authoritative [`ObjectTree`], mutates it with
//! seeded random operations and emits the matching notifications. Faults
//! are injected on the notification side only: a dropped event or a
//! corrupted value leaves the truth intact, so the engine should catch it.
//!
//! Operations come in bursts separated by quiet periods longer than the
//! engine's quiescence window, giving the scheduler a chance to compare.

use crate::error::{ConfigError, SourceError};
use crate::source::{NotificationSender, SnapshotSource};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sigwatch_model::{
    InterfaceName, Interfaces, ObjectPath, ObjectTree, PendingEvent, Properties, PropertyName,
    PropertyValue, Snapshot,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const INTERFACES: &[&str] = &["Pv", "Vg", "Lv", "Job"];
const PROPERTIES: &[&str] = &["Name", "Size", "Used", "Tags"];

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Objects present before the first notification
    pub objects: usize,
    /// Total operations to perform
    pub operations: u64,
    /// Probability that a notification is not delivered
    pub drop_rate: f64,
    /// Probability that an emitted property value is altered
    pub corrupt_rate: f64,
    /// Root path all simulated objects live under
    pub root: ObjectPath,
    /// Wait before the first operation
    pub startup_delay: Duration,
    /// Pause between operations within a burst
    pub step_interval: Duration,
    /// Operations per burst
    pub burst: u64,
    /// Pause after each burst
    pub quiet_period: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            objects: 8,
            operations: 200,
            drop_rate: 0.0,
            corrupt_rate: 0.0,
            root: ObjectPath::new(crate::config::DEFAULT_ROOT_PATH),
            startup_delay: Duration::from_millis(100),
            step_interval: Duration::from_millis(10),
            burst: 50,
            quiet_period: Duration::from_secs(4),
        }
    }
}

impl SimulatorConfig {
    /// Check that rates are probabilities and a burst is non-empty
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [("drop_rate", self.drop_rate), ("corrupt_rate", self.corrupt_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {rate}")));
            }
        }
        if self.burst == 0 {
            return Err(ConfigError::Invalid("burst must be positive".into()));
        }
        Ok(())
    }
}

/// What the simulator did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Operations applied to the authoritative tree
    pub operations: u64,
    /// Notifications delivered
    pub emitted: u64,
    /// Notifications withheld
    pub dropped: u64,
    /// Notifications delivered with an altered value
    pub corrupted: u64,
}

impl SimulationReport {
    /// Whether any fault was injected
    #[must_use]
    pub fn is_faulty(&self) -> bool {
        self.dropped > 0 || self.corrupted > 0
    }
}

/// Authoritative state of the simulated producer
///
/// Cheap to clone; all clones share one tree.
#[derive(Debug, Clone, Default)]
pub struct SimulatedService {
    truth: Arc<Mutex<ObjectTree>>,
}

impl SimulatedService {
    /// Copy of the current authoritative tree
    #[must_use]
    pub fn tree(&self) -> ObjectTree {
        self.truth.lock().clone()
    }
}

#[async_trait::async_trait]
impl SnapshotSource for SimulatedService {
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        Ok(Snapshot::new(self.tree()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    AddObject,
    RemoveInterface,
    UpdateProperty,
}

/// Seeded random producer
#[derive(Debug)]
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    service: SimulatedService,
    next_id: u64,
    report: SimulationReport,
}

impl Simulator {
    /// Create a simulator and populate the initial objects
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SimulatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut sim = Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            service: SimulatedService::default(),
            next_id: 0,
            report: SimulationReport::default(),
        };

        for _ in 0..sim.config.objects {
            let (path, interfaces) = sim.new_object();
            sim.service.truth.lock().insert(path, interfaces);
        }
        Ok(sim)
    }

    /// Handle to the authoritative state, usable as a [`SnapshotSource`]
    #[must_use]
    pub fn service(&self) -> SimulatedService {
        self.service.clone()
    }

    /// Perform every configured operation, then return
    ///
    /// `sender` is dropped on return, closing the notification stream.
    pub async fn run(mut self, sender: NotificationSender) -> SimulationReport {
        tokio::time::sleep(self.config.startup_delay).await;
        info!(
            seed = self.config.seed,
            operations = self.config.operations,
            drop_rate = self.config.drop_rate,
            corrupt_rate = self.config.corrupt_rate,
            "Simulation started"
        );

        for i in 1..=self.config.operations {
            if let Some(event) = self.step() {
                self.deliver(&sender, event);
            }
            self.report.operations += 1;

            if i % self.config.burst == 0 {
                debug!(operations = i, "Burst complete");
                tokio::time::sleep(self.config.quiet_period).await;
            } else {
                tokio::time::sleep(self.config.step_interval).await;
            }
        }

        info!(
            emitted = self.report.emitted,
            dropped = self.report.dropped,
            corrupted = self.report.corrupted,
            "Simulation finished"
        );
        self.report
    }

    /// Apply one random operation to the truth; returns the faithful event
    fn step(&mut self) -> Option<PendingEvent> {
        let empty = self.service.truth.lock().is_empty();
        let op = if empty {
            Operation::AddObject
        } else {
            match self.rng.gen_range(0..10) {
                0..=2 => Operation::AddObject,
                3..=4 => Operation::RemoveInterface,
                _ => Operation::UpdateProperty,
            }
        };

        match op {
            Operation::AddObject => {
                let (path, interfaces) = self.new_object();
                self.service
                    .truth
                    .lock()
                    .insert(path.clone(), interfaces.clone());
                Some(PendingEvent::Add { path, interfaces })
            }
            Operation::RemoveInterface => self.remove_interface(),
            Operation::UpdateProperty => self.update_property(),
        }
    }

    fn remove_interface(&mut self) -> Option<PendingEvent> {
        let mut truth = self.service.truth.lock();
        let path = pick(&mut self.rng, truth.keys())?.clone();
        let entry = truth.get_mut(&path)?;
        let interface = pick(&mut self.rng, entry.keys())?.clone();

        entry.remove(&interface);
        if entry.is_empty() {
            truth.remove(&path);
        }
        Some(PendingEvent::Remove {
            path,
            interfaces: vec![interface],
        })
    }

    fn update_property(&mut self) -> Option<PendingEvent> {
        let mut truth = self.service.truth.lock();
        let path = pick(&mut self.rng, truth.keys())?.clone();
        let entry = truth.get_mut(&path)?;
        let interface = pick(&mut self.rng, entry.keys())?.clone();
        let property = PropertyName::new(*PROPERTIES.choose(&mut self.rng)?);
        let value = random_value(&mut self.rng, property.as_str());

        entry
            .get_mut(&interface)?
            .insert(property.clone(), value.clone());
        Some(PendingEvent::Update {
            path,
            interface,
            changed: Properties::from([(property, value)]),
            invalidated: Vec::new(),
        })
    }

    fn deliver(&mut self, sender: &NotificationSender, mut event: PendingEvent) {
        if self.rng.gen_bool(self.config.drop_rate) {
            debug!(kind = %event.kind(), path = %event.path(), "Dropping notification");
            self.report.dropped += 1;
            return;
        }
        if self.rng.gen_bool(self.config.corrupt_rate) && corrupt(&mut event) {
            debug!(kind = %event.kind(), path = %event.path(), "Corrupting notification");
            self.report.corrupted += 1;
        }
        if sender.send(event) {
            self.report.emitted += 1;
        }
    }

    fn new_object(&mut self) -> (ObjectPath, Interfaces) {
        self.next_id += 1;
        let path = self.config.root.child(format!("obj{}", self.next_id));

        let count = self.rng.gen_range(1..=2);
        let interfaces = INTERFACES
            .choose_multiple(&mut self.rng, count)
            .map(|name| {
                let properties: Properties = PROPERTIES
                    .iter()
                    .map(|prop| (PropertyName::new(*prop), random_value(&mut self.rng, prop)))
                    .collect();
                (InterfaceName::new(*name), properties)
            })
            .collect();
        (path, interfaces)
    }
}

fn pick<'a, T: 'a>(
    rng: &mut StdRng,
    mut items: impl ExactSizeIterator<Item = &'a T>,
) -> Option<&'a T> {
    let len = items.len();
    if len == 0 {
        return None;
    }
    items.nth(rng.gen_range(0..len))
}

fn random_value(rng: &mut StdRng, property: &str) -> PropertyValue {
    match property {
        "Name" => PropertyValue::from(format!("sim{}", rng.gen_range(0..1000))),
        "Size" => PropertyValue::UInt(rng.gen_range(0..1u64 << 40)),
        "Used" => PropertyValue::Bool(rng.gen_bool(0.5)),
        _ => PropertyValue::Array(
            (0..rng.gen_range(0..3))
                .map(|i| PropertyValue::from(format!("tag{i}")))
                .collect(),
        ),
    }
}

/// Alter one carried value; returns whether anything changed
fn corrupt(event: &mut PendingEvent) -> bool {
    let properties = match event {
        PendingEvent::Add { interfaces, .. } => interfaces.values_mut().next(),
        PendingEvent::Update { changed, .. } => Some(changed),
        PendingEvent::Remove { .. } => None,
    };
    let Some(value) = properties.and_then(|props| props.values_mut().next()) else {
        return false;
    };
    *value = PropertyValue::from("corrupted");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::notification_channel;

    fn quick(seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed,
            objects: 3,
            operations: 30,
            root: ObjectPath::new("/sim"),
            startup_delay: Duration::ZERO,
            step_interval: Duration::from_millis(1),
            burst: 10,
            quiet_period: Duration::from_millis(5),
            ..SimulatorConfig::default()
        }
    }

    #[test]
    fn rejects_out_of_range_rates() {
        let config = SimulatorConfig {
            drop_rate: 1.5,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(config).is_err());
    }

    #[test]
    fn initial_objects_live_under_root() {
        let sim = Simulator::new(quick(7)).unwrap();
        let tree = sim.service().tree();
        assert_eq!(tree.len(), 3);
        let root = ObjectPath::new("/sim");
        assert!(tree.keys().all(|path| path.is_under(&root)));
        assert!(sigwatch_model::is_well_formed(&tree));
    }

    #[tokio::test(start_paused = true)]
    async fn same_seed_same_truth() {
        let first = Simulator::new(quick(11)).unwrap();
        let second = Simulator::new(quick(11)).unwrap();
        let (a, b) = (first.service(), second.service());

        let (tx1, _rx1) = notification_channel();
        let (tx2, _rx2) = notification_channel();
        let r1 = first.run(tx1).await;
        let r2 = second.run(tx2).await;

        assert_eq!(r1, r2);
        assert_eq!(a.tree(), b.tree());
    }

    #[tokio::test(start_paused = true)]
    async fn fault_free_run_emits_every_operation() {
        let sim = Simulator::new(quick(3)).unwrap();
        let (tx, mut rx) = notification_channel();
        let report = sim.run(tx).await;

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(report.operations, 30);
        assert_eq!(report.emitted, received);
        assert!(!report.is_faulty());
    }

    #[tokio::test(start_paused = true)]
    async fn full_drop_rate_emits_nothing() {
        let config = SimulatorConfig {
            drop_rate: 1.0,
            ..quick(5)
        };
        let sim = Simulator::new(config).unwrap();
        let (tx, _rx) = notification_channel();
        let report = sim.run(tx).await;
        assert_eq!(report.emitted, 0);
        assert!(report.dropped > 0);
    }

    #[test]
    fn corrupt_changes_update_value() {
        let mut event = PendingEvent::Update {
            path: ObjectPath::new("/sim/obj1"),
            interface: InterfaceName::new("Pv"),
            changed: Properties::from([(PropertyName::new("Used"), PropertyValue::Bool(true))]),
            invalidated: vec![],
        };
        assert!(corrupt(&mut event));
        let PendingEvent::Update { changed, .. } = event else {
            unreachable!()
        };
        assert_eq!(changed["Used"], PropertyValue::from("corrupted"));
    }
}
