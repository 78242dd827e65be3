// THEORY:
// The `simulator` module is the personnel half of the engine. An `EntitySimulator`
// owns a fixed roster of monitored people and evolves their vitals and position once
// per tick by bounded random perturbation.
//
// Key architectural principles:
// 1.  **Derived Status**: every roster member starts NORMAL. From then on its status is
//     recomputed from the vital rate and the emergency flag whenever either changes,
//     and is never written any other way.
// 2.  **Frozen Emergencies**: once `force_emergency` sets the flag, normal evolution
//     skips the entity's vitals and position. There is no recovery path short of a
//     restart. Only `updated_at` keeps moving.
// 3.  **Fixed Identity**: the roster is built once. Entities are never added or
//     removed, and ids are immutable.
// 4.  **Consistent Reads**: the roster and its RNG live behind one mutex. It is held
//     for a whole tick or a whole clone, so a reader never sees a half-updated entity.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub const VITAL_RATE_MIN: u32 = 60;
pub const VITAL_RATE_MAX: u32 = 100;
/// Below this the entity is at risk.
pub const AT_RISK_LOW: u32 = 70;
/// Above this the entity is at risk.
pub const AT_RISK_HIGH: u32 = 90;
pub const VITAL_RATE_STEP: i64 = 5;
pub const EMERGENCY_VITAL_MIN: u32 = 120;
pub const EMERGENCY_VITAL_MAX: u32 = 150;
/// Maximum drift per tick, in degrees, on each axis.
pub const POSITION_JITTER: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Normal,
    AtRisk,
    Critical,
}

/// The status implied by a vital rate and the emergency override.
pub fn derive_status(vital_rate: u32, emergency: bool) -> EntityStatus {
    if emergency {
        EntityStatus::Critical
    } else if vital_rate < AT_RISK_LOW || vital_rate > AT_RISK_HIGH {
        EntityStatus::AtRisk
    } else {
        EntityStatus::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// A read-only copy of one entity at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: String,
    pub display_name: String,
    pub position: Position,
    pub vital_rate: u32,
    pub status: EntityStatus,
    pub updated_at: DateTime<Utc>,
}

/// How one roster member starts out.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeed {
    pub id: String,
    pub display_name: String,
    pub position: Position,
    /// Clamped into the normal range. `None` draws a random starting rate.
    pub initial_vital_rate: Option<u32>,
}

impl EntitySeed {
    pub fn new(id: &str, display_name: &str, lat: f64, lon: f64) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            position: Position { lat, lon },
            initial_vital_rate: None,
        }
    }

    pub fn with_vital_rate(mut self, vital_rate: u32) -> Self {
        self.initial_vital_rate = Some(vital_rate);
        self
    }
}

/// The six-person squad monitored by default.
pub fn default_roster() -> Vec<EntitySeed> {
    vec![
        EntitySeed::new("soldier-1", "Lt. Rajesh Kumar", 28.6139, 77.2090),
        EntitySeed::new("soldier-2", "Sgt. Priya Sharma", 28.6140, 77.2095),
        EntitySeed::new("soldier-3", "Cpl. Amit Singh", 28.6145, 77.2100),
        EntitySeed::new("soldier-4", "Pvt. Sunita Devi", 28.6142, 77.2098),
        EntitySeed::new("soldier-5", "Maj. Vikram Joshi", 28.6148, 77.2105),
        EntitySeed::new("soldier-6", "Capt. Anjali Patel", 28.6143, 77.2102),
    ]
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub tick_interval: Duration,
    /// Fixes the RNG for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entity {
    id: String,
    display_name: String,
    position: Position,
    vital_rate: u32,
    emergency: bool,
    status: EntityStatus,
    updated_at: DateTime<Utc>,
}

impl Entity {
    fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            position: self.position,
            vital_rate: self.vital_rate,
            status: self.status,
            updated_at: self.updated_at,
        }
    }

    fn evolve(&mut self, rng: &mut StdRng) {
        let delta = rng.gen_range(-VITAL_RATE_STEP..=VITAL_RATE_STEP);
        let next = self.vital_rate as i64 + delta;
        self.vital_rate = next.clamp(VITAL_RATE_MIN as i64, VITAL_RATE_MAX as i64) as u32;
        self.position.lat += rng.gen_range(-POSITION_JITTER..=POSITION_JITTER);
        self.position.lon += rng.gen_range(-POSITION_JITTER..=POSITION_JITTER);
        self.status = derive_status(self.vital_rate, self.emergency);
    }
}

struct SimState {
    entities: Vec<Entity>,
    rng: StdRng,
}

impl SimState {
    fn tick(&mut self) {
        let now = Utc::now();
        let SimState { entities, rng } = self;
        for entity in entities.iter_mut() {
            if !entity.emergency {
                entity.evolve(rng);
            }
            entity.updated_at = now;
        }
    }
}

/// The personnel telemetry producer.
pub struct EntitySimulator {
    state: Arc<Mutex<SimState>>,
    running: Arc<AtomicBool>,
    tick_interval: Duration,
    control: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl EntitySimulator {
    pub fn new(config: SimulatorConfig, roster: Vec<EntitySeed>) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let now = Utc::now();
        let entities: Vec<Entity> = roster
            .into_iter()
            .map(|seed| {
                let vital_rate = match seed.initial_vital_rate {
                    Some(rate) => rate.clamp(VITAL_RATE_MIN, VITAL_RATE_MAX),
                    None => rng.gen_range(VITAL_RATE_MIN..=VITAL_RATE_MAX),
                };
                Entity {
                    id: seed.id,
                    display_name: seed.display_name,
                    position: seed.position,
                    vital_rate,
                    emergency: false,
                    status: EntityStatus::Normal,
                    updated_at: now,
                }
            })
            .collect();
        info!(count = entities.len(), "Initialized monitored entities");

        Self {
            state: Arc::new(Mutex::new(SimState { entities, rng })),
            running: Arc::new(AtomicBool::new(false)),
            tick_interval: config.tick_interval,
            control: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the evolution loop. Does nothing if it is already running. Must be
    /// called from within a tokio runtime.
    pub fn start(&self) {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let state = self.state.clone();
        let running = self.running.clone();
        let tick_interval = self.tick_interval;
        running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                state.lock().unwrap_or_else(PoisonError::into_inner).tick();
            }
            running.store(false, Ordering::SeqCst);
        });

        *control = Some((shutdown, handle));
        info!("Entity monitoring started");
    }

    /// Signals the loop to exit and waits for it.
    pub async fn stop(&self) {
        let taken = self.control.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some((shutdown, handle)) = taken else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "Entity monitoring loop terminated abnormally");
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Entity monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one evolution step over the whole roster.
    pub fn tick(&self) {
        self.lock().tick();
    }

    /// A consistent copy of every entity, in roster order.
    pub fn roster(&self) -> Vec<EntitySnapshot> {
        self.lock().entities.iter().map(Entity::snapshot).collect()
    }

    /// Forces `id` into a critical emergency. Returns `false` if no such entity exists.
    pub fn force_emergency(&self, id: &str) -> bool {
        let mut guard = self.lock();
        let SimState { entities, rng } = &mut *guard;
        let Some(entity) = entities.iter_mut().find(|e| e.id == id) else {
            warn!(entity_id = %id, "Entity not found");
            return false;
        };
        entity.emergency = true;
        entity.vital_rate = rng.gen_range(EMERGENCY_VITAL_MIN..=EMERGENCY_VITAL_MAX);
        entity.status = derive_status(entity.vital_rate, entity.emergency);
        entity.updated_at = Utc::now();
        info!(
            entity_id = %entity.id,
            display_name = %entity.display_name,
            vital_rate = entity.vital_rate,
            "Emergency forced"
        );
        true
    }
}
