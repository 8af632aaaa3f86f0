use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::TAU;

use crate::config::WorldConfig;
use crate::protocol::{GameStateWire, PowerUpKind, PowerUpWire, RampWire, Vec3};

/// Exclusive upper bound of generated seeds; browser clients parse the seed
/// as a number in this range.
const SEED_RANGE: u32 = 1_000_000;

/// Round to 4 decimal places (plenty for a yaw angle)
#[inline]
fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

/// Seed plus everything derived from it. Collected coins and power-ups leave
/// an empty slot so every entry keeps its generated index.
#[derive(Debug, Clone)]
struct SeededWorld {
    seed: String,
    coins: Vec<Option<Vec3>>,
    power_ups: Vec<Option<PowerUpWire>>,
    ramps: Vec<RampWire>,
}

impl SeededWorld {
    fn generate(seed: String, config: &WorldConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed_to_u64(&seed));
        let half = config.half_extent().floor() as i64;

        // Whole-number coordinates so clients can echo them back and match exactly.
        let spot = |rng: &mut ChaCha8Rng| {
            let x = rng.gen_range(-half..=half) as f64;
            let z = rng.gen_range(-half..=half) as f64;
            Vec3::new(x, 0.0, z)
        };

        let coins = (0..config.coin_count)
            .map(|_| Some(spot(&mut rng)))
            .collect();
        let power_ups = (0..config.power_up_count)
            .map(|_| {
                let pos = spot(&mut rng);
                let kind = if rng.gen_bool(0.5) {
                    PowerUpKind::Speed
                } else {
                    PowerUpKind::Control
                };
                Some(PowerUpWire {
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    kind,
                })
            })
            .collect();
        let ramps = (0..config.ramp_count)
            .map(|_| {
                let pos = spot(&mut rng);
                RampWire {
                    x: pos.x,
                    y: pos.y,
                    z: pos.z,
                    rotation: round4(rng.gen_range(0.0..TAU)),
                }
            })
            .collect();

        Self {
            seed,
            coins,
            power_ups,
            ramps,
        }
    }
}

/// Process-wide world every client must agree on.
///
/// The seed (and the layout derived from it) is created the first time it is
/// needed and never changes afterwards. Coins and power-ups are consumed at
/// most once, and an entry's index never changes.
pub struct WorldState {
    config: WorldConfig,
    seeded: Option<SeededWorld>,
}

impl WorldState {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            seeded: None,
        }
    }

    /// Current seed without creating one.
    pub fn seed(&self) -> Option<&str> {
        self.seeded.as_ref().map(|w| w.seed.as_str())
    }

    /// Existing seed, or a newly generated one on first call.
    pub fn ensure_seed(&mut self) -> &str {
        &self.seeded().seed
    }

    /// Snapshot handed to a joining player.
    pub fn game_state(&mut self) -> GameStateWire {
        let world = self.seeded();
        GameStateWire {
            seed: world.seed.clone(),
            coins: world.coins.clone(),
            power_ups: world.power_ups.clone(),
            ramps: world.ramps.clone(),
        }
    }

    /// Coin slots; `None` marks a collected coin.
    pub fn coins(&self) -> &[Option<Vec3>] {
        self.seeded
            .as_ref()
            .map(|w| w.coins.as_slice())
            .unwrap_or_default()
    }

    /// Power-up slots; `None` marks a collected power-up.
    pub fn power_ups(&self) -> &[Option<PowerUpWire>] {
        self.seeded
            .as_ref()
            .map(|w| w.power_ups.as_slice())
            .unwrap_or_default()
    }

    /// Clear the first uncollected coin at exactly `at`. Returns its slot
    /// index, or `None` if it was already taken (or never existed).
    pub fn consume_coin(&mut self, at: &Vec3) -> Option<usize> {
        let world = self.seeded.as_mut()?;
        let index = world.coins.iter().position(|c| c.as_ref() == Some(at))?;
        world.coins[index] = None;
        Some(index)
    }

    /// Power-up counterpart of [`consume_coin`](Self::consume_coin).
    pub fn consume_power_up(&mut self, at: &Vec3) -> Option<usize> {
        let world = self.seeded.as_mut()?;
        let index = world
            .power_ups
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.position() == *at))?;
        world.power_ups[index] = None;
        Some(index)
    }

    fn seeded(&mut self) -> &mut SeededWorld {
        let config = &self.config;
        self.seeded.get_or_insert_with(|| {
            let seed = config.seed.clone().unwrap_or_else(random_seed);
            let world = SeededWorld::generate(seed, config);
            tracing::info!(
                seed = %world.seed,
                coins = world.coins.len(),
                power_ups = world.power_ups.len(),
                ramps = world.ramps.len(),
                "world seeded"
            );
            world
        })
    }
}

fn random_seed() -> String {
    rand::thread_rng().gen_range(0..SEED_RANGE).to_string()
}

/// Numeric seeds map to themselves; anything else is hashed (FNV-1a).
fn seed_to_u64(seed: &str) -> u64 {
    if let Ok(n) = seed.trim().parse::<u64>() {
        return n;
    }
    seed.bytes().fold(0xcbf29ce484222325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(seed: &str) -> WorldState {
        WorldState::new(WorldConfig {
            seed: Some(seed.to_string()),
            coin_count: 20,
            power_up_count: 10,
            ramp_count: 5,
            map_size: 100.0,
        })
    }

    #[test]
    fn seed_is_lazy_and_stable() {
        let mut world = WorldState::new(WorldConfig::default());
        assert!(world.seed().is_none());
        let first = world.ensure_seed().to_string();
        for _ in 0..100 {
            assert_eq!(world.ensure_seed(), first);
        }
        assert_eq!(world.seed(), Some(first.as_str()));
    }

    #[test]
    fn random_seed_is_in_client_range() {
        for _ in 0..100 {
            let seed: u32 = random_seed().parse().unwrap();
            assert!(seed < SEED_RANGE);
        }
    }

    #[test]
    fn configured_seed_is_used() {
        let mut world = fixed("424242");
        assert_eq!(world.ensure_seed(), "424242");
    }

    #[test]
    fn layout_is_deterministic_per_seed() {
        let a = fixed("1234").game_state();
        let b = fixed("1234").game_state();
        let c = fixed("1235").game_state();
        assert_eq!(a, b);
        assert_ne!(a.coins, c.coins);
        assert_eq!(a.coins.len(), 20);
        assert_eq!(a.power_ups.len(), 10);
        assert_eq!(a.ramps.len(), 5);
    }

    #[test]
    fn layout_stays_on_the_map_grid() {
        let state = fixed("99").game_state();
        for coin in state.coins.iter().flatten() {
            assert!(coin.x.abs() <= 50.0 && coin.z.abs() <= 50.0);
            assert_eq!(coin.x.fract(), 0.0);
            assert_eq!(coin.z.fract(), 0.0);
        }
        for ramp in &state.ramps {
            assert!(ramp.rotation >= 0.0 && ramp.rotation <= round4(TAU));
        }
    }

    #[test]
    fn non_numeric_seed_is_hashed() {
        assert_eq!(seed_to_u64("17"), 17);
        assert_ne!(seed_to_u64("powder"), seed_to_u64("slush"));
        let mut world = fixed("powder");
        assert_eq!(world.game_state().coins.len(), 20);
    }

    #[test]
    fn coin_consumed_at_most_once() {
        let mut world = fixed("7");
        let coins = world.game_state().coins;
        let target = coins[3].unwrap();
        let first_index = coins.iter().position(|c| *c == Some(target)).unwrap();
        // Duplicate coordinates are possible on a small grid.
        let copies = coins.iter().filter(|c| **c == Some(target)).count();

        assert_eq!(world.consume_coin(&target), Some(first_index));
        for _ in 1..copies {
            assert!(world.consume_coin(&target).is_some());
        }
        assert_eq!(world.consume_coin(&target), None);
        assert_eq!(world.coins().iter().flatten().count(), coins.len() - copies);
    }

    #[test]
    fn power_up_consumed_at_most_once() {
        let mut world = fixed("8");
        let first = world.game_state().power_ups[0].as_ref().unwrap().position();
        assert_eq!(world.consume_power_up(&first), Some(0));
        while world.consume_power_up(&first).is_some() {}
        assert_eq!(world.consume_power_up(&first), None);
    }

    #[test]
    fn consumed_slots_keep_later_indices() {
        let mut world = fixed("7");
        let coins = world.game_state().coins;
        let unique: Vec<usize> = (0..coins.len())
            .filter(|&i| coins.iter().filter(|c| **c == coins[i]).count() == 1)
            .collect();
        let (a, b) = (unique[0], unique[unique.len() - 1]);
        assert!(a < b);

        assert_eq!(world.consume_coin(&coins[a].unwrap()), Some(a));
        // The later coin is still reported at its generated index.
        assert_eq!(world.consume_coin(&coins[b].unwrap()), Some(b));
        assert_eq!(world.coins().len(), coins.len());
        assert!(world.coins()[a].is_none() && world.coins()[b].is_none());

        let state = world.game_state();
        assert_eq!(state.coins.len(), coins.len());
        assert_eq!(state.coins[a], None);
    }

    #[test]
    fn consuming_before_seeding_finds_nothing() {
        let mut world = fixed("8");
        assert_eq!(world.consume_coin(&Vec3::ZERO), None);
        assert!(world.seed().is_none());
    }

    #[test]
    fn unknown_position_is_not_consumed() {
        let mut world = fixed("8");
        world.ensure_seed();
        let before = world.coins().to_vec();
        assert_eq!(world.consume_coin(&Vec3::new(0.5, 0.0, 0.5)), None);
        assert_eq!(world.coins(), before.as_slice());
    }
}
