//! Seeded failure-injecting collaborators

use async_trait::async_trait;
use galley_core::{Perceiver, RemoteIntelligence};
use galley_model::{
    AssetKind, Capture, DescriptiveBlueprint, Hypothesis, ImageBytes, Ingredient, Preferences,
    ProtocolDraft,
};
use galley_resilience::{CredentialProvider, NetworkProbe, ProbeError, RemoteError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Probability of each failure kind per remote attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChaosRates {
    /// Quota exhaustion (429)
    pub quota: f64,
    /// Transient outage (503)
    pub transient: f64,
    /// Rejected request (400)
    pub permanent: f64,
}

impl Default for ChaosRates {
    fn default() -> Self {
        Self {
            quota: 0.05,
            transient: 0.15,
            permanent: 0.05,
        }
    }
}

impl ChaosRates {
    /// Check that every rate is a probability and they sum to at most 1
    ///
    /// # Errors
    /// Describes the first offending rate.
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [
            ("quota", self.quota),
            ("transient", self.transient),
            ("permanent", self.permanent),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{name} rate must lie in [0, 1] (got {rate})"));
            }
        }
        let total = self.quota + self.transient + self.permanent;
        if total > 1.0 {
            return Err(format!("failure rates sum to {total}, above 1"));
        }
        Ok(())
    }
}

/// What a [`ChaosRemote`] answered, per operation class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChaosTally {
    /// Synthesis attempts answered successfully
    pub synthesize_ok: u32,
    /// Synthesis attempts answered with a quota error
    pub synthesize_quota: u32,
    /// Synthesis attempts answered with any error
    pub synthesize_failed: u32,
    /// Attempts on every other operation
    pub other_calls: u32,
    /// Quota errors on every other operation
    pub other_quota: u32,
}

enum Draw {
    Answer,
    Fail(RemoteError),
}

/// Remote service that fails at seeded random
#[derive(Debug)]
pub struct ChaosRemote {
    rng: Mutex<StdRng>,
    rates: ChaosRates,
    tally: Mutex<ChaosTally>,
}

impl ChaosRemote {
    /// Create a remote whose failures are determined by `seed`
    #[must_use]
    pub fn new(seed: u64, rates: ChaosRates) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            rates,
            tally: Mutex::new(ChaosTally::default()),
        }
    }

    /// Answers given so far
    #[must_use]
    pub fn tally(&self) -> ChaosTally {
        *self.tally.lock()
    }

    fn draw(&self) -> Draw {
        let roll: f64 = self.rng.lock().random();
        let r = self.rates;
        if roll < r.quota {
            Draw::Fail(RemoteError::with_status(429, "resource exhausted"))
        } else if roll < r.quota + r.transient {
            Draw::Fail(RemoteError::with_status(503, "service unavailable"))
        } else if roll < r.quota + r.transient + r.permanent {
            Draw::Fail(RemoteError::with_status(400, "invalid argument"))
        } else {
            Draw::Answer
        }
    }

    fn attempt<T>(&self, answer: impl FnOnce() -> T) -> Result<T, RemoteError> {
        let draw = self.draw();
        let mut tally = self.tally.lock();
        tally.other_calls += 1;
        match draw {
            Draw::Answer => Ok(answer()),
            Draw::Fail(e) => {
                if e.status == Some(429) {
                    tally.other_quota += 1;
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RemoteIntelligence for ChaosRemote {
    async fn synthesize(
        &self,
        ingredients: &[Ingredient],
        _preferences: &Preferences,
    ) -> Result<ProtocolDraft, RemoteError> {
        let draw = self.draw();
        let mut tally = self.tally.lock();
        match draw {
            Draw::Answer => {
                tally.synthesize_ok += 1;
                let mut draft = ProtocolDraft::new("Chaos Kitchen Stew").cites("chaos remote");
                for item in ingredients {
                    draft = draft.uses(item.name.clone());
                }
                for step in ["Prep", "Sear", "Simmer", "Season", "Serve"] {
                    draft = draft.step(step);
                }
                Ok(draft)
            }
            Draw::Fail(e) => {
                tally.synthesize_failed += 1;
                if e.status == Some(429) {
                    tally.synthesize_quota += 1;
                }
                Err(e)
            }
        }
    }

    async fn hypothesize(&self, ingredients: &[Ingredient]) -> Result<Vec<Hypothesis>, RemoteError> {
        let fresh = !ingredients.iter().any(|i| i.key() == "saffron");
        self.attempt(|| {
            if fresh {
                vec![Hypothesis::new("saffron", 0.6).with_visual_hint("small red threads")]
            } else {
                Vec::new()
            }
        })
    }

    async fn rescan(
        &self,
        _capture: &Capture,
        hypotheses: &[Hypothesis],
    ) -> Result<Vec<Ingredient>, RemoteError> {
        self.attempt(|| {
            hypotheses
                .iter()
                .map(|h| Ingredient::new(h.name.clone(), h.confidence()))
                .collect()
        })
    }

    async fn refine(&self, ingredients: &[Ingredient]) -> Result<Vec<Ingredient>, RemoteError> {
        self.attempt(|| ingredients.to_vec())
    }

    async fn generate_asset(&self, kind: AssetKind, _subject: &str) -> Result<ImageBytes, RemoteError> {
        self.attempt(|| ImageBytes::new("image/png", kind.label().as_bytes().to_vec()))
    }

    async fn describe_blueprint(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<DescriptiveBlueprint, RemoteError> {
        self.attempt(|| DescriptiveBlueprint {
            plating: format!("{subject}: {description}"),
            colors: "warm ochre".into(),
            textures: "glossy sauce over crisp edges".into(),
            garnish: "torn herbs".into(),
            lighting: "low side light".into(),
            composition: "three-quarter view".into(),
        })
    }

    async fn validate_credential(&self, _credential: &str) -> Result<(), RemoteError> {
        self.attempt(|| ())
    }
}

const PANTRY: [(&str, &str); 8] = [
    ("tomato", "produce"),
    ("onion", "produce"),
    ("garlic", "produce"),
    ("rice", "grain"),
    ("egg", "dairy"),
    ("spinach", "produce"),
    ("chickpea", "legume"),
    ("lemon", "produce"),
];

/// Local detector returning a seeded handful of pantry items
#[derive(Debug)]
pub struct PantryPerceiver {
    rng: Mutex<StdRng>,
}

impl PantryPerceiver {
    /// Create a detector seeded with `seed`
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl Perceiver for PantryPerceiver {
    async fn detect(&self, _capture: &Capture) -> Result<Vec<Ingredient>, RemoteError> {
        let mut rng = self.rng.lock();
        let count = rng.random_range(1..=4);
        let items = (0..count)
            .map(|_| {
                let (name, category) = PANTRY[rng.random_range(0..PANTRY.len())];
                Ingredient::new(name, rng.random_range(0.4..1.0))
                    .with_category(category)
                    .with_mass(rng.random_range(50.0..500.0))
            })
            .collect();
        Ok(items)
    }
}

/// Network that is always up with a fixed credential
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl NetworkProbe for AlwaysOnline {
    fn network_up(&self) -> Result<bool, ProbeError> {
        Ok(true)
    }
}

impl CredentialProvider for AlwaysOnline {
    fn credential(&self) -> Result<Option<String>, ProbeError> {
        Ok(Some("sim-key".to_string()))
    }
}
