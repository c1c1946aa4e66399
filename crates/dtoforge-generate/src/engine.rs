use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use dtoforge_core::Record;

use crate::errors::GenerationError;
use crate::model::{GenerateOptions, GenerationReport};
use crate::session::BuildSession;

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub instances: Vec<Record>,
    pub report: GenerationReport,
}

/// Entry point for generating a batch of instances of one root type.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Compile `root_type` once and generate `count` instances. Each
    /// instance draws from its own RNG derived from the run seed, so a
    /// fixed seed reproduces the batch exactly.
    pub fn run(
        &self,
        session: &mut BuildSession,
        root_type: &str,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let seed = self.options.seed.unwrap_or_else(|| rand::rng().random());

        session.set_options(self.options.clone());
        let (composition, composition_report) = session.compile_with_report(root_type)?;
        let mut report = GenerationReport::new(run_id, root_type, seed, composition_report);
        report.instances_requested = self.options.count as u64;

        info!(
            root_type,
            seed,
            count = self.options.count,
            "generating instances"
        );

        let mut instances = Vec::with_capacity(self.options.count);
        for index in 0..self.options.count {
            let instance_seed = hash_seed(seed, &format!("{root_type}#{index}"));
            let mut rng = ChaCha8Rng::seed_from_u64(instance_seed);
            match composition.generate(&mut rng) {
                Ok(record) => instances.push(record),
                Err(GenerationError::Failed(failure)) if self.options.collect_field_errors => {
                    warn!(
                        root_type,
                        index,
                        failures = failure.failures.len(),
                        "instance skipped after field failures"
                    );
                    report.failures.extend(failure.failures);
                }
                Err(err) => return Err(err),
            }
        }

        report.instances_generated = instances.len() as u64;
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            root_type,
            generated = report.instances_generated,
            duration_ms = report.duration_ms,
            "generation finished"
        );
        Ok(GenerationResult { instances, report })
    }
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
