use std::collections::BTreeSet;

pub const MIN_OVERSAMPLING: u32 = 2;

/// Sampling interval shared by all stages, derived from the Nyquist timestep
/// count of the excitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessInterval {
    nyquist_steps: u64,
    oversampling: u32,
    steps: u64,
}

impl ProcessInterval {
    /// Oversampling below 2 is raised to 2; the interval never drops below one step.
    pub fn from_nyquist(nyquist_steps: u64, oversampling: u32) -> Self {
        let oversampling = oversampling.max(MIN_OVERSAMPLING);
        let steps = (nyquist_steps / u64::from(oversampling)).max(1);
        Self {
            nyquist_steps,
            oversampling,
            steps,
        }
    }

    pub const fn steps(self) -> u64 {
        self.steps
    }

    pub const fn oversampling(self) -> u32 {
        self.oversampling
    }

    pub const fn nyquist_steps(self) -> u64 {
        self.nyquist_steps
    }
}

/// When a single stage runs: every `interval` timesteps plus any explicitly
/// requested timesteps. An interval of zero leaves only the explicit steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageSchedule {
    interval: u64,
    explicit_steps: BTreeSet<u64>,
}

impl StageSchedule {
    pub fn every(interval: u64) -> Self {
        Self {
            interval,
            explicit_steps: BTreeSet::new(),
        }
    }

    pub fn from_interval(interval: ProcessInterval) -> Self {
        Self::every(interval.steps())
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = u64>) -> Self {
        self.explicit_steps.extend(steps);
        self
    }

    pub fn add_step(&mut self, timestep: u64) {
        self.explicit_steps.insert(timestep);
    }

    pub const fn interval(&self) -> u64 {
        self.interval
    }

    pub fn explicit_steps(&self) -> impl Iterator<Item = u64> + '_ {
        self.explicit_steps.iter().copied()
    }

    pub fn is_eligible(&self, timestep: u64) -> bool {
        if self.explicit_steps.contains(&timestep) {
            return true;
        }
        self.interval != 0 && timestep % self.interval == 0
    }

    /// Timesteps from `timestep` until the next eligible one, or `None` when
    /// nothing further is scheduled.
    pub fn next_interval(&self, timestep: u64) -> Option<u64> {
        let periodic = (self.interval != 0).then(|| self.interval - timestep % self.interval);
        let explicit = self
            .explicit_steps
            .range(timestep + 1..)
            .next()
            .map(|step| step - timestep);

        match (periodic, explicit) {
            (Some(periodic), Some(explicit)) => Some(periodic.min(explicit)),
            (periodic, explicit) => periodic.or(explicit),
        }
    }
}
