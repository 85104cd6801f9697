//! Energy pattern models.
//!
//! The scheduler wants a productivity score per time-of-day window. How that
//! score is derived is pluggable: the default learns from completion
//! history, with a uniform fallback for cold accounts and tests.

use chrono::Timelike;

use crate::task::{CompletionSample, EnergyWindow, Task};

/// Neutral score used when no observations exist for a window.
pub const COLD_START_SCORE: f64 = 0.5;

/// Observed productivity per time-of-day window, 0.0 to 1.0.
pub trait EnergyModel {
    fn score(&self, window: EnergyWindow) -> f64;
}

/// Uniform model: every window scores the cold-start value.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEnergy;

impl EnergyModel for UniformEnergy {
    fn score(&self, _window: EnergyWindow) -> f64 {
        COLD_START_SCORE
    }
}

/// Model derived from task completion history.
///
/// Each completion sample with a reported productivity (1-5) contributes to
/// the window its actual start falls in; the window score is the mean,
/// normalized to 0..1. Windows without samples fall back to the cold-start
/// score.
#[derive(Debug, Clone)]
pub struct CompletionHistoryModel {
    scores: [(f64, u64); 3], // (sum, count) per window ordinal
}

impl CompletionHistoryModel {
    /// Build from every completion sample across the user's tasks.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let samples = tasks.iter().flat_map(|t| t.completion_history.iter());
        Self::from_samples(samples)
    }

    /// Build from an explicit sample iterator.
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a CompletionSample>,
    {
        let mut scores = [(0.0, 0u64); 3];
        for sample in samples {
            let Some(productivity) = sample.productivity else {
                continue;
            };
            let productivity = productivity.clamp(1, 5);
            let window = EnergyWindow::from_hour(sample.actual_start.time().hour());
            let slot = &mut scores[Self::index(window)];
            // 1-5 maps onto 0..1
            slot.0 += (productivity - 1) as f64 / 4.0;
            slot.1 += 1;
        }
        Self { scores }
    }

    fn index(window: EnergyWindow) -> usize {
        match window {
            EnergyWindow::Morning => 0,
            EnergyWindow::Afternoon => 1,
            EnergyWindow::Evening => 2,
        }
    }

    /// Number of samples observed for a window.
    pub fn sample_count(&self, window: EnergyWindow) -> u64 {
        self.scores[Self::index(window)].1
    }
}

impl EnergyModel for CompletionHistoryModel {
    fn score(&self, window: EnergyWindow) -> f64 {
        let (sum, count) = self.scores[Self::index(window)];
        if count == 0 {
            COLD_START_SCORE
        } else {
            sum / count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use chrono::{DateTime, TimeZone, Utc};

    fn sample(hour: u32, productivity: u8) -> CompletionSample {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 5, 5, hour, 0, 0).unwrap();
        CompletionSample {
            scheduled_start: None,
            scheduled_end: None,
            actual_start: start,
            actual_end: start + chrono::Duration::minutes(30),
            energy_reported: None,
            productivity: Some(productivity),
        }
    }

    #[test]
    fn uniform_model_scores_everything_the_same() {
        let model = UniformEnergy;
        assert_eq!(model.score(EnergyWindow::Morning), COLD_START_SCORE);
        assert_eq!(model.score(EnergyWindow::Evening), COLD_START_SCORE);
    }

    #[test]
    fn history_model_averages_per_window() {
        let samples = vec![sample(9, 5), sample(10, 3), sample(20, 1)];
        let model = CompletionHistoryModel::from_samples(&samples);
        // (1.0 + 0.5) / 2
        assert!((model.score(EnergyWindow::Morning) - 0.75).abs() < 1e-9);
        assert_eq!(model.score(EnergyWindow::Evening), 0.0);
        assert_eq!(model.score(EnergyWindow::Afternoon), COLD_START_SCORE);
        assert_eq!(model.sample_count(EnergyWindow::Morning), 2);
    }

    #[test]
    fn samples_without_productivity_are_skipped() {
        let mut s = sample(9, 5);
        s.productivity = None;
        let model = CompletionHistoryModel::from_samples(&[s]);
        assert_eq!(model.sample_count(EnergyWindow::Morning), 0);
        assert_eq!(model.score(EnergyWindow::Morning), COLD_START_SCORE);
    }

    #[test]
    fn from_tasks_collects_across_tasks() {
        let mut a = Task::new("u1", "A", TaskKind::Flexible, 30);
        a.completion_history.push(sample(8, 4));
        let mut b = Task::new("u1", "B", TaskKind::Flexible, 30);
        b.completion_history.push(sample(14, 2));
        let model = CompletionHistoryModel::from_tasks(&[a, b]);
        assert_eq!(model.sample_count(EnergyWindow::Morning), 1);
        assert_eq!(model.sample_count(EnergyWindow::Afternoon), 1);
    }
}
