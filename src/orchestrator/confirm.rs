//! Go/no-go decision before workers start

use super::estimate::RunEstimate;

/// Decides whether a run may start once its estimate is known
pub trait Confirmation: Send + Sync {
    fn confirm(&self, estimate: &RunEstimate) -> bool;
}

/// Always proceeds (unattended runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl Confirmation for AutoConfirm {
    fn confirm(&self, _estimate: &RunEstimate) -> bool {
        true
    }
}

impl<F> Confirmation for F
where
    F: Fn(&RunEstimate) -> bool + Send + Sync,
{
    fn confirm(&self, estimate: &RunEstimate) -> bool {
        self(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_confirmation() {
        let estimate = RunEstimate::compute(100, 4, 5.0);
        let small_only = |e: &RunEstimate| e.remaining < 50;

        assert!(!small_only.confirm(&estimate));
        assert!(AutoConfirm.confirm(&estimate));
    }
}
