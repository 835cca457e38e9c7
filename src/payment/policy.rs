//! Extra declines injected after the card checks pass.

use crate::Amount;
use crate::model::{DeclineReason, PaymentCard};

/// Decides whether an otherwise eligible charge is declined anyway.
pub trait DeclinePolicy: Send + Sync {
    fn decline(&self, card: &PaymentCard, amount: Amount) -> Option<DeclineReason>;
}

/// Default policy: outcomes depend only on card state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDecline;

impl DeclinePolicy for NeverDecline {
    fn decline(&self, _card: &PaymentCard, _amount: Amount) -> Option<DeclineReason> {
        None
    }
}

/// Declines a random share of eligible charges with `processing_error`,
/// the way a flaky processor would in a demo.
#[cfg(feature = "chaos")]
#[derive(Debug, Clone, Copy)]
pub struct RandomDecline {
    rate: f64,
}

#[cfg(feature = "chaos")]
impl RandomDecline {
    /// `rate` is clamped to `0.0..=1.0`.
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(feature = "chaos")]
impl DeclinePolicy for RandomDecline {
    fn decline(&self, _card: &PaymentCard, _amount: Amount) -> Option<DeclineReason> {
        use rand::Rng;

        rand::thread_rng()
            .gen_bool(self.rate)
            .then_some(DeclineReason::ProcessingError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> PaymentCard {
        PaymentCard::new(1, "4242424242424242", "Ada", (12, 2030), "123", Amount::ZERO)
    }

    #[test]
    fn never_decline_passes_everything() {
        assert_eq!(NeverDecline.decline(&card(), Amount::from_major(1)), None);
    }

    #[cfg(feature = "chaos")]
    #[test]
    fn random_decline_extremes_are_deterministic() {
        let always = RandomDecline::new(1.0);
        let never = RandomDecline::new(0.0);
        for _ in 0..50 {
            assert_eq!(
                always.decline(&card(), Amount::from_major(1)),
                Some(DeclineReason::ProcessingError)
            );
            assert_eq!(never.decline(&card(), Amount::from_major(1)), None);
        }
    }

    #[cfg(feature = "chaos")]
    #[test]
    fn random_decline_clamps_rate() {
        assert_eq!(RandomDecline::new(3.0).rate(), 1.0);
        assert_eq!(RandomDecline::new(-1.0).rate(), 0.0);
        assert_eq!(RandomDecline::new(f64::NAN).rate(), 0.0);
    }
}
