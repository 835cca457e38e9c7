use std::fmt;

/// Monetary amount with 2 decimal places, stored as a scaled integer (minor units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 100;

    pub const ZERO: Amount = Amount(0);

    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_minor(value: i64) -> Self {
        Amount(value)
    }

    pub fn from_major(value: i64) -> Self {
        Amount(value * Self::SCALE)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:02}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_float_converts_correctly() {
        assert_eq!(Amount::from_float(100.0), Amount::from_minor(10_000));
        assert_eq!(Amount::from_float(1.5), Amount::from_minor(150));
        assert_eq!(Amount::from_float(0.01), Amount::from_minor(1));
    }

    #[test]
    fn from_float_rounds_to_cents() {
        assert_eq!(Amount::from_float(1.234), Amount::from_minor(123));
        assert_eq!(Amount::from_float(1.236), Amount::from_minor(124));
        assert_eq!(Amount::from_float(19.99), Amount::from_minor(1999));
    }

    #[test]
    fn from_major_scales() {
        assert_eq!(Amount::from_major(25), Amount::from_minor(2_500));
    }

    #[test]
    fn display_formats_positive() {
        assert_eq!(Amount::from_minor(10_000).to_string(), "100.00");
        assert_eq!(Amount::from_minor(150).to_string(), "1.50");
        assert_eq!(Amount::from_minor(1).to_string(), "0.01");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::from_minor(-5_025).to_string(), "-50.25");
        assert_eq!(Amount::from_minor(-1).to_string(), "-0.01");
    }

    #[test]
    fn arithmetic() {
        let mut a = Amount::from_major(10);
        a += Amount::from_major(5);
        assert_eq!(a, Amount::from_major(15));
        a -= Amount::from_major(3);
        assert_eq!(a, Amount::from_major(12));
        assert_eq!(a - Amount::from_major(2), Amount::from_major(10));
        assert_eq!(-a, Amount::from_major(-12));
    }

    #[test]
    fn sum_of_amounts() {
        let total: Amount = [1, 2, 3].into_iter().map(Amount::from_major).sum();
        assert_eq!(total, Amount::from_major(6));
    }

    #[test]
    fn is_positive() {
        assert!(Amount::from_minor(1).is_positive());
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::from_minor(-1).is_positive());
    }
}
