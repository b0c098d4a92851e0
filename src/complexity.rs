/// Data and time complexity of a PNB-based differential-linear key recovery.
///
/// N is the number of samples needed to tell the right key guess from wrong
/// ones, given the forward bias `epsilon_d`, the backward bias `epsilon_a` and
/// the confidence parameter `alpha`:
///
/// ```text
/// N = ((sqrt(alpha * ln 4) + 3 * sqrt(1 - (ed^4 ea^4) / (ed^2 ea^2))) / sqrt(ed^2 ea^2))^2
/// ```
///
/// C is the total work for `m = 256 - PNB` guessed key bits:
///
/// ```text
/// C = 2^m * N + 2^(256 - alpha) + 2^PNB
/// ```
use crate::constants;
use crate::error::{Error, Result};
use crate::params::ComplexityParams;

use log::debug;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};

/// Evaluated complexity figures.
#[derive(Clone, Debug, PartialEq)]
pub struct Complexity {
    pub params: ComplexityParams,
    pub m: u32,
    pub n: f64,
    pub n_log2: f64,
    pub c_exact: BigRational,
    pub c: f64,
    pub c_log2: f64,
}

impl Complexity {
    /// Evaluates N and C for a set of parameters.
    pub fn evaluate(params: &ComplexityParams) -> Result<Complexity> {
        let m = constants::KEY_BITS.checked_sub(params.pnb).ok_or_else(|| {
            Error::Domain(format!(
                "PNB count {} exceeds the {}-bit key",
                params.pnb,
                constants::KEY_BITS
            ))
        })?;

        let alpha_exp = constants::KEY_BITS.checked_sub(params.alpha).ok_or_else(|| {
            Error::Domain(format!(
                "alpha {} exceeds the {}-bit key",
                params.alpha,
                constants::KEY_BITS
            ))
        })?;

        let n = samples(params.epsilon_d, params.epsilon_a, params.alpha)?;

        let n_exact = BigRational::from_float(n)
            .ok_or_else(|| Error::Diverged(format!("N = {:e} has no exact value", n)))?;

        let c_exact = pow2(m) * n_exact + pow2(alpha_exp) + pow2(params.pnb);
        let c = ratio_to_f64(&c_exact)?;

        debug!(
            "m = {}, N = {:e}, 2^m * N = {:e}, C = {:e}",
            m,
            n,
            2f64.powi(m as i32) * n,
            c
        );

        Ok(Complexity {
            params: params.clone(),
            m,
            n,
            n_log2: n.log2(),
            c_exact,
            c,
            c_log2: c.log2(),
        })
    }

    /// Evaluates C entirely in double precision.
    pub fn c_double(&self) -> f64 {
        2f64.powi(self.m as i32) * self.n
            + 2f64.powi((constants::KEY_BITS - self.params.alpha) as i32)
            + 2f64.powi(self.params.pnb as i32)
    }

    /// Formats the exact value of C as an integer or a reduced fraction.
    pub fn c_exact_string(&self) -> String {
        if self.c_exact.denom().is_one() {
            self.c_exact.numer().to_string()
        } else {
            format!("{}/{}", self.c_exact.numer(), self.c_exact.denom())
        }
    }
}

/// Computes N. Fails instead of returning NaN or infinity.
pub fn samples(epsilon_d: f64, epsilon_a: f64, alpha: u32) -> Result<f64> {
    let square = epsilon_d.powi(2) * epsilon_a.powi(2);
    let denominator = square.sqrt();

    if !(denominator > 0.0) || !denominator.is_finite() {
        return Err(Error::Diverged(format!(
            "epsilon_d = {:e}, epsilon_a = {:e} gives denominator {:e}",
            epsilon_d, epsilon_a, denominator
        )));
    }

    let radicand = 1.0 - (epsilon_d.powi(4) * epsilon_a.powi(4)) / square;

    if !(radicand >= 0.0) {
        return Err(Error::Domain(format!(
            "negative radicand {:e} for epsilon_d = {:e}, epsilon_a = {:e}",
            radicand, epsilon_d, epsilon_a
        )));
    }

    let numerator = (alpha as f64 * 4f64.ln()).sqrt() + 3.0 * radicand.sqrt();
    let n = (numerator / denominator).powi(2);

    if !n.is_finite() {
        return Err(Error::Diverged(format!(
            "N is not finite for epsilon_d = {:e}, epsilon_a = {:e}",
            epsilon_d, epsilon_a
        )));
    }

    Ok(n)
}

fn pow2(k: u32) -> BigRational {
    BigRational::from_integer(BigInt::one() << k as usize)
}

/// Rounds a rational with a power-of-two denominator to the nearest f64.
fn ratio_to_f64(r: &BigRational) -> Result<f64> {
    let numer = r.numer().to_f64();
    let denom = r.denom().to_f64();

    match (numer, denom) {
        (Some(n), Some(d)) if n.is_finite() && d.is_finite() && d > 0.0 => Ok(n / d),
        _ => Err(Error::Precision(format!(
            "C has {} bits and does not fit a double",
            r.numer().bits()
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn default_complexity() -> Complexity {
        Complexity::evaluate(&ComplexityParams::default()).expect("evaluate failed")
    }

    fn rel_diff(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    /// Tests N for the embedded parameters.
    #[test]
    fn n_reference_value() {
        let c = default_complexity();

        assert_eq!(c.m, 119);
        assert!(rel_diff(c.n, 8699448571.528343) < 1e-10);
    }

    /// Tests log2(N) agrees with ln(N) / ln(2).
    #[test]
    fn n_log2_matches_ln() {
        let c = default_complexity();

        assert!(rel_diff(c.n_log2, c.n.ln() / 2f64.ln()) < 1e-9);
        assert!((c.n_log2 - 33.0182768103115).abs() < 1e-9);
    }

    /// Tests C is exactly 2^119 N + 2^156 + 2^137.
    #[test]
    fn c_exact_value() {
        let c = default_complexity();
        let n = BigRational::from_float(c.n).unwrap();
        let expected = pow2(119) * n + pow2(156) + pow2(137);

        assert_eq!(c.c_exact, expected);
    }

    /// Tests the exact C agrees with a double precision evaluation.
    #[test]
    fn c_matches_double() {
        let c = default_complexity();

        assert!(rel_diff(c.c, c.c_double()) < 1e-6);
        assert!(rel_diff(c.c, 9.712580185233659e46) < 1e-10);
        assert!((c.c_log2 - 156.08854696900687).abs() < 1e-9);
    }

    /// Tests the exact C is printed as an integer for the embedded parameters.
    #[test]
    fn c_exact_is_integer() {
        let c = default_complexity();
        let text = c.c_exact_string();

        assert!(!text.contains('/'));
        assert_eq!(text.len(), 47);
    }

    /// Tests evaluation is a pure function.
    #[test]
    fn evaluate_idempotent() {
        assert_eq!(default_complexity(), default_complexity());
    }

    /// Tests N strictly increases with alpha.
    #[test]
    fn n_monotonic_in_alpha() {
        let mut last = 0.0;

        for alpha in (0..=256).step_by(8) {
            let n = samples(0.000792, 0.2, alpha).expect("samples failed");
            assert!(n > last);
            last = n;
        }
    }

    /// Tests vanishing epsilons produce an error instead of a panic.
    #[test]
    fn n_diverges_at_zero_epsilon() {
        assert!(matches!(samples(0.0, 0.2, 100), Err(Error::Diverged(_))));
        assert!(matches!(samples(0.000792, 0.0, 100), Err(Error::Diverged(_))));
        assert!(matches!(samples(1e-200, 1e-200, 100), Err(Error::Diverged(_))));
    }

    /// Tests a product of epsilons above one is a domain error.
    #[test]
    fn n_negative_radicand() {
        assert!(matches!(samples(2.0, 1.0, 100), Err(Error::Domain(_))));
    }

    /// Tests a C beyond the double range is a precision error.
    #[test]
    fn evaluate_c_overflows_double() {
        let mut p = ComplexityParams::default();
        p.epsilon_d = 1e-149;
        p.epsilon_a = 1.0;

        assert!(matches!(Complexity::evaluate(&p), Err(Error::Precision(_))));
    }

    /// Tests error messages keep tiny epsilons in exponent notation.
    #[test]
    fn error_messages_use_exponents() {
        let msg = samples(1e-300, 1.0, 100).unwrap_err().to_string();

        assert!(msg.contains("1e-300"), "{}", msg);
        assert!(msg.len() < 120, "{}", msg);

        let msg = samples(2.0, 1.0, 100).unwrap_err().to_string();
        assert!(msg.contains("-3e0"), "{}", msg);
    }

    /// Tests bit widths above the key size are rejected.
    #[test]
    fn evaluate_rejects_wide_parameters() {
        let mut p = ComplexityParams::default();
        p.pnb = 257;
        assert!(matches!(Complexity::evaluate(&p), Err(Error::Domain(_))));

        let mut p = ComplexityParams::default();
        p.alpha = 300;
        assert!(matches!(Complexity::evaluate(&p), Err(Error::Domain(_))));
    }

    /// Tests the extremes of the PNB count still fit a double.
    #[test]
    fn evaluate_pnb_extremes() {
        for pnb in &[0, 256] {
            let mut p = ComplexityParams::default();
            p.pnb = *pnb;

            let c = Complexity::evaluate(&p).expect("evaluate failed");
            assert!(c.c.is_finite());
            assert!(rel_diff(c.c, c.c_double()) < 1e-6);
        }
    }
}
