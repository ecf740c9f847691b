use crate::error::{Error, Result};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::{fmt, str};

/// Most significant digits DynamoDB keeps for a number.
pub const MAX_SIGNIFICANT_DIGITS: usize = 38;

/// Smallest power of ten the leading digit of a non-zero number may have.
pub const MIN_EXPONENT: i64 = -130;

/// Largest power of ten the leading digit of a number may have.
pub const MAX_EXPONENT: i64 = 125;

/// Arbitrary-precision decimal number restricted to the range DynamoDB accepts.
///
/// DynamoDB transfers numbers as decimal text, so values never go through floating point.
/// Parsing rejects more than [`MAX_SIGNIFICANT_DIGITS`] significant digits and magnitudes
/// outside `1E-130` to `9.99…E+125`.
///
/// ```rust
/// use dynamodb_mapper::attribute::number::Number;
///
/// let number: Number = "12.50".parse().unwrap();
/// assert_eq!(number.to_string(), "12.5");
/// assert!(number > Number::from(12));
/// assert!("1e200".parse::<Number>().is_err());
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Number(BigDecimal);

impl Number {
    /// Whether the number is zero.
    pub fn is_zero(&self) -> bool {
        Zero::is_zero(&self.0)
    }

    /// Whether the number has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// The value as an `i64`, if it is an integer in range.
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        ToPrimitive::to_i64(&self.0)
    }

    /// Lossy conversion to `f64`.
    pub fn to_f64(&self) -> f64 {
        ToPrimitive::to_f64(&self.0).unwrap_or(f64::NAN)
    }

    /// The underlying decimal.
    pub fn as_decimal(&self) -> &BigDecimal {
        &self.0
    }
}

impl str::FromStr for Number {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = || Error::Serialization(format!("invalid number {text:?}"));
        let out_of_range = || {
            Error::Serialization(format!(
                "number {text:?} is outside the range DynamoDB can store"
            ))
        };
        let text = text.trim();
        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            Some(_) => (false, text),
            None => return Err(invalid()),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(position) => {
                let exponent = unsigned[position + 1..]
                    .parse::<i64>()
                    .map_err(|_| invalid())?;
                (&unsigned[..position], exponent)
            }
            None => (unsigned, 0),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let is_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !is_digits(integer) || !is_digits(fraction)
        {
            return Err(invalid());
        }
        let digits = format!("{integer}{fraction}");
        let significant = digits.trim_start_matches('0');
        if significant.is_empty() {
            return Ok(Self::default());
        }
        if significant.trim_end_matches('0').len() > MAX_SIGNIFICANT_DIGITS {
            return Err(Error::Serialization(format!(
                "number {text:?} has more than {MAX_SIGNIFICANT_DIGITS} significant digits"
            )));
        }
        // value = digits * 10^-scale
        let scale = i64::try_from(fraction.len())
            .ok()
            .and_then(|length| length.checked_sub(exponent))
            .ok_or_else(out_of_range)?;
        let leading = i64::try_from(significant.len() - 1)
            .ok()
            .and_then(|position| position.checked_sub(scale))
            .ok_or_else(out_of_range)?;
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&leading) {
            return Err(out_of_range());
        }
        let mut unscaled: BigInt = significant.parse().map_err(|_| invalid())?;
        if negative {
            unscaled = -unscaled;
        }
        Ok(Self(BigDecimal::new(unscaled, scale).normalized()))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_plain_string())
    }
}

macro_rules! impl_from_integer {
    ($($integer:ty),*) => {
        $(
            impl From<$integer> for Number {
                fn from(value: $integer) -> Self {
                    Self(BigDecimal::new(BigInt::from(value), 0).normalized())
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl TryFrom<BigDecimal> for Number {
    type Error = Error;

    fn try_from(value: BigDecimal) -> Result<Self> {
        value.to_string().parse()
    }
}

impl TryFrom<f64> for Number {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::Serialization(format!(
                "{value} cannot be stored as a number"
            )));
        }
        value.to_string().parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::cmp;

    #[rstest]
    #[case::integer("42", "42")]
    #[case::negative("-7", "-7")]
    #[case::explicit_sign("+3", "3")]
    #[case::trailing_zeros("12.500", "12.5")]
    #[case::leading_zeros("007.25", "7.25")]
    #[case::zero("-0.000", "0")]
    #[case::small_fraction(".05", "0.05")]
    #[case::exponent("1.5e3", "1500")]
    #[case::negative_exponent("25E-4", "0.0025")]
    #[case::positive_exponent_sign("2E+2", "200")]
    #[case::high_precision(
        "3.14159265358979323846264338327950288",
        "3.14159265358979323846264338327950288"
    )]
    #[case::zero_with_huge_exponent("0e9223372036854775807", "0")]
    fn test_number_display(#[case] text: &str, #[case] expected: &str) {
        let number: Number = text.parse().unwrap();
        assert_eq!(number.to_string(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::sign_only("-")]
    #[case::letters("12a")]
    #[case::double_point("1.2.3")]
    #[case::bad_exponent("1e")]
    #[case::not_a_number("NaN")]
    fn test_number_invalid(#[case] text: &str) {
        assert!(matches!(text.parse::<Number>(), Err(Error::Serialization(_))));
    }

    #[rstest]
    #[case::smallest("1e-130", true)]
    #[case::below_smallest("9.9e-131", false)]
    #[case::largest("9.9999999999999999999999999999999999999e125", true)]
    #[case::above_largest("1e126", false)]
    #[case::huge_exponent("1e50000000", false)]
    #[case::exponent_overflow("10e9223372036854775807", false)]
    #[case::exponent_underflow("1.5e-9223372036854775808", false)]
    #[case::max_digits("12345678901234567890123456789012345678", true)]
    #[case::too_many_digits("123456789012345678901234567890123456789", false)]
    #[case::trailing_zeros_are_not_significant("1234567890123456789012345678901234567800000", true)]
    fn test_number_range(#[case] text: &str, #[case] accepted: bool) {
        assert_eq!(text.parse::<Number>().is_ok(), accepted);
    }

    #[rstest]
    #[case::integers("1", "2", cmp::Ordering::Less)]
    #[case::magnitude("10", "9.99", cmp::Ordering::Greater)]
    #[case::fraction("0.125", "0.13", cmp::Ordering::Less)]
    #[case::negative("-10", "-9", cmp::Ordering::Less)]
    #[case::sign("-0.5", "0", cmp::Ordering::Less)]
    #[case::equal("1.50", "1.5", cmp::Ordering::Equal)]
    fn test_number_ordering(#[case] left: &str, #[case] right: &str, #[case] expected: cmp::Ordering) {
        let left: Number = left.parse().unwrap();
        let right: Number = right.parse().unwrap();
        assert_eq!(left.cmp(&right), expected);
    }

    #[test]
    fn test_number_integer_conversions() {
        assert_eq!(Number::from(-120_i64).to_string(), "-120");
        assert_eq!(Number::from(i64::MIN).to_i64(), Some(i64::MIN));
        assert_eq!(Number::from(5_u8).to_i64(), Some(5));
        assert_eq!("2.5".parse::<Number>().unwrap().to_i64(), None);
        assert_eq!(Number::try_from(0.1).unwrap().to_string(), "0.1");
        assert!(Number::try_from(f64::NAN).is_err());
        assert!(Number::try_from(1e300).is_err());
    }

    #[test]
    fn test_number_from_decimal() {
        let decimal: BigDecimal = "1.250".parse().unwrap();
        let number = Number::try_from(decimal).unwrap();
        assert_eq!(number, "1.25".parse().unwrap());
        assert_eq!(number.as_decimal().to_string(), "1.25");
    }
}
