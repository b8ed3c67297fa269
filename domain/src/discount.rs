//! Price/discount reconciliation.

use crate::numerals::parse_localized_number;
use crate::CoreError;

/// Largest accepted gap between a stored percentage and the one implied by
/// the discount price, in percentage points.
pub const PERCENTAGE_TOLERANCE: f64 = 0.1;

/// Outcome of reconciling the discount fields of a course.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Discount {
    None,
    Applied { price: f64, percentage: f64 },
}

/// Percentage implied by a discount price.
pub fn implied_percentage(price: f64, discount_price: f64) -> f64 {
    (price - discount_price) / price * 100.0
}

fn check_price(price: f64) -> Result<(), CoreError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(CoreError::invalid("price", "must be a number greater than zero"));
    }
    Ok(())
}

fn check_percentage(pct: f64) -> Result<(), CoreError> {
    if !pct.is_finite() || pct <= 0.0 || pct >= 100.0 {
        return Err(CoreError::invalid(
            "discountPercentage",
            format!("{pct} is outside (0, 100)"),
        ));
    }
    Ok(())
}

fn check_discount_price(price: f64, discount_price: f64) -> Result<(), CoreError> {
    if !discount_price.is_finite() || discount_price < 0.0 {
        return Err(CoreError::invalid("discountPrice", "must be a non-negative number"));
    }
    if discount_price >= price {
        return Err(CoreError::invalid("discountPrice", "must be lower than the price"));
    }
    Ok(())
}

fn check_agreement(price: f64, discount_price: f64, pct: f64) -> Result<(), CoreError> {
    let computed = implied_percentage(price, discount_price);
    if (computed - pct).abs() > PERCENTAGE_TOLERANCE {
        return Err(CoreError::Inconsistent(format!(
            "discount percentage {pct} does not match discount price (implies {computed:.2})"
        )));
    }
    Ok(())
}

/// Fill in whichever discount field is missing and check the pair.
///
/// A derived price is rounded to an integer. A derived percentage is rounded
/// to the nearest integer when that stays within tolerance, otherwise to one
/// decimal place.
pub fn reconcile_discount(
    price: f64,
    discount_price: Option<f64>,
    discount_percentage: Option<f64>,
) -> Result<Discount, CoreError> {
    check_price(price)?;
    match (discount_price, discount_percentage) {
        (None, None) => Ok(Discount::None),
        (None, Some(pct)) => {
            check_percentage(pct)?;
            let derived = (price * (1.0 - pct / 100.0)).round();
            check_discount_price(price, derived)?;
            Ok(Discount::Applied {
                price: derived,
                percentage: pct,
            })
        }
        (Some(dp), None) => {
            check_discount_price(price, dp)?;
            let exact = implied_percentage(price, dp);
            let mut pct = exact.round();
            if (pct - exact).abs() > PERCENTAGE_TOLERANCE {
                pct = (exact * 10.0).round() / 10.0;
            }
            check_percentage(pct)?;
            Ok(Discount::Applied {
                price: dp,
                percentage: pct,
            })
        }
        (Some(dp), Some(pct)) => {
            check_discount_price(price, dp)?;
            check_percentage(pct)?;
            check_agreement(price, dp, pct)?;
            Ok(Discount::Applied {
                price: dp,
                percentage: pct,
            })
        }
    }
}

/// Check the stored discount fields of a course: both present or both
/// absent, in range, and in agreement with each other.
pub fn check_discount_fields(
    price: &str,
    discount_price: Option<&str>,
    discount_percentage: Option<f64>,
) -> Result<(), CoreError> {
    let price = parse_localized_number(price)
        .ok_or_else(|| CoreError::invalid("price", "not a number"))?;
    check_price(price)?;
    match (discount_price, discount_percentage) {
        (None, None) => Ok(()),
        (Some(_), None) | (None, Some(_)) => Err(CoreError::Inconsistent(
            "discountPrice and discountPercentage must be set together".into(),
        )),
        (Some(dp), Some(pct)) => {
            let dp = parse_localized_number(dp)
                .ok_or_else(|| CoreError::invalid("discountPrice", "not a number"))?;
            check_discount_price(price, dp)?;
            check_percentage(pct)?;
            check_agreement(price, dp, pct)
        }
    }
}
