//! Fixed price list per cylinder spec.

use gasline_core::{DomainError, Money};
use gasline_inventory::CylinderSpec;

/// Largest number of cylinders a single order may request.
pub const MAX_QUANTITY: u32 = 20;

pub fn unit_price(spec: CylinderSpec) -> Money {
    match spec {
        CylinderSpec::Kg5 => Money::from_yuan(50),
        CylinderSpec::Kg15 => Money::from_yuan(120),
        CylinderSpec::Kg50 => Money::from_yuan(350),
    }
}

pub fn order_total(unit_price: Money, quantity: u32) -> Result<Money, DomainError> {
    unit_price.checked_mul(quantity)
}
