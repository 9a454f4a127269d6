use crate::api::{CartItem, CartLine, CartView, CheckoutSummary};
use crate::catalog_lookup::BookCatalog;
use crate::service_error::ServiceError;

/// Tax in basis points of the subtotal, half up to the nearest minor unit.
/// None when the amount does not fit
pub fn tax_for(subtotal: i64, tax_rate_basis_points: u32) -> Option<i64> {
    Some(
        subtotal
            .checked_mul(tax_rate_basis_points as i64)?
            .checked_add(5_000)?
            .div_euclid(10_000),
    )
}

pub fn summarize(lines: &[CartLine], tax_rate_basis_points: u32) -> Option<CheckoutSummary> {
    let subtotal = lines
        .iter()
        .try_fold(0i64, |sum, line| sum.checked_add(line.line_total))?;
    let tax = tax_for(subtotal, tax_rate_basis_points)?;
    Some(CheckoutSummary {
        subtotal,
        tax,
        total: subtotal.checked_add(tax)?,
    })
}

fn amount_too_large() -> ServiceError {
    ServiceError::Invalid("Cart amount is too large".to_string())
}

/// Prices the cart with current catalog prices.
/// Books the catalog no longer sells end up in `unavailable` and are not charged
pub async fn price_cart(
    catalog: &dyn BookCatalog,
    items: Vec<CartItem>,
    tax_rate_basis_points: u32,
) -> Result<CartView, ServiceError> {
    let mut lines = vec![];
    let mut unavailable = vec![];
    for item in items {
        match catalog.find_book(item.book_id).await? {
            Some(entry) if entry.purchasable => {
                let line_total = entry
                    .price
                    .checked_mul(item.quantity as i64)
                    .ok_or_else(amount_too_large)?;
                lines.push(CartLine {
                    book_id: entry.book_id,
                    title: entry.title,
                    author_id: entry.author_id,
                    unit_price: entry.price,
                    quantity: item.quantity,
                    line_total,
                })
            }
            _ => unavailable.push(item.book_id),
        }
    }

    let summary = summarize(&lines, tax_rate_basis_points).ok_or_else(amount_too_large)?;
    Ok(CartView {
        lines,
        unavailable,
        summary,
    })
}
