//! HTTP clients for the payment providers' read APIs.

mod card_billing_client;
mod checkout_client;

pub use card_billing_client::CardBillingClient;
pub use checkout_client::CheckoutClient;

use crate::ports::ProviderReadError;

/// Maps a non-success HTTP status to a read error.
fn status_error(status: reqwest::StatusCode, body: String) -> ProviderReadError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ProviderReadError::Unauthorized
        }
        _ => ProviderReadError::Unavailable(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}
