use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::assistant::{DynCompletionClient, GenError};
use crate::settings::PricingSettings;

#[derive(Error, Debug, PartialEq)]
pub enum PricingError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Exchange rate for {currency} must be positive, got {rate}")]
    InvalidRate { currency: String, rate: f64 },

    #[error("Amount must be a finite, non-negative number")]
    InvalidAmount,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub converted: f64,
    /// Plausibility note from the LLM, absent when it is unavailable.
    pub verdict: Option<String>,
}

fn rate_for(currency: &str, pricing: &PricingSettings) -> Result<f64, PricingError> {
    if currency.eq_ignore_ascii_case(&pricing.base_currency) {
        return Ok(1.0);
    }

    let rate = pricing
        .exchange_rates
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(currency))
        .map(|(_, rate)| *rate)
        .ok_or_else(|| PricingError::UnknownCurrency(currency.to_uppercase()))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(PricingError::InvalidRate {
            currency: currency.to_uppercase(),
            rate,
        });
    }
    Ok(rate)
}

/// Converts through the base currency and rounds to cents.
pub fn convert(
    amount: f64,
    from: &str,
    to: &str,
    pricing: &PricingSettings,
) -> Result<f64, PricingError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(PricingError::InvalidAmount);
    }

    let from_rate = rate_for(from.trim(), pricing)?;
    let to_rate = rate_for(to.trim(), pricing)?;
    let converted = amount / from_rate * to_rate;

    Ok((converted * 100.0).round() / 100.0)
}

pub struct PriceConverter {
    client: DynCompletionClient,
}

impl PriceConverter {
    pub fn new(client: DynCompletionClient) -> Self {
        Self { client }
    }

    pub async fn convert_and_verify(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        pricing: &PricingSettings,
    ) -> Result<Conversion, PricingError> {
        let converted = convert(amount, from, to, pricing)?;
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();

        let prompt = format!(
            "{:.2} {} was converted to {:.2} {}. Is this plausible given typical exchange rates? \
             Answer in one sentence starting with \"Plausible\" or \"Suspicious\".",
            amount, from, converted, to
        );
        let verdict = match self
            .client
            .complete("You sanity-check currency conversions for a price list.", &prompt)
            .await
        {
            Ok(text) => Some(text),
            Err(GenError::NotConfigured) => {
                debug!("LLM not configured, skipping conversion check");
                None
            }
            Err(e) => {
                warn!("Conversion check failed: {}", e);
                None
            }
        };

        Ok(Conversion {
            amount,
            from,
            to,
            converted,
            verdict,
        })
    }
}
