//! Per-token pricing for known OpenAI models, in USD.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// `(input, output)` cost per token. Unknown models cost zero.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    // Longest prefix first so "gpt-4o-mini" doesn't match "gpt-4o".
    let per_million = match model {
        m if m.starts_with("gpt-4o-mini") => (dec!(0.15), dec!(0.60)),
        m if m.starts_with("gpt-4o") => (dec!(2.50), dec!(10.00)),
        m if m.starts_with("gpt-4.1-nano") => (dec!(0.10), dec!(0.40)),
        m if m.starts_with("gpt-4.1-mini") => (dec!(0.40), dec!(1.60)),
        m if m.starts_with("gpt-4.1") => (dec!(2.00), dec!(8.00)),
        m if m.starts_with("gpt-4-turbo") => (dec!(10.00), dec!(30.00)),
        m if m.starts_with("gpt-3.5-turbo") => (dec!(0.50), dec!(1.50)),
        _ => return (Decimal::ZERO, Decimal::ZERO),
    };
    let million = dec!(1_000_000);
    (per_million.0 / million, per_million.1 / million)
}

/// Total cost of a call given its token counts.
pub fn call_cost(per_token: (Decimal, Decimal), input_tokens: u32, output_tokens: u32) -> Decimal {
    per_token.0 * Decimal::from(input_tokens) + per_token.1 * Decimal::from(output_tokens)
}
