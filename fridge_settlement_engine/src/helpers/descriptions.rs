//! Human-readable descriptions stored on orders and ledger rows, and sent to the payment gateway.

/// Descriptions are stored in, and sent to the gateway as, 255-character fields.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Prepended to the description of a reversed deposit. The row's status is authoritative; this is for display.
pub const REVERSED_MARKER: &str = "[REEMBOLSADO] ";

/// Joins `(quantity, name)` pairs into `1x Water, 2x Soda`.
pub fn item_summary<'a, I>(items: I) -> String
where I: IntoIterator<Item = (i64, &'a str)> {
    items.into_iter().map(|(qty, name)| format!("{qty}x {name}")).collect::<Vec<_>>().join(", ")
}

/// Truncates `s` to [`MAX_DESCRIPTION_LEN`] characters, ending with `...` when anything was cut.
pub fn cap_description(s: &str) -> String {
    if s.chars().count() <= MAX_DESCRIPTION_LEN {
        return s.to_string();
    }
    let mut result = s.chars().take(MAX_DESCRIPTION_LEN - 3).collect::<String>();
    result.push_str("...");
    result
}

/// e.g. `[Residencial Aurora] 1x Water, 2x Soda`
pub fn gateway_order_description(location_name: &str, summary: &str) -> String {
    cap_description(&format!("[{location_name}] {summary}"))
}

/// Ledger description for a payment that arrived after its order was abandoned.
pub fn late_payment_description(order_id: i64) -> String {
    format!("Pagamento do pedido #{order_id} creditado na carteira")
}
