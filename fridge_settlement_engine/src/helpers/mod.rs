mod descriptions;
mod payment_reference;

pub use descriptions::{
    cap_description,
    gateway_order_description,
    item_summary,
    late_payment_description,
    MAX_DESCRIPTION_LEN,
    REVERSED_MARKER,
};
pub use payment_reference::PaymentReference;
