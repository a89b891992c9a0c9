use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref THROTTLE_ADMITTED: Counter = register_counter!(
        "gateway_throttle_admitted_total",
        "Notification attempts admitted by the throttle"
    )
    .unwrap();
    pub static ref THROTTLE_DENIED: Counter = register_counter!(
        "gateway_throttle_denied_total",
        "Notification attempts denied by the throttle"
    )
    .unwrap();
    pub static ref THROTTLE_KEYS: Gauge = register_gauge!(
        "gateway_throttle_tracked_keys",
        "Client keys held by the throttle"
    )
    .unwrap();
    pub static ref EMAILS_SENT: Counter =
        register_counter!("gateway_emails_sent_total", "Notification emails sent").unwrap();
    pub static ref EMAILS_FAILED: Counter =
        register_counter!("gateway_emails_failed_total", "Notification emails that failed").unwrap();
    pub static ref CHAT_REQUESTS: Counter =
        register_counter!("gateway_chat_requests_total", "Chat turns relayed").unwrap();
    pub static ref RELAY_FIRST_TOKEN_LATENCY: Histogram = register_histogram!(
        "gateway_chat_first_token_seconds",
        "Time until the LLM produced its first token"
    )
    .unwrap();
}

// Prometheus text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
