use serde_json::Value;

use crate::stream::sample::Sample;

/// A classified inbound frame. Anything that does not fit one of these is
/// dropped at the decoder and never reaches the buffers.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Telemetry(Sample),
    /// Last valid entry of an `initial_data` backlog, if any survived.
    Backlog(Option<Sample>),
    PeerStatus(bool),
    Heartbeat,
}

pub fn decode(text: &str, expected_source: &str) -> Option<Inbound> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => {
            log::debug!("dropping unparseable frame: {err}");
            return None;
        }
    };
    decode_value(&value, expected_source)
}

pub fn decode_value(value: &Value, expected_source: &str) -> Option<Inbound> {
    match value.get("type").and_then(Value::as_str) {
        Some("initial_data") => {
            let Some(entries) = value.get("data").and_then(Value::as_array) else {
                log::debug!("dropping initial_data without a data array");
                return None;
            };
            let last = entries
                .iter()
                .filter_map(|entry| Sample::from_value(entry, expected_source))
                .last();
            Some(Inbound::Backlog(last))
        }
        // Only a literal `true` counts as connected.
        Some("esp32_status") => Some(Inbound::PeerStatus(
            value.get("connected").and_then(Value::as_bool) == Some(true),
        )),
        Some("heartbeat") => Some(Inbound::Heartbeat),
        _ => match Sample::from_value(value, expected_source) {
            Some(sample) => Some(Inbound::Telemetry(sample)),
            None => {
                log::debug!("dropping frame that is not valid telemetry");
                None
            }
        },
    }
}
