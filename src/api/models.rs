use crate::flow::CardFlow;
use crate::netcard::NetworkCards;

/// Body of `GET /cards`.
#[derive(Debug, serde::Serialize)]
pub struct CardsResponse<'a> {
    /// UNIX epoch seconds of the enumeration, `0` before the first one finished.
    pub timestamp: u64,
    pub cards: &'a NetworkCards,
    pub failures: &'a [String],
    pub container_scan_ran: bool,
}

/// Body of `GET /flow`.
#[derive(Debug, serde::Serialize)]
pub struct FlowResponse<'a> {
    pub timestamp: u64,
    pub interval_secs: u64,
    /// Bytes per second since the previous sample.
    pub flow: &'a CardFlow,
}
