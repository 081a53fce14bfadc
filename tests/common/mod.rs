#![allow(dead_code)]

use nvp_gateway::domain::components::{Credentials, Invoice, Tender};
use nvp_gateway::domain::transaction::{TransactionBuilder, sale};
use nvp_gateway::infrastructure::in_memory::{InMemorySink, ScriptedTransport};
use nvp_gateway::{GatewayConfig, PaymentEngine};
use rust_decimal::Decimal;
use std::sync::Arc;

pub const APPROVED: &str = "RESULT[1]=0&PNREF[12]=V19A2E4C9B11&RESPMSG[8]=Approved&AUTHCODE[6]=010101";

pub fn credentials() -> Credentials {
    Credentials::new("merchant", "merchant", "PayPal", "secret")
}

pub fn card() -> Tender {
    Tender::card("4111111111111111", "1230").with_cvv("123")
}

pub fn card_sale(request_id: &str, amount: Decimal) -> TransactionBuilder {
    sale(request_id, credentials(), card(), Invoice::new(amount))
}

/// An engine wired to a scripted transport and an in-memory sink that share
/// state with the returned handles.
pub fn engine_with_sink() -> (PaymentEngine, ScriptedTransport, InMemorySink) {
    let sink = InMemorySink::new();
    let transport = ScriptedTransport::new().with_sink(sink.clone());
    let engine = PaymentEngine::new(Arc::new(GatewayConfig::default()), Box::new(transport.clone()))
        .with_sink(Box::new(sink.clone()));
    (engine, transport, sink)
}
