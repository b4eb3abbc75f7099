pub mod client;

pub use client::{
    Customer, GatewayClient, GatewayError, GatewaySettings, InitiateRequest, InitiatedPayment,
    ValidationOutcome,
};
