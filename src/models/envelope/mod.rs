pub mod inbound_envelope;
