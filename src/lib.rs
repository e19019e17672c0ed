//! `pgstream` is a client-side streaming codec for the PostgreSQL wire
//! protocol, version 3.
//!
//! The crate turns typed frontend messages into wire bytes and an inbound
//! byte stream into typed backend messages. It is transport-agnostic: plug
//! the [`PgStreamClientCodec`](crate::tokio::PgStreamClientCodec) into any
//! duplex byte channel to get a `Sink` of frontend messages and a `Stream`
//! of backend messages.
//!
//! * [`messages`] defines the closed message sets and their bit-exact
//!   encode/decode contracts.
//! * [`tokio`] hosts the incremental decoder stage, tolerant of arbitrary
//!   byte-chunk boundaries.
//! * [`rollover`] is a fan-out stage that hands the input stream to one
//!   downstream consumer at a time, used for protocol phase transitions.
//! * [`types`] maps raw result columns to Rust values.

pub mod charset;
pub mod error;
pub mod messages;
pub mod rollover;
pub mod tokio;
pub mod types;

#[macro_use]
extern crate getset;
#[macro_use]
extern crate derive_new;
