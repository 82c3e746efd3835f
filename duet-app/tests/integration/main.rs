//! Integration tests covering multi-peer scenarios end-to-end.

mod helpers;

mod demo;
mod multi_peer;
