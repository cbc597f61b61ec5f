//! Protocol Buffer definitions and generated code for RPC services.
//!
//! This module contains auto-generated Rust types from Protobuf
//! definitions, created by `tonic-build` at compile time.

pub mod application {
    tonic::include_proto!("crengine.application");
}

pub mod revision {
    tonic::include_proto!("crengine.revision");
}
