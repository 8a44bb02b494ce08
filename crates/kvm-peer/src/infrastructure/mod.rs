//! Infrastructure layer for the peer daemon.
//!
//! Contains OS-facing adapters: global input capture hooks, input
//! synthesis, screen metrics, clipboard access, network sockets, network
//! interface enumeration, and persisted configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and `kvm_core`,
//! but MUST NOT be imported by the `application` or domain layers.

pub mod capture;
pub mod clipboard;
pub mod config;
pub mod emulation;
pub mod net_interfaces;
pub mod network;
pub mod screen;
