//! Application layer use cases for the peer daemon.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules) and the infrastructure (OS/network/storage).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "route input
//!   to the correct peer when the cursor crosses a screen edge").
//! - **Depend on abstractions** (traits) rather than concrete implementations,
//!   so the infrastructure can be swapped without changing this code.
//! - **Contain no OS calls, no network I/O, no file system access**.
//!
//! # Sub-modules
//!
//! - **`control_core`** – Owns the `Idle`/`Controlling`/`Controlled` state
//!   machine, decides whether a captured input event is suppressed or
//!   forwarded, and dispatches incoming protocol messages from the currently
//!   controlling peer. This is the most critical use case — it runs on every
//!   keystroke and mouse movement.

pub mod control_core;
