/// Router Module Index
///
/// Splits the HTTP surface by who may call it. The `AccessGate` middleware runs
/// in front of all three; each router then adds its own requirement.

/// Routes reachable without an identity.
pub mod public;

/// Routes that reject anonymous callers.
pub mod authenticated;

/// Routes restricted to administrators, nested under `/admin`.
pub mod admin;
