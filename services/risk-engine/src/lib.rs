//! Risk Gate
//!
//! Enforces per-user, per-pair risk limits and keeps fund locks consistent
//! across the order lifecycle:
//!
//! - pre-trade: six ordered checks (size, price band, open-order cap, daily
//!   volume, balance adequacy, rate limit) that either pass with warnings or
//!   fail with the first violated limit
//! - at acceptance: fund lock (quote for buys, base for sells) and
//!   open-order accounting
//! - per fill: settlement of the filled portion through the locks
//! - at terminal state: release of leftover locks
//!
//! User state is co-serialized with the owning pair's writer step; the gate
//! itself never takes a lock across pairs.

pub mod funds;
pub mod gate;
pub mod limits;
pub mod validator;

pub use gate::RiskGate;
pub use limits::LimitsRegistry;
