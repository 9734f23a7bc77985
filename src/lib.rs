//! stacksim
//!
//! An abstract interpreter for stepping through a compiled JVM method one
//! instruction at a time, watching the operand stack and local-variable
//! slots evolve: typed slots with two-slot-wide values, provenance tracking
//! for every value, constant folding, and ahead-of-time branch resolution.
//!
//! ## Architecture
//!
//! The crate is driven by an external stepping caller (a UI or a test
//! harness); there is no scheduler and no background work.
//!
//! - **decode**: the decoder output contract: instruction list, try
//!   regions, debug maps (`MethodCode`, `Insn`, `Label`)
//! - **effect**: per-instruction static pop/push/jump table (`EffectTable`)
//! - **value**: typed values and the append-only provenance arena
//! - **sim**: the phase-driven simulator, its containers, and known-value
//!   folding
//!
//! ## Simulation Flow
//!
//! ```text
//! MethodCode → EffectTable → Simulator
//!                              ↓
//!          init_locals → (perform_pops → perform_pushes → perform_jump)*
//! ```

pub mod decode;
pub mod effect;
pub mod error;
pub mod sim;
pub mod value;

pub use decode::{Insn, Label, MethodCode, TryRegion};
pub use effect::{EffectEntry, EffectTable, PopReq};
pub use error::{Error, Result};
pub use sim::{Prediction, SimState, Simulator};
pub use value::{Category, Lineage, LineageStore, Value};
