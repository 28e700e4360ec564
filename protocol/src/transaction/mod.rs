//! # Shielded Transactions
//!
//! ```text
//! types.rs      TxKind, TxState and the legal state moves
//! builder.rs    ShieldedTransaction, its canonical bytes, spend binding
//! assembler.rs  TxAssembler: build, sign, submit, confirm
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`TxAssembler::build_top_up`] or [`TxAssembler::build_send`].
//!    A send reserves its inputs and obtains its proof here.
//! 2. **Sign**: top-ups only, with the owner's key holder.
//! 3. **Submit**: one attempt. Rejection or a transport error releases any
//!    reservation and surfaces as `SubmissionFailed`.
//! 4. **Confirm**: the assembler polls until confirmed, rejected or timed
//!    out, then applies the store effects.

pub mod assembler;
pub mod builder;
pub mod types;

pub use assembler::{PendingTransaction, TxAssembler, TxReceipt};
pub use builder::{spend_binding, spend_statement, SendBody, ShieldedTransaction, TopUpBody, TxBody};
pub use types::{TxKind, TxState};
