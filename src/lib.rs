//! A preprocessor and SAT-backed solver front-end for combinational
//! Boolean circuits expressed as And-Inverter Graphs.
//!
//! The substrate is [`Circ`], a hash-consed gate arena with signed edges
//! ([`Sig`]) kept in canonical form by its constructors. Two rewrite
//! engines consume and produce it: [`DagShrinker`] applies local two-level
//! rules inside a bottom-up rebuild, and [`SatSweeper`] collapses signals a
//! SAT oracle proves functionally equivalent. [`clausify`] lowers the
//! result into CNF for any solver implementing the [`SatOracle`] contract;
//! [`aiger`] moves circuits in and out of the AIGER interchange format.
//!
//! Sequential circuits are not supported: latches surface from the parser
//! as [`Def`] bindings and callers are expected to reject a non-empty list.

pub mod aiger;
pub mod circ;
pub mod clausify;
pub mod cone;
pub mod equivs;
pub mod maps;
pub mod shrink;
pub mod sig;
pub mod solver;
pub mod sweep;

use thiserror::Error;

pub use circ::Circ;
pub use cone::{Def, Sinks};
pub use equivs::Equivs;
pub use shrink::DagShrinker;
pub use sig::{Gate, GateType, Sig};
pub use solver::{CadicalSolver, Lit, SatOracle, Var};
pub use sweep::SatSweeper;

/// The result of a fallible circuit operation.
pub type Result<T> = std::result::Result<T, AigError>;

/// Error returned when reading a circuit from a file failed.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Only the plain combinational AIGER subset is supported.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Invalid token, something else was expected.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// An IO error occurred (file doesn't exist, wrong extension, ...).
    #[error("io error: {0}")]
    IoError(String),
}

/// Error returned when a circuit operation failed.
#[derive(Debug, Error)]
pub enum AigError {
    /// The circuit has latches, which the solving pipeline rejects.
    #[error("sequential circuits are not supported ({0} latches present)")]
    SequentialCircuit(usize),

    /// Just forwarding a [`ParserError`].
    #[error("{0}")]
    ParserError(#[from] ParserError),

    /// Just forwarding an IO error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
