//! Crate root: public surface and protocol-wide invariants
//!
//! `authproof` is a distributed authorization service built on a
//! constructive authorization logic. A requester assembles a formal proof
//! that a trusted principal grants them access to a resource; the proof
//! travels with its supporting credentials and certificates to a server
//! that independently re-checks every inference step before issuing a
//! signed access token.
//!
//! ## Invariants
//!
//! - **Canonical encoding is signature-covered.** Ed25519 signatures are
//!   computed over the UTF-8 bytes of the canonical textual encoding of a
//!   formula (`Display` in [`canon`], round-tripped by [`parse`]). Any
//!   change to that encoding invalidates every existing credential.
//!
//! - **Verification is independent of the prover.** The server never
//!   trusts how a proof was found: it rebuilds the admissible context from
//!   evidence whose signatures it has verified itself, rebases the proof
//!   onto it, and re-checks every step against the rule calculus.
//!
//! - **Purity.** Proof construction, matching, and verification perform no
//!   I/O; all model values are immutable and structurally compared. The
//!   verifier's memo table is the only interior mutability, behind a lock,
//!   and is invisible in the public semantics.
//!
//! Failure is always a precise error local to one request, never a panic
//! and never process-fatal.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Term, judgement, sequent, rule, and proof model; substitution.
pub mod logic;
/// Canonical textual encoding (the signature-covered form).
pub mod canon;
/// Parser for the canonical grammar.
pub mod parse;
/// Higher-order matching of formulas, judgements, and sequents.
pub mod matcher;
/// The fixed inference-rule catalog.
pub mod rules;
/// Per-rule structural validation and proof walking.
pub mod verifier;
/// Tactics, combinators, splicing, and the proof-search drivers.
pub mod prover;
/// Context queries over sequent assumptions (CAs, key ownership).
pub mod context;
/// Ed25519 credentials, certificates, fingerprints, chain validation.
pub mod crypto;
/// Access requests: assembly, rebasing, and server-side verification.
pub mod request;
/// JSON wire format with canonical-encoded payloads.
pub mod wire;
/// Evidence loading (abstract store + directory layout).
pub mod store;
/// Happy-path wrappers for the request and authorization flows.
pub mod api;

pub use crate::crypto::{fingerprint, Certificate, ChainError, Credential};
pub use crate::logic::{
    Agent, Formula, Judgement, Key, Operator, Premise, Proof, Resource, Rule, Sequent,
    Speaker, Substitution, Variable,
};
pub use crate::prover::{get_one_proof, prove, prove_access, Tactic};
pub use crate::request::{AccessRequest, Authorizer, RejectError, RequestError};
pub use crate::store::{DirStore, EvidenceStore};
pub use crate::verifier::verify;
