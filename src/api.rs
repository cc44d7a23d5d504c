//! Happy-path crate API
//!
//! Thin wrappers that wire the store, prover, and request pipeline
//! together for the common flows: a requester asking for access to one
//! resource, and a server bootstrapping its authorizer from the same
//! on-disk layout. Everything delegates to the underlying modules; no
//! policy lives here.

#![forbid(unsafe_code)]

use crate::logic::{Agent, Formula, Judgement, Resource, Sequent};
use crate::prover::prove_access;
use crate::request::{
    generate_request, sequent_context, AccessRequest, Authorizer, RequestError,
};
use crate::store::{EvidenceStore, StoreError};

/// The admissible context induced by every credential in the store.
pub fn build_context(
    store: &impl EvidenceStore,
    ca: &Agent,
) -> Result<Vec<Judgement>, RequestError> {
    let creds = store.credentials()?;
    sequent_context(store, ca, &creds)
}

/// One-shot request construction: load evidence, search for a closed proof
/// of `grantor says open(requester, resource)`, and assemble the request.
pub fn request_access(
    store: &impl EvidenceStore,
    ca: &Agent,
    grantor: &Agent,
    requester: &Agent,
    resource: &Resource,
) -> Result<AccessRequest, RequestError> {
    let gamma = build_context(store, ca)?;
    let goal = Formula::says(
        Formula::Agent(grantor.clone()),
        Formula::open(
            Formula::Agent(requester.clone()),
            Formula::Resource(resource.clone()),
        ),
    );
    let seq = Sequent::new(gamma, Judgement::truth(goal.clone()));
    let pf = prove_access(&seq).ok_or_else(|| RequestError::NoProof(goal.to_string()))?;
    generate_request(&pf, requester, store)
}

/// Build the server-side authorizer: trusted roots from the store's
/// certificates, acceptance credentials signed with `issuer`'s key.
pub fn authorizer_from_store(
    store: &impl EvidenceStore,
    issuer: &Agent,
    trusted: &[Agent],
) -> Result<Authorizer, StoreError> {
    let roots = trusted
        .iter()
        .map(|a| store.certificate(a))
        .collect::<Result<Vec<_>, _>>()?;
    let issuer_key = store.signing_key(issuer)?;
    Ok(Authorizer::new(roots, issuer.clone(), issuer_key))
}
